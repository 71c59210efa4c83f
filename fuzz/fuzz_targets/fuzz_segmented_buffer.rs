// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for SegmentedMemBuffer against a flat Vec<u8> model

#![no_main]

use libfuzzer_sys::fuzz_target;
use quadstore_storage::SegmentedMemBuffer;

fuzz_target!(|data: &[u8]| {
    let Some((&first, mut rest)) = data.split_first() else {
        return;
    };
    let segment_size = usize::from(first % 16) + 1;
    let Ok(mut buffer) = SegmentedMemBuffer::with_segment_size(segment_size) else {
        return;
    };
    let mut model: Vec<u8> = Vec::new();

    while let [op, pos, arg, tail @ ..] = rest {
        let pos = u64::from(*pos);
        rest = tail;
        match op % 3 {
            0 => {
                let len = usize::from(*arg % 32).min(tail.len());
                let (bytes, next) = tail.split_at(len);
                buffer.write(pos, bytes).unwrap();

                let end = pos as usize + bytes.len();
                if model.len() < end {
                    model.resize(end, 0);
                }
                model[pos as usize..end].copy_from_slice(bytes);
                rest = next;
            }
            1 => {
                let mut out = vec![0u8; usize::from(*arg % 64)];
                let read = buffer.read(pos, &mut out).unwrap();
                if pos as usize >= model.len() {
                    assert_eq!(read, None);
                } else {
                    let n = out.len().min(model.len() - pos as usize);
                    assert_eq!(read, Some(n));
                    assert_eq!(&out[..n], &model[pos as usize..pos as usize + n]);
                }
            }
            _ => {
                buffer.truncate(pos);
                model.truncate(pos as usize);
            }
        }
        assert_eq!(buffer.length(), model.len() as u64);
    }
});
