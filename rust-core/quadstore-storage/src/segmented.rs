// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Segmented in-memory byte space.
//
// Storage is a list of fixed-size, zero-initialised segments. Growing the
// space only ever appends new segments, so bytes already written are never
// reallocated or copied. Bytes at or beyond the logical length always read
// as zero once exposed by a later write.

use crate::error::{StorageError, StorageResult};

/// Default segment size in bytes (1 MiB).
pub const DEFAULT_SEGMENT_SIZE: usize = 1024 * 1024;

/// Largest logical length a [`SegmentedMemBuffer`] will grow to (4 GiB).
///
/// Writes ending past this limit fail with [`StorageError::AddressOverflow`]
/// before any segment is allocated.
pub const MAX_SEGMENTED_LENGTH: u64 = 1 << 32;

/// A growable, chunked byte space with positional reads and writes.
///
/// Not internally synchronised; [`crate::binary_file::BinaryDataFileMem`]
/// wraps one in a lock.
#[derive(Debug)]
pub struct SegmentedMemBuffer {
    segment_size: usize,
    segments: Vec<Box<[u8]>>,
    /// Logical end of data (the "file end").
    data_length: u64,
}

impl SegmentedMemBuffer {
    /// Create an empty buffer with [`DEFAULT_SEGMENT_SIZE`] segments.
    pub fn new() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            segments: Vec::new(),
            data_length: 0,
        }
    }

    /// Create an empty buffer with a custom segment size.
    pub fn with_segment_size(segment_size: usize) -> StorageResult<Self> {
        if segment_size == 0 {
            return Err(StorageError::InvalidConfig(
                "segment size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            segment_size,
            segments: Vec::new(),
            data_length: 0,
        })
    }

    /// Logical length in bytes.
    pub fn length(&self) -> u64 {
        self.data_length
    }

    /// Returns `true` if no data has been written (or all was truncated).
    pub fn is_empty(&self) -> bool {
        self.data_length == 0
    }

    /// The size of each segment in bytes.
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Number of segments currently allocated.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Read up to `buf.len()` bytes starting at `pos`.
    ///
    /// The read is clamped to the logical length. Returns `Ok(None)` when
    /// `pos` is at or past the end of data.
    pub fn read(&self, pos: u64, buf: &mut [u8]) -> StorageResult<Option<usize>> {
        if pos >= self.data_length {
            return Ok(None);
        }
        let available = self.data_length - pos;
        let len = match usize::try_from(available) {
            Ok(available) => buf.len().min(available),
            Err(_) => buf.len(),
        };

        let mut position = to_index(pos)?;
        let mut copied = 0;
        while copied < len {
            let segment = position / self.segment_size;
            let offset = position % self.segment_size;
            let n = (self.segment_size - offset).min(len - copied);
            buf[copied..copied + n].copy_from_slice(&self.segments[segment][offset..offset + n]);
            copied += n;
            position += n;
        }
        Ok(Some(len))
    }

    /// Write `data` at `pos`, growing the space as needed up to
    /// [`MAX_SEGMENTED_LENGTH`].
    ///
    /// Writing past the current end leaves a zero-filled gap. The logical
    /// length becomes `max(length, pos + data.len())`.
    pub fn write(&mut self, pos: u64, data: &[u8]) -> StorageResult<()> {
        let end = pos
            .checked_add(data.len() as u64)
            .ok_or(StorageError::AddressOverflow(pos))?;
        if end > MAX_SEGMENTED_LENGTH {
            return Err(StorageError::AddressOverflow(end));
        }
        let end_index = to_index(end)?;
        self.ensure_capacity(end_index);

        let mut position = to_index(pos)?;
        let mut copied = 0;
        while copied < data.len() {
            let segment = position / self.segment_size;
            let offset = position % self.segment_size;
            let n = (self.segment_size - offset).min(data.len() - copied);
            self.segments[segment][offset..offset + n].copy_from_slice(&data[copied..copied + n]);
            copied += n;
            position += n;
        }

        self.data_length = self.data_length.max(end);
        Ok(())
    }

    /// Shrink the logical length to `min(length, new_length)`.
    ///
    /// Segments wholly past the new end are released and the tail of the
    /// boundary segment is zeroed. Never grows the buffer.
    pub fn truncate(&mut self, new_length: u64) {
        if new_length >= self.data_length {
            return;
        }
        self.data_length = new_length;

        // new_length < data_length, which was produced by a successful write,
        // so it fits in usize.
        let length = new_length as usize;
        let keep = length.div_ceil(self.segment_size);
        self.segments.truncate(keep);

        let tail = length % self.segment_size;
        if tail != 0 {
            if let Some(last) = self.segments.last_mut() {
                last[tail..].fill(0);
            }
        }
    }

    /// Discard all data.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.data_length = 0;
    }

    fn ensure_capacity(&mut self, end: usize) {
        while self.segments.len().saturating_mul(self.segment_size) < end {
            self.segments
                .push(vec![0u8; self.segment_size].into_boxed_slice());
        }
    }
}

impl Default for SegmentedMemBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_index(pos: u64) -> StorageResult<usize> {
    usize::try_from(pos).map_err(|_| StorageError::AddressOverflow(pos))
}
