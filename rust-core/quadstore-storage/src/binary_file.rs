// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Append-only, randomly readable binary data files.
//
// A binary data file is a flat byte space with no framing of its own:
// writes always append at the current end and return the offset they
// started at, reads are positional. Callers that need records put length
// prefixes in the bytes themselves.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::error::{check_range, StorageError, StorageResult};
use crate::segmented::{SegmentedMemBuffer, DEFAULT_SEGMENT_SIZE};

/// An append-only, randomly readable byte file.
///
/// Each call is atomic with respect to other calls on the same file, but
/// sequencing several calls into one unit is the caller's job.
pub trait BinaryDataFile: Send + Sync {
    /// Open the file. Fails with [`StorageError::AlreadyOpen`] if it is open.
    fn open(&self) -> StorageResult<()>;

    /// Returns `true` between a successful `open` and `close`.
    fn is_open(&self) -> bool;

    /// Read up to `buf.len()` bytes at `pos`.
    ///
    /// Returns `Ok(None)` when `pos` is at or past the end of data.
    fn read(&self, pos: u64, buf: &mut [u8]) -> StorageResult<Option<usize>>;

    /// Append `buf` at the end of the file, returning the offset the bytes
    /// were written at (the length before the write).
    fn write(&self, buf: &[u8]) -> StorageResult<u64>;

    /// Current length of the file in bytes.
    fn length(&self) -> StorageResult<u64>;

    /// Shrink the file to `min(length, len)` bytes. Never grows it.
    fn truncate(&self, len: u64) -> StorageResult<()>;

    /// Flush written bytes to the backing medium.
    fn sync(&self) -> StorageResult<()>;

    /// Close the file. Closing a closed file is a no-op.
    fn close(&self) -> StorageResult<()>;

    /// Read into `buf[start..start + len]`.
    fn read_range(
        &self,
        pos: u64,
        buf: &mut [u8],
        start: usize,
        len: usize,
    ) -> StorageResult<Option<usize>> {
        check_range(start, len, buf.len())?;
        self.read(pos, &mut buf[start..start + len])
    }

    /// Append `buf[start..start + len]`.
    fn write_range(&self, buf: &[u8], start: usize, len: usize) -> StorageResult<u64> {
        check_range(start, len, buf.len())?;
        self.write(&buf[start..start + len])
    }

    /// Returns `true` if the file holds no bytes.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.length()? == 0)
    }
}

// ---------------------------------------------------------------------------
// BinaryDataFileMem
// ---------------------------------------------------------------------------

/// An in-memory binary data file backed by a [`SegmentedMemBuffer`].
///
/// Reads share a read lock and never block one another. Contents are lost
/// on close; reopening yields an empty file.
#[derive(Debug)]
pub struct BinaryDataFileMem {
    label: String,
    segment_size: usize,
    storage: RwLock<Option<SegmentedMemBuffer>>,
}

impl BinaryDataFileMem {
    /// Create a closed in-memory file with the default segment size.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            storage: RwLock::new(None),
        }
    }

    /// Create a closed in-memory file with a custom segment size.
    pub fn with_segment_size(label: impl Into<String>, segment_size: usize) -> StorageResult<Self> {
        if segment_size == 0 {
            return Err(StorageError::InvalidConfig(
                "segment size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            label: label.into(),
            segment_size,
            storage: RwLock::new(None),
        })
    }

    /// Create a closed in-memory file sized from `config`.
    pub fn from_config(label: impl Into<String>, config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Self::with_segment_size(label, config.segment_size)
    }

    /// The label used in errors and log events.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn read_storage(&self) -> StorageResult<RwLockReadGuard<'_, Option<SegmentedMemBuffer>>> {
        self.storage
            .read()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))
    }

    fn write_storage(&self) -> StorageResult<RwLockWriteGuard<'_, Option<SegmentedMemBuffer>>> {
        self.storage
            .write()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))
    }

    fn not_open(&self) -> StorageError {
        StorageError::NotOpen(self.label.clone())
    }
}

impl BinaryDataFile for BinaryDataFileMem {
    fn open(&self) -> StorageResult<()> {
        let mut storage = self.write_storage()?;
        if storage.is_some() {
            return Err(StorageError::AlreadyOpen(self.label.clone()));
        }
        *storage = Some(SegmentedMemBuffer::with_segment_size(self.segment_size)?);
        debug!(label = %self.label, segment_size = self.segment_size, "Opened in-memory binary file");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.storage
            .read()
            .map(|storage| storage.is_some())
            .unwrap_or(false)
    }

    fn read(&self, pos: u64, buf: &mut [u8]) -> StorageResult<Option<usize>> {
        let storage = self.read_storage()?;
        let buffer = storage.as_ref().ok_or_else(|| self.not_open())?;
        buffer.read(pos, buf)
    }

    fn write(&self, buf: &[u8]) -> StorageResult<u64> {
        let mut storage = self.write_storage()?;
        let buffer = storage.as_mut().ok_or_else(|| self.not_open())?;
        let pos = buffer.length();
        buffer.write(pos, buf)?;
        Ok(pos)
    }

    fn length(&self) -> StorageResult<u64> {
        let storage = self.read_storage()?;
        let buffer = storage.as_ref().ok_or_else(|| self.not_open())?;
        Ok(buffer.length())
    }

    fn truncate(&self, len: u64) -> StorageResult<()> {
        let mut storage = self.write_storage()?;
        let buffer = storage.as_mut().ok_or_else(|| self.not_open())?;
        buffer.truncate(len);
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        let storage = self.read_storage()?;
        storage.as_ref().ok_or_else(|| self.not_open())?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let mut storage = self.write_storage()?;
        if storage.take().is_some() {
            debug!(label = %self.label, "Closed in-memory binary file");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BinaryDataFileRandomAccess
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct OpenFile {
    file: File,
    length: u64,
}

/// A binary data file on disk.
///
/// Reads and writes go through a single mutex since the file cursor is
/// shared. Existing contents are kept when the file is reopened.
#[derive(Debug)]
pub struct BinaryDataFileRandomAccess {
    path: PathBuf,
    state: Mutex<Option<OpenFile>>,
}

impl BinaryDataFileRandomAccess {
    /// Create a closed handle for the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(None),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_state(&self) -> StorageResult<MutexGuard<'_, Option<OpenFile>>> {
        self.state
            .lock()
            .map_err(|_| StorageError::LockPoisoned(self.path.display().to_string()))
    }

    fn not_open(&self) -> StorageError {
        StorageError::NotOpen(self.path.display().to_string())
    }
}

impl BinaryDataFile for BinaryDataFileRandomAccess {
    fn open(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        if state.is_some() {
            return Err(StorageError::AlreadyOpen(self.path.display().to_string()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let length = file.metadata()?.len();
        debug!(path = %self.path.display(), length, "Opened binary file");
        *state = Some(OpenFile { file, length });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.is_some())
            .unwrap_or(false)
    }

    fn read(&self, pos: u64, buf: &mut [u8]) -> StorageResult<Option<usize>> {
        let mut state = self.lock_state()?;
        let open = state.as_mut().ok_or_else(|| self.not_open())?;
        if pos >= open.length {
            return Ok(None);
        }
        let available = open.length - pos;
        let len = match usize::try_from(available) {
            Ok(available) => buf.len().min(available),
            Err(_) => buf.len(),
        };
        open.file.seek(SeekFrom::Start(pos))?;
        open.file.read_exact(&mut buf[..len])?;
        Ok(Some(len))
    }

    fn write(&self, buf: &[u8]) -> StorageResult<u64> {
        let mut state = self.lock_state()?;
        let open = state.as_mut().ok_or_else(|| self.not_open())?;
        let pos = open.length;
        append_all(&mut open.file, pos, buf, |file, len| file.set_len(len))?;
        open.length += buf.len() as u64;
        Ok(pos)
    }

    fn length(&self) -> StorageResult<u64> {
        let state = self.lock_state()?;
        let open = state.as_ref().ok_or_else(|| self.not_open())?;
        Ok(open.length)
    }

    fn truncate(&self, len: u64) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        let open = state.as_mut().ok_or_else(|| self.not_open())?;
        if len < open.length {
            open.file.set_len(len)?;
            open.length = len;
        }
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        let open = state.as_mut().ok_or_else(|| self.not_open())?;
        open.file.sync_all()?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        if let Some(open) = state.take() {
            open.file.sync_all()?;
            debug!(path = %self.path.display(), length = open.length, "Closed binary file");
        }
        Ok(())
    }
}

/// Write all of `buf` at `pos`. On failure the file is cut back to `pos`
/// so no partial record is left past the logical end.
fn append_all<F: Write + Seek>(
    file: &mut F,
    pos: u64,
    buf: &[u8],
    cut: impl FnOnce(&mut F, u64) -> io::Result<()>,
) -> io::Result<()> {
    file.seek(SeekFrom::Start(pos))?;
    if let Err(err) = file.write_all(buf) {
        if let Err(cut_err) = cut(file, pos) {
            warn!(error = %cut_err, pos, "Failed to cut back partial write");
        }
        return Err(err);
    }
    Ok(())
}
