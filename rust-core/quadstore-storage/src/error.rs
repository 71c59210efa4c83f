// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the QuadStore block and binary-file layer.
//
// Every failure here is local and synchronous: the operation that reports
// one has not changed any stored state.

use thiserror::Error;

use crate::block::{BlockId, ByteOrder};

/// Errors raised by binary data files, segmented buffers and block access.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file has not been opened, or has been closed.
    #[error("not open: {0}")]
    NotOpen(String),

    /// `open()` was called on a file that is already open.
    #[error("already open: {0}")]
    AlreadyOpen(String),

    /// The block store has been closed.
    #[error("already closed: {0}")]
    Closed(String),

    /// A block ID outside `[0, boundary)` was read or written.
    #[error("block {id} out of bounds (allocation boundary {boundary})")]
    BlockOutOfBounds {
        /// The offending block ID.
        id: BlockId,
        /// The allocation boundary at the time of the call.
        boundary: u64,
    },

    /// A block ID beyond what this implementation can address.
    #[error("block {id} exceeds the addressable limit of {limit} blocks")]
    BlockIdOutOfRange {
        /// The offending block ID.
        id: BlockId,
        /// Largest number of blocks this implementation can hold.
        limit: u64,
    },

    /// The block's buffer length differs from the store's fixed block size.
    #[error("fixed block size only: got {actual} bytes, block size is {expected}")]
    BlockSizeMismatch {
        /// The store's block size.
        expected: usize,
        /// The size that was presented.
        actual: usize,
    },

    /// The block was built with a byte order other than network order.
    #[error("block {id} has byte order {actual:?}, store requires {expected:?}")]
    ByteOrderMismatch {
        /// The offending block ID.
        id: BlockId,
        /// The store-wide byte order.
        expected: ByteOrder,
        /// The block's byte order.
        actual: ByteOrder,
    },

    /// `start + len` does not lie inside the caller's buffer.
    #[error("range {start}+{len} outside buffer of {buffer_len} bytes")]
    BufferRange {
        /// Start offset within the caller's buffer.
        start: usize,
        /// Requested length.
        len: usize,
        /// Actual buffer length.
        buffer_len: usize,
    },

    /// A file position that cannot be represented in process memory.
    #[error("position {0} exceeds the addressable range")]
    AddressOverflow(u64),

    /// The stored data is inconsistent with the expected layout.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A lock guarding storage state was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Convenience type alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;

/// Check that `start..start + len` lies inside a buffer of `buffer_len` bytes.
pub(crate) fn check_range(start: usize, len: usize, buffer_len: usize) -> StorageResult<()> {
    match start.checked_add(len) {
        Some(end) if end <= buffer_len => Ok(()),
        _ => Err(StorageError::BufferRange {
            start,
            len,
            buffer_len,
        }),
    }
}
