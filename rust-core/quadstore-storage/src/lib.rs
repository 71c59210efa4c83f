// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QuadStore storage primitives
//
// The byte-level layer beneath the quad store: append-only binary data
// files, a segmented in-memory byte space that backs them, and fixed-size
// block storage with an allocation boundary that higher layers use to roll
// back speculative allocations.
//
// # Modules
//
// - [`binary_file`] -- The `BinaryDataFile` trait with in-memory and
//   on-disk implementations.
// - [`segmented`] -- `SegmentedMemBuffer`, a chunked byte space that grows
//   without copying.
// - [`block`] -- `Block` and `BlockId`.
// - [`block_access`] -- The `BlockAccess` trait with in-memory and on-disk
//   implementations.
// - [`config`] -- `StorageConfig`.
// - [`error`] -- `StorageError`.
//
// # Example
//
// ```rust
// use quadstore_storage::{BinaryDataFile, BinaryDataFileMem, BlockAccess, BlockAccessMem};
//
// let file = BinaryDataFileMem::new("nodes");
// file.open().unwrap();
// let offset = file.write(b"record").unwrap();
// let mut buf = [0u8; 6];
// assert_eq!(file.read(offset, &mut buf).unwrap(), Some(6));
//
// let blocks = BlockAccessMem::new("index", 4096).unwrap();
// let mut block = blocks.allocate(0).unwrap();
// block.put_u32(0, 42);
// blocks.write(&block).unwrap();
// assert_eq!(blocks.read(block.id()).unwrap().get_u32(0), Some(42));
// ```

pub mod binary_file;
pub mod block;
pub mod block_access;
pub mod config;
pub mod error;
pub mod segmented;

pub use binary_file::{BinaryDataFile, BinaryDataFileMem, BinaryDataFileRandomAccess};
pub use block::{Block, BlockId, ByteOrder, NETWORK_ORDER};
pub use block_access::{BlockAccess, BlockAccessFile, BlockAccessMem, MAX_MEM_BLOCKS};
pub use config::{StorageConfig, DEFAULT_BLOCK_SIZE};
pub use error::{StorageError, StorageResult};
pub use segmented::{SegmentedMemBuffer, DEFAULT_SEGMENT_SIZE, MAX_SEGMENTED_LENGTH};
