// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-block-size storage.
//
// A block store is a dense sequence of blocks indexed by `BlockId`, plus an
// allocation boundary equal to the sequence length. `valid(id)` holds
// exactly for `id < boundary`. Higher layers roll back speculative
// allocations with `reset_alloc_boundary`, which discards every block at or
// above the new boundary.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::block::{Block, BlockId, NETWORK_ORDER};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Largest number of blocks [`BlockAccessMem`] will hold.
///
/// IDs at or above this limit fail with [`StorageError::BlockIdOutOfRange`]
/// rather than being truncated.
pub const MAX_MEM_BLOCKS: u64 = u32::MAX as u64;

/// Fixed-size block storage addressed by [`BlockId`].
///
/// Individual calls are atomic with respect to one another; there is no
/// isolation across calls.
pub trait BlockAccess: Send + Sync {
    /// The fixed block size of this store.
    fn block_size(&self) -> usize;

    /// Allocate a zero-filled block with the next sequential ID.
    ///
    /// `size` must be `0` (meaning the store's block size) or equal to the
    /// block size.
    fn allocate(&self, size: usize) -> StorageResult<Block>;

    /// Read a block.
    fn read(&self, id: BlockId) -> StorageResult<Block>;

    /// Write a previously allocated block. Never allocates.
    fn write(&self, block: &Block) -> StorageResult<()>;

    /// Same as [`BlockAccess::write`].
    fn overwrite(&self, block: &Block) -> StorageResult<()> {
        self.write(block)
    }

    /// Returns `true` if no blocks have been allocated.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.alloc_boundary()? == 0)
    }

    /// The ID the next allocation will receive.
    fn alloc_boundary(&self) -> StorageResult<u64>;

    /// Discard all blocks with IDs at or above `boundary`. A boundary at or
    /// above the current one leaves the store unchanged.
    fn reset_alloc_boundary(&self, boundary: u64) -> StorageResult<()>;

    /// Returns `true` if `id` names an allocated block.
    fn valid(&self, id: BlockId) -> bool;

    /// Flush to the backing medium.
    fn sync(&self) -> StorageResult<()>;

    /// Close the store. Later calls fail with [`StorageError::Closed`].
    fn close(&self) -> StorageResult<()>;

    /// Label used in errors and log events.
    fn label(&self) -> &str;
}

/// Check a block's size and byte order against a store's requirements.
pub fn check_block(block: &Block, block_size: usize) -> StorageResult<()> {
    if block.len() != block_size {
        return Err(StorageError::BlockSizeMismatch {
            expected: block_size,
            actual: block.len(),
        });
    }
    if block.byte_order() != NETWORK_ORDER {
        return Err(StorageError::ByteOrderMismatch {
            id: block.id(),
            expected: NETWORK_ORDER,
            actual: block.byte_order(),
        });
    }
    Ok(())
}

fn check_alloc_size(requested: usize, block_size: usize) -> StorageResult<()> {
    if requested != 0 && requested != block_size {
        return Err(StorageError::BlockSizeMismatch {
            expected: block_size,
            actual: requested,
        });
    }
    Ok(())
}

fn check_bounds(id: BlockId, boundary: u64) -> StorageResult<()> {
    if id.get() >= boundary {
        return Err(StorageError::BlockOutOfBounds { id, boundary });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// BlockAccessMem
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemState {
    blocks: Vec<Block>,
    closed: bool,
}

/// An in-memory block store.
///
/// In safe mode (the default) every read returns, and every write stores,
/// a freshly allocated copy of the block's bytes. With safe mode off,
/// buffers are shared between store and caller until either side mutates
/// them.
#[derive(Debug)]
pub struct BlockAccessMem {
    label: String,
    block_size: usize,
    safe_mode: bool,
    state: RwLock<MemState>,
}

impl BlockAccessMem {
    /// Create an empty store in safe mode.
    pub fn new(label: impl Into<String>, block_size: usize) -> StorageResult<Self> {
        Self::with_safe_mode(label, block_size, true)
    }

    /// Create an empty store with an explicit copy mode.
    pub fn with_safe_mode(
        label: impl Into<String>,
        block_size: usize,
        safe_mode: bool,
    ) -> StorageResult<Self> {
        if block_size == 0 {
            return Err(StorageError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            label: label.into(),
            block_size,
            safe_mode,
            state: RwLock::new(MemState::default()),
        })
    }

    /// Create an empty store from `config`.
    pub fn from_config(label: impl Into<String>, config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Self::with_safe_mode(label, config.block_size, config.safe_mode)
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// The copy handed across the store boundary, with the modified flag
    /// cleared.
    fn hand_over(&self, block: &Block) -> Block {
        if self.safe_mode {
            block.replicate()
        } else {
            let mut shared = block.clone();
            shared.set_modified(false);
            shared
        }
    }

    fn read_state(&self) -> StorageResult<RwLockReadGuard<'_, MemState>> {
        let state = self
            .state
            .read()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))?;
        if state.closed {
            return Err(StorageError::Closed(self.label.clone()));
        }
        Ok(state)
    }

    fn write_state(&self) -> StorageResult<RwLockWriteGuard<'_, MemState>> {
        let state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))?;
        if state.closed {
            return Err(StorageError::Closed(self.label.clone()));
        }
        Ok(state)
    }
}

/// Convert an ID into a vector index, enforcing [`MAX_MEM_BLOCKS`].
fn mem_index(id: BlockId) -> StorageResult<usize> {
    if id.get() >= MAX_MEM_BLOCKS {
        return Err(StorageError::BlockIdOutOfRange {
            id,
            limit: MAX_MEM_BLOCKS,
        });
    }
    usize::try_from(id.get()).map_err(|_| StorageError::BlockIdOutOfRange {
        id,
        limit: MAX_MEM_BLOCKS,
    })
}

impl BlockAccess for BlockAccessMem {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate(&self, size: usize) -> StorageResult<Block> {
        check_alloc_size(size, self.block_size)?;
        let mut state = self.write_state()?;
        let id = BlockId::new(state.blocks.len() as u64);
        mem_index(id)?;

        let block = Block::zeroed(id, self.block_size);
        let handed = self.hand_over(&block);
        state.blocks.push(block);
        debug!(label = %self.label, block = %id, "Allocated block");
        Ok(handed)
    }

    fn read(&self, id: BlockId) -> StorageResult<Block> {
        let index = mem_index(id)?;
        let state = self.read_state()?;
        check_bounds(id, state.blocks.len() as u64)?;
        Ok(self.hand_over(&state.blocks[index]))
    }

    fn write(&self, block: &Block) -> StorageResult<()> {
        check_block(block, self.block_size)?;
        let index = mem_index(block.id())?;
        let mut state = self.write_state()?;
        check_bounds(block.id(), state.blocks.len() as u64)?;
        state.blocks[index] = self.hand_over(block);
        Ok(())
    }

    fn alloc_boundary(&self) -> StorageResult<u64> {
        Ok(self.read_state()?.blocks.len() as u64)
    }

    fn reset_alloc_boundary(&self, boundary: u64) -> StorageResult<()> {
        let mut state = self.write_state()?;
        let current = state.blocks.len() as u64;
        if boundary < current {
            // boundary < current, which is a vector length.
            state.blocks.truncate(boundary as usize);
            debug!(label = %self.label, from = current, to = boundary, "Reset allocation boundary");
        }
        Ok(())
    }

    fn valid(&self, id: BlockId) -> bool {
        self.read_state()
            .map(|state| id.get() < state.blocks.len() as u64)
            .unwrap_or(false)
    }

    fn sync(&self) -> StorageResult<()> {
        self.read_state().map(|_| ())
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))?;
        if !state.closed {
            state.closed = true;
            state.blocks.clear();
            debug!(label = %self.label, "Closed in-memory block store");
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

// ---------------------------------------------------------------------------
// BlockAccessFile
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FileState {
    file: Option<File>,
    boundary: u64,
}

/// A block store in a single file, block `n` at offset `n * block_size`.
///
/// Reopening an existing file derives the allocation boundary from its
/// length. Every read and write copies through the file, so blocks handed
/// out never alias storage.
#[derive(Debug)]
pub struct BlockAccessFile {
    label: String,
    path: PathBuf,
    block_size: usize,
    state: Mutex<FileState>,
}

impl BlockAccessFile {
    /// Open or create the block file at `path`.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> StorageResult<Self> {
        if block_size == 0 {
            return Err(StorageError::InvalidConfig(
                "block size must be greater than zero".to_string(),
            ));
        }
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let length = file.metadata()?.len();
        let size = block_size as u64;
        if length % size != 0 {
            return Err(StorageError::CorruptedData(format!(
                "{}: length {length} is not a multiple of block size {block_size}",
                path.display()
            )));
        }
        let boundary = length / size;
        debug!(path = %path.display(), block_size, boundary, "Opened block file");

        Ok(Self {
            label: path.display().to_string(),
            path,
            block_size,
            state: Mutex::new(FileState {
                file: Some(file),
                boundary,
            }),
        })
    }

    /// Open or create a block file sized from `config`.
    pub fn open_with_config(path: impl AsRef<Path>, config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Self::open(path, config.block_size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_state(&self) -> StorageResult<MutexGuard<'_, FileState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::LockPoisoned(self.label.clone()))
    }

    fn offset_of(&self, id: BlockId) -> StorageResult<u64> {
        id.get()
            .checked_mul(self.block_size as u64)
            .ok_or(StorageError::AddressOverflow(id.get()))
    }
}

impl BlockAccess for BlockAccessFile {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate(&self, size: usize) -> StorageResult<Block> {
        check_alloc_size(size, self.block_size)?;
        let mut state = self.lock_state()?;
        let id = BlockId::new(state.boundary);
        let end = self.offset_of(BlockId::new(state.boundary + 1))?;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.label.clone()))?;
        file.set_len(end)?;
        state.boundary += 1;
        debug!(label = %self.label, block = %id, "Allocated block");
        Ok(Block::zeroed(id, self.block_size))
    }

    fn read(&self, id: BlockId) -> StorageResult<Block> {
        let offset = self.offset_of(id)?;
        let mut state = self.lock_state()?;
        let boundary = state.boundary;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.label.clone()))?;
        check_bounds(id, boundary)?;

        let mut bytes = vec![0u8; self.block_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut bytes)?;
        Ok(Block::from_bytes(id, bytes))
    }

    fn write(&self, block: &Block) -> StorageResult<()> {
        check_block(block, self.block_size)?;
        let offset = self.offset_of(block.id())?;
        let mut state = self.lock_state()?;
        let boundary = state.boundary;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.label.clone()))?;
        check_bounds(block.id(), boundary)?;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(block.bytes())?;
        Ok(())
    }

    fn alloc_boundary(&self) -> StorageResult<u64> {
        let state = self.lock_state()?;
        if state.file.is_none() {
            return Err(StorageError::Closed(self.label.clone()));
        }
        Ok(state.boundary)
    }

    fn reset_alloc_boundary(&self, boundary: u64) -> StorageResult<()> {
        let end = self.offset_of(BlockId::new(boundary))?;
        let mut state = self.lock_state()?;
        let current = state.boundary;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.label.clone()))?;
        if boundary < current {
            file.set_len(end)?;
            state.boundary = boundary;
            debug!(label = %self.label, from = current, to = boundary, "Reset allocation boundary");
        }
        Ok(())
    }

    fn valid(&self, id: BlockId) -> bool {
        self.lock_state()
            .map(|state| state.file.is_some() && id.get() < state.boundary)
            .unwrap_or(false)
    }

    fn sync(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.label.clone()))?;
        file.sync_all()?;
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        if let Some(file) = state.file.take() {
            file.sync_all()?;
            debug!(label = %self.label, boundary = state.boundary, "Closed block file");
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
