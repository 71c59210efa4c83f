// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed-size blocks.
//
// A block is an ID plus a byte buffer of the owning store's block size.
// The buffer is reference counted and copy-on-write: cloning a block is
// cheap, and the first mutation through either handle detaches it. A
// caller therefore cannot reach into storage through a block it was
// handed, whichever copy mode the store uses.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a block within a block store.
///
/// IDs are dense and assigned in allocation order starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(u64);

impl BlockId {
    /// Wrap a raw block number.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw block number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Byte order used by a block's typed accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Most significant byte first. This is network order, the only order
    /// block stores accept.
    BigEndian,
    /// Least significant byte first.
    LittleEndian,
}

/// The byte order every block store requires.
pub const NETWORK_ORDER: ByteOrder = ByteOrder::BigEndian;

/// A fixed-size block of bytes tagged with its ID.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    bytes: Arc<Vec<u8>>,
    byte_order: ByteOrder,
    modified: bool,
}

impl Block {
    /// A zero-filled block of `size` bytes in network order.
    pub fn zeroed(id: BlockId, size: usize) -> Self {
        Self::from_bytes(id, vec![0u8; size])
    }

    /// A block taking ownership of `bytes`, in network order.
    pub fn from_bytes(id: BlockId, bytes: Vec<u8>) -> Self {
        Self {
            id,
            bytes: Arc::new(bytes),
            byte_order: NETWORK_ORDER,
            modified: false,
        }
    }

    /// Re-tag this block with a different byte order.
    #[must_use]
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the block has been mutated since it was created or copied.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable access to the buffer. Detaches a shared buffer first and
    /// marks the block modified.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.modified = true;
        Arc::make_mut(&mut self.bytes).as_mut_slice()
    }

    /// A deep copy with a freshly allocated buffer and the modified flag
    /// cleared.
    #[must_use]
    pub fn replicate(&self) -> Self {
        Self {
            id: self.id,
            bytes: Arc::new(self.bytes.as_ref().clone()),
            byte_order: self.byte_order,
            modified: false,
        }
    }

    /// Returns `true` if both blocks currently share one buffer allocation.
    pub fn shares_buffer(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.bytes, &b.bytes)
    }

    /// Read a `u32` at `offset`, or `None` if it does not fit.
    pub fn get_u32(&self, offset: usize) -> Option<u32> {
        let raw: [u8; 4] = self.bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
        Some(match self.byte_order {
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
        })
    }

    /// Write a `u32` at `offset`. Returns `false` if it does not fit.
    pub fn put_u32(&mut self, offset: usize, value: u32) -> bool {
        let raw = match self.byte_order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put_raw(offset, &raw)
    }

    /// Read a `u64` at `offset`, or `None` if it does not fit.
    pub fn get_u64(&self, offset: usize) -> Option<u64> {
        let raw: [u8; 8] = self.bytes.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
        Some(match self.byte_order {
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
        })
    }

    /// Write a `u64` at `offset`. Returns `false` if it does not fit.
    pub fn put_u64(&mut self, offset: usize, value: u64) -> bool {
        let raw = match self.byte_order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.put_raw(offset, &raw)
    }

    fn put_raw(&mut self, offset: usize, raw: &[u8]) -> bool {
        let Some(end) = offset.checked_add(raw.len()) else {
            return false;
        };
        if end > self.bytes.len() {
            return false;
        }
        self.bytes_mut()[offset..end].copy_from_slice(raw);
        true
    }
}

/// Blocks are equal when their IDs and contents are equal.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.bytes == other.bytes
    }
}

impl Eq for Block {}
