// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};
use crate::segmented::DEFAULT_SEGMENT_SIZE;

/// Default block size in bytes (8 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Configuration shared by the block and binary-file layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Fixed size of every block in a block store.
    pub block_size: usize,
    /// Segment size for in-memory binary files.
    pub segment_size: usize,
    /// Copy block buffers eagerly on every read and write.
    pub safe_mode: bool,
}

impl StorageConfig {
    /// Reject zero sizes.
    pub fn validate(&self) -> StorageResult<()> {
        if self.block_size == 0 {
            return Err(StorageError::InvalidConfig(
                "block_size must be greater than zero".to_string(),
            ));
        }
        if self.segment_size == 0 {
            return Err(StorageError::InvalidConfig(
                "segment_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> StorageResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            segment_size: DEFAULT_SEGMENT_SIZE,
            safe_mode: true,
        }
    }
}
