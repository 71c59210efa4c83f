// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction counters.

use serde::Serialize;

/// Accumulated transaction statistics.
///
/// Counters increase for the lifetime of the dataset; the `active_*`
/// fields are a point-in-time view taken when the snapshot is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    /// Read transactions started.
    pub begin_read: u64,
    /// Write transactions started.
    pub begin_write: u64,
    pub commits: u64,
    pub aborts: u64,
    /// Transactions finished by commit, abort or end.
    pub finished: u64,
    /// Write attempts that gave up waiting for the writer gate.
    pub write_lock_timeouts: u64,
    /// Operations appended to the journal.
    pub journaled_operations: u64,
    /// Inverse operations replayed during rollback.
    pub replayed_operations: u64,
    pub active_readers: u64,
    pub active_writers: u64,
}

impl TransactionStats {
    pub fn begins(&self) -> u64 {
        self.begin_read + self.begin_write
    }
}
