// SPDX-License-Identifier: PMPL-1.0-or-later
//! Dataset error types.

use std::time::Duration;

use thiserror::Error;

use crate::dataset::TxnMode;

/// Misuse of the transaction protocol. Always reported before any state
/// is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionViolation {
    #[error("write operation outside a write transaction")]
    WriteOutsideWriteTransaction,

    #[error("{active} transaction already active on this thread")]
    NestedBegin { active: TxnMode },

    #[error("no transaction active on this thread")]
    NoActiveTransaction,

    /// `begin(Write)` from the thread that already holds the write lock.
    #[error("this thread already holds the write lock")]
    WriterSelfDeadlock,

    #[error("gave up after {waited:?} waiting for the write lock")]
    WriteLockTimeout { waited: Duration },
}

/// Dataset errors
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset is closed")]
    Closed,

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("transaction violation: {0}")]
    Transaction(#[from] TransactionViolation),
}

impl DatasetError {
    /// Returns `true` for errors caused by breaking transaction discipline.
    pub fn is_transaction_violation(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}

/// Convenience type alias for dataset results.
pub type DatasetResult<T> = Result<T, DatasetError>;
