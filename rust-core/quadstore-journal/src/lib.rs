// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QuadStore transaction journal
//
// Single-writer transactions with abort for any `DatasetGraph`. Each write
// transaction records its effective quad additions and deletions in a
// reversible journal; commit discards the journal, abort replays its
// inverses newest first.
//
// # Modules
//
// - [`operation`] -- `Operation` and `QuadOperation`.
// - [`record`] -- `ReversibleOperationRecord` and the list-backed journal.
// - [`gate`] -- `WriterGate`, the fair single-writer lock.
// - [`dataset`] -- `TransactionalDataset`.
// - [`config`] -- `TransactionConfig`.
// - [`stats`] -- `TransactionStats`.
//
// # Example
//
// ```rust
// use quadstore_dataset::{DatasetGraph, GraphName, InMemoryDataset, Quad, Term};
// use quadstore_journal::TransactionalDataset;
//
// let ds = TransactionalDataset::new(InMemoryDataset::new());
// let quad = Quad::new(
//     GraphName::Default,
//     Term::iri("https://example.org/s"),
//     Term::iri("https://example.org/p"),
//     Term::literal("o"),
// );
// ds.execute_write(|ds| ds.add(&quad)).unwrap();
// assert!(ds.contains(&quad).unwrap());
// ```

pub mod config;
pub mod dataset;
pub mod gate;
pub mod operation;
pub mod record;
pub mod stats;

pub use config::TransactionConfig;
pub use dataset::TransactionalDataset;
pub use gate::WriterGate;
pub use operation::{Operation, QuadOperation};
pub use record::{ListBackedOperationRecord, QuadJournal, ReversibleOperationRecord};
pub use stats::TransactionStats;
