// SPDX-License-Identifier: PMPL-1.0-or-later
//
// QuadStore dataset model
//
// RDF terms, triples and quads, the `DatasetGraph` contract that backing
// stores implement, and an in-memory backing store.
//
// # Modules
//
// - [`model`] -- `Term`, `GraphName`, `Triple`, `Quad`, `QuadPattern`.
// - [`graph`] -- `Graph`, an owned set of triples.
// - [`dataset`] -- The `DatasetGraph` trait and `TxnMode`.
// - [`memory`] -- `InMemoryDataset`.
// - [`error`] -- `DatasetError` and `TransactionViolation`.
//
// # Example
//
// ```rust
// use quadstore_dataset::{DatasetGraph, GraphName, InMemoryDataset, Quad, Term};
//
// let ds = InMemoryDataset::new();
// let quad = Quad::new(
//     GraphName::Default,
//     Term::iri("https://example.org/alice"),
//     Term::iri("https://example.org/knows"),
//     Term::iri("https://example.org/bob"),
// );
// ds.add(&quad).unwrap();
// assert!(ds.contains(&quad).unwrap());
// ```

pub mod dataset;
pub mod error;
pub mod graph;
pub mod memory;
pub mod model;

pub use dataset::{DatasetGraph, TxnMode};
pub use error::{DatasetError, DatasetResult, TransactionViolation};
pub use graph::Graph;
pub use memory::InMemoryDataset;
pub use model::{GraphName, Quad, QuadPattern, Term, Triple};
