// SPDX-License-Identifier: PMPL-1.0-or-later
//! The backing-store contract.
//!
//! A `DatasetGraph` is a quad store with CRUD over quads and named graphs
//! plus transaction primitives. Stores without native transactions keep the
//! default no-op primitives; a transactional wrapper layers rollback on top
//! by calling these methods explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DatasetResult;
use crate::graph::Graph;
use crate::model::{GraphName, Quad, QuadPattern, Term};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxnMode {
    Read,
    Write,
}

impl TxnMode {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write)
    }
}

impl fmt::Display for TxnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "READ"),
            Self::Write => write!(f, "WRITE"),
        }
    }
}

/// A quad store.
///
/// All methods take `&self`; implementations are internally synchronized
/// per call and offer no isolation across calls.
pub trait DatasetGraph: Send + Sync {
    /// Add a quad. Adding a quad that is already present is a no-op.
    fn add(&self, quad: &Quad) -> DatasetResult<()>;

    /// Delete a quad. Deleting an absent quad is a no-op.
    fn delete(&self, quad: &Quad) -> DatasetResult<()>;

    fn contains(&self, quad: &Quad) -> DatasetResult<bool>;

    /// All quads matching `pattern`, as an owned snapshot.
    fn find(&self, pattern: &QuadPattern) -> DatasetResult<Vec<Quad>>;

    /// Add every triple of `graph` under `name`, creating the graph record
    /// if it does not exist.
    fn add_graph(&self, name: &GraphName, graph: &Graph) -> DatasetResult<()>;

    /// Delete every quad in `name` and drop its record. The default graph
    /// is emptied but never dropped.
    fn remove_graph(&self, name: &GraphName) -> DatasetResult<()>;

    fn contains_graph(&self, name: &GraphName) -> DatasetResult<bool>;

    /// Names of all named graphs, including empty ones.
    fn graph_names(&self) -> DatasetResult<Vec<Term>>;

    /// Delete every quad in every graph.
    fn clear(&self) -> DatasetResult<()>;

    /// A detached copy of the triples in `name`.
    fn graph(&self, name: &GraphName) -> DatasetResult<Graph> {
        Ok(self
            .find(&QuadPattern::in_graph(name.clone()))?
            .iter()
            .map(Quad::triple)
            .collect())
    }

    fn len(&self) -> DatasetResult<usize> {
        Ok(self.find(&QuadPattern::any())?.len())
    }

    fn is_empty(&self) -> DatasetResult<bool> {
        Ok(self.len()? == 0)
    }

    fn begin(&self, _mode: TxnMode) -> DatasetResult<()> {
        Ok(())
    }

    fn commit(&self) -> DatasetResult<()> {
        Ok(())
    }

    fn abort(&self) -> DatasetResult<()> {
        Ok(())
    }

    /// Finish the current transaction. Ending an uncommitted write
    /// transaction discards its changes.
    fn end(&self) -> DatasetResult<()> {
        Ok(())
    }

    fn close(&self) -> DatasetResult<()>;
}
