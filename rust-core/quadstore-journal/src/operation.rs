// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Invertible dataset operations.

use serde::{Deserialize, Serialize};

use quadstore_dataset::{DatasetGraph, DatasetResult, Quad};

/// An operation on a dataset that can be undone by its inverse.
///
/// Constructing an operation never touches a dataset; only
/// [`act_on`](Operation::act_on) does.
pub trait Operation {
    type Data;

    /// The payload.
    fn data(&self) -> &Self::Data;

    /// The operation that undoes this one.
    fn inverse(&self) -> Self
    where
        Self: Sized;

    /// Apply the forward effect to `store`.
    fn act_on<S: DatasetGraph + ?Sized>(&self, store: &S) -> DatasetResult<()>;
}

/// A quad addition or deletion.
///
/// Equality and hashing depend only on the variant and the quad.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuadOperation {
    Addition(Quad),
    Deletion(Quad),
}

impl QuadOperation {
    pub fn quad(&self) -> &Quad {
        match self {
            Self::Addition(quad) | Self::Deletion(quad) => quad,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Addition(_))
    }
}

impl Operation for QuadOperation {
    type Data = Quad;

    fn data(&self) -> &Quad {
        self.quad()
    }

    fn inverse(&self) -> Self {
        match self {
            Self::Addition(quad) => Self::Deletion(quad.clone()),
            Self::Deletion(quad) => Self::Addition(quad.clone()),
        }
    }

    fn act_on<S: DatasetGraph + ?Sized>(&self, store: &S) -> DatasetResult<()> {
        match self {
            Self::Addition(quad) => store.add(quad),
            Self::Deletion(quad) => store.delete(quad),
        }
    }
}
