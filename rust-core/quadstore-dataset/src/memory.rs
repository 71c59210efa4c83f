// SPDX-License-Identifier: PMPL-1.0-or-later
//! In-memory backing store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use tracing::debug;

use crate::dataset::DatasetGraph;
use crate::error::{DatasetError, DatasetResult};
use crate::graph::Graph;
use crate::model::{GraphName, Quad, QuadPattern, Term, Triple};

#[derive(Debug)]
struct MemState {
    graphs: BTreeMap<GraphName, BTreeSet<Triple>>,
    closed: bool,
}

impl MemState {
    fn new() -> Self {
        let mut graphs = BTreeMap::new();
        graphs.insert(GraphName::Default, BTreeSet::new());
        Self {
            graphs,
            closed: false,
        }
    }

    fn check_open(&self) -> DatasetResult<()> {
        if self.closed {
            return Err(DatasetError::Closed);
        }
        Ok(())
    }
}

/// A quad store held in memory, one ordered triple set per graph.
///
/// Thread-safe via `RwLock`: concurrent reads, exclusive writes. It has no
/// native transactions; wrap it in a transactional dataset for rollback.
#[derive(Debug)]
pub struct InMemoryDataset {
    state: RwLock<MemState>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemState::new()),
        }
    }
}

impl Default for InMemoryDataset {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetGraph for InMemoryDataset {
    fn add(&self, quad: &Quad) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        state
            .graphs
            .entry(quad.graph.clone())
            .or_default()
            .insert(quad.triple());
        Ok(())
    }

    fn delete(&self, quad: &Quad) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        if let Some(triples) = state.graphs.get_mut(&quad.graph) {
            triples.remove(&quad.triple());
        }
        Ok(())
    }

    fn contains(&self, quad: &Quad) -> DatasetResult<bool> {
        let state = self.state.read().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        Ok(state
            .graphs
            .get(&quad.graph)
            .is_some_and(|triples| triples.contains(&quad.triple())))
    }

    fn find(&self, pattern: &QuadPattern) -> DatasetResult<Vec<Quad>> {
        let state = self.state.read().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;

        let collect = |name: &GraphName, triples: &BTreeSet<Triple>, out: &mut Vec<Quad>| {
            out.extend(
                triples
                    .iter()
                    .filter(|t| pattern.matches_triple(t))
                    .map(|t| Quad::from_triple(name.clone(), t)),
            );
        };

        let mut found = Vec::new();
        match &pattern.graph {
            Some(name) => {
                if let Some(triples) = state.graphs.get(name) {
                    collect(name, triples, &mut found);
                }
            }
            None => {
                for (name, triples) in &state.graphs {
                    collect(name, triples, &mut found);
                }
            }
        }
        Ok(found)
    }

    fn add_graph(&self, name: &GraphName, graph: &Graph) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        let triples = state.graphs.entry(name.clone()).or_default();
        triples.extend(graph.iter().cloned());
        debug!(graph = %name, triples = graph.len(), "Added graph");
        Ok(())
    }

    fn remove_graph(&self, name: &GraphName) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        if name.is_default() {
            if let Some(triples) = state.graphs.get_mut(name) {
                triples.clear();
            }
        } else {
            state.graphs.remove(name);
        }
        debug!(graph = %name, "Removed graph");
        Ok(())
    }

    fn contains_graph(&self, name: &GraphName) -> DatasetResult<bool> {
        let state = self.state.read().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        Ok(state.graphs.contains_key(name))
    }

    fn graph_names(&self) -> DatasetResult<Vec<Term>> {
        let state = self.state.read().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        Ok(state
            .graphs
            .keys()
            .filter_map(|name| match name {
                GraphName::Named(term) => Some(term.clone()),
                GraphName::Default => None,
            })
            .collect())
    }

    fn clear(&self) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        *state = MemState::new();
        Ok(())
    }

    fn len(&self) -> DatasetResult<usize> {
        let state = self.state.read().map_err(|_| DatasetError::LockPoisoned)?;
        state.check_open()?;
        Ok(state.graphs.values().map(BTreeSet::len).sum())
    }

    fn close(&self) -> DatasetResult<()> {
        let mut state = self.state.write().map_err(|_| DatasetError::LockPoisoned)?;
        if !state.closed {
            state.graphs.clear();
            state.closed = true;
            debug!("Closed in-memory dataset");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(local: &str) -> Term {
        Term::iri(format!("https://example.org/{local}"))
    }

    fn quad(g: Option<&str>, s: &str, o: &str) -> Quad {
        let graph = g.map_or(GraphName::Default, |g| GraphName::named(iri(g)));
        Quad::new(graph, iri(s), iri("knows"), iri(o))
    }

    #[test]
    fn test_add_find_delete() {
        let ds = InMemoryDataset::new();
        ds.add(&quad(None, "alice", "bob")).unwrap();
        ds.add(&quad(Some("g1"), "alice", "carol")).unwrap();
        ds.add(&quad(Some("g1"), "alice", "carol")).unwrap();

        assert_eq!(ds.len().unwrap(), 2);
        assert!(ds.contains(&quad(Some("g1"), "alice", "carol")).unwrap());
        assert!(!ds.contains(&quad(None, "alice", "carol")).unwrap());

        let by_subject = ds
            .find(&QuadPattern::any().with_subject(iri("alice")))
            .unwrap();
        assert_eq!(by_subject.len(), 2);

        ds.delete(&quad(None, "alice", "bob")).unwrap();
        ds.delete(&quad(None, "alice", "bob")).unwrap();
        assert_eq!(ds.len().unwrap(), 1);
    }

    #[test]
    fn test_find_restricted_to_graph() {
        let ds = InMemoryDataset::new();
        ds.add(&quad(None, "a", "b")).unwrap();
        ds.add(&quad(Some("g1"), "a", "b")).unwrap();
        ds.add(&quad(Some("g2"), "a", "b")).unwrap();

        let in_g1 = ds
            .find(&QuadPattern::in_graph(GraphName::named(iri("g1"))))
            .unwrap();
        assert_eq!(in_g1, vec![quad(Some("g1"), "a", "b")]);
        assert!(ds
            .find(&QuadPattern::in_graph(GraphName::named(iri("missing"))))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_graph_records() {
        let ds = InMemoryDataset::new();
        let name = GraphName::named(iri("g"));
        assert!(!ds.contains_graph(&name).unwrap());
        assert!(ds.contains_graph(&GraphName::Default).unwrap());

        ds.add_graph(&name, &Graph::new()).unwrap();
        assert!(ds.contains_graph(&name).unwrap());
        assert_eq!(ds.graph_names().unwrap(), vec![iri("g")]);

        ds.add(&quad(Some("g"), "a", "b")).unwrap();
        ds.remove_graph(&name).unwrap();
        assert!(!ds.contains_graph(&name).unwrap());
        assert!(ds.is_empty().unwrap());
    }

    #[test]
    fn test_remove_default_graph_empties_it() {
        let ds = InMemoryDataset::new();
        ds.add(&quad(None, "a", "b")).unwrap();
        ds.remove_graph(&GraphName::Default).unwrap();
        assert!(ds.contains_graph(&GraphName::Default).unwrap());
        assert!(ds.is_empty().unwrap());
    }

    #[test]
    fn test_graph_is_detached_copy() {
        let ds = InMemoryDataset::new();
        let name = GraphName::named(iri("g"));
        ds.add(&quad(Some("g"), "a", "b")).unwrap();

        let mut snapshot = ds.graph(&name).unwrap();
        snapshot.add(Triple::new(iri("x"), iri("knows"), iri("y")));

        assert_eq!(ds.graph(&name).unwrap().len(), 1);
    }

    #[test]
    fn test_clear() {
        let ds = InMemoryDataset::new();
        ds.add(&quad(None, "a", "b")).unwrap();
        ds.add(&quad(Some("g"), "a", "b")).unwrap();
        ds.clear().unwrap();
        assert!(ds.is_empty().unwrap());
        assert!(ds.graph_names().unwrap().is_empty());
    }

    #[test]
    fn test_closed_dataset_rejects_calls() {
        let ds = InMemoryDataset::new();
        ds.close().unwrap();
        ds.close().unwrap();
        assert!(matches!(
            ds.add(&quad(None, "a", "b")),
            Err(DatasetError::Closed)
        ));
        assert!(matches!(ds.len(), Err(DatasetError::Closed)));
    }
}
