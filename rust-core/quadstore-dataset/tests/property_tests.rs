// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for the in-memory dataset

use std::collections::BTreeSet;

use proptest::prelude::*;
use quadstore_dataset::{DatasetGraph, GraphName, InMemoryDataset, Quad, QuadPattern, Term};

fn arb_term(prefix: &'static str) -> impl Strategy<Value = Term> {
    (0u8..4).prop_map(move |i| Term::iri(format!("https://example.org/{prefix}{i}")))
}

fn arb_graph() -> impl Strategy<Value = GraphName> {
    prop_oneof![
        Just(GraphName::Default),
        arb_term("g").prop_map(GraphName::Named),
    ]
}

fn arb_quad() -> impl Strategy<Value = Quad> {
    (arb_graph(), arb_term("s"), arb_term("p"), arb_term("o"))
        .prop_map(|(g, s, p, o)| Quad::new(g, s, p, o))
}

fn arb_pattern() -> impl Strategy<Value = QuadPattern> {
    (
        prop::option::of(arb_graph()),
        prop::option::of(arb_term("s")),
        prop::option::of(arb_term("p")),
        prop::option::of(arb_term("o")),
    )
        .prop_map(|(graph, subject, predicate, object)| QuadPattern {
            graph,
            subject,
            predicate,
            object,
        })
}

proptest! {
    #[test]
    fn test_find_agrees_with_set_model(
        added in prop::collection::vec(arb_quad(), 0..30),
        deleted in prop::collection::vec(arb_quad(), 0..30),
        pattern in arb_pattern()
    ) {
        let ds = InMemoryDataset::new();
        let mut model = BTreeSet::new();
        for quad in &added {
            ds.add(quad).unwrap();
            model.insert(quad.clone());
        }
        for quad in &deleted {
            ds.delete(quad).unwrap();
            model.remove(quad);
        }

        prop_assert_eq!(ds.len().unwrap(), model.len());

        let found: BTreeSet<Quad> = ds.find(&pattern).unwrap().into_iter().collect();
        let expected: BTreeSet<Quad> = model.iter().filter(|q| pattern.matches(q)).cloned().collect();
        prop_assert_eq!(found, expected);
    }
}
