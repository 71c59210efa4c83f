// SPDX-License-Identifier: PMPL-1.0-or-later
//! Atomicity tests for the transactional dataset.
//!
//! Verifies that write transactions are all-or-nothing: abort restores the
//! exact prior quad set, commit makes changes permanent, and only one
//! writer's operations reach the journal at a time. A probe backing store
//! records the calls the wrapper makes so delegation and exclusion can be
//! observed.

use std::collections::BTreeSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use quadstore_dataset::{
    DatasetError, DatasetGraph, DatasetResult, Graph, GraphName, InMemoryDataset, Quad,
    QuadPattern, Term, TransactionViolation, Triple, TxnMode,
};
use quadstore_journal::{TransactionConfig, TransactionalDataset};
use tracing_subscriber::EnvFilter;

/// Route library events to the test harness; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Add(ThreadId, Quad),
    Delete(ThreadId, Quad),
    Begin(TxnMode),
    Commit,
    Abort,
    End,
    Close,
}

type Hook = Box<dyn FnOnce() + Send>;

/// Backing store that logs every call, can be told to fail deletes of one
/// quad, and keeps a copy of its contents at the moment it is closed.
#[derive(Default)]
struct ProbeDataset {
    inner: InMemoryDataset,
    calls: Mutex<Vec<Call>>,
    fail_delete: Mutex<Option<Quad>>,
    before_delete: Mutex<Option<Hook>>,
    at_close: Mutex<Option<BTreeSet<Quad>>>,
}

impl ProbeDataset {
    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_deleting(&self, quad: Option<Quad>) {
        *self.fail_delete.lock().unwrap() = quad;
    }

    /// Run `hook` at the start of the next delete.
    fn before_next_delete(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_delete.lock().unwrap() = Some(Box::new(hook));
    }

    fn contents_at_close(&self) -> Option<BTreeSet<Quad>> {
        self.at_close.lock().unwrap().clone()
    }
}

impl DatasetGraph for ProbeDataset {
    fn add(&self, quad: &Quad) -> DatasetResult<()> {
        self.log(Call::Add(thread::current().id(), quad.clone()));
        self.inner.add(quad)
    }

    fn delete(&self, quad: &Quad) -> DatasetResult<()> {
        let hook = self.before_delete.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        if self.fail_delete.lock().unwrap().as_ref() == Some(quad) {
            return Err(DatasetError::LockPoisoned);
        }
        self.log(Call::Delete(thread::current().id(), quad.clone()));
        self.inner.delete(quad)
    }

    fn contains(&self, quad: &Quad) -> DatasetResult<bool> {
        self.inner.contains(quad)
    }

    fn find(&self, pattern: &QuadPattern) -> DatasetResult<Vec<Quad>> {
        self.inner.find(pattern)
    }

    fn add_graph(&self, name: &GraphName, graph: &Graph) -> DatasetResult<()> {
        self.inner.add_graph(name, graph)
    }

    fn remove_graph(&self, name: &GraphName) -> DatasetResult<()> {
        self.inner.remove_graph(name)
    }

    fn contains_graph(&self, name: &GraphName) -> DatasetResult<bool> {
        self.inner.contains_graph(name)
    }

    fn graph_names(&self) -> DatasetResult<Vec<Term>> {
        self.inner.graph_names()
    }

    fn clear(&self) -> DatasetResult<()> {
        self.inner.clear()
    }

    fn begin(&self, mode: TxnMode) -> DatasetResult<()> {
        self.log(Call::Begin(mode));
        Ok(())
    }

    fn commit(&self) -> DatasetResult<()> {
        self.log(Call::Commit);
        Ok(())
    }

    fn abort(&self) -> DatasetResult<()> {
        self.log(Call::Abort);
        Ok(())
    }

    fn end(&self) -> DatasetResult<()> {
        self.log(Call::End);
        Ok(())
    }

    fn close(&self) -> DatasetResult<()> {
        self.log(Call::Close);
        let contents = self.inner.find(&QuadPattern::any())?.into_iter().collect();
        *self.at_close.lock().unwrap() = Some(contents);
        self.inner.close()
    }
}

fn quad(s: &str, o: &str) -> Quad {
    Quad::new(
        GraphName::Default,
        Term::iri(format!("https://example.org/{s}")),
        Term::iri("https://example.org/knows"),
        Term::iri(format!("https://example.org/{o}")),
    )
}

fn all_quads(ds: &impl DatasetGraph) -> BTreeSet<Quad> {
    ds.find(&QuadPattern::any()).unwrap().into_iter().collect()
}

// ===========================================================================
// Rollback
// ===========================================================================

#[test]
fn test_abort_restores_exact_prior_state() {
    init_tracing();
    let ds = TransactionalDataset::new(InMemoryDataset::new());
    ds.inner().add(&quad("alice", "bob")).unwrap();
    ds.inner().add(&quad("bob", "carol")).unwrap();
    let before = all_quads(&ds);

    ds.begin(TxnMode::Write).unwrap();
    // Redundant add of a present quad and delete of an absent one.
    ds.add(&quad("alice", "bob")).unwrap();
    ds.delete(&quad("nobody", "nothing")).unwrap();
    ds.delete(&quad("bob", "carol")).unwrap();
    ds.add(&quad("carol", "dave")).unwrap();
    ds.add(&quad("bob", "carol")).unwrap();
    ds.delete(&quad("alice", "bob")).unwrap();
    ds.abort().unwrap();

    assert_eq!(all_quads(&ds), before);
    assert_eq!(ds.journal_len(), 0, "journal must be empty after abort");
}

#[test]
fn test_replay_goes_through_wrapper_unjournaled() {
    let ds = TransactionalDataset::new(ProbeDataset::default());
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();
    ds.add(&quad("c", "d")).unwrap();
    ds.abort().unwrap();

    let me = thread::current().id();
    assert_eq!(
        ds.inner().calls(),
        vec![
            Call::Begin(TxnMode::Write),
            Call::Add(me, quad("a", "b")),
            Call::Add(me, quad("c", "d")),
            Call::Delete(me, quad("c", "d")),
            Call::Delete(me, quad("a", "b")),
            Call::Abort,
        ]
    );
    assert_eq!(ds.stats().journaled_operations, 2);
}

#[test]
fn test_failed_undo_continues_and_reports_first_error() {
    init_tracing();
    let ds = TransactionalDataset::new(ProbeDataset::default());
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();
    ds.add(&quad("c", "d")).unwrap();

    ds.inner().fail_deleting(Some(quad("c", "d")));
    assert!(matches!(ds.abort(), Err(DatasetError::LockPoisoned)));

    // The older operation was still undone.
    assert!(!ds.contains(&quad("a", "b")).unwrap());
    assert!(ds.contains(&quad("c", "d")).unwrap());
    assert_eq!(ds.journal_len(), 0);
    assert!(!ds.is_in_transaction());

    // The writer gate was released.
    ds.inner().fail_deleting(None);
    assert!(ds.try_begin(TxnMode::Write).unwrap());
    ds.commit().unwrap();
}

// ===========================================================================
// Commit
// ===========================================================================

#[test]
fn test_commit_discards_journal_and_delegates() {
    let ds = TransactionalDataset::new(ProbeDataset::default());
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();
    ds.commit().unwrap();
    assert_eq!(ds.journal_len(), 0);
    assert_eq!(ds.inner().calls().last(), Some(&Call::Commit));

    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("c", "d")).unwrap();
    ds.abort().unwrap();

    assert!(ds.contains(&quad("a", "b")).unwrap());
    assert!(!ds.contains(&quad("c", "d")).unwrap());
}

#[test]
fn test_read_transaction_delegates_without_journal() {
    let ds = TransactionalDataset::new(ProbeDataset::default());
    ds.begin(TxnMode::Read).unwrap();
    assert!(!ds.is_recording());
    ds.end().unwrap();
    assert_eq!(
        ds.inner().calls(),
        vec![Call::Begin(TxnMode::Read), Call::End]
    );
}

// ===========================================================================
// Single-writer exclusion
// ===========================================================================

#[test]
fn test_second_writer_blocks_until_first_commits() {
    init_tracing();
    let ds = Arc::new(TransactionalDataset::new(ProbeDataset::default()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let (started_tx, started_rx) = mpsc::channel();

    let first = {
        let ds = Arc::clone(&ds);
        let events = Arc::clone(&events);
        thread::spawn(move || {
            ds.begin(TxnMode::Write).unwrap();
            started_tx.send(()).unwrap();
            for i in 0..5 {
                ds.add(&quad("first", &i.to_string())).unwrap();
                thread::sleep(Duration::from_millis(5));
            }
            events.lock().unwrap().push("first-commit");
            ds.commit().unwrap();
        })
    };

    started_rx.recv().unwrap();
    let second = {
        let ds = Arc::clone(&ds);
        let events = Arc::clone(&events);
        thread::spawn(move || {
            ds.begin(TxnMode::Write).unwrap();
            events.lock().unwrap().push("second-begin");
            for i in 0..5 {
                ds.add(&quad("second", &i.to_string())).unwrap();
            }
            ds.commit().unwrap();
        })
    };

    first.join().unwrap();
    second.join().unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec!["first-commit", "second-begin"]
    );

    // Each writer's additions reach the backing store as one unbroken run.
    let writers: Vec<ThreadId> = ds
        .inner()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Add(thread, _) => Some(thread),
            _ => None,
        })
        .collect();
    assert_eq!(writers.len(), 10);
    assert!(writers[..5].iter().all(|t| *t == writers[0]));
    assert!(writers[5..].iter().all(|t| *t == writers[5]));
    assert_ne!(writers[0], writers[5]);
}

#[test]
fn test_readers_do_not_wait_for_writer() {
    let ds = Arc::new(TransactionalDataset::new(InMemoryDataset::new()));
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();

    let reader = Arc::clone(&ds);
    let seen = thread::spawn(move || {
        reader
            .execute_read(|ds| ds.contains(&quad("a", "b")))
            .unwrap()
    })
    .join()
    .unwrap();

    // No isolation is added on top of the backing store.
    assert!(seen);
    ds.abort().unwrap();
}

#[test]
fn test_other_thread_cannot_write_into_open_transaction() {
    let ds = Arc::new(TransactionalDataset::new(InMemoryDataset::new()));
    ds.begin(TxnMode::Write).unwrap();

    let other = Arc::clone(&ds);
    let result = thread::spawn(move || other.add(&quad("x", "y")))
        .join()
        .unwrap();
    assert!(matches!(
        result,
        Err(DatasetError::Transaction(
            TransactionViolation::WriteOutsideWriteTransaction
        ))
    ));
    assert_eq!(ds.journal_len(), 0);
    ds.commit().unwrap();
}

#[test]
fn test_autocommit_waits_for_open_writer() {
    let ds = Arc::new(TransactionalDataset::with_config(
        InMemoryDataset::new(),
        TransactionConfig::default().with_autocommit(true),
    ));
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let other = Arc::clone(&ds);
    let writer = thread::spawn(move || {
        other.add(&quad("c", "d")).unwrap();
        done_tx.send(()).unwrap();
    });

    assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    ds.abort().unwrap();
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    writer.join().unwrap();

    assert_eq!(all_quads(&*ds), BTreeSet::from([quad("c", "d")]));
}

// ===========================================================================
// Transaction discipline
// ===========================================================================

#[test]
fn test_write_without_transaction_rejected() {
    let ds = TransactionalDataset::new(InMemoryDataset::new());
    let err = ds.add(&quad("a", "b")).unwrap_err();
    assert!(err.is_transaction_violation());
    assert!(ds.is_empty().unwrap());

    let graph: Graph = [Triple::new(
        Term::iri("https://example.org/a"),
        Term::iri("https://example.org/knows"),
        Term::iri("https://example.org/b"),
    )]
    .into_iter()
    .collect();
    let name = GraphName::named(Term::iri("https://example.org/g"));
    assert!(ds.add_graph(&name, &graph).is_err());
    assert!(!ds.contains_graph(&name).unwrap());
}

#[test]
fn test_write_in_read_transaction_rejected() {
    let ds = TransactionalDataset::new(InMemoryDataset::new());
    ds.begin(TxnMode::Read).unwrap();
    assert!(ds.delete(&quad("a", "b")).is_err());
    assert!(ds.remove_graph(&GraphName::Default).is_err());
    ds.end().unwrap();
    assert!(ds.is_empty().unwrap());
}

// ===========================================================================
// Copy-on-add
// ===========================================================================

#[test]
fn test_add_graph_snapshot_independent_of_caller() {
    let ds = TransactionalDataset::new(InMemoryDataset::new());
    let name = GraphName::named(Term::iri("https://example.org/g"));
    let t1 = Triple::new(
        Term::iri("https://example.org/s"),
        Term::iri("https://example.org/p"),
        Term::literal("one"),
    );
    let t2 = Triple::new(
        Term::iri("https://example.org/s"),
        Term::iri("https://example.org/p"),
        Term::literal("two"),
    );
    let mut external: Graph = [t1.clone(), t2.clone()].into_iter().collect();

    ds.execute_write(|ds| ds.add_graph(&name, &external)).unwrap();

    external.delete(&t1);
    external.add(Triple::new(
        Term::iri("https://example.org/s"),
        Term::iri("https://example.org/p"),
        Term::literal("three"),
    ));

    let stored = ds.graph(&name).unwrap();
    assert_eq!(stored, [t1, t2].into_iter().collect::<Graph>());
}

#[test]
fn test_close_during_write_rolls_back_backing_store() {
    init_tracing();
    let ds = TransactionalDataset::new(ProbeDataset::default());
    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();
    ds.close().unwrap();

    let calls = ds.inner().calls();
    let me = thread::current().id();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[Call::Delete(me, quad("a", "b")), Call::Close]
    );
    assert!(matches!(ds.commit(), Err(DatasetError::Closed)));
}

#[test]
fn test_close_during_abort_completes_rollback() {
    init_tracing();
    let ds = Arc::new(TransactionalDataset::new(ProbeDataset::default()));
    ds.inner().add(&quad("kept", "x")).unwrap();

    ds.begin(TxnMode::Write).unwrap();
    ds.add(&quad("a", "b")).unwrap();
    ds.add(&quad("b", "c")).unwrap();
    ds.add(&quad("c", "d")).unwrap();

    // The first undo closes the dataset from another thread and waits.
    let closer = Arc::clone(&ds);
    ds.inner().before_next_delete(move || {
        let handle = thread::spawn(move || closer.close());
        handle.join().unwrap().unwrap();
    });

    let aborted = ds.abort();
    assert!(matches!(aborted, Err(DatasetError::Closed)));
    assert!(ds.is_closed());
    assert!(!ds.is_recording());
    assert_eq!(ds.journal_len(), 0);
    assert_eq!(
        ds.inner().contents_at_close(),
        Some(BTreeSet::from([quad("kept", "x")])),
        "uncommitted quads reached the closed backing store"
    );
}
