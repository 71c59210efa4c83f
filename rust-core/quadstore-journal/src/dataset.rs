// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transactional dataset wrapper.
//
// Wraps any `DatasetGraph` and gives it single-writer transactions with
// abort, whether or not the backing store can roll back by itself. A write
// transaction holds the writer gate and journals every effective add and
// delete; abort replays the journal's inverses, newest first, through the
// wrapper's own check-before-act path with journaling switched off.
//
// Transactions are per thread. A thread has at most one active
// transaction; mutations are allowed only from a thread inside a write
// transaction (or, with autocommit enabled, outside any transaction).

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use quadstore_dataset::{
    DatasetError, DatasetGraph, DatasetResult, Graph, GraphName, Quad, QuadPattern, Term,
    TransactionViolation, TxnMode,
};
use tracing::{debug, info, warn};

use crate::config::TransactionConfig;
use crate::gate::{lock_with_recovery, WriterGate};
use crate::operation::{Operation, QuadOperation};
use crate::record::{QuadJournal, ReversibleOperationRecord};
use crate::stats::TransactionStats;

#[derive(Debug, Default)]
struct JournalState {
    record: QuadJournal,
    recording: bool,
    /// An abort is replaying `record`. Cleared by `close` when it takes
    /// over the remainder.
    undoing: bool,
}

/// A `DatasetGraph` with journaled, abortable write transactions.
///
/// # Example
///
/// ```rust
/// use quadstore_dataset::{DatasetGraph, GraphName, InMemoryDataset, Quad, Term, TxnMode};
/// use quadstore_journal::TransactionalDataset;
///
/// let ds = TransactionalDataset::new(InMemoryDataset::new());
/// let quad = Quad::new(
///     GraphName::Default,
///     Term::iri("https://example.org/s"),
///     Term::iri("https://example.org/p"),
///     Term::literal("o"),
/// );
///
/// ds.begin(TxnMode::Write).unwrap();
/// ds.add(&quad).unwrap();
/// ds.abort().unwrap();
/// assert!(!ds.contains(&quad).unwrap());
/// ```
#[derive(Debug)]
pub struct TransactionalDataset<D: DatasetGraph> {
    inner: D,
    config: TransactionConfig,
    gate: WriterGate,
    active: Mutex<HashMap<ThreadId, TxnMode>>,
    journal: Mutex<JournalState>,
    stats: Mutex<TransactionStats>,
    closed: AtomicBool,
}

impl<D: DatasetGraph> TransactionalDataset<D> {
    pub fn new(inner: D) -> Self {
        Self::with_config(inner, TransactionConfig::default())
    }

    pub fn with_config(inner: D, config: TransactionConfig) -> Self {
        Self {
            inner,
            config,
            gate: WriterGate::new(),
            active: Mutex::new(HashMap::new()),
            journal: Mutex::new(JournalState::default()),
            stats: Mutex::new(TransactionStats::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// The backing store. Writes made through it bypass the journal.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// The calling thread's active transaction mode, if any.
    pub fn transaction_mode(&self) -> DatasetResult<Option<TxnMode>> {
        self.current_mode()
    }

    pub fn is_in_transaction(&self) -> bool {
        matches!(self.current_mode(), Ok(Some(_)))
    }

    /// Whether a write transaction is journaling.
    pub fn is_recording(&self) -> bool {
        lock_with_recovery(&self.journal).recording
    }

    /// Operations journaled by the current write transaction.
    pub fn journal_len(&self) -> usize {
        lock_with_recovery(&self.journal).record.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// A snapshot of the transaction counters.
    pub fn stats(&self) -> TransactionStats {
        let mut snapshot = lock_with_recovery(&self.stats).clone();
        let active = lock_with_recovery(&self.active);
        snapshot.active_writers = active.values().filter(|m| m.is_write()).count() as u64;
        snapshot.active_readers = active.len() as u64 - snapshot.active_writers;
        snapshot
    }

    /// Like `begin`, but a write transaction returns `Ok(false)` instead of
    /// waiting when another writer holds the gate.
    pub fn try_begin(&self, mode: TxnMode) -> DatasetResult<bool> {
        match mode {
            TxnMode::Read => self.begin_read().map(|()| true),
            TxnMode::Write => self.begin_write(false),
        }
    }

    /// Run `f` in a write transaction. Commits if `f` succeeds, aborts
    /// otherwise.
    pub fn execute_write<T>(&self, f: impl FnOnce(&Self) -> DatasetResult<T>) -> DatasetResult<T> {
        self.begin(TxnMode::Write)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = self.abort() {
                    warn!(error = %abort_err, "Abort after failed write transaction failed");
                }
                Err(err)
            }
        }
    }

    /// Run `f` in a read transaction, ending it whatever `f` returns.
    pub fn execute_read<T>(&self, f: impl FnOnce(&Self) -> DatasetResult<T>) -> DatasetResult<T> {
        self.begin(TxnMode::Read)?;
        let result = f(self);
        let ended = self.end();
        let value = result?;
        ended?;
        Ok(value)
    }

    fn check_open(&self) -> DatasetResult<()> {
        if self.is_closed() {
            return Err(DatasetError::Closed);
        }
        Ok(())
    }

    fn lock_active(&self) -> DatasetResult<MutexGuard<'_, HashMap<ThreadId, TxnMode>>> {
        self.active.lock().map_err(|_| DatasetError::LockPoisoned)
    }

    fn lock_journal(&self) -> DatasetResult<MutexGuard<'_, JournalState>> {
        self.journal.lock().map_err(|_| DatasetError::LockPoisoned)
    }

    fn bump(&self, update: impl FnOnce(&mut TransactionStats)) {
        update(&mut lock_with_recovery(&self.stats));
    }

    fn current_mode(&self) -> DatasetResult<Option<TxnMode>> {
        Ok(self.lock_active()?.get(&thread::current().id()).copied())
    }

    fn check_no_transaction(&self, requested: TxnMode) -> DatasetResult<()> {
        match self.current_mode()? {
            None => Ok(()),
            Some(TxnMode::Write) if requested.is_write() => {
                Err(TransactionViolation::WriterSelfDeadlock.into())
            }
            Some(active) => Err(TransactionViolation::NestedBegin { active }.into()),
        }
    }

    fn begin_read(&self) -> DatasetResult<()> {
        self.check_open()?;
        self.check_no_transaction(TxnMode::Read)?;
        self.inner.begin(TxnMode::Read)?;
        self.lock_active()?
            .insert(thread::current().id(), TxnMode::Read);
        self.bump(|s| s.begin_read += 1);
        debug!("Began read transaction");
        Ok(())
    }

    /// Enter a write transaction. With `wait` false, returns `Ok(false)`
    /// when the gate is busy.
    fn begin_write(&self, wait: bool) -> DatasetResult<bool> {
        self.check_open()?;
        self.check_no_transaction(TxnMode::Write)?;

        if !wait {
            if !self.gate.try_acquire()? {
                return Ok(false);
            }
        } else if let Some(timeout) = self.config.write_lock_timeout() {
            if !self.gate.try_acquire_for(timeout)? {
                self.bump(|s| s.write_lock_timeouts += 1);
                return Err(TransactionViolation::WriteLockTimeout { waited: timeout }.into());
            }
        } else {
            self.gate.acquire()?;
        }

        if let Err(err) = self.start_recording() {
            self.gate.release();
            return Err(err);
        }
        self.bump(|s| s.begin_write += 1);
        debug!("Began write transaction");
        Ok(true)
    }

    /// Runs with the gate held.
    fn start_recording(&self) -> DatasetResult<()> {
        // The dataset may have been closed while this thread queued.
        self.check_open()?;
        self.inner.begin(TxnMode::Write)?;
        {
            let mut journal = self.lock_journal()?;
            journal.record.clear();
            journal.recording = true;
        }
        self.lock_active()?
            .insert(thread::current().id(), TxnMode::Write);
        Ok(())
    }

    /// Drop the calling thread's transaction and release the gate if it
    /// was a writer.
    fn finish(&self, mode: TxnMode) {
        lock_with_recovery(&self.active).remove(&thread::current().id());
        if mode.is_write() {
            self.gate.release();
        }
        self.bump(|s| s.finished += 1);
    }

    /// Stop recording and undo the journal newest first, each entry
    /// through the check-before-act mutation path with journaling off.
    ///
    /// An entry leaves the journal only after its undo has run, so a
    /// `close` from another thread finds and replays whatever is left.
    fn rollback(&self) -> DatasetResult<()> {
        let operations = {
            let mut journal = lock_with_recovery(&self.journal);
            journal.recording = false;
            journal.undoing = true;
            journal.record.len()
        };

        let mut replayed = 0u64;
        let mut first_error = None;
        loop {
            let next = {
                let mut journal = lock_with_recovery(&self.journal);
                let next = if journal.undoing {
                    journal.record.newest().cloned()
                } else {
                    None
                };
                if next.is_none() {
                    journal.undoing = false;
                }
                next
            };
            let Some(op) = next else { break };

            replayed += 1;
            if let Err(err) = self.undo(&op) {
                warn!(error = %err, quad = %op.quad(), "Failed to undo journaled operation");
                first_error.get_or_insert(err);
            }

            let mut journal = lock_with_recovery(&self.journal);
            if journal.undoing {
                journal.record.pop_newest();
            }
        }

        self.bump(|s| s.replayed_operations += replayed);
        info!(operations, replayed, "Rolled back write transaction");
        first_error.map_or(Ok(()), Err)
    }

    fn undo(&self, op: &QuadOperation) -> DatasetResult<()> {
        match op.inverse() {
            QuadOperation::Addition(quad) => self.record_add(&quad),
            QuadOperation::Deletion(quad) => self.record_delete(&quad),
        }
    }

    /// Shared tail of `abort` and `end`.
    fn finish_uncommitted(
        &self,
        mode: TxnMode,
        finish_inner: impl FnOnce(&D) -> DatasetResult<()>,
        counts_as_abort: bool,
    ) -> DatasetResult<()> {
        let replayed = if mode.is_write() {
            self.rollback()
        } else {
            Ok(())
        };
        let finished = finish_inner(&self.inner);
        self.finish(mode);
        if counts_as_abort || mode.is_write() {
            self.bump(|s| s.aborts += 1);
        }
        replayed.and(finished)
    }

    /// Gatekeeper for every mutation.
    fn mutate<T>(&self, f: impl FnOnce() -> DatasetResult<T>) -> DatasetResult<T> {
        self.check_open()?;
        match self.current_mode()? {
            Some(TxnMode::Write) => f(),
            None if self.config.allow_autocommit => self.execute_write(|_| f()),
            Some(TxnMode::Read) | None => {
                Err(TransactionViolation::WriteOutsideWriteTransaction.into())
            }
        }
    }

    fn journal_op(&self, op: QuadOperation) -> DatasetResult<()> {
        let mut journal = self.lock_journal()?;
        if journal.recording {
            journal.record.append(op);
            drop(journal);
            self.bump(|s| s.journaled_operations += 1);
        }
        Ok(())
    }

    fn record_add(&self, quad: &Quad) -> DatasetResult<()> {
        if self.inner.contains(quad)? {
            return Ok(());
        }
        self.inner.add(quad)?;
        self.journal_op(QuadOperation::Addition(quad.clone()))
    }

    fn record_delete(&self, quad: &Quad) -> DatasetResult<()> {
        if !self.inner.contains(quad)? {
            return Ok(());
        }
        self.inner.delete(quad)?;
        self.journal_op(QuadOperation::Deletion(quad.clone()))
    }
}

/// Consume `record` newest first, applying each inverse to `target`.
/// Every operation is attempted; the first failure is returned.
fn replay_inverse<S: DatasetGraph + ?Sized>(
    record: QuadJournal,
    target: &S,
) -> (u64, Option<DatasetError>) {
    let mut replayed = 0u64;
    let mut first_error = None;
    let mut reversed = record.reverse();
    reversed.consume(|op| {
        replayed += 1;
        if let Err(err) = op.inverse().act_on(target) {
            warn!(error = %err, quad = %op.quad(), "Failed to undo journaled operation");
            first_error.get_or_insert(err);
        }
    });
    (replayed, first_error)
}

impl<D: DatasetGraph> DatasetGraph for TransactionalDataset<D> {
    /// Adds and journals `quad` only if it is absent.
    fn add(&self, quad: &Quad) -> DatasetResult<()> {
        self.mutate(|| self.record_add(quad))
    }

    /// Deletes and journals `quad` only if it is present.
    fn delete(&self, quad: &Quad) -> DatasetResult<()> {
        self.mutate(|| self.record_delete(quad))
    }

    fn contains(&self, quad: &Quad) -> DatasetResult<bool> {
        self.check_open()?;
        self.inner.contains(quad)
    }

    fn find(&self, pattern: &QuadPattern) -> DatasetResult<Vec<Quad>> {
        self.check_open()?;
        self.inner.find(pattern)
    }

    /// Copies `graph` triple by triple, each through the journaled add
    /// path. Later changes to `graph` are not seen by the dataset.
    fn add_graph(&self, name: &GraphName, graph: &Graph) -> DatasetResult<()> {
        self.mutate(|| {
            if !self.inner.contains_graph(name)? {
                self.inner.add_graph(name, &Graph::new())?;
            }
            for triple in graph {
                self.record_add(&Quad::from_triple(name.clone(), triple))?;
            }
            debug!(graph = %name, triples = graph.len(), "Copied graph into dataset");
            Ok(())
        })
    }

    fn remove_graph(&self, name: &GraphName) -> DatasetResult<()> {
        self.mutate(|| {
            for quad in self.inner.find(&QuadPattern::in_graph(name.clone()))? {
                self.record_delete(&quad)?;
            }
            self.inner.remove_graph(name)
        })
    }

    fn contains_graph(&self, name: &GraphName) -> DatasetResult<bool> {
        self.check_open()?;
        self.inner.contains_graph(name)
    }

    fn graph_names(&self) -> DatasetResult<Vec<Term>> {
        self.check_open()?;
        self.inner.graph_names()
    }

    fn clear(&self) -> DatasetResult<()> {
        self.mutate(|| {
            for quad in self.inner.find(&QuadPattern::any())? {
                self.record_delete(&quad)?;
            }
            self.inner.clear()
        })
    }

    fn graph(&self, name: &GraphName) -> DatasetResult<Graph> {
        self.check_open()?;
        self.inner.graph(name)
    }

    fn len(&self) -> DatasetResult<usize> {
        self.check_open()?;
        self.inner.len()
    }

    /// Read transactions may run alongside each other and alongside the
    /// writer. A write transaction waits for the writer gate, first come
    /// first served, for at most the configured timeout.
    fn begin(&self, mode: TxnMode) -> DatasetResult<()> {
        match mode {
            TxnMode::Read => self.begin_read(),
            TxnMode::Write => self.begin_write(true).map(|_| ()),
        }
    }

    /// Discards the journal without replaying it.
    fn commit(&self) -> DatasetResult<()> {
        self.check_open()?;
        let mode = self
            .current_mode()?
            .ok_or(TransactionViolation::NoActiveTransaction)?;

        let discarded = if mode.is_write() {
            let mut journal = self.lock_journal()?;
            journal.recording = false;
            let discarded = journal.record.len();
            journal.record.clear();
            discarded
        } else {
            0
        };

        let committed = self.inner.commit();
        self.finish(mode);
        self.bump(|s| s.commits += 1);
        if mode.is_write() {
            info!(operations = discarded, "Committed write transaction");
        } else {
            debug!("Committed read transaction");
        }
        committed
    }

    fn abort(&self) -> DatasetResult<()> {
        self.check_open()?;
        let mode = self
            .current_mode()?
            .ok_or(TransactionViolation::NoActiveTransaction)?;
        self.finish_uncommitted(mode, D::abort, true)
    }

    /// Ending an uncommitted write transaction rolls it back. With no
    /// active transaction this is a no-op.
    fn end(&self) -> DatasetResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        match self.current_mode()? {
            Some(mode) => self.finish_uncommitted(mode, D::end, false),
            None => Ok(()),
        }
    }

    /// Closing under an unfinished write transaction rolls it back
    /// directly against the backing store and releases the writer gate.
    /// An abort already replaying on another thread is taken over: the
    /// entries it has not yet undone are replayed here before the backing
    /// store closes.
    fn close(&self) -> DatasetResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let abandoned = {
            let mut journal = lock_with_recovery(&self.journal);
            if journal.recording || journal.undoing {
                journal.recording = false;
                journal.undoing = false;
                Some(mem::take(&mut journal.record))
            } else {
                None
            }
        };

        let mut first_error = None;
        if let Some(record) = abandoned {
            warn!(
                operations = record.len(),
                "Closing dataset during a write transaction; rolling back"
            );
            let (replayed, err) = replay_inverse(record, &self.inner);
            self.bump(|s| {
                s.replayed_operations += replayed;
                s.aborts += 1;
            });
            first_error = err;
        }

        let still_active = {
            let mut active = lock_with_recovery(&self.active);
            let count = active.len();
            active.clear();
            count
        };
        if still_active > 0 {
            warn!(transactions = still_active, "Transactions still active at close");
        }
        self.gate.force_release();

        let closed = self.inner.close();
        debug!("Closed transactional dataset");
        match first_error {
            Some(err) => Err(err),
            None => closed,
        }
    }
}
