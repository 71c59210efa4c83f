// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fair single-writer gate.
//
// Waiters take a ticket and are admitted strictly in ticket order, so a
// stream of new writers cannot starve one that has been waiting. The gate
// records the holding thread to detect a thread waiting on itself.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use quadstore_dataset::TransactionViolation;
use tracing::warn;

#[derive(Debug)]
struct GateState {
    holder: Option<ThreadId>,
    next_ticket: u64,
    wait_queue: VecDeque<u64>,
}

impl GateState {
    fn can_admit(&self, ticket: u64) -> bool {
        self.holder.is_none() && self.wait_queue.front().copied() == Some(ticket)
    }

    fn take_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.wait_queue.push_back(ticket);
        ticket
    }

    fn remove_ticket(&mut self, ticket: u64) {
        if let Some(pos) = self.wait_queue.iter().position(|queued| *queued == ticket) {
            let _ = self.wait_queue.remove(pos);
        }
    }
}

/// A FIFO mutual-exclusion gate owned by at most one thread at a time.
///
/// Unlike a `Mutex` guard, ownership is not tied to a scope: a thread
/// acquires in `begin` and releases in `commit` or `abort`.
#[derive(Debug)]
pub struct WriterGate {
    state: Mutex<GateState>,
    cv: Condvar,
}

impl WriterGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                holder: None,
                next_ticket: 1,
                wait_queue: VecDeque::new(),
            }),
            cv: Condvar::new(),
        }
    }

    /// Block until the calling thread holds the gate.
    pub fn acquire(&self) -> Result<(), TransactionViolation> {
        self.acquire_until(None).map(|_| ())
    }

    /// Wait at most `timeout`. `Ok(false)` means the wait timed out and
    /// the caller's place in the queue was given up.
    pub fn try_acquire_for(&self, timeout: Duration) -> Result<bool, TransactionViolation> {
        self.acquire_until(Some(Instant::now() + timeout))
    }

    /// Take the gate only if it is free and nobody is queued ahead.
    pub fn try_acquire(&self) -> Result<bool, TransactionViolation> {
        let me = thread::current().id();
        let mut state = lock_with_recovery(&self.state);
        if state.holder == Some(me) {
            return Err(TransactionViolation::WriterSelfDeadlock);
        }
        if state.holder.is_none() && state.wait_queue.is_empty() {
            state.holder = Some(me);
            return Ok(true);
        }
        Ok(false)
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> Result<bool, TransactionViolation> {
        let me = thread::current().id();
        let mut state = lock_with_recovery(&self.state);
        if state.holder == Some(me) {
            return Err(TransactionViolation::WriterSelfDeadlock);
        }
        let ticket = state.take_ticket();

        loop {
            if state.can_admit(ticket) {
                let _ = state.wait_queue.pop_front();
                state.holder = Some(me);
                self.cv.notify_all();
                return Ok(true);
            }

            state = match deadline {
                None => match self.cv.wait(state) {
                    Ok(next) => next,
                    Err(poisoned) => poisoned.into_inner(),
                },
                Some(deadline) => {
                    let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                        state.remove_ticket(ticket);
                        self.cv.notify_all();
                        return Ok(false);
                    };
                    match self.cv.wait_timeout(state, remaining) {
                        Ok((next, _)) => next,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
            };
        }
    }

    /// Release the gate if the calling thread holds it. Returns `false`
    /// otherwise.
    pub fn release(&self) -> bool {
        let me = thread::current().id();
        let mut state = lock_with_recovery(&self.state);
        if state.holder != Some(me) {
            return false;
        }
        state.holder = None;
        self.cv.notify_all();
        true
    }

    /// Release the gate whoever holds it. Used when the dataset is closed
    /// under an unfinished writer.
    pub fn force_release(&self) -> Option<ThreadId> {
        let mut state = lock_with_recovery(&self.state);
        let previous = state.holder.take();
        self.cv.notify_all();
        previous
    }

    pub fn holder(&self) -> Option<ThreadId> {
        lock_with_recovery(&self.state).holder
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.holder() == Some(thread::current().id())
    }

    /// Threads currently queued for the gate.
    pub fn waiting(&self) -> usize {
        lock_with_recovery(&self.state).wait_queue.len()
    }
}

impl Default for WriterGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex whose state stays consistent across panics.
pub(crate) fn lock_with_recovery<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("mutex poisoned; recovering inner state");
            poisoned.into_inner()
        }
    }
}
