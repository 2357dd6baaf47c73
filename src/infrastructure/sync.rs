//! Poison-tolerant locking and the per-namespace writer gate.
//!
//! Subscribers run under `catch_unwind`, and no state lock is held while they
//! run, so a poisoned mutex only means some unrelated thread panicked
//! mid-update. The guarded maps stay structurally valid, so the guard is
//! recovered instead of propagating the poison.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serializes writers of one namespace while letting the owning thread re-enter.
///
/// A write (read, reduce, merge, persist, publish) holds the gate for its whole
/// duration. Subscribers, reducers and stores called from inside that write run
/// on the same thread and may write again; other threads wait.
#[derive(Debug, Default)]
pub(crate) struct WriterGate {
    owner: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl WriterGate {
    pub(crate) fn enter(&self) -> WriterTurn<'_> {
        let me = thread::current().id();
        let mut owner = lock(&self.owner);
        loop {
            match *owner {
                None => {
                    *owner = Some((me, 1));
                    break;
                }
                Some((id, ref mut depth)) if id == me => {
                    *depth += 1;
                    break;
                }
                Some(_) => {}
            }
            owner = self
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        WriterTurn { gate: self }
    }
}

/// Held while a write is in progress; released on drop, including during unwinding.
pub(crate) struct WriterTurn<'a> {
    gate: &'a WriterGate,
}

impl Drop for WriterTurn<'_> {
    fn drop(&mut self) {
        let mut owner = lock(&self.gate.owner);
        let done = match owner.as_mut() {
            Some((_, depth)) => {
                *depth -= 1;
                *depth == 0
            }
            None => true,
        };
        if done {
            *owner = None;
            drop(owner);
            self.gate.released.notify_one();
        }
    }
}
