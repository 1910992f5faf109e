//! Receiver registry: dispatch key → receiver, behind one mutex.
//!
//! Every operation takes the lock for a single map mutation or a single
//! filtered copy. Receivers are never called while the lock is held.
//! Taking a snapshot also drops entries scoped to senders that are gone.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::key::{DispatchKey, ReceiverId, SenderId};
use crate::receiver::Receiver;

struct Entry<S, P, R> {
    seq: u64,
    receiver: Receiver<S, P, R>,
}

struct Inner<S, P, R> {
    entries: HashMap<DispatchKey, Entry<S, P, R>>,
    next_seq: u64,
}

pub(crate) struct Registry<S, P, R> {
    inner: Mutex<Inner<S, P, R>>,
}

impl<S, P, R> Registry<S, P, R> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_seq: 0,
            }),
        }
    }

    // A panic can only poison the lock between whole map operations.
    fn lock(&self) -> MutexGuard<'_, Inner<S, P, R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert unless the key is already taken. Returns whether it was inserted.
    pub(crate) fn insert(&self, key: DispatchKey, receiver: Receiver<S, P, R>) -> bool {
        let mut inner = self.lock();
        if inner.entries.contains_key(&key) {
            return false;
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(key, Entry { seq, receiver });
        true
    }

    pub(crate) fn remove(&self, key: &DispatchKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Remove every entry holding this receiver. Returns how many were removed.
    pub(crate) fn purge(&self, receiver: ReceiverId) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.receiver.id() != receiver);
        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::info!(receiver = %receiver, removed, "purged stale receiver");
        }
        removed
    }

    /// Receivers matching a dispatch from `sender`, in registration order.
    ///
    /// Entries scoped to a sender that has since been dropped can never match
    /// again; they are removed here.
    pub(crate) fn snapshot(&self, sender: &SenderId) -> Vec<Receiver<S, P, R>> {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.sender().is_alive());
        let orphaned = before - inner.entries.len();
        if orphaned > 0 {
            tracing::info!(removed = orphaned, "purged receivers scoped to dropped senders");
        }

        let mut matching: Vec<(u64, Receiver<S, P, R>)> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.matches(sender))
            .map(|(_, entry)| (entry.seq, entry.receiver.clone()))
            .collect();
        drop(inner);

        matching.sort_unstable_by_key(|(seq, _)| *seq);
        matching.into_iter().map(|(_, receiver)| receiver).collect()
    }

    pub(crate) fn contains(&self, key: &DispatchKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub(crate) fn any_matching(&self, sender: &SenderId) -> bool {
        self.lock().entries.keys().any(|key| key.matches(sender))
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().entries.len()
    }
}
