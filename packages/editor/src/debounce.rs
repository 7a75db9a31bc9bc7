//! Cancelable delayed tasks keyed by block id.
//!
//! Scheduling a key aborts the task already pending for that key and starts a
//! fresh quiet period. Each schedule gets a ticket; a task that fired just
//! before being superseded is recognised as stale by [`Debouncer::fire`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::task::JoinHandle;

pub type Ticket = u64;

struct PendingTask {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

pub struct Debouncer<K> {
    next_ticket: Ticket,
    pending: HashMap<K, PendingTask>,
}

impl<K: Eq + Hash + Copy> Debouncer<K> {
    pub fn new() -> Self {
        Self {
            next_ticket: 0,
            pending: HashMap::new(),
        }
    }

    /// Run `on_fire` with the schedule's ticket once `delay` passes without
    /// another schedule for `key`. Must be called inside a tokio runtime.
    pub fn schedule<F>(&mut self, key: K, delay: Duration, on_fire: F) -> Ticket
    where
        F: FnOnce(Ticket) + Send + 'static,
    {
        self.cancel(key);

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(ticket);
        });

        self.pending.insert(key, PendingTask { ticket, handle });
        ticket
    }

    /// Claim a fired ticket. False when it was superseded or cancelled.
    pub fn fire(&mut self, key: K, ticket: Ticket) -> bool {
        match self.pending.get(&key) {
            Some(task) if task.ticket == ticket => {
                self.pending.remove(&key);
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self, key: K) -> bool {
        match self.pending.remove(&key) {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.pending.drain() {
            task.handle.abort();
        }
    }

    #[cfg(test)]
    fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<K: Eq + Hash + Copy> Default for Debouncer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for task in self.pending.values() {
            task.handle.abort();
        }
    }
}
