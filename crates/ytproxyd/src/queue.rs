//! FIFO of admitted queries shared by connection handlers and the executor.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::protocol::{QueryRequest, QueueEntry};
use crate::transport::ResponseSink;

/// An admitted query together with the connection that asked for it.
#[derive(Clone)]
pub(crate) struct Query {
    pub(crate) request: QueryRequest,
    pub(crate) origin: ResponseSink,
}

impl Query {
    pub(crate) fn new(request: QueryRequest, origin: ResponseSink) -> Self {
        Self { request, origin }
    }

    fn entry(&self) -> QueueEntry {
        QueueEntry {
            kind: self.request.kind,
            id: self.request.id.clone(),
            query: self.request.body.clone(),
        }
    }
}

#[derive(Default)]
struct Shared {
    items: Mutex<VecDeque<Query>>,
    ready: Condvar,
}

/// Insertion-ordered queue of pending queries.
///
/// Every operation is atomic under one mutex. The head stays in the queue
/// while the executor works on it and is only removed by
/// [`pop_front`](Self::pop_front), so snapshots include in-flight work.
#[derive(Clone, Default)]
pub struct QueryQueue {
    shared: Arc<Shared>,
}

impl QueryQueue {
    /// Builds an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a query and returns its zero-based position.
    pub(crate) fn enqueue(&self, query: Query) -> usize {
        let position = {
            let mut items = self.lock();
            items.push_back(query);
            items.len() - 1
        };
        self.shared.ready.notify_all();
        position
    }

    #[cfg(test)]
    pub(crate) fn peek_front(&self) -> Option<Query> {
        self.lock().front().cloned()
    }

    /// Removes the head. Does nothing when the queue is empty.
    pub(crate) fn pop_front(&self) {
        self.lock().pop_front();
    }

    /// Number of queries waiting or in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<QueueEntry> {
        self.lock().iter().map(Query::entry).collect()
    }

    /// Blocks until a query is available, `stop` returns true, or `timeout`
    /// elapses, then peeks the head.
    pub(crate) fn wait_front(&self, timeout: Duration, stop: impl Fn() -> bool) -> Option<Query> {
        let items = self.lock();
        let (items, _) = self
            .shared
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty() && !stop())
            .unwrap_or_else(PoisonError::into_inner);
        items.front().cloned()
    }

    /// Wakes every waiter so it can re-check its stop condition.
    pub(crate) fn interrupt(&self) {
        let _items = self.lock();
        self.shared.ready.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Query>> {
        self.shared
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for QueryQueue {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("QueryQueue")
            .field("len", &self.len())
            .finish()
    }
}
