//! The hand-off point for queries taken off a connection.
//!
//! Whenever a query loses its connection, the channel passes it to a
//! [`Scheduler`] together with the reason and the time of the event. What
//! happens next – sending it elsewhere, counting the attempt against its
//! retry budget, or failing it – is entirely up to the scheduler.

use std::collections::VecDeque;
use std::collections::vec_deque;

use super::channel::Registry;
use super::query::QueryId;
use super::status::Status;

//------------ Scheduler -----------------------------------------------------

/// Receives queries that have been detached from their connection.
///
/// The scheduler gets mutable access to the [`Registry`] and may bind the
/// query to another connection right away. It cannot close connections
/// from within the hand-off.
pub trait Scheduler<I> {
    /// Takes over a query that is no longer bound to any connection.
    fn requeue(
        &mut self,
        registry: &mut Registry,
        query: QueryId,
        now: &I,
        status: Status,
    );
}

impl<I, F> Scheduler<I> for F
where
    F: FnMut(&mut Registry, QueryId, &I, Status),
{
    fn requeue(
        &mut self,
        registry: &mut Registry,
        query: QueryId,
        now: &I,
        status: Status,
    ) {
        (self)(registry, query, now, status)
    }
}

//------------ Requeued ------------------------------------------------------

/// A query parked by the [`PendingQueue`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Requeued<I> {
    pub query: QueryId,
    pub now: I,
    pub status: Status,
}

//------------ PendingQueue --------------------------------------------------

/// A scheduler that parks requeued queries for the next dispatch round.
///
/// Queries come out in the order they were requeued.
#[derive(Clone, Debug)]
pub struct PendingQueue<I> {
    queue: VecDeque<Requeued<I>>,
}

impl<I> PendingQueue<I> {
    pub fn new() -> Self {
        PendingQueue {
            queue: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Takes the oldest parked query.
    pub fn pop(&mut self) -> Option<Requeued<I>> {
        self.queue.pop_front()
    }

    pub fn iter(&self) -> vec_deque::Iter<'_, Requeued<I>> {
        self.queue.iter()
    }

    /// Returns whether the query is parked here.
    pub fn contains(&self, query: QueryId) -> bool {
        self.queue.iter().any(|item| item.query == query)
    }
}

impl<I> Default for PendingQueue<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone> Scheduler<I> for PendingQueue<I> {
    fn requeue(
        &mut self,
        _registry: &mut Registry,
        query: QueryId,
        now: &I,
        status: Status,
    ) {
        self.queue.push_back(Requeued {
            query,
            now: now.clone(),
            status,
        })
    }
}
