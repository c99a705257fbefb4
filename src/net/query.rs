//! In-flight queries.

use bytes::Bytes;
use core::fmt;

use super::conn::ConnectionId;
use crate::utils::list::NodeId;

//------------ QueryId -------------------------------------------------------

/// Identifies a query within its channel.
///
/// Ids are never reused during the lifetime of a channel.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct QueryId(pub(super) u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

//------------ QueryBinding --------------------------------------------------

/// The connection a query is currently bound to.
///
/// The connection’s query list owns the binding. This is merely a
/// back-reference that allows removing the query from that list without
/// searching it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QueryBinding {
    /// The connection carrying the query.
    pub conn: ConnectionId,

    /// The query’s node in the connection’s query list.
    pub node: NodeId,
}

//------------ Query ---------------------------------------------------------

/// A single in-flight resolution request.
///
/// A query without a binding belongs to the scheduler.
#[derive(Clone, Debug)]
pub struct Query {
    id: QueryId,

    /// The encoded request message.
    request: Bytes,

    pub(super) binding: Option<QueryBinding>,
}

impl Query {
    pub(super) fn new(id: QueryId, request: Bytes) -> Self {
        Query {
            id,
            request,
            binding: None,
        }
    }

    /// Returns the id of the query.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Returns the encoded request message.
    pub fn request(&self) -> &Bytes {
        &self.request
    }

    /// Returns the current binding, if any.
    pub fn binding(&self) -> Option<QueryBinding> {
        self.binding
    }

    /// Returns the connection the query is bound to, if any.
    pub fn conn(&self) -> Option<ConnectionId> {
        self.binding.map(|binding| binding.conn)
    }
}
