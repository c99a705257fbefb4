//! Connections to a server.

use bytes::BytesMut;
use core::fmt;

use super::query::QueryId;
use super::server::ServerId;
use super::socket::Socket;
use crate::resolv::conf::Transport;
use crate::utils::list::{NodeId, NodeList};

//------------ ConnectionId --------------------------------------------------

/// Identifies a connection within its channel.
///
/// Ids are never reused during the lifetime of a channel, so an id held
/// past the destruction of its connection simply stops resolving.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConnectionId(pub(super) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

//------------ TcpBuffers ----------------------------------------------------

/// The stream buffers of a TCP connection.
#[derive(Debug, Default)]
pub struct TcpBuffers {
    /// Received data not yet parsed into messages.
    pub parser: BytesMut,

    /// Length-prefixed messages not yet written to the socket.
    pub send: BytesMut,
}

impl TcpBuffers {
    /// Discards the content of both buffers.
    pub fn clear(&mut self) {
        self.parser.clear();
        self.send.clear();
    }

    /// Returns whether both buffers are empty.
    pub fn is_empty(&self) -> bool {
        self.parser.is_empty() && self.send.is_empty()
    }
}

//------------ Connection ----------------------------------------------------

/// One socket carrying queries to a single server.
#[derive(Debug)]
pub struct Connection {
    pub(super) id: ConnectionId,
    pub(super) socket: Socket,
    pub(super) server: ServerId,

    /// Our node in the server’s connection list.
    pub(super) server_node: NodeId,

    pub(super) transport: Transport,

    /// The queries currently bound to this connection, in binding order.
    pub(super) queries: NodeList<QueryId>,

    /// Number of queries ever sent over this connection.
    pub(super) total_queries: usize,

    /// Stream buffers, present for TCP connections only.
    pub(super) tcp: Option<TcpBuffers>,
}

impl Connection {
    pub(super) fn new(
        id: ConnectionId,
        socket: Socket,
        server: ServerId,
        server_node: NodeId,
        transport: Transport,
    ) -> Self {
        Connection {
            id,
            socket,
            server,
            server_node,
            transport,
            queries: NodeList::new(),
            total_queries: 0,
            tcp: transport.is_stream().then(TcpBuffers::default),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn socket(&self) -> Socket {
        self.socket
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_tcp(&self) -> bool {
        self.transport.is_stream()
    }

    /// Returns the number of queries currently bound to the connection.
    pub fn bound_queries(&self) -> usize {
        self.queries.len()
    }

    /// Returns the queries currently bound, in the order they were bound.
    pub fn queries(&self) -> impl Iterator<Item = QueryId> + '_ {
        self.queries.iter().copied()
    }

    /// Returns the number of queries ever sent over the connection.
    pub fn total_queries(&self) -> usize {
        self.total_queries
    }

    pub fn tcp_buffers(&self) -> Option<&TcpBuffers> {
        self.tcp.as_ref()
    }

    pub fn tcp_buffers_mut(&mut self) -> Option<&mut TcpBuffers> {
        self.tcp.as_mut()
    }
}
