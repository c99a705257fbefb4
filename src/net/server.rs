//! Configured name servers.

use core::fmt;
use std::net::SocketAddr;

use super::conn::ConnectionId;
use crate::resolv::conf::ServerConf;
use crate::utils::list::NodeList;

//------------ ServerId ------------------------------------------------------

/// Identifies a server within its channel.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ServerId(pub(super) u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

//------------ Server --------------------------------------------------------

/// The state kept for one upstream name server.
#[derive(Debug)]
pub struct Server {
    pub(super) id: ServerId,
    pub(super) conf: ServerConf,

    /// Position of the server in the configuration.
    pub(super) index: usize,

    /// All open connections, in the order they were opened.
    pub(super) connections: NodeList<ConnectionId>,

    /// The TCP connection, if there is one.
    ///
    /// There is at most one TCP connection per server.
    pub(super) tcp_conn: Option<ConnectionId>,

    /// Number of communication failures since the last success.
    pub(super) consec_failures: usize,
}

impl Server {
    pub(super) fn new(id: ServerId, conf: ServerConf, index: usize) -> Self {
        Server {
            id,
            conf,
            index,
            connections: NodeList::new(),
            tcp_conn: None,
            consec_failures: 0,
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn conf(&self) -> &ServerConf {
        &self.conf
    }

    pub fn addr(&self) -> SocketAddr {
        self.conf.addr
    }

    /// Returns the position of the server in the configuration.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the server’s connections in the order they were opened.
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.iter().copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn tcp_conn(&self) -> Option<ConnectionId> {
        self.tcp_conn
    }

    pub fn consec_failures(&self) -> usize {
        self.consec_failures
    }

    /// The key the servers are ordered by: healthiest first, then in
    /// configuration order.
    pub(super) fn sort_key(&self) -> (usize, usize) {
        (self.consec_failures, self.index)
    }
}
