//! The resolver channel and the registry of its servers, connections and
//! queries.
//!
//! A [`Channel`] ties the [`Registry`] – which knows which query travels
//! over which connection to which server – to the collaborators the
//! connection core needs: a [`Scheduler`] that takes over detached
//! queries, [`SocketFunctions`] that close sockets, a [`Clock`], and an
//! optional [`SockStateCallback`] informing the event loop.
//!
//! The operations that destroy connections live in the [`close`] module.
//!
//! [`close`]: super::close

use bytes::Bytes;
use std::collections::HashMap;
use std::vec::Vec;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::conn::{Connection, ConnectionId};
use super::query::{Query, QueryBinding, QueryId};
use super::scheduler::Scheduler;
use super::server::{Server, ServerId};
use super::socket::{SockStateCallback, Socket, SocketFunctions};
use super::status::Status;
use crate::resolv::conf::{ResolvConf, ResolvOptions, ServerConf, Transport};

//------------ ChannelOptions ------------------------------------------------

/// The channel-wide options the connection core evaluates.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChannelOptions {
    /// Keep idle connections open.
    pub stay_open: bool,

    /// Maximum number of queries per UDP connection, zero for no limit.
    pub udp_max_queries: usize,
}

impl From<&ResolvOptions> for ChannelOptions {
    fn from(options: &ResolvOptions) -> Self {
        ChannelOptions {
            stay_open: options.stay_open,
            udp_max_queries: options.udp_max_queries,
        }
    }
}

//------------ Registry ------------------------------------------------------

/// All servers, connections and queries of a channel.
///
/// Every connection appears exactly once in the socket index and once in
/// its server’s connection list. Both entries are removed together when
/// the connection is destroyed.
#[derive(Debug, Default)]
pub struct Registry {
    pub(super) options: ChannelOptions,
    pub(super) servers: HashMap<ServerId, Server>,
    pub(super) conns: HashMap<ConnectionId, Connection>,
    pub(super) conn_by_socket: HashMap<Socket, ConnectionId>,
    pub(super) queries: HashMap<QueryId, Query>,
    next_server: u64,
    next_conn: u64,
    next_query: u64,
    next_index: usize,
}

/// # Options and Servers
///
impl Registry {
    pub fn new(options: ChannelOptions) -> Self {
        Registry {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ChannelOptions) {
        self.options = options
    }

    /// Adds a server at the end of the configured order.
    pub fn add_server(&mut self, conf: ServerConf) -> ServerId {
        let id = ServerId(self.next_server);
        self.next_server += 1;
        let index = self.next_index;
        self.next_index += 1;
        debug!(server = %id, addr = %conf.addr, "Adding server");
        self.servers.insert(id, Server::new(id, conf, index));
        id
    }

    pub fn server(&self, server: ServerId) -> Option<&Server> {
        self.servers.get(&server)
    }

    /// Returns the server with the given address.
    pub fn server_by_addr(
        &self,
        addr: std::net::SocketAddr,
    ) -> Option<&Server> {
        self.servers.values().find(|server| server.conf.addr == addr)
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Returns the ids of all servers, healthiest first.
    ///
    /// Servers with fewer consecutive failures come first, ties are broken
    /// by configuration order.
    pub fn server_order(&self) -> Vec<ServerId> {
        let mut servers: Vec<_> = self.servers.values().collect();
        servers.sort_by_key(|server| server.sort_key());
        servers.into_iter().map(Server::id).collect()
    }

    /// Records a communication failure with the server.
    pub fn server_increment_failures(&mut self, server: ServerId) {
        if let Some(server) = self.servers.get_mut(&server) {
            server.consec_failures += 1;
            trace!(
                server = %server.id,
                failures = server.consec_failures,
                "Server failure"
            );
        }
    }

    /// Records a successful exchange with the server.
    pub fn server_set_good(&mut self, server: ServerId) {
        if let Some(server) = self.servers.get_mut(&server) {
            server.consec_failures = 0;
        }
    }

    /// Removes a server that has no connections left.
    ///
    /// Returns `false` if the server still has connections or is unknown.
    pub(super) fn remove_server(&mut self, server: ServerId) -> bool {
        match self.servers.get(&server) {
            Some(item) if item.connections.is_empty() => {
                self.servers.remove(&server);
                true
            }
            _ => false,
        }
    }

    /// Moves a retained server to a new configuration position.
    fn update_server(&mut self, server: ServerId, conf: ServerConf) {
        let index = self.next_index;
        self.next_index += 1;
        if let Some(server) = self.servers.get_mut(&server) {
            server.conf = conf;
            server.index = index;
        }
    }
}

/// # Connections
///
impl Registry {
    /// Registers a freshly opened socket as a connection to `server`.
    ///
    /// Returns `None` if the server is unknown, the socket is already in
    /// use by another connection, or a TCP connection is requested while
    /// the server already has one.
    pub fn add_connection(
        &mut self,
        server: ServerId,
        socket: Socket,
        transport: Transport,
    ) -> Option<ConnectionId> {
        if self.conn_by_socket.contains_key(&socket) {
            warn!(socket = %socket, "Socket already registered");
            return None;
        }
        let id = ConnectionId(self.next_conn);
        let item = self.servers.get_mut(&server)?;
        if transport.is_stream() && item.tcp_conn.is_some() {
            return None;
        }
        self.next_conn += 1;

        let node = item.connections.push_back(id);
        if transport.is_stream() {
            item.tcp_conn = Some(id);
        }
        self.conn_by_socket.insert(socket, id);
        self.conns
            .insert(id, Connection::new(id, socket, server, node, transport));
        trace!(
            conn = %id, server = %server, socket = %socket, %transport,
            "Added connection"
        );
        Some(id)
    }

    pub fn connection(&self, conn: ConnectionId) -> Option<&Connection> {
        self.conns.get(&conn)
    }

    pub fn connection_mut(
        &mut self,
        conn: ConnectionId,
    ) -> Option<&mut Connection> {
        self.conns.get_mut(&conn)
    }

    /// Looks up the connection using a socket.
    pub fn conn_by_socket(&self, socket: Socket) -> Option<ConnectionId> {
        self.conn_by_socket.get(&socket).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Takes a connection out of the socket index and its server’s list.
    ///
    /// Once this returns, no lookup can find the connection anymore.
    pub(super) fn unlink_connection(
        &mut self,
        conn: ConnectionId,
    ) -> Option<Connection> {
        let conn = self.conns.remove(&conn)?;
        if self.conn_by_socket.get(&conn.socket) == Some(&conn.id) {
            self.conn_by_socket.remove(&conn.socket);
        }
        if let Some(server) = self.servers.get_mut(&conn.server) {
            server.connections.remove(conn.server_node);
        }
        Some(conn)
    }

    /// Forgets the server’s TCP connection if it is `conn`.
    pub(super) fn clear_tcp_conn(
        &mut self,
        server: ServerId,
        conn: ConnectionId,
    ) {
        if let Some(server) = self.servers.get_mut(&server) {
            if server.tcp_conn == Some(conn) {
                server.tcp_conn = None;
            }
        }
    }
}

/// # Queries
///
impl Registry {
    /// Creates a new query that is not bound to any connection.
    pub fn add_query(&mut self, request: Bytes) -> QueryId {
        let id = QueryId(self.next_query);
        self.next_query += 1;
        self.queries.insert(id, Query::new(id, request));
        id
    }

    pub fn query(&self, query: QueryId) -> Option<&Query> {
        self.queries.get(&query)
    }

    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Binds a query to a connection for sending.
    ///
    /// A query bound elsewhere is detached from its previous connection
    /// first. The connection’s count of total queries is incremented.
    /// Returns `false` if either the query or the connection is unknown.
    pub fn bind_query(&mut self, query: QueryId, conn: ConnectionId) -> bool {
        if !self.conns.contains_key(&conn) {
            return false;
        }
        let Some(item) = self.queries.get_mut(&query) else {
            return false;
        };
        if let Some(binding) = item.binding.take() {
            if let Some(prev) = self.conns.get_mut(&binding.conn) {
                prev.queries.remove(binding.node);
            }
        }
        let Some(target) = self.conns.get_mut(&conn) else {
            return false;
        };
        let node = target.queries.push_back(query);
        target.total_queries += 1;
        item.binding = Some(QueryBinding { conn, node });
        true
    }

    /// Removes a finished query.
    ///
    /// This is the completion path: the query is detached from its
    /// connection and handed back to the caller.
    pub fn end_query(&mut self, query: QueryId) -> Option<Query> {
        self.detach_query(query);
        self.queries.remove(&query)
    }

    /// Detaches a query from its connection using its back-reference.
    ///
    /// Returns `false` if the query is unknown or was not bound.
    pub(super) fn detach_query(&mut self, query: QueryId) -> bool {
        let Some(binding) = self
            .queries
            .get_mut(&query)
            .and_then(|item| item.binding.take())
        else {
            return false;
        };
        if let Some(conn) = self.conns.get_mut(&binding.conn) {
            conn.queries.remove(binding.node);
        }
        true
    }
}

//------------ Channel -------------------------------------------------------

/// A resolver channel.
///
/// Dropping the channel shuts down all its connections.
pub struct Channel<S, K, C = SystemClock>
where
    S: Scheduler<C::Instant>,
    K: SocketFunctions,
    C: Clock,
{
    pub(super) registry: Registry,
    pub(super) scheduler: S,
    pub(super) sockets: K,
    pub(super) clock: C,
    pub(super) sock_state_cb: Option<SockStateCallback>,
}

impl<S, K, C> Channel<S, K, C>
where
    S: Scheduler<C::Instant>,
    K: SocketFunctions,
    C: Clock,
{
    /// Creates a channel without any servers.
    pub fn new(options: ChannelOptions, scheduler: S, sockets: K) -> Self {
        Self::with_clock(options, scheduler, sockets, C::new())
    }

    /// Creates a channel using the given clock.
    pub fn with_clock(
        options: ChannelOptions,
        scheduler: S,
        sockets: K,
        clock: C,
    ) -> Self {
        Channel {
            registry: Registry::new(options),
            scheduler,
            sockets,
            clock,
            sock_state_cb: None,
        }
    }

    /// Creates a channel from a resolver configuration.
    pub fn from_conf(conf: &ResolvConf, scheduler: S, sockets: K) -> Self {
        let options = ChannelOptions::from(&conf.options);
        let mut res = Self::new(options, scheduler, sockets);
        for server in &conf.servers {
            res.registry.add_server(server.clone());
        }
        res
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn sockets(&self) -> &K {
        &self.sockets
    }

    pub fn sockets_mut(&mut self) -> &mut K {
        &mut self.sockets
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sets the callback informing the event loop about socket interest.
    pub fn set_sock_state_cb(&mut self, cb: SockStateCallback) {
        self.sock_state_cb = Some(cb)
    }

    pub(super) fn notify_sock_state(
        &mut self,
        socket: Socket,
        read: bool,
        write: bool,
    ) {
        if let Some(cb) = self.sock_state_cb.as_mut() {
            cb(socket, read, write)
        }
    }

    /// Registers a freshly opened socket as a connection to `server`.
    ///
    /// The event loop is asked to watch the socket for reading and, while a
    /// TCP connection is being established, for writing.
    pub fn open_connection(
        &mut self,
        server: ServerId,
        socket: Socket,
        transport: Transport,
    ) -> Option<ConnectionId> {
        let conn = self.registry.add_connection(server, socket, transport)?;
        self.notify_sock_state(socket, true, transport.is_stream());
        Some(conn)
    }

    /// Handles a failed read or write on a connection.
    ///
    /// The failure is counted against the connection’s server and the
    /// connection is closed, requeueing its queries with `status`.
    pub fn handle_conn_error(&mut self, conn: ConnectionId, status: Status) {
        let Some(server) = self.registry.connection(conn).map(|c| c.server)
        else {
            return;
        };
        debug!(conn = %conn, %status, "Connection error");
        self.registry.server_increment_failures(server);
        self.close_connection(conn, status);
    }

    /// Replaces the server list.
    ///
    /// Servers whose address is still configured keep their connections
    /// and take their new position. All other servers are shut down and
    /// removed. Addresses not yet known are added.
    pub fn set_servers(&mut self, servers: &[ServerConf]) {
        let removed: Vec<_> = self
            .registry
            .servers
            .values()
            .filter(|server| {
                !servers.iter().any(|conf| conf.addr == server.conf.addr)
            })
            .map(Server::id)
            .collect();
        for server in removed {
            self.close_sockets(server);
            self.registry.remove_server(server);
        }
        for conf in servers {
            match self.registry.server_by_addr(conf.addr).map(Server::id) {
                Some(server) => {
                    self.registry.update_server(server, conf.clone())
                }
                None => {
                    self.registry.add_server(conf.clone());
                }
            }
        }
    }

    /// Shuts down all connections and removes all servers.
    ///
    /// Queries still in flight are handed to the scheduler.
    pub fn destroy(&mut self) {
        for server in self.registry.server_order() {
            self.close_sockets(server);
            self.registry.remove_server(server);
        }
    }
}

impl<S, K, C> Drop for Channel<S, K, C>
where
    S: Scheduler<C::Instant>,
    K: SocketFunctions,
    C: Clock,
{
    fn drop(&mut self) {
        self.destroy()
    }
}
