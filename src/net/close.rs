//! Closing connections.
//!
//! All connections are destroyed through [`Channel::close_connection`]. It
//! takes the connection out of every index before any of its queries is
//! handed to the scheduler, so the scheduler never sees a connection that
//! is being torn down. The remaining operations decide which connections
//! to close: [`Channel::close_sockets`] closes all connections of a server
//! and [`Channel::check_cleanup_conns`] closes those that are idle and no
//! longer wanted.

use core::fmt;
use std::vec::Vec;
use tracing::{debug, trace, warn};

use super::channel::{Channel, ChannelOptions};
use super::clock::Clock;
use super::conn::{Connection, ConnectionId};
use super::query::{QueryBinding, QueryId};
use super::scheduler::Scheduler;
use super::server::{Server, ServerId};
use super::socket::SocketFunctions;
use super::status::Status;
use crate::resolv::conf::Transport;
use crate::utils::list::NodeId;

//------------ CleanupReason -------------------------------------------------

/// Why the cleanup sweep closed a connection.
///
/// If several reasons apply, the first one in the order of the variants
/// is reported.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CleanupReason {
    /// The channel does not keep idle connections open.
    NotStayOpen,

    /// The server had failures. Reopening the connection changes the
    /// source port which can get us past middleboxes dropping packets and
    /// makes spoofing responses harder.
    ServerFailures,

    /// The UDP connection has carried the maximum number of queries.
    UdpMaxQueries,
}

impl fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupReason::NotStayOpen => f.write_str("idle"),
            CleanupReason::ServerFailures => f.write_str("server failures"),
            CleanupReason::UdpMaxQueries => {
                f.write_str("UDP query limit reached")
            }
        }
    }
}

/// Decides whether the cleanup sweep should close a connection.
///
/// A connection with queries in flight is never closed.
pub fn cleanup_reason(
    options: &ChannelOptions,
    server: &Server,
    conn: &Connection,
) -> Option<CleanupReason> {
    if conn.bound_queries() > 0 {
        return None;
    }
    if !options.stay_open {
        return Some(CleanupReason::NotStayOpen);
    }
    if server.consec_failures() > 0 {
        return Some(CleanupReason::ServerFailures);
    }
    if conn.transport() == Transport::Udp
        && options.udp_max_queries > 0
        && conn.total_queries() >= options.udp_max_queries
    {
        return Some(CleanupReason::UdpMaxQueries);
    }
    None
}

//------------ Channel -------------------------------------------------------

impl<S, K, C> Channel<S, K, C>
where
    S: Scheduler<C::Instant>,
    K: SocketFunctions,
    C: Clock,
{
    /// Closes a connection.
    ///
    /// Every query still bound to the connection is handed to the scheduler
    /// with `status`. Unknown connections are ignored.
    pub fn close_connection(&mut self, conn: ConnectionId, status: Status) {
        // Unlink
        let Some(mut conn) = self.registry.unlink_connection(conn) else {
            return;
        };

        if let Some(tcp) = conn.tcp.as_mut() {
            tcp.clear();
            self.registry.clear_tcp_conn(conn.server, conn.id);
        }

        self.requeue_queries(&mut conn, status);

        debug!(
            conn = %conn.id,
            server = %conn.server,
            socket = %conn.socket,
            transport = %conn.transport,
            %status,
            "Closing connection"
        );
        drop(core::mem::take(&mut conn.queries));

        self.notify_sock_state(conn.socket, false, false);
        self.sockets.close(conn.socket);
    }

    /// Moves a query off its connection and hands it to the scheduler.
    ///
    /// The scheduler receives `status` and the current time. Queries that
    /// are unknown or not bound to a connection already belong to the
    /// scheduler and are ignored.
    pub fn requeue_query(&mut self, query: QueryId, status: Status) {
        let now = self.clock.now();
        if self.registry.detach_query(query) {
            self.hand_off(query, &now, status);
        }
    }

    /// Requeues all queries of a connection that is being closed.
    ///
    /// All queries receive the same timestamp.
    fn requeue_queries(&mut self, conn: &mut Connection, status: Status) {
        let now = self.clock.now();
        while let Some(node) = conn.queries.first_node() {
            self.requeue_from(conn, node, &now, status);
        }
    }

    /// Detaches the query at `node` from an unlinked connection and hands
    /// it to the scheduler.
    ///
    /// The scheduler may have bound a query still listed here to another
    /// connection during an earlier hand-off. Such a query is not ours
    /// anymore and only its stale node is dropped.
    fn requeue_from(
        &mut self,
        conn: &mut Connection,
        node: NodeId,
        now: &C::Instant,
        status: Status,
    ) {
        let Some(query) = conn.queries.remove(node) else {
            return;
        };
        let Some(item) = self.registry.queries.get_mut(&query) else {
            warn!(query = %query, conn = %conn.id, "Dropping unknown query");
            return;
        };
        if item.binding != Some(QueryBinding { conn: conn.id, node }) {
            trace!(
                query = %query, conn = %conn.id,
                "Query rebound during drain, skipping"
            );
            return;
        }
        item.binding = None;
        self.hand_off(query, now, status);
    }

    fn hand_off(&mut self, query: QueryId, now: &C::Instant, status: Status) {
        trace!(query = %query, %status, "Requeueing query");
        self.scheduler
            .requeue(&mut self.registry, query, now, status);
    }

    /// Closes all connections of a server.
    ///
    /// Queries are requeued with [`Status::Success`]. This is used when a
    /// server is removed or the channel is destroyed.
    pub fn close_sockets(&mut self, server: ServerId) {
        loop {
            let Some(item) = self.registry.servers.get(&server) else {
                return;
            };
            let Some(node) = item.connections.first_node() else {
                return;
            };
            let Some(&conn) = item.connections.get(node) else {
                return;
            };
            self.close_connection(conn, Status::Success);

            // A stale list entry would make us spin forever.
            if let Some(item) = self.registry.servers.get_mut(&server) {
                if item.connections.remove(node).is_some() {
                    warn!(
                        server = %server, conn = %conn,
                        "Removed stale connection entry"
                    );
                }
            }
        }
    }

    /// Closes idle connections that are no longer wanted.
    ///
    /// This should run periodically. Connections with queries in flight
    /// are left alone. Returns the closed connections and why each one was
    /// closed.
    pub fn check_cleanup_conns(
        &mut self,
    ) -> Vec<(ConnectionId, CleanupReason)> {
        let mut closed = Vec::new();
        for server in self.registry.server_order() {
            let mut cursor = match self.registry.servers.get(&server) {
                Some(item) => item.connections.first_node(),
                None => continue,
            };
            while let Some(node) = cursor {
                let Some(item) = self.registry.servers.get(&server) else {
                    break;
                };
                cursor = item.connections.next(node);
                let Some(&conn) = item.connections.get(node) else {
                    continue;
                };
                let options = &self.registry.options;
                let Some(reason) =
                    self.registry.conns.get(&conn).and_then(|conn| {
                        cleanup_reason(options, item, conn)
                    })
                else {
                    continue;
                };
                debug!(
                    conn = %conn, server = %server, %reason,
                    "Cleaning up"
                );
                self.close_connection(conn, Status::Success);
                closed.push((conn, reason));
            }
        }
        closed
    }
}

//============ Testing =======================================================
