//! Managing the connections of a resolver channel.
//!
//! A resolver sends many queries concurrently to a set of name servers,
//! multiplexing them over a small number of UDP and TCP sockets. This
//! module keeps track of which query travels over which connection to which
//! server and takes care of tearing connections down again without losing
//! any query in the process.
//!
//! The [`Channel`][channel::Channel] owns a [`Registry`][channel::Registry]
//! with all servers, connections, and queries. Connections are destroyed
//! only through
//! [`close_connection`][channel::Channel::close_connection], which hands
//! every query still bound to the connection to the
//! [`Scheduler`][scheduler::Scheduler]. Two operations decide which
//! connections to close:
//!
//! * [`close_sockets`][channel::Channel::close_sockets] closes all
//!   connections of a server, for instance when the server is removed or
//!   the channel is destroyed, and
//! * [`check_cleanup_conns`][channel::Channel::check_cleanup_conns] is
//!   meant to run periodically and closes idle connections that are no
//!   longer wanted.
//!
//! The module does not perform any I/O itself. Sockets are opened by the
//! caller and registered via
//! [`open_connection`][channel::Channel::open_connection]. Closing them is
//! delegated to a [`SocketFunctions`][socket::SocketFunctions]
//! implementation.

pub mod channel;
pub mod clock;
pub mod close;
pub mod conn;
pub mod query;
pub mod scheduler;
pub mod server;
pub mod socket;
pub mod status;
