//! Socket handles and the collaborators that own the actual sockets.
//!
//! The connection core never performs I/O. It identifies sockets by an
//! opaque [`Socket`] handle, reports interest changes through a
//! [`SockStateCallback`] and asks a [`SocketFunctions`] implementation to
//! close a socket once the connection using it is gone.

use core::fmt;
use std::boxed::Box;
use std::collections::HashMap;
use tracing::{trace, warn};

//------------ Socket --------------------------------------------------------

/// An opaque socket descriptor.
///
/// On Unix systems this is the file descriptor, on Windows the raw socket.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Socket(u64);

impl Socket {
    /// Creates a socket handle from its raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Socket(raw)
    }

    /// Returns the raw value of the handle.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

#[cfg(unix)]
impl From<std::os::unix::io::RawFd> for Socket {
    fn from(fd: std::os::unix::io::RawFd) -> Self {
        // Valid descriptors are never negative.
        Socket(fd as u64)
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//------------ SockStateCallback ---------------------------------------------

/// Notification about the interest in a socket.
///
/// The callback receives the socket and whether the event loop should
/// watch it for readability and writability, respectively. A call with
/// both set to `false` means the socket is about to be closed and must be
/// removed from the event loop.
pub type SockStateCallback = Box<dyn FnMut(Socket, bool, bool)>;

//------------ SocketFunctions -----------------------------------------------

/// The operations on sockets the connection core needs.
pub trait SocketFunctions {
    /// Closes the socket.
    ///
    /// This is called exactly once per connection.
    fn close(&mut self, sock: Socket);
}

impl<T: SocketFunctions + ?Sized> SocketFunctions for &mut T {
    fn close(&mut self, sock: Socket) {
        (**self).close(sock)
    }
}

//------------ OwnedSockets --------------------------------------------------

/// Socket functions for sockets owned by the channel.
///
/// Sockets are registered after they have been opened and are dropped, and
/// therefore closed, when the connection core asks for it.
#[derive(Debug, Default)]
pub struct OwnedSockets {
    sockets: HashMap<Socket, socket2::Socket>,
}

impl OwnedSockets {
    /// Creates an empty set of sockets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of an opened socket and returns its handle.
    pub fn register(&mut self, sock: socket2::Socket) -> Socket {
        let handle = raw_handle(&sock);
        self.sockets.insert(handle, sock);
        handle
    }

    /// Returns the socket for a handle.
    pub fn get(&self, sock: Socket) -> Option<&socket2::Socket> {
        self.sockets.get(&sock)
    }

    /// Returns the number of open sockets.
    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    /// Returns whether there are no open sockets.
    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }
}

impl SocketFunctions for OwnedSockets {
    fn close(&mut self, sock: Socket) {
        match self.sockets.remove(&sock) {
            Some(sock) => {
                trace!(socket = %raw_handle(&sock), "Closing socket");
                drop(sock)
            }
            None => warn!(socket = %sock, "Asked to close unknown socket"),
        }
    }
}

#[cfg(unix)]
fn raw_handle(sock: &socket2::Socket) -> Socket {
    use std::os::unix::io::AsRawFd;
    Socket::from(sock.as_raw_fd())
}

#[cfg(windows)]
fn raw_handle(sock: &socket2::Socket) -> Socket {
    use std::os::windows::io::AsRawSocket;
    Socket::from_raw(sock.as_raw_socket())
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use socket2::{Domain, Protocol, Type};

    #[test]
    fn owned_sockets_close_drops_socket() {
        let mut sockets = OwnedSockets::new();
        let sock = socket2::Socket::new(
            Domain::IPV4,
            Type::DGRAM,
            Some(Protocol::UDP),
        )
        .unwrap();
        let handle = sockets.register(sock);
        assert_eq!(sockets.len(), 1);
        assert!(sockets.get(handle).is_some());

        sockets.close(handle);
        assert!(sockets.is_empty());

        // Closing twice is tolerated.
        sockets.close(handle);
        assert!(sockets.is_empty());
    }
}
