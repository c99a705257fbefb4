//! Status codes handed to the scheduler with requeued queries.

#![warn(missing_docs)]

use core::fmt;

//------------ Status --------------------------------------------------------

/// The reason a query was taken off its connection.
///
/// The connection core never interprets a status. It only passes it on to
/// the scheduler, which decides whether the status counts against the
/// query's retry budget, marks a server as unhealthy, or fails the query.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Status {
    /// No fault occurred, the query may be reassigned freely.
    ///
    /// Used by bulk shutdown and the cleanup sweep.
    Success,

    /// The server refused the connection or sending failed.
    ConnRefused,

    /// The connection was reset or closed by the peer.
    ConnReset,

    /// Reading from the connection failed.
    ReadError,

    /// No response arrived in time.
    Timeout,

    /// The server sent a response that could not be used.
    BadResponse,

    /// The channel is being destroyed.
    Destruction,
}

impl Status {
    /// Returns whether the status reports the absence of a fault.
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }
}

//--- Display

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("success"),
            Status::ConnRefused => f.write_str("connection refused"),
            Status::ConnReset => f.write_str("connection reset"),
            Status::ReadError => f.write_str("error reading from socket"),
            Status::Timeout => f.write_str("timeout waiting for response"),
            Status::BadResponse => f.write_str("bad response"),
            Status::Destruction => f.write_str("channel destroyed"),
        }
    }
}
