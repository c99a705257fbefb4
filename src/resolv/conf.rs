//! Resolver configuration
//!
//! The configuration consists of the list of name servers to talk to and a
//! set of options that influence how connections to them are managed. It is
//! normally read from the system’s `/etc/resolv.conf` and follows glibc’s
//! resolver in naming and format. In addition to glibc’s options, the
//! `udp-max-queries:N` option limits how many queries are sent over a
//! single UDP socket before it is replaced.

use core::fmt;
use core::str::{FromStr, SplitWhitespace};
use core::time::Duration;
use std::error;
use std::fs;
use std::io::{self, BufRead, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::string::String;
use std::vec::Vec;

//------------ ResolvOptions ------------------------------------------------

/// Options for the resolver configuration.
///
/// Only options that affect the connection handling are kept. Everything
/// else found in a configuration file is silently ignored.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvOptions {
    /// Timeout to wait for a response.
    pub timeout: Duration,

    /// Number of attempts before giving up.
    pub attempts: usize,

    /// Always use TCP.
    pub use_vc: bool,

    /// Ignore truncation errors, don’t retry with TCP.
    pub ign_tc: bool,

    /// Keep idle connections open between queries.
    ///
    /// If this is not set, the cleanup sweep closes every connection that
    /// has no queries in flight.
    pub stay_open: bool,

    /// Use round-robin selection of name servers.
    pub rotate: bool,

    /// Maximum number of queries sent over a single UDP socket.
    ///
    /// Once a UDP connection has carried this many queries it is replaced
    /// as soon as it is idle, which forces a new source port. A value of
    /// zero means no limit.
    pub udp_max_queries: usize,
}

impl Default for ResolvOptions {
    fn default() -> Self {
        ResolvOptions {
            timeout: Duration::new(5, 0),
            attempts: 2,
            use_vc: false,
            ign_tc: false,
            stay_open: false,
            rotate: false,
            udp_max_queries: 0,
        }
    }
}

//------------ Transport -----------------------------------------------------

/// The transport protocol of a connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transport {
    /// Unencrypted UDP transport.
    Udp,

    /// Unencrypted TCP transport.
    Tcp,
}

impl Transport {
    /// Returns whether the transport is a streaming protocol.
    pub fn is_stream(self) -> bool {
        match self {
            Transport::Udp => false,
            Transport::Tcp => true,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => f.write_str("UDP"),
            Transport::Tcp => f.write_str("TCP"),
        }
    }
}

//------------ ServerConf ----------------------------------------------------

/// Configuration for one upstream DNS server.
///
/// The server is identified by a socket address, ie., an address/port pair.
/// Queries to the server may travel over both UDP and TCP.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConf {
    /// Server address.
    pub addr: SocketAddr,

    /// How long to wait for a response before returning a timeout error.
    pub request_timeout: Duration,

    /// Size of the message receive buffer in bytes.
    ///
    /// This is used for datagram transports only.
    pub recv_size: usize,
}

impl ServerConf {
    /// Returns a new default server config for the given address.
    pub fn new(addr: SocketAddr) -> Self {
        ServerConf {
            addr,
            request_timeout: Duration::from_secs(2),
            // Maximum non-fragmenting payload sizes from RFC 6891, 6.2.3.
            recv_size: match addr {
                SocketAddr::V4(_) => 1280,
                SocketAddr::V6(_) => 1410,
            },
        }
    }
}

//------------ ResolvConf ---------------------------------------------------

/// Resolver configuration.
///
/// The type follows the builder pattern. After creating a value with
/// `ResolvConf::new()` you can manipulate the members. Once you are happy
/// with them, you call `finalize()` to make sure the configuration is valid.
///
/// Additionally, the type can parse a glibc-style configuration file,
/// commonly known as `/etc/resolv.conf` through the `parse()` and
/// `parse_file()` methods. You still need to call `finalize()` after
/// parsing.
///
/// The easiest way to get the system resolver configuration is
/// `ResolvConf::system()`. It parses the configuration file or returns a
/// default configuration if that fails.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResolvConf {
    /// Addresses of servers to query.
    pub servers: Vec<ServerConf>,

    /// Default options.
    pub options: ResolvOptions,
}

/// # Management
///
impl ResolvConf {
    /// Creates a new, empty configuration.
    ///
    /// An empty configuration does not contain any name servers. Call
    /// `self.finalize()` to make it usable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalizes the configuration for actual use.
    ///
    /// If `servers` is empty, adds `127.0.0.1:53` which is exactly what
    /// glibc does. The request timeout of every server is set to the
    /// configured timeout.
    pub fn finalize(&mut self) {
        if self.servers.is_empty() {
            let addr =
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 53);
            self.servers.push(ServerConf::new(addr));
        }
        for server in &mut self.servers {
            server.request_timeout = self.options.timeout
        }
    }

    /// Creates a default configuration for this system.
    ///
    /// This currently only works for Unix-y systems.
    pub fn system() -> Self {
        let mut res = ResolvConf::new();
        let _ = res.parse_file("/etc/resolv.conf");
        res.finalize();
        res
    }
}

/// # Parsing Configuration File
///
impl ResolvConf {
    /// Parses the configuration from a file.
    pub fn parse_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<(), Error> {
        let mut file = fs::File::open(path)?;
        self.parse(&mut file)
    }

    /// Parses the configuration from a reader.
    ///
    /// The format is that of the /etc/resolv.conf file.
    pub fn parse<R: Read>(&mut self, reader: &mut R) -> Result<(), Error> {
        for line in io::BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end();

            if line.is_empty()
                || line.starts_with(';')
                || line.starts_with('#')
            {
                continue;
            }

            let mut words = line.split_whitespace();
            let keyword = words.next();
            match keyword {
                Some("nameserver") => self.parse_nameserver(words)?,
                Some("options") => self.parse_options(words),
                // Name lists are of no concern for connection handling.
                Some("domain") | Some("search") | Some("sortlist") => {}
                _ => return Err(Error::ParseError),
            }
        }
        Ok(())
    }

    fn parse_nameserver(
        &mut self,
        mut words: SplitWhitespace,
    ) -> Result<(), Error> {
        let word = next_word(&mut words)?;
        let addr = match SocketAddr::from_str(word) {
            Ok(addr) => addr,
            Err(_) => SocketAddr::new(IpAddr::from_str(word)?, 53),
        };
        self.servers.push(ServerConf::new(addr));
        no_more_words(words)
    }

    fn parse_options(&mut self, words: SplitWhitespace) {
        for word in words {
            // Ignore unknown or misformated options.
            let Ok(option) = split_arg(word) else {
                continue;
            };
            match option {
                ("timeout", Some(n)) => {
                    self.options.timeout = Duration::from_secs(n as u64)
                }
                ("attempts", Some(n)) => self.options.attempts = n,
                ("udp-max-queries", Some(n)) => {
                    self.options.udp_max_queries = n
                }
                ("rotate", None) => self.options.rotate = true,
                ("stay-open", None) => self.options.stay_open = true,
                ("use-vc", None) => self.options.use_vc = true,
                ("ign-tc", None) => self.options.ign_tc = true,
                _ => {}
            }
        }
    }
}

//--- Display

impl fmt::Display for ResolvConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for server in &self.servers {
            let server = server.addr;
            f.write_str("nameserver ")?;
            if server.port() == 53 {
                writeln!(f, "{}", server.ip())?;
            } else {
                writeln!(f, "{}", server)?;
            }
        }

        // Collect options so we only print them if there are any non-default
        // ones.
        let defaults = ResolvOptions::default();
        let mut options: Vec<String> = Vec::new();

        if self.options.timeout != defaults.timeout {
            // XXX This ignores fractional seconds.
            options
                .push(format!("timeout:{}", self.options.timeout.as_secs()));
        }
        if self.options.attempts != defaults.attempts {
            options.push(format!("attempts:{}", self.options.attempts));
        }
        if self.options.udp_max_queries != defaults.udp_max_queries {
            options.push(format!(
                "udp-max-queries:{}",
                self.options.udp_max_queries
            ));
        }
        if self.options.use_vc {
            options.push("use-vc".into())
        }
        if self.options.ign_tc {
            options.push("ign-tc".into())
        }
        if self.options.stay_open {
            options.push("stay-open".into())
        }
        if self.options.rotate {
            options.push("rotate".into())
        }

        if !options.is_empty() {
            f.write_str("options")?;
            for option in options {
                write!(f, " {}", option)?;
            }
            f.write_str("\n")?;
        }

        Ok(())
    }
}

//------------ Private Helpers -----------------------------------------------
//
// These are here to wrap stuff into Results.

/// Returns a reference to the next word or an error.
fn next_word<'a>(words: &mut SplitWhitespace<'a>) -> Result<&'a str, Error> {
    words.next().ok_or(Error::ParseError)
}

/// Returns nothing but errors out if there are words left.
fn no_more_words(mut words: SplitWhitespace) -> Result<(), Error> {
    match words.next() {
        Some(..) => Err(Error::ParseError),
        None => Ok(()),
    }
}

/// Splits the name and argument from an option with arguments.
///
/// These options consist of a name followed by a colon followed by a
/// value, which so far is only `usize`, so we do that.
fn split_arg(s: &str) -> Result<(&str, Option<usize>), Error> {
    match s.split_once(':') {
        Some((left, right)) => Ok((left, Some(usize::from_str(right)?))),
        None => Ok((s, None)),
    }
}

//------------ Error --------------------------------------------------------

/// The error that can happen when parsing `resolv.conf`.
#[derive(Debug)]
pub enum Error {
    /// The file is not a proper file.
    ParseError,

    /// Something happend while reading.
    Io(io::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::ParseError => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        Error::Io(error)
    }
}

impl From<std::net::AddrParseError> for Error {
    fn from(_: std::net::AddrParseError) -> Error {
        Error::ParseError
    }
}

impl From<core::num::ParseIntError> for Error {
    fn from(_: core::num::ParseIntError) -> Error {
        Error::ParseError
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ParseError => f.write_str("error parsing configuration"),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

//============ Testing ======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::string::ToString;

    #[test]
    fn parse_resolv_conf() {
        let mut conf = ResolvConf::new();
        let data = "nameserver 192.0.2.0\n\
                    nameserver 192.0.2.1\n\
                    search example.com\n\
                    options use-vc stay-open udp-max-queries:100 ndots:3\n"
            .to_string();
        assert!(conf.parse(&mut io::Cursor::new(data)).is_ok());
        assert!(conf.options.use_vc);
        assert!(conf.options.stay_open);
        assert_eq!(conf.options.udp_max_queries, 100);
        assert_eq!(conf.servers.len(), 2);
        assert_eq!(
            conf.servers[1].addr,
            SocketAddr::from(([192, 0, 2, 1], 53))
        );
    }

    #[test]
    fn parse_nameserver_with_port() {
        let mut conf = ResolvConf::new();
        let data = "nameserver [2001:db8::1]:5353\n".to_string();
        conf.parse(&mut io::Cursor::new(data)).unwrap();
        assert_eq!(conf.servers[0].addr.port(), 5353);
        assert_eq!(conf.servers[0].recv_size, 1410);
    }

    #[test]
    fn reject_malformed_lines() {
        let mut conf = ResolvConf::new();
        let data = "nameserver\n".to_string();
        assert!(matches!(
            conf.parse(&mut io::Cursor::new(data)),
            Err(Error::ParseError)
        ));

        let data = "frobnicate all the things\n".to_string();
        assert!(conf.parse(&mut io::Cursor::new(data)).is_err());
    }

    #[test]
    fn finalize_adds_localhost() {
        let mut conf = ResolvConf::new();
        conf.options.timeout = Duration::from_secs(3);
        conf.finalize();
        assert_eq!(conf.servers.len(), 1);
        assert_eq!(
            conf.servers[0].addr,
            SocketAddr::from(([127, 0, 0, 1], 53))
        );
        assert_eq!(conf.servers[0].request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn display_prints_non_default_options() {
        let mut conf = ResolvConf::new();
        conf.servers
            .push(ServerConf::new(SocketAddr::from(([192, 0, 2, 1], 53))));
        conf.options.stay_open = true;
        conf.options.udp_max_queries = 7;
        assert_eq!(
            conf.to_string(),
            "nameserver 192.0.2.1\noptions udp-max-queries:7 stay-open\n"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn options_from_json() {
        let options: ResolvOptions = serde_json::from_str(
            r#"{
                "timeout": { "secs": 1, "nanos": 0 },
                "attempts": 3,
                "use_vc": false,
                "ign_tc": false,
                "stay_open": true,
                "rotate": false,
                "udp_max_queries": 64
            }"#,
        )
        .unwrap();
        assert!(options.stay_open);
        assert_eq!(options.udp_max_queries, 64);
        assert_eq!(options.timeout, Duration::from_secs(1));
    }
}
