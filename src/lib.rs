//! Connection management for DNS stub resolvers.
//!
//! This crate provides the part of an asynchronous DNS resolver that keeps
//! track of in-flight queries and the sockets carrying them. Many queries
//! to a set of configured name servers are multiplexed over a small number
//! of reused UDP and TCP connections. Connections come and go – because a
//! server failed, because they sat idle, because a UDP socket has been used
//! for too many queries, or because the resolver shuts down – and the
//! crate makes sure no query is lost or left pointing at a connection that
//! no longer exists when that happens.
//!
//! # Modules
//!
//! * [net] contains the resolver channel, its servers, connections and
//!   queries, and the operations that close connections,
//! * [resolv] contains the resolver configuration modelled after glibc’s
//!   `resolv.conf`, and
//! * [utils] contains the ordered list with stable node handles used to
//!   link queries and connections.
//!
//! The crate does not encode or decode DNS messages, does not perform any
//! I/O itself, and does not decide where a query is sent next. These are
//! left to the caller via the [`Scheduler`][net::scheduler::Scheduler] and
//! [`SocketFunctions`][net::socket::SocketFunctions] traits.
//!
//! # Reference of Feature Flags
//!
//! * `logging`: Provides
#![cfg_attr(feature = "logging", doc = "  [logging::init_logging]")]
#![cfg_attr(not(feature = "logging"), doc = "  `logging::init_logging`")]
//!   which installs a
//!   [tracing-subscriber](https://github.com/tokio-rs/tracing) subscriber
//!   honouring `RUST_LOG`. This feature is enabled by default.
//! * `serde`: Enables serialization of the configuration types via
//!   [serde](https://serde.rs/).

#![no_std]
#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![allow(clippy::new_without_default)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[allow(unused_imports)] // Import macros even if unused.
#[macro_use]
extern crate std;

#[macro_use]
extern crate core;

#[cfg(feature = "logging")]
pub mod logging;
pub mod net;
pub mod resolv;
pub mod utils;
