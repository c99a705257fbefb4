//! Resolver configuration.

pub use self::conf::ResolvConf;

pub mod conf;
