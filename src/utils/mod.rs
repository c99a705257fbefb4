//! Various utility modules.

pub mod list;
