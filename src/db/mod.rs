//! Database module: SQL repositories for user preferences and the
//! sent-question audit log.
//!
//! External modules should import from `tg_digestbot::db`; the repository API
//! is re-exported here.

pub mod repo;

pub use repo::*;
