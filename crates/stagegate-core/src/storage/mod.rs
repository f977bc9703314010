//! # Storage Module
//!
//! Persistent review history backends.

mod redb_history;

pub use redb_history::RedbHistory;
