//! # stagegate
//!
//! Application layer of Stagegate: the HTTP policy decision API, the CLI and
//! configuration loading. All policy lives in `stagegate-core`.

pub mod api;
pub mod cli;
pub mod config;
