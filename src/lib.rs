//! Token console: client-side token management.
//!
//! Re-exports modules needed by the binary and by integration tests in `tests/`.

pub mod actions;
pub mod billing;
pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod list;
pub mod lookup;
pub mod models;
pub mod notification;
pub mod preferences;
pub mod scope;
