//! Inquiry completion worker.
//!
//! Receives inquiry events, completes each one through the direct completion
//! service or a managed persona run, and records exactly one terminal status.

pub mod api;
pub mod completion;
pub mod config;
pub mod db;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use state::AppState;
