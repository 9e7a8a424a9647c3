//! In-memory service registry for the job platform.
//!
//! Services register themselves with a TTL, report health and heartbeats, and
//! callers discover a healthy instance by name.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod registry;
pub mod shutdown;
pub mod worker;
