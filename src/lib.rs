//! Core library for the `surge` CLI.
//!
//! `surge` drives a fixed number of concurrent HTTP workers against one
//! target for a fixed duration, ramping them up and down in even steps,
//! aggregating every attempt into streaming statistics, and draining open
//! connections before reporting. The binary is the primary interface; the
//! modules below are public so runs can also be embedded and tested.
pub mod app;
pub mod args;
pub mod config;
pub mod engine;
pub mod entry;
pub mod error;
pub mod http;
pub mod metrics;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod sinks;
pub mod system;
