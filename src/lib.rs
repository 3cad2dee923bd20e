//! Order Execution Latency Benchmark
//!
//! Measures placement, fill, and cancel latency against a trading venue
//! that exposes two parallel transports: a synchronous request/response
//! channel and an asynchronous push channel.
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator → Gateway (place/cancel) → Registry (await notification)
//!       ↑                                      ↑
//!  Statistics (batch completion)       Push subscription
//!
//! Book state machine: snapshot + diff stream, queried on demand
//! ```

pub mod bench;
pub mod book;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod retry;
pub mod sim;
pub mod stats;
pub mod types;

#[cfg(test)]
mod config_tests;
