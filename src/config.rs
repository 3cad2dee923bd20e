//! Benchmark run configuration
//!
//! One immutable `BenchmarkConfig` per run, produced by a layered
//! builder: serde defaults, then an optional TOML file, then
//! `LATENCY_BENCH_*` environment variables, then explicit overrides.

use crate::error::Result;
use crate::types::{OrderKind, TransportChannel};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_order_kind")]
    pub order_kind: OrderKind,
    #[serde(default = "default_transport")]
    pub transport: TransportChannel,
    #[serde(default = "default_order_size")]
    pub order_size: Decimal,
    #[serde(default = "default_order_count")]
    pub order_count: usize,
    /// Sleep between consecutive orders
    #[serde(default = "default_inter_order_delay_ms")]
    pub inter_order_delay_ms: u64,
    /// How long to wait for the fill notification of one order
    #[serde(default = "default_order_timeout_ms")]
    pub order_timeout_ms: u64,
    /// Fractional distance from the touch for limit/post-only prices
    #[serde(default = "default_price_offset")]
    pub price_offset: Decimal,
    /// Wait before canceling a resting post-only order
    #[serde(default = "default_cancel_delay_ms")]
    pub cancel_delay_ms: u64,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_symbol() -> String {
    "BTC".to_string()
}
fn default_order_kind() -> OrderKind {
    OrderKind::Market
}
fn default_transport() -> TransportChannel {
    TransportChannel::RequestResponse
}
fn default_order_size() -> Decimal {
    dec!(0.001)
}
fn default_order_count() -> usize {
    10
}
fn default_inter_order_delay_ms() -> u64 {
    1000
}
fn default_order_timeout_ms() -> u64 {
    10_000
}
fn default_price_offset() -> Decimal {
    dec!(0.01)
}
fn default_cancel_delay_ms() -> u64 {
    500
}
fn default_max_retry_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    250
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            order_kind: default_order_kind(),
            transport: default_transport(),
            order_size: default_order_size(),
            order_count: default_order_count(),
            inter_order_delay_ms: default_inter_order_delay_ms(),
            order_timeout_ms: default_order_timeout_ms(),
            price_offset: default_price_offset(),
            cancel_delay_ms: default_cancel_delay_ms(),
            max_retry_attempts: default_max_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl BenchmarkConfig {
    pub fn builder() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::default()
    }

    pub fn inter_order_delay(&self) -> Duration {
        Duration::from_millis(self.inter_order_delay_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_millis(self.order_timeout_ms)
    }

    pub fn cancel_delay(&self) -> Duration {
        Duration::from_millis(self.cancel_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Layered config builder: defaults -> file -> env -> overrides
#[derive(Default)]
pub struct BenchmarkConfigBuilder {
    file: Option<String>,
    overrides: Vec<(String, String)>,
}

impl BenchmarkConfigBuilder {
    /// Read an optional TOML file; missing files are not an error
    pub fn file(mut self, path: &str) -> Self {
        self.file = Some(path.to_string());
        self
    }

    /// Force one key to a value, above file and environment
    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.overrides.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> Result<BenchmarkConfig> {
        let mut builder = config::Config::builder();
        if let Some(path) = &self.file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("LATENCY_BENCH"));
        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }
        Ok(builder.build()?.try_deserialize()?)
    }
}
