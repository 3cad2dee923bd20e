//! Benchmark orchestration
//!
//! Drives one strictly sequential batch of orders through the gateway,
//! applying the retry policy per order, awaiting out-of-band fill
//! notifications, and folding the recorded metrics into run statistics.

use crate::config::BenchmarkConfig;
use crate::error::{BenchError, Result};
use crate::gateway::{OrderExecutionGateway, Placement};
use crate::retry::RetryPolicy;
use crate::stats::LatencyAggregate;
use crate::types::{millis_between, ExecutionMetrics, OrderIntent, OrderKind, Side};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-run summary; each leg aggregate covers only the orders that have
/// that leg populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total_orders: usize,
    pub successful_orders: usize,
    pub failed_orders: usize,
    pub success_rate: f64,
    pub send_to_return: Option<LatencyAggregate>,
    pub send_to_fill: Option<LatencyAggregate>,
    pub fill_to_notification: Option<LatencyAggregate>,
    pub cancel_send_to_return: Option<LatencyAggregate>,
    pub cancel_notification: Option<LatencyAggregate>,
}

/// Finalized result of one benchmark run, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub config: BenchmarkConfig,
    pub metrics: Vec<ExecutionMetrics>,
    pub statistics: RunStatistics,
    /// Failure counts keyed by verbatim error message
    pub error_categories: HashMap<String, u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives benchmark runs; at most one run is in flight at a time
pub struct BenchmarkOrchestrator {
    gateway: Arc<OrderExecutionGateway>,
    running: AtomicBool,
    current: RwLock<Option<RunResult>>,
}

/// Clears the running flag on all exit paths, including faults
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BenchmarkOrchestrator {
    pub fn new(gateway: Arc<OrderExecutionGateway>) -> Self {
        Self {
            gateway,
            running: AtomicBool::new(false),
            current: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Last finalized run, if any
    pub fn get_current_result(&self) -> Option<RunResult> {
        self.current.read().clone()
    }

    /// Execute one sequential batch. Fails fast with `AlreadyRunning`
    /// if a run is in flight; the in-flight run is not touched.
    pub async fn run_benchmark(&self, config: BenchmarkConfig) -> Result<RunResult> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BenchError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        info!(
            "starting benchmark: {} {:?} orders of {} {} via {:?}",
            config.order_count, config.order_kind, config.order_size, config.symbol,
            config.transport
        );

        let started_at = Utc::now();
        let retry = RetryPolicy::new(config.max_retry_attempts, config.retry_base_delay());
        let mut metrics = Vec::with_capacity(config.order_count);

        for index in 0..config.order_count {
            // Alternate direction to keep net position flat
            let side = if index % 2 == 0 { Side::Long } else { Side::Short };
            let entry = self.execute_order(&config, side, &retry).await;
            metrics.push(entry);

            self.gateway.cleanup_expired_orders(config.order_timeout_ms);

            if index + 1 < config.order_count {
                tokio::time::sleep(config.inter_order_delay()).await;
            }
        }

        let statistics = compute_statistics(&metrics);
        let error_categories = error_histogram(&metrics);
        let finished_at = Utc::now();

        info!(
            "benchmark finished: {}/{} orders succeeded",
            statistics.successful_orders, statistics.total_orders
        );

        let result = RunResult {
            config,
            metrics,
            statistics,
            error_categories,
            started_at,
            finished_at,
        };
        *self.current.write() = Some(result.clone());
        Ok(result)
    }

    /// Place one order and record all of its latency legs. A failure is
    /// recorded, never propagated; the batch always continues.
    async fn execute_order(
        &self,
        config: &BenchmarkConfig,
        side: Side,
        retry: &RetryPolicy,
    ) -> ExecutionMetrics {
        let mut entry = ExecutionMetrics::default();

        let placement = match self.place_with_retry(config, side, retry).await {
            Ok(placement) => placement,
            Err(err) => {
                warn!("order placement failed: {}", err);
                entry.success = false;
                entry.error_category = Some(err.to_string());
                return entry;
            }
        };
        entry.apply_placement(&placement.outcome);

        if let Some(fill_rx) = placement.fill {
            match tokio::time::timeout(config.order_timeout(), fill_rx).await {
                Ok(Ok(event)) => entry.apply_fill(&event),
                // Elapsed, or the waiter was swept: no fill recorded,
                // the placement itself still stands
                Ok(Err(_)) | Err(_) => {
                    entry.fill_timed_out = true;
                    if let Some(id) = &entry.operation_id {
                        self.gateway.registry().remove(id);
                    }
                }
            }
        }

        if config.order_kind == OrderKind::PostOnly {
            if let Some(operation_id) = entry.operation_id.clone() {
                tokio::time::sleep(config.cancel_delay()).await;
                let cancel = retry
                    .execute(|| {
                        self.gateway
                            .cancel_order(&operation_id, &config.symbol, config.transport)
                    })
                    .await;
                match cancel {
                    Ok(outcome) => {
                        entry.cancel_sent_at = Some(outcome.cancel_sent_at);
                        entry.cancel_returned_at = Some(outcome.cancel_returned_at);
                        entry.cancel_send_to_return_ms = Some(outcome.cancel_send_to_return_ms);
                        if let Some(note) = outcome.notification {
                            entry.cancel_notification_ms =
                                Some(millis_between(outcome.cancel_sent_at, note.received_at));
                        }
                    }
                    Err(err) => {
                        warn!("cancel failed for {}: {}", operation_id, err);
                        entry.error_category = Some(err.to_string());
                    }
                }
            }
        }

        entry
    }

    async fn place_with_retry(
        &self,
        config: &BenchmarkConfig,
        side: Side,
        retry: &RetryPolicy,
    ) -> Result<Placement> {
        let price = match config.order_kind {
            OrderKind::Market => None,
            // Limit orders cross so they fill; post-only orders rest
            OrderKind::Limit => Some(self.offset_price(config, side, true).await?),
            OrderKind::PostOnly => Some(self.offset_price(config, side, false).await?),
        };
        let await_fill = match config.order_kind {
            OrderKind::Market | OrderKind::Limit => Some(config.order_timeout()),
            OrderKind::PostOnly => None,
        };

        let intent = OrderIntent {
            symbol: config.symbol.clone(),
            side,
            size: config.order_size,
            kind: config.order_kind,
            price,
            transport: config.transport,
        };
        retry.execute(|| self.gateway.place(&intent, await_fill)).await
    }

    /// Derive a limit price from the touch. Crossing prices step through
    /// the opposite side so the order fills; resting prices step away so
    /// a post-only placement is accepted.
    async fn offset_price(
        &self,
        config: &BenchmarkConfig,
        side: Side,
        crossing: bool,
    ) -> Result<Decimal> {
        let (bid, ask) = self.gateway.fetch_market_price(&config.symbol).await?;
        let offset = config.price_offset;
        let price = match (side.is_long(), crossing) {
            (true, true) => ask * (Decimal::ONE + offset),
            (true, false) => bid * (Decimal::ONE - offset),
            (false, true) => bid * (Decimal::ONE - offset),
            (false, false) => ask * (Decimal::ONE + offset),
        };
        Ok(price)
    }
}

fn compute_statistics(metrics: &[ExecutionMetrics]) -> RunStatistics {
    let total_orders = metrics.len();
    let successful_orders = metrics.iter().filter(|m| m.success).count();
    let failed_orders = total_orders - successful_orders;
    let success_rate = if total_orders == 0 {
        0.0
    } else {
        successful_orders as f64 / total_orders as f64
    };

    let leg = |field: fn(&ExecutionMetrics) -> Option<f64>| {
        let samples: Vec<f64> = metrics.iter().filter_map(field).collect();
        LatencyAggregate::from_samples(&samples)
    };

    RunStatistics {
        total_orders,
        successful_orders,
        failed_orders,
        success_rate,
        send_to_return: leg(|m| m.send_to_return_ms),
        send_to_fill: leg(|m| m.send_to_fill_ms),
        fill_to_notification: leg(|m| m.fill_to_notification_ms),
        cancel_send_to_return: leg(|m| m.cancel_send_to_return_ms),
        cancel_notification: leg(|m| m.cancel_notification_ms),
    }
}

fn error_histogram(metrics: &[ExecutionMetrics]) -> HashMap<String, u64> {
    let mut histogram = HashMap::new();
    for entry in metrics {
        if let Some(category) = &entry.error_category {
            *histogram.entry(category.clone()).or_insert(0) += 1;
        }
    }
    histogram
}

#[cfg(test)]
mod tests;
