use super::*;
use crate::gateway::{
    CancelSpec, MockVenueTransport, OrderSpec, PlaceAck, PlaceStatus, VenueTransport,
};
use crate::types::TransportChannel;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::sync::Notify;

fn quick_config(order_count: usize) -> BenchmarkConfig {
    BenchmarkConfig {
        order_count,
        inter_order_delay_ms: 0,
        order_timeout_ms: 100,
        retry_base_delay_ms: 1,
        max_retry_attempts: 2,
        ..BenchmarkConfig::default()
    }
}

fn orchestrator_with(transport: MockVenueTransport) -> BenchmarkOrchestrator {
    BenchmarkOrchestrator::new(Arc::new(OrderExecutionGateway::new(Arc::new(transport))))
}

#[tokio::test]
async fn test_all_permanent_failures_counted() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(64000), dec!(64010))));
    transport
        .expect_place_order()
        .times(5)
        .returning(|_, _| Err(BenchError::InsufficientFunds("balance 0".into())));

    let orchestrator = orchestrator_with(transport);
    let result = orchestrator.run_benchmark(quick_config(5)).await.unwrap();

    assert_eq!(result.statistics.success_rate, 0.0);
    assert_eq!(result.statistics.failed_orders, 5);
    assert_eq!(result.statistics.successful_orders, 0);
    let total: u64 = result.error_categories.values().sum();
    assert_eq!(total, 5);
    assert_eq!(
        result.error_categories["insufficient funds: balance 0"],
        5
    );
    assert!(result.statistics.send_to_return.is_none());
    assert!(!orchestrator.is_running());
}

#[tokio::test]
async fn test_immediate_fills_populate_fill_leg() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(64000), dec!(64010))));
    let mut seq = 0u32;
    transport.expect_place_order().returning(move |_, _| {
        seq += 1;
        Ok(PlaceAck {
            operation_id: Some(format!("op-{}", seq)),
            status: PlaceStatus::Filled,
        })
    });

    let gateway = Arc::new(OrderExecutionGateway::new(Arc::new(transport)));
    let orchestrator = Arc::new(BenchmarkOrchestrator::new(gateway.clone()));

    // Independent delivery path: resolve each registered waiter as the
    // push subscription would
    let pump_gateway = gateway.clone();
    let pump = tokio::spawn(async move {
        for i in 1..=3 {
            let id = format!("op-{}", i);
            loop {
                tokio::task::yield_now().await;
                if pump_gateway.registry().len() > 0 {
                    pump_gateway.handle_notification(crate::types::NotificationEvent {
                        operation_id: id.clone(),
                        event_time: Utc::now(),
                        received_at: Utc::now(),
                    });
                    break;
                }
            }
        }
    });

    let result = orchestrator.run_benchmark(quick_config(3)).await.unwrap();
    pump.await.unwrap();

    assert_eq!(result.statistics.success_rate, 1.0);
    let fill = result.statistics.send_to_fill.as_ref().unwrap();
    assert_eq!(fill.count, 3);
    assert!(result.statistics.fill_to_notification.is_some());
    assert!(result.metrics.iter().all(|m| !m.fill_timed_out));
}

#[tokio::test]
async fn test_fill_timeout_is_not_a_placement_failure() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(64000), dec!(64010))));
    transport.expect_place_order().returning(|_, _| {
        Ok(PlaceAck {
            operation_id: Some("op-slow".into()),
            status: PlaceStatus::Resting,
        })
    });

    let orchestrator = orchestrator_with(transport);
    let mut config = quick_config(1);
    config.order_timeout_ms = 20;
    let result = orchestrator.run_benchmark(config).await.unwrap();

    let entry = &result.metrics[0];
    assert!(entry.success);
    assert!(entry.fill_timed_out);
    assert!(entry.send_to_fill_ms.is_none());
    assert!(entry.send_to_return_ms.is_some());
    assert_eq!(result.statistics.success_rate, 1.0);
    assert!(result.statistics.send_to_fill.is_none());
}

#[tokio::test]
async fn test_post_only_records_cancel_leg() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(64000), dec!(64010))));
    transport.expect_place_order().returning(|_, _| {
        Ok(PlaceAck {
            operation_id: Some("op-rest".into()),
            status: PlaceStatus::Resting,
        })
    });
    transport
        .expect_cancel_order()
        .times(1)
        .returning(|_, _| Ok(()));

    let orchestrator = orchestrator_with(transport);
    let mut config = quick_config(1);
    config.order_kind = OrderKind::PostOnly;
    config.cancel_delay_ms = 0;
    let result = orchestrator.run_benchmark(config).await.unwrap();

    let entry = &result.metrics[0];
    assert!(entry.success);
    assert!(entry.cancel_send_to_return_ms.is_some());
    assert!(entry.cancel_notification_ms.is_some());
    // Post-only orders do not await a fill
    assert!(entry.send_to_fill_ms.is_none());
    assert!(!entry.fill_timed_out);
    assert!(result.statistics.cancel_send_to_return.is_some());
}

#[tokio::test]
async fn test_sides_alternate_by_index_parity() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(1000), dec!(1001))));

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    transport.expect_place_order().returning(move |spec, _| {
        sink.lock().push(spec.side);
        Ok(PlaceAck {
            operation_id: None,
            status: PlaceStatus::Filled,
        })
    });

    let orchestrator = orchestrator_with(transport);
    orchestrator.run_benchmark(quick_config(4)).await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![Side::Long, Side::Short, Side::Long, Side::Short]
    );
}

#[tokio::test]
async fn test_transient_failure_retried_then_recorded() {
    let mut transport = MockVenueTransport::new();
    transport.expect_asset_index().returning(|_| Ok(0));
    transport
        .expect_best_bid_ask()
        .returning(|_| Ok((dec!(1000), dec!(1001))));
    // 1 order * 2 attempts, both transient failures
    transport
        .expect_place_order()
        .times(2)
        .returning(|_, _| Err(BenchError::Transport("connection reset".into())));

    let orchestrator = orchestrator_with(transport);
    let result = orchestrator.run_benchmark(quick_config(1)).await.unwrap();

    assert_eq!(result.statistics.failed_orders, 1);
    assert_eq!(
        result.error_categories["transport error: connection reset"],
        1
    );
}

/// Transport that parks every placement until released; used to hold a
/// run in its running state.
struct ParkedTransport {
    release: Arc<Notify>,
}

#[async_trait]
impl VenueTransport for ParkedTransport {
    async fn place_order(
        &self,
        _spec: &OrderSpec,
        _channel: TransportChannel,
    ) -> crate::error::Result<PlaceAck> {
        self.release.notified().await;
        Ok(PlaceAck {
            operation_id: None,
            status: PlaceStatus::Filled,
        })
    }

    async fn cancel_order(
        &self,
        _spec: &CancelSpec,
        _channel: TransportChannel,
    ) -> crate::error::Result<()> {
        Ok(())
    }

    fn asset_index(&self, _symbol: &str) -> crate::error::Result<u32> {
        Ok(0)
    }

    async fn best_bid_ask(
        &self,
        _symbol: &str,
    ) -> crate::error::Result<(Decimal, Decimal)> {
        Ok((dec!(1000), dec!(1001)))
    }
}

#[tokio::test]
async fn test_second_run_rejected_while_running() {
    let release = Arc::new(Notify::new());
    let transport = ParkedTransport {
        release: release.clone(),
    };
    let orchestrator = Arc::new(BenchmarkOrchestrator::new(Arc::new(
        OrderExecutionGateway::new(Arc::new(transport)),
    )));

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run_benchmark(quick_config(1)).await })
    };

    // Wait until the first run holds the running flag
    while !orchestrator.is_running() {
        tokio::task::yield_now().await;
    }

    let second = orchestrator.run_benchmark(quick_config(1)).await;
    assert!(matches!(second, Err(BenchError::AlreadyRunning)));
    // The in-flight run was not disturbed
    assert!(orchestrator.is_running());

    release.notify_one();
    let first_result = first.await.unwrap().unwrap();
    assert_eq!(first_result.statistics.total_orders, 1);
    assert!(!orchestrator.is_running());
}

#[test]
fn test_statistics_over_populated_legs_only() {
    let mut with_fill = ExecutionMetrics {
        success: true,
        send_to_return_ms: Some(10.0),
        send_to_fill_ms: Some(30.0),
        ..Default::default()
    };
    with_fill.fill_to_notification_ms = Some(5.0);
    let without_fill = ExecutionMetrics {
        success: true,
        send_to_return_ms: Some(20.0),
        fill_timed_out: true,
        ..Default::default()
    };

    let stats = compute_statistics(&[with_fill, without_fill]);
    assert_eq!(stats.send_to_return.as_ref().unwrap().count, 2);
    assert_eq!(stats.send_to_fill.as_ref().unwrap().count, 1);
    assert_eq!(stats.send_to_fill.as_ref().unwrap().avg_ms, 30.0);
    assert!(stats.cancel_send_to_return.is_none());
}

#[test]
fn test_error_histogram_counts_by_message() {
    let failed = |msg: &str| ExecutionMetrics {
        success: false,
        error_category: Some(msg.to_string()),
        ..Default::default()
    };
    let histogram = error_histogram(&[
        failed("rate limited: slow down"),
        failed("rate limited: slow down"),
        failed("transport error: reset"),
    ]);
    assert_eq!(histogram["rate limited: slow down"], 2);
    assert_eq!(histogram["transport error: reset"], 1);
}

#[test]
fn test_run_result_serializes() {
    let stats = compute_statistics(&[]);
    let result = RunResult {
        config: BenchmarkConfig::default(),
        metrics: vec![],
        statistics: stats,
        error_categories: HashMap::new(),
        started_at: Utc::now(),
        finished_at: Utc::now(),
    };
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"success_rate\":0.0"));
}
