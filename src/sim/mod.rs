//! In-process simulated venue
//!
//! Implements `VenueTransport` with deterministic artificial latency, a
//! small instrument table, failure injection, and push channels that
//! deliver fill notifications and book updates out-of-band, the way the
//! real venue's subscriptions would.

use crate::book::{BookMessage, BookSnapshot, OrderBookStateMachine, SnapshotEntry, StatusUpdate};
use crate::error::{BenchError, Result};
use crate::gateway::{CancelSpec, OrderExecutionGateway, OrderSpec, PlaceAck, PlaceStatus, VenueTransport};
use crate::types::{NotificationEvent, OrderKind, Side, TransportChannel};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Error kind injected by `fail_all_with`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFailure {
    InsufficientFunds,
    RateLimited,
    Transport,
}

#[derive(Debug, Clone)]
pub struct SimulatedVenueConfig {
    /// Latency floor for every call
    pub base_latency_ms: u64,
    /// Deterministic per-call ramp, cycling over ten steps
    pub latency_step_ms: u64,
    /// Delay between placement and the pushed fill
    pub fill_delay_ms: u64,
    /// When set, every placement fails with this error
    pub fail_all_with: Option<SimFailure>,
}

impl Default for SimulatedVenueConfig {
    fn default() -> Self {
        Self {
            base_latency_ms: 5,
            latency_step_ms: 1,
            fill_delay_ms: 10,
            fail_all_with: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Instrument {
    index: u32,
    bid: Decimal,
    ask: Decimal,
    min_order_value: Decimal,
}

pub struct SimulatedVenue {
    config: SimulatedVenueConfig,
    instruments: HashMap<String, Instrument>,
    calls: AtomicU64,
    fills: mpsc::UnboundedSender<NotificationEvent>,
    book: Mutex<Option<(String, mpsc::UnboundedSender<BookMessage>)>>,
}

impl SimulatedVenue {
    /// Build the venue and the receiving end of its push channel
    pub fn new(
        config: SimulatedVenueConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<NotificationEvent>) {
        let mut instruments = HashMap::new();
        instruments.insert(
            "BTC".to_string(),
            Instrument {
                index: 0,
                bid: dec!(64000.0),
                ask: dec!(64010.0),
                min_order_value: dec!(10),
            },
        );
        instruments.insert(
            "ETH".to_string(),
            Instrument {
                index: 1,
                bid: dec!(3000.00),
                ask: dec!(3000.50),
                min_order_value: dec!(10),
            },
        );
        instruments.insert(
            "SOL".to_string(),
            Instrument {
                index: 2,
                bid: dec!(150.000),
                ask: dec!(150.050),
                min_order_value: dec!(10),
            },
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let venue = Arc::new(Self {
            config,
            instruments,
            calls: AtomicU64::new(0),
            fills: tx,
            book: Mutex::new(None),
        });
        (venue, rx)
    }

    /// Subscribe to the book stream for one instrument. The current
    /// resting state arrives first as a snapshot; order lifecycle
    /// changes follow as status updates.
    pub fn subscribe_book(&self, symbol: &str) -> Result<mpsc::UnboundedReceiver<BookMessage>> {
        let instrument = self.instrument(symbol)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = BookMessage::Snapshot(BookSnapshot {
            coin: symbol.to_string(),
            entries: vec![
                SnapshotEntry {
                    order_id: format!("{}-touch-bid", symbol),
                    side: Side::Long,
                    price: instrument.bid,
                    size: dec!(1),
                },
                SnapshotEntry {
                    order_id: format!("{}-touch-ask", symbol),
                    side: Side::Short,
                    price: instrument.ask,
                    size: dec!(1),
                },
            ],
        });
        let _ = tx.send(snapshot);
        *self.book.lock() = Some((symbol.to_string(), tx));
        Ok(rx)
    }

    fn book_sender(&self, symbol: &str) -> Option<mpsc::UnboundedSender<BookMessage>> {
        let book = self.book.lock();
        book.as_ref()
            .filter(|(coin, _)| coin == symbol)
            .map(|(_, tx)| tx.clone())
    }

    fn push_status(&self, update: StatusUpdate) {
        if let Some(tx) = self.book_sender(&update.coin) {
            let _ = tx.send(BookMessage::StatusUpdate(update));
        }
    }

    /// Forward pushed events into the gateway on an independent task,
    /// stamping the local receipt time.
    pub fn spawn_notification_pump(
        gateway: Arc<OrderExecutionGateway>,
        mut rx: mpsc::UnboundedReceiver<NotificationEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(mut event) = rx.recv().await {
                event.received_at = Utc::now();
                gateway.handle_notification(event);
            }
        })
    }

    /// Apply book stream messages to a shared state machine on an
    /// independent task, mirroring the notification pump.
    pub fn spawn_book_pump(
        book: Arc<Mutex<OrderBookStateMachine>>,
        mut rx: mpsc::UnboundedReceiver<BookMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                book.lock().apply(message);
            }
        })
    }

    async fn simulate_latency(&self) {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let ms = self.config.base_latency_ms + self.config.latency_step_ms * (call % 10);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn instrument(&self, symbol: &str) -> Result<&Instrument> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| BenchError::UnknownInstrument(symbol.to_string()))
    }
}

#[async_trait]
impl VenueTransport for SimulatedVenue {
    async fn place_order(&self, spec: &OrderSpec, channel: TransportChannel) -> Result<PlaceAck> {
        self.simulate_latency().await;

        if let Some(failure) = self.config.fail_all_with {
            return Err(match failure {
                SimFailure::InsufficientFunds => {
                    BenchError::InsufficientFunds("simulated empty balance".into())
                }
                SimFailure::RateLimited => BenchError::RateLimited("simulated quota".into()),
                SimFailure::Transport => BenchError::Transport("simulated disconnect".into()),
            });
        }

        let instrument = self.instrument(&spec.symbol)?;
        if spec.price * spec.size < instrument.min_order_value {
            return Err(BenchError::BelowMinimumValue(format!(
                "order value {} below minimum {}",
                spec.price * spec.size,
                instrument.min_order_value
            )));
        }

        let operation_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "sim: accepted {:?} {} {} @ {} via {:?} as {}",
            spec.kind, spec.size, spec.symbol, spec.price, channel, operation_id
        );

        self.push_status(StatusUpdate {
            coin: spec.symbol.clone(),
            order_id: operation_id.clone(),
            status: "open".into(),
            side: Some(spec.side),
            price: Some(spec.price),
            size: Some(spec.size),
        });

        // Market and limit orders fill after a delay on the push channel;
        // post-only orders rest until canceled.
        let status = if spec.kind == OrderKind::PostOnly {
            PlaceStatus::Resting
        } else {
            let fills = self.fills.clone();
            let book_tx = self.book_sender(&spec.symbol);
            let coin = spec.symbol.clone();
            let id = operation_id.clone();
            let delay = Duration::from_millis(self.config.fill_delay_ms);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let now = Utc::now();
                let _ = fills.send(NotificationEvent {
                    operation_id: id.clone(),
                    event_time: now,
                    received_at: now,
                });
                if let Some(tx) = book_tx {
                    let _ = tx.send(BookMessage::StatusUpdate(StatusUpdate {
                        coin,
                        order_id: id,
                        status: "filled".into(),
                        side: None,
                        price: None,
                        size: None,
                    }));
                }
            });
            PlaceStatus::Resting
        };

        Ok(PlaceAck {
            operation_id: Some(operation_id),
            status,
        })
    }

    async fn cancel_order(&self, spec: &CancelSpec, _channel: TransportChannel) -> Result<()> {
        self.simulate_latency().await;
        self.instrument(&spec.symbol)?;
        debug!("sim: canceled {}", spec.operation_id);
        self.push_status(StatusUpdate {
            coin: spec.symbol.clone(),
            order_id: spec.operation_id.clone(),
            status: "canceled".into(),
            side: None,
            price: None,
            size: None,
        });
        Ok(())
    }

    fn asset_index(&self, symbol: &str) -> Result<u32> {
        Ok(self.instrument(symbol)?.index)
    }

    async fn best_bid_ask(&self, symbol: &str) -> Result<(Decimal, Decimal)> {
        self.simulate_latency().await;
        let instrument = self.instrument(symbol)?;
        Ok((instrument.bid, instrument.ask))
    }
}
