//! Order execution gateway
//!
//! Places market/limit/post-only orders and cancels over a selectable
//! transport channel, measuring the transport round trip and feeding the
//! pending-operation registry so out-of-band fill notifications can be
//! correlated later.

use crate::error::{BenchError, Result};
use crate::registry::PendingOperationRegistry;
use crate::types::{
    NotificationEvent, OrderIntent, OrderKind, PlacementOutcome, Side, TransportChannel,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// Crossing multipliers for aggressive market pricing
const AGGRESSIVE_LONG_FACTOR: Decimal = dec!(1.001);
const AGGRESSIVE_SHORT_FACTOR: Decimal = dec!(0.999);

/// Wire request for one placement
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub symbol: String,
    pub asset_index: u32,
    pub side: Side,
    pub size: Decimal,
    pub price: Decimal,
    pub kind: OrderKind,
}

/// Wire request for one cancel
#[derive(Debug, Clone, PartialEq)]
pub struct CancelSpec {
    pub symbol: String,
    pub asset_index: u32,
    pub operation_id: String,
}

/// How the venue reported a successful placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceStatus {
    /// Filled within the placement response itself
    Filled,
    /// Accepted and resting in the book
    Resting,
}

/// Venue response to a successful placement
#[derive(Debug, Clone)]
pub struct PlaceAck {
    pub operation_id: Option<String>,
    pub status: PlaceStatus,
}

/// Opaque venue transport: two parallel channels plus instrument metadata.
/// Network I/O and signing live behind this seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VenueTransport: Send + Sync {
    async fn place_order(&self, spec: &OrderSpec, channel: TransportChannel) -> Result<PlaceAck>;
    async fn cancel_order(&self, spec: &CancelSpec, channel: TransportChannel) -> Result<()>;
    fn asset_index(&self, symbol: &str) -> Result<u32>;
    async fn best_bid_ask(&self, symbol: &str) -> Result<(Decimal, Decimal)>;
}

/// Result of one placement: the synchronous outcome plus, when a fill
/// was awaited, the registered notification receiver.
pub struct Placement {
    pub outcome: PlacementOutcome,
    pub fill: Option<oneshot::Receiver<NotificationEvent>>,
}

/// Result of one cancel leg
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub cancel_sent_at: DateTime<Utc>,
    pub cancel_returned_at: DateTime<Utc>,
    pub cancel_send_to_return_ms: f64,
    /// Best-effort cancel acknowledgment synthesized from the synchronous
    /// response; the venue's async cancel-ack channel is not integrated
    pub notification: Option<NotificationEvent>,
}

pub struct OrderExecutionGateway {
    transport: Arc<dyn VenueTransport>,
    registry: Arc<PendingOperationRegistry>,
    price_decimals: HashMap<String, u32>,
    price_cache: RwLock<HashMap<String, (Decimal, Decimal)>>,
}

impl OrderExecutionGateway {
    pub fn new(transport: Arc<dyn VenueTransport>) -> Self {
        let mut price_decimals = HashMap::new();
        price_decimals.insert("BTC".to_string(), 1);
        price_decimals.insert("ETH".to_string(), 2);
        price_decimals.insert("SOL".to_string(), 3);
        price_decimals.insert("AVAX".to_string(), 3);
        price_decimals.insert("DOGE".to_string(), 5);

        Self {
            transport,
            registry: Arc::new(PendingOperationRegistry::new()),
            price_decimals,
            price_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Override the per-symbol price precision table
    pub fn with_price_decimals(mut self, decimals: HashMap<String, u32>) -> Self {
        self.price_decimals = decimals;
        self
    }

    pub fn registry(&self) -> Arc<PendingOperationRegistry> {
        self.registry.clone()
    }

    /// Round to the instrument's price precision; unknown symbols keep
    /// the natural scale of the input price
    pub fn round_price(&self, symbol: &str, price: Decimal) -> Decimal {
        match self.price_decimals.get(symbol) {
            Some(dp) => price.round_dp(*dp),
            None => price,
        }
    }

    /// Place one submitted intent, dispatching on its order kind
    pub async fn place(
        &self,
        intent: &OrderIntent,
        await_fill: Option<Duration>,
    ) -> Result<Placement> {
        match intent.kind {
            OrderKind::Market => {
                self.place_market_order(
                    &intent.symbol,
                    intent.side,
                    intent.size,
                    intent.transport,
                    await_fill,
                )
                .await
            }
            OrderKind::Limit => {
                let price = intent
                    .price
                    .ok_or_else(|| BenchError::Config("limit order requires a price".into()))?;
                self.place_limit_order(
                    &intent.symbol,
                    intent.side,
                    intent.size,
                    price,
                    intent.transport,
                    await_fill,
                )
                .await
            }
            OrderKind::PostOnly => {
                let price = intent.price.ok_or_else(|| {
                    BenchError::Config("post-only order requires a price".into())
                })?;
                self.place_post_only_order(
                    &intent.symbol,
                    intent.side,
                    intent.size,
                    price,
                    intent.transport,
                    await_fill,
                )
                .await
            }
        }
    }

    /// Place an aggressive market order at a price derived from the
    /// current touch so it is expected to fill immediately.
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        channel: TransportChannel,
        await_fill: Option<Duration>,
    ) -> Result<Placement> {
        // Unknown instruments are rejected before any market data call
        self.transport.asset_index(symbol)?;
        let (bid, ask) = self.fetch_market_price(symbol).await?;
        let raw = if side.is_long() {
            ask * AGGRESSIVE_LONG_FACTOR
        } else {
            bid * AGGRESSIVE_SHORT_FACTOR
        };
        self.dispatch(symbol, side, size, raw, OrderKind::Market, channel, await_fill)
            .await
    }

    /// Place a limit order at the caller-supplied price
    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        channel: TransportChannel,
        await_fill: Option<Duration>,
    ) -> Result<Placement> {
        self.dispatch(symbol, side, size, price, OrderKind::Limit, channel, await_fill)
            .await
    }

    /// Place a post-only order; rejected by the venue if it would cross
    pub async fn place_post_only_order(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
        channel: TransportChannel,
        await_fill: Option<Duration>,
    ) -> Result<Placement> {
        self.dispatch(symbol, side, size, price, OrderKind::PostOnly, channel, await_fill)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
        raw_price: Decimal,
        kind: OrderKind,
        channel: TransportChannel,
        await_fill: Option<Duration>,
    ) -> Result<Placement> {
        if size <= Decimal::ZERO {
            return Err(BenchError::Config("order size must be positive".into()));
        }
        let asset_index = self.transport.asset_index(symbol)?;
        let price = self.round_price(symbol, raw_price);
        let spec = OrderSpec {
            symbol: symbol.to_string(),
            asset_index,
            side,
            size,
            price,
            kind,
        };

        debug!(
            "placing {:?} {:?} {} {} @ {} via {:?}",
            kind, side, size, symbol, price, channel
        );

        // The measured interval covers only the transport round trip
        let sent_at = Utc::now();
        let started = Instant::now();
        let ack = self.transport.place_order(&spec, channel).await;
        let send_to_return_ms = started.elapsed().as_secs_f64() * 1000.0;
        let returned_at = Utc::now();

        let ack = ack?;
        let immediately_filled = ack.status == PlaceStatus::Filled;

        let fill = match (&ack.operation_id, await_fill) {
            (Some(id), Some(timeout)) => {
                // Registered before the id is handed upward, so a push
                // notification can never outrun its waiter
                Some(self.registry.register(id, Instant::now() + timeout))
            }
            (None, Some(_)) => {
                warn!("placement succeeded without an operation id, fill not awaited");
                None
            }
            _ => None,
        };

        Ok(Placement {
            outcome: PlacementOutcome {
                operation_id: ack.operation_id,
                success: true,
                sent_at,
                returned_at,
                send_to_return_ms,
                immediately_filled,
                error: None,
            },
            fill,
        })
    }

    /// Cancel a resting order, mirroring placement timing semantics for
    /// the cancel leg.
    pub async fn cancel_order(
        &self,
        operation_id: &str,
        symbol: &str,
        channel: TransportChannel,
    ) -> Result<CancelOutcome> {
        let asset_index = self.transport.asset_index(symbol)?;
        let spec = CancelSpec {
            symbol: symbol.to_string(),
            asset_index,
            operation_id: operation_id.to_string(),
        };

        let cancel_sent_at = Utc::now();
        let started = Instant::now();
        let result = self.transport.cancel_order(&spec, channel).await;
        let cancel_send_to_return_ms = started.elapsed().as_secs_f64() * 1000.0;
        let cancel_returned_at = Utc::now();

        result?;

        // A canceled order cannot subsequently fill
        if self.registry.remove(operation_id) {
            debug!("dropped pending fill waiter for canceled {}", operation_id);
        }

        Ok(CancelOutcome {
            cancel_sent_at,
            cancel_returned_at,
            cancel_send_to_return_ms,
            notification: Some(NotificationEvent {
                operation_id: operation_id.to_string(),
                event_time: cancel_returned_at,
                received_at: cancel_returned_at,
            }),
        })
    }

    /// Latest observed (bid, ask); advisory only, may be stale
    pub fn get_market_price(&self, symbol: &str) -> Option<(Decimal, Decimal)> {
        self.price_cache.read().get(symbol).copied()
    }

    /// Fetch the current touch from the venue and refresh the cache
    pub async fn fetch_market_price(&self, symbol: &str) -> Result<(Decimal, Decimal)> {
        let (bid, ask) = self.transport.best_bid_ask(symbol).await?;
        self.price_cache
            .write()
            .insert(symbol.to_string(), (bid, ask));
        Ok((bid, ask))
    }

    /// Push-subscription entry point for fill/cancel notifications;
    /// runs concurrently with placement.
    pub fn handle_notification(&self, event: NotificationEvent) {
        self.registry.resolve(event);
    }

    /// Drop registry entries older than `timeout_ms`. Safe to call
    /// concurrently with placement.
    pub fn cleanup_expired_orders(&self, timeout_ms: u64) {
        let swept = self
            .registry
            .sweep_older_than(Instant::now(), Duration::from_millis(timeout_ms));
        if !swept.is_empty() {
            info!("cleaned up {} expired pending orders: {:?}", swept.len(), swept);
        }
    }
}
