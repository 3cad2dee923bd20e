//! Order book reconstruction from a snapshot + delta push stream.
//!
//! One state machine per instrument. State is an order-id-indexed map;
//! bids/asks are materialized and sorted only on query, never on apply.

use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One resting order tracked by the book
#[derive(Debug, Clone)]
struct BookEntry {
    side: Side,
    price: Decimal,
    size: Decimal,
    /// Insertion counter; FIFO tie-break at equal price
    arrival: u64,
}

/// A price level as returned by queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub order_id: String,
    pub price: Decimal,
    pub size: Decimal,
}

/// Sorted view of the book for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookView {
    pub coin: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// Messages arriving on the book subscription, discriminated by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BookMessage {
    #[serde(rename = "snapshot")]
    Snapshot(BookSnapshot),
    #[serde(rename = "diff")]
    Diff(BookDiff),
    #[serde(rename = "statusUpdate")]
    StatusUpdate(StatusUpdate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub coin: String,
    pub entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDiff {
    pub coin: String,
    pub items: Vec<DiffItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum DiffItem {
    #[serde(rename = "remove")]
    Remove { order_id: String },
    #[serde(rename = "new")]
    New {
        order_id: String,
        side: Side,
        price: Decimal,
        size: Decimal,
    },
    #[serde(rename = "update")]
    Update { order_id: String, size: Decimal },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub coin: String,
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub size: Option<Decimal>,
}

/// Per-instrument bid/ask state driven by the push subscription
pub struct OrderBookStateMachine {
    coin: String,
    entries: HashMap<String, BookEntry>,
    next_arrival: u64,
}

impl OrderBookStateMachine {
    pub fn new(coin: &str) -> Self {
        Self {
            coin: coin.to_string(),
            entries: HashMap::new(),
            next_arrival: 0,
        }
    }

    pub fn coin(&self) -> &str {
        &self.coin
    }

    /// Apply one subscription message; O(1) amortized per item
    pub fn apply(&mut self, message: BookMessage) {
        match message {
            BookMessage::Snapshot(snapshot) => self.apply_snapshot(snapshot),
            BookMessage::Diff(diff) => self.apply_diff(diff),
            BookMessage::StatusUpdate(update) => self.apply_status(update),
        }
    }

    fn apply_snapshot(&mut self, snapshot: BookSnapshot) {
        self.entries.clear();
        for entry in snapshot.entries {
            self.insert(entry.order_id, entry.side, entry.price, entry.size);
        }
        debug!("{}: rebuilt book from snapshot, {} orders", self.coin, self.entries.len());
    }

    fn apply_diff(&mut self, diff: BookDiff) {
        for item in diff.items {
            match item {
                DiffItem::Remove { order_id } => {
                    self.entries.remove(&order_id);
                }
                DiffItem::New {
                    order_id,
                    side,
                    price,
                    size,
                } => {
                    self.insert(order_id, side, price, size);
                }
                DiffItem::Update { order_id, size } => {
                    // Diffs may reference ids not yet snapshotted
                    if let Some(entry) = self.entries.get_mut(&order_id) {
                        entry.size = size;
                    }
                }
            }
        }
    }

    fn apply_status(&mut self, update: StatusUpdate) {
        match update.status.as_str() {
            "open" => match (update.side, update.price, update.size) {
                (Some(side), Some(price), Some(size)) => {
                    self.insert(update.order_id, side, price, size);
                }
                _ => debug!(
                    "{}: open status for {} missing level fields, ignored",
                    self.coin, update.order_id
                ),
            },
            "filled" | "canceled" | "rejected" | "marginCanceled" => {
                self.entries.remove(&update.order_id);
            }
            "partialFill" => {
                if let Some(entry) = self.entries.get_mut(&update.order_id) {
                    let filled = update.size.unwrap_or_default();
                    entry.size -= filled;
                    if entry.size <= Decimal::ZERO {
                        self.entries.remove(&update.order_id);
                    }
                }
            }
            other => {
                // Unknown status: no mutation
                debug!("{}: unrecognized order status '{}', ignored", self.coin, other);
            }
        }
    }

    fn insert(&mut self, order_id: String, side: Side, price: Decimal, size: Decimal) {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        self.entries.insert(
            order_id,
            BookEntry {
                side,
                price,
                size,
                arrival,
            },
        );
    }

    /// Bids sorted descending by price, equal prices first-seen first
    pub fn sorted_bids(&self) -> Vec<BookLevel> {
        self.sorted_side(Side::Long)
    }

    /// Asks sorted ascending by price, equal prices first-seen first
    pub fn sorted_asks(&self) -> Vec<BookLevel> {
        self.sorted_side(Side::Short)
    }

    fn sorted_side(&self, side: Side) -> Vec<BookLevel> {
        let mut levels: Vec<(&String, &BookEntry)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.side == side)
            .collect();
        levels.sort_by(|(_, a), (_, b)| {
            let by_price = if side.is_long() {
                b.price.cmp(&a.price)
            } else {
                a.price.cmp(&b.price)
            };
            by_price.then(a.arrival.cmp(&b.arrival))
        });
        levels
            .into_iter()
            .map(|(id, e)| BookLevel {
                order_id: id.clone(),
                price: e.price,
                size: e.size,
            })
            .collect()
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.entries
            .values()
            .filter(|e| e.side.is_long())
            .map(|e| e.price)
            .max()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.entries
            .values()
            .filter(|e| !e.side.is_long())
            .map(|e| e.price)
            .min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted snapshot of the current state
    pub fn snapshot_view(&self) -> BookView {
        BookView {
            coin: self.coin.clone(),
            bids: self.sorted_bids(),
            asks: self.sorted_asks(),
        }
    }
}
