//! Venue depth ingestion: turns an L2 depth document into resting orders.
//!
//! Venues publish depth as decimal strings. Each value is parsed exactly and
//! scaled to integer ticks once, here at the boundary; the core never sees a
//! fraction and never rounds. Fetching the document is the caller's problem;
//! this module only understands its shape.

use crate::engine::Engine;
use crate::types::{Order, OrderId, OrderType, Side, TICK_SCALE};
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use thiserror::Error;

/// L2 depth document as published by the venue: price/quantity pairs of
/// decimal strings, best-first on both sides.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthDocument {
    pub last_update_id: u64,
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("malformed depth document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid decimal value {0:?}")]
    InvalidDecimal(String),
    #[error("{0} does not fit the tick scale")]
    OutOfRange(Decimal),
}

impl DepthDocument {
    pub fn from_json(text: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Converts a venue decimal string to integer ticks (scale 10^8, half-up at
/// the tick boundary).
pub fn decimal_to_ticks(text: &str) -> Result<u64, FeedError> {
    let value: Decimal = text
        .trim()
        .parse()
        .map_err(|_| FeedError::InvalidDecimal(text.to_owned()))?;
    let scaled = value
        .checked_mul(Decimal::from(TICK_SCALE))
        .ok_or(FeedError::OutOfRange(value))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled.to_u64().ok_or(FeedError::OutOfRange(value))
}

/// Seeds the engine from a depth document: bids rest as buys, asks as sells,
/// all GoodTillCancel, with ids assigned monotonically from `first_id`.
/// Returns the next unused id. The whole document is converted before any
/// order is submitted, so a malformed row leaves the book untouched.
pub fn seed_book(
    engine: &Engine,
    document: &DepthDocument,
    first_id: OrderId,
) -> Result<OrderId, FeedError> {
    let mut next_id = first_id.0;
    let mut orders = Vec::with_capacity(document.bids.len() + document.asks.len());
    for (rows, side) in [(&document.bids, Side::Buy), (&document.asks, Side::Sell)] {
        for (price_text, quantity_text) in rows {
            let price = decimal_to_ticks(price_text)?;
            let quantity = decimal_to_ticks(quantity_text)?;
            // Zero-quantity rows are level deletions in incremental feeds;
            // nothing to rest.
            if quantity == 0 {
                continue;
            }
            orders.push(Order::new(
                OrderType::GoodTillCancel,
                OrderId(next_id),
                side,
                price,
                quantity,
            ));
            next_id += 1;
        }
    }
    debug!(
        "seeding book with {} depth orders (last_update_id {})",
        orders.len(),
        document.last_update_id
    );
    for order in orders {
        engine.add_order(order);
    }
    Ok(OrderId(next_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotStrategy;

    #[test]
    fn decimal_strings_convert_exactly() {
        assert_eq!(decimal_to_ticks("0.00000001").unwrap(), 1);
        assert_eq!(decimal_to_ticks("1").unwrap(), 100_000_000);
        assert_eq!(decimal_to_ticks("30123.45678901").unwrap(), 3_012_345_678_901);
        assert_eq!(decimal_to_ticks(" 2.5 ").unwrap(), 250_000_000);
    }

    #[test]
    fn sub_tick_fractions_round_half_up() {
        assert_eq!(decimal_to_ticks("0.000000015").unwrap(), 2);
        assert_eq!(decimal_to_ticks("0.000000014").unwrap(), 1);
    }

    #[test]
    fn invalid_and_negative_values_are_rejected() {
        assert!(matches!(
            decimal_to_ticks("abc"),
            Err(FeedError::InvalidDecimal(_))
        ));
        assert!(matches!(
            decimal_to_ticks("-1.5"),
            Err(FeedError::OutOfRange(_))
        ));
    }

    #[test]
    fn depth_document_parses_the_venue_shape() {
        let text = r#"{
            "lastUpdateId": 4711,
            "bids": [["100.5", "2"], ["100.0", "1.5"]],
            "asks": [["101.0", "3"]]
        }"#;
        let document = DepthDocument::from_json(text).unwrap();
        assert_eq!(document.last_update_id, 4711);
        assert_eq!(document.bids.len(), 2);
        assert_eq!(document.asks[0].0, "101.0");
    }

    #[test]
    fn malformed_documents_error() {
        assert!(matches!(
            DepthDocument::from_json("{\"bids\": []}"),
            Err(FeedError::Malformed(_))
        ));
    }

    #[test]
    fn seed_book_rests_asks_as_sells() {
        let engine = Engine::new();
        let document = DepthDocument {
            last_update_id: 1,
            bids: vec![("100.0".into(), "2".into())],
            asks: vec![("101.0".into(), "3".into()), ("102.0".into(), "0".into())],
        };
        let next = seed_book(&engine, &document, OrderId(1)).unwrap();

        // Two live orders: the zero-quantity ask row is skipped.
        assert_eq!(next, OrderId(3));
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.best_bid(), Some(100 * TICK_SCALE));
        assert_eq!(engine.best_ask(), Some(101 * TICK_SCALE));

        let depth = engine.depth(SnapshotStrategy::Sequential);
        assert_eq!(depth.bids[0].quantity, 2 * TICK_SCALE);
        assert_eq!(depth.asks[0].quantity, 3 * TICK_SCALE);
    }
}
