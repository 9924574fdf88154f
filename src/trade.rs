//! Trade records emitted by the match loop.

use crate::types::{OrderId, Price, Quantity};
use serde::{Deserialize, Serialize};

/// One participant of a trade: the order touched, the price it rested at,
/// and the quantity filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
}

/// A single match between a resting bid and a resting ask. The two legs are
/// recorded symmetrically; neither participant is privileged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub bid: TradeLeg,
    pub ask: TradeLeg,
}
