//! Core scalar types and the order model.
//!
//! Prices and quantities are unsigned 64-bit tick counts; venue decimals are
//! converted to ticks once, at ingress (see [`crate::feed`]). [`Order`]
//! carries the immutable identity of an order plus its remaining quantity,
//! the only field that changes once the order is resting in the book.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-point scale: one tick is 10^-8 of a venue unit.
pub const TICK_SCALE: u64 = 100_000_000;

/// Price in integer ticks.
pub type Price = u64;

/// Quantity in integer ticks.
pub type Quantity = u64;

/// Unique order identifier (client-assigned).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Order lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Rests until filled or cancelled.
    GoodTillCancel,
    /// Rests until the 16:00 day boundary, then is auto-cancelled.
    GoodForDay,
    /// Matches what it can immediately; the remainder is cancelled.
    FillAndKill,
    /// Matches the full quantity immediately or not at all.
    FillOrKill,
    /// Takes whatever rests on the opposite side. Converted on entry to a
    /// limit pinned at the worst opposite resting price.
    Market,
}

/// A single order.
///
/// Identity fields are frozen once the order enters the book; only the
/// remaining quantity changes, and only under the engine lock. External
/// holders can observe an order but not mutate it.
#[derive(Debug)]
pub struct Order {
    id: OrderId,
    side: Side,
    order_type: OrderType,
    price: Price,
    initial_quantity: Quantity,
    remaining_quantity: AtomicU64,
}

impl Order {
    pub fn new(
        order_type: OrderType,
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Self {
        Self {
            id,
            side,
            order_type,
            price,
            initial_quantity: quantity,
            remaining_quantity: AtomicU64::new(quantity),
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn initial_quantity(&self) -> Quantity {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Quantity {
        self.remaining_quantity.load(Ordering::Acquire)
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.initial_quantity - self.remaining_quantity()
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_quantity() == 0
    }

    /// Subtracts `quantity` from the remaining quantity.
    ///
    /// Panics if `quantity` exceeds the remaining quantity; the match loop
    /// never produces such a fill, so hitting this means the book state is
    /// corrupt.
    pub(crate) fn fill(&self, quantity: Quantity) {
        let remaining = self.remaining_quantity();
        assert!(
            quantity <= remaining,
            "order {}: fill of {} exceeds remaining {}",
            self.id.0,
            quantity,
            remaining
        );
        self.remaining_quantity
            .store(remaining - quantity, Ordering::Release);
    }

    /// Pins a market order to a limit price. Panics unless the order type is
    /// [`OrderType::Market`].
    pub(crate) fn to_good_till_cancel(&mut self, price: Price) {
        assert!(
            self.order_type == OrderType::Market,
            "order {}: only market orders can be pinned to a limit price",
            self.id.0
        );
        self.order_type = OrderType::GoodTillCancel;
        self.price = price;
    }
}

/// Replacement request for a resting order: same id, new side, price, and
/// quantity. Applying it re-enters the queue, so time priority is lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub id: OrderId,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
}

impl ModifyRequest {
    /// Builds the replacement order, carrying over the original order's type.
    pub(crate) fn to_order(self, order_type: OrderType) -> Order {
        Order::new(order_type, self.id, self.side, self.price, self.quantity)
    }
}
