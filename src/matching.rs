//! Order admission and price-time priority matching.
//!
//! [`OrderBook::submit`] runs the admission checks (duplicate id, FillAndKill
//! crossability, Market conversion, FillOrKill feasibility), rests the order,
//! then drives the match loop while the best bid crosses the best ask.

use crate::order_book::{LevelAction, OrderBook};
use crate::trade::{Trade, TradeLeg};
use crate::types::{ModifyRequest, Order, OrderType, Price, Quantity, Side};
use std::sync::Arc;

impl OrderBook {
    /// Submits an order and returns the trades it produced.
    ///
    /// Submissions that cannot be admitted leave the book untouched and
    /// return no trades: a zero quantity, a duplicate id, a FillAndKill with
    /// nothing to cross, a Market order against an empty opposite side, or a
    /// FillOrKill the resting depth cannot cover.
    pub fn submit(&mut self, mut order: Order) -> Vec<Trade> {
        if order.initial_quantity() == 0 || self.contains(order.id()) {
            return Vec::new();
        }

        if order.order_type() == OrderType::FillAndKill
            && !self.can_match(order.side(), order.price())
        {
            return Vec::new();
        }

        if order.order_type() == OrderType::Market {
            // Pin to the worst opposite resting price so the order sweeps all
            // available liquidity as an ordinary limit.
            let worst = match order.side() {
                Side::Buy => self.worst_ask(),
                Side::Sell => self.worst_bid(),
            };
            match worst {
                Some(price) => order.to_good_till_cancel(price),
                None => return Vec::new(),
            }
        }

        if order.order_type() == OrderType::FillOrKill
            && !self.can_fully_fill(order.side(), order.price(), order.initial_quantity())
        {
            return Vec::new();
        }

        self.insert_resting(Arc::new(order));
        self.match_orders()
    }

    /// Cancels `request.id` and resubmits with the new side, price, and
    /// quantity, keeping the original order's type. The replacement joins the
    /// back of its queue, so time priority restarts. Unknown ids are a no-op.
    pub fn modify(&mut self, request: ModifyRequest) -> Vec<Trade> {
        let Some(order_type) = self.order_type(request.id) else {
            return Vec::new();
        };
        self.cancel(request.id);
        self.submit(request.to_order(order_type))
    }

    /// Whether an order at `price` would cross the opposite best.
    fn can_match(&self, side: Side, price: Price) -> bool {
        match side {
            Side::Buy => self.best_ask().map_or(false, |ask| price >= ask),
            Side::Sell => self.best_bid().map_or(false, |bid| price <= bid),
        }
    }

    /// FillOrKill feasibility: the resting depth at-or-better must cover the
    /// full quantity. The level aggregates answer this in one pass over the
    /// candidate prices.
    fn can_fully_fill(&self, side: Side, price: Price, quantity: Quantity) -> bool {
        if !self.can_match(side, price) {
            return false;
        }
        let mut outstanding = quantity;
        let mut covered_by = |level_price: Price| {
            let available = self
                .levels
                .get(&level_price)
                .map_or(0, |data| data.quantity);
            if outstanding <= available {
                true
            } else {
                outstanding -= available;
                false
            }
        };
        match side {
            Side::Buy => self.asks.range(..=price).any(|(&p, _)| covered_by(p)),
            Side::Sell => self.bids.range(price..).rev().any(|(&p, _)| covered_by(p)),
        }
    }

    /// Matches crossing orders until the spread opens or one side empties.
    /// Trades come out in (best price, FIFO within level) order; two orders at
    /// the same price match strictly in arrival order.
    fn match_orders(&mut self) -> Vec<Trade> {
        let mut trades = Vec::new();

        loop {
            let (Some(bid_price), Some(ask_price)) = (self.best_bid(), self.best_ask()) else {
                break;
            };
            if bid_price < ask_price {
                break;
            }

            while let (Some(bid), Some(ask)) = (
                self.bids
                    .get(&bid_price)
                    .and_then(|queue| queue.front(&self.nodes))
                    .map(Arc::clone),
                self.asks
                    .get(&ask_price)
                    .and_then(|queue| queue.front(&self.nodes))
                    .map(Arc::clone),
            ) {
                let quantity = bid.remaining_quantity().min(ask.remaining_quantity());
                bid.fill(quantity);
                ask.fill(quantity);

                trades.push(Trade {
                    bid: TradeLeg {
                        order_id: bid.id(),
                        price: bid.price(),
                        quantity,
                    },
                    ask: TradeLeg {
                        order_id: ask.id(),
                        price: ask.price(),
                        quantity,
                    },
                });

                for order in [&bid, &ask] {
                    let filled = order.is_filled();
                    if filled {
                        self.pop_front(order.side(), order.price());
                        self.remove_index(order.id());
                    }
                    self.update_level(
                        order.price(),
                        quantity,
                        if filled {
                            LevelAction::Remove
                        } else {
                            LevelAction::Match
                        },
                    );
                }
            }

            if self.bids.get(&bid_price).map_or(false, |queue| queue.is_empty()) {
                self.bids.remove(&bid_price);
            }
            if self.asks.get(&ask_price).map_or(false, |queue| queue.is_empty()) {
                self.asks.remove(&ask_price);
            }
        }

        // A FillAndKill left at the head of either best level took what it
        // could; discard the unexecuted remainder.
        for side in [Side::Buy, Side::Sell] {
            let head = match side {
                Side::Buy => self
                    .bids
                    .iter()
                    .next_back()
                    .and_then(|(_, queue)| queue.front(&self.nodes)),
                Side::Sell => self
                    .asks
                    .iter()
                    .next()
                    .and_then(|(_, queue)| queue.front(&self.nodes)),
            };
            let unexecuted = head
                .filter(|order| {
                    order.order_type() == OrderType::FillAndKill && order.remaining_quantity() > 0
                })
                .map(|order| order.id());
            if let Some(id) = unexecuted {
                self.cancel(id);
            }
        }

        trades
    }
}
