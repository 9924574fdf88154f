//! Deterministic synthetic order streams for tests and benchmarks.
//!
//! Same config (including seed) produces the same sequence of orders.

use crate::engine::Engine;
use crate::order_book::OrderBook;
use crate::trade::Trade;
use crate::types::{Order, OrderId, OrderType, Price, Quantity, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the synthetic order generator. All ranges are
/// inclusive.
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// RNG seed. Same seed, same stream.
    pub seed: u64,
    /// Number of orders produced by [`Generator::all_orders`].
    pub num_orders: usize,
    /// Probability of Buy; Sell otherwise.
    pub buy_ratio: f64,
    pub price_min: Price,
    pub price_max: Price,
    pub quantity_min: Quantity,
    pub quantity_max: Quantity,
    /// Order type mix. Probabilities are consumed in this order; whatever is
    /// left over is the Market ratio.
    pub good_till_cancel_ratio: f64,
    pub good_for_day_ratio: f64,
    pub fill_and_kill_ratio: f64,
    pub fill_or_kill_ratio: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            num_orders: 1000,
            buy_ratio: 0.5,
            price_min: 95,
            price_max: 105,
            quantity_min: 1,
            quantity_max: 100,
            good_till_cancel_ratio: 0.82,
            good_for_day_ratio: 0.05,
            fill_and_kill_ratio: 0.08,
            fill_or_kill_ratio: 0.03,
        }
    }
}

/// Deterministic order stream. Create with [`Generator::new`]; pull orders
/// with [`Generator::next_order`] or [`Generator::all_orders`].
pub struct Generator {
    rng: StdRng,
    config: GeneratorConfig,
    next_order_id: u64,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            next_order_id: 1,
        }
    }

    /// Generates the next order, advancing the RNG and the id counter.
    pub fn next_order(&mut self) -> Order {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;

        let side = if self.rng.gen::<f64>() < self.config.buy_ratio {
            Side::Buy
        } else {
            Side::Sell
        };
        let roll = self.rng.gen::<f64>();
        let c = &self.config;
        let order_type = if roll < c.good_till_cancel_ratio {
            OrderType::GoodTillCancel
        } else if roll < c.good_till_cancel_ratio + c.good_for_day_ratio {
            OrderType::GoodForDay
        } else if roll < c.good_till_cancel_ratio + c.good_for_day_ratio + c.fill_and_kill_ratio {
            OrderType::FillAndKill
        } else if roll
            < c.good_till_cancel_ratio
                + c.good_for_day_ratio
                + c.fill_and_kill_ratio
                + c.fill_or_kill_ratio
        {
            OrderType::FillOrKill
        } else {
            OrderType::Market
        };
        let price = self
            .rng
            .gen_range(self.config.price_min..=self.config.price_max);
        let quantity = self
            .rng
            .gen_range(self.config.quantity_min..=self.config.quantity_max);

        Order::new(order_type, id, side, price, quantity)
    }

    /// Exactly `n` orders, advancing the generator state.
    pub fn take_orders(&mut self, n: usize) -> Vec<Order> {
        (0..n).map(|_| self.next_order()).collect()
    }

    /// The full stream of `config.num_orders` orders.
    pub fn all_orders(&mut self) -> Vec<Order> {
        self.take_orders(self.config.num_orders)
    }
}

/// Replays `orders` into the engine, returning all trades produced.
pub fn replay(engine: &Engine, orders: impl IntoIterator<Item = Order>) -> Vec<Trade> {
    let mut trades = Vec::new();
    for order in orders {
        trades.extend(engine.add_order(order));
    }
    trades
}

/// Replays `orders` into a bare book (no locking), returning all trades.
pub fn replay_book(book: &mut OrderBook, orders: impl IntoIterator<Item = Order>) -> Vec<Trade> {
    let mut trades = Vec::new();
    for order in orders {
        trades.extend(book.submit(order));
    }
    trades
}
