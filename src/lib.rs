//! # depthbook
//!
//! In-memory, single-instrument limit order book with a price-time priority
//! matching engine, GoodForDay expiry, and parallel L2 depth snapshots.
//!
//! ## Entry point
//!
//! Use [`Engine`] for concurrent access: create with [`Engine::new`], then
//! [`Engine::add_order`], [`Engine::cancel_order`], [`Engine::modify_order`],
//! and [`Engine::depth`]. A background thread expires GoodForDay orders at
//! the local 16:00 boundary.
//!
//! ## Example
//!
//! ```rust
//! use depthbook::{Engine, Order, OrderId, OrderType, Side, SnapshotStrategy};
//!
//! let engine = Engine::new();
//! engine.add_order(Order::new(OrderType::GoodTillCancel, OrderId(1), Side::Buy, 100, 5));
//! let trades = engine.add_order(Order::new(OrderType::GoodTillCancel, OrderId(2), Side::Sell, 100, 3));
//! assert_eq!(trades.len(), 1);
//! assert_eq!(trades[0].bid.quantity, 3);
//!
//! let depth = engine.depth(SnapshotStrategy::Sequential);
//! assert_eq!(depth.bids[0].quantity, 2);
//! assert!(depth.asks.is_empty());
//! ```
//!
//! ## Lower-level API
//!
//! [`OrderBook`] is the single-threaded core behind the engine; use it
//! directly when you manage locking yourself. [`WorkerPool`] backs the
//! pool-based snapshot strategies and can be shared across snapshots.

pub mod engine;
pub mod feed;
pub mod gen;
mod matching;
pub mod order_book;
pub mod pool;
pub mod snapshot;
pub mod trade;
pub mod types;

pub use engine::Engine;
pub use order_book::OrderBook;
pub use pool::{TaskHandle, WorkerPool};
pub use snapshot::{DepthLevel, DepthSnapshot, SnapshotStrategy};
pub use trade::{Trade, TradeLeg};
pub use types::{ModifyRequest, Order, OrderId, OrderType, Price, Quantity, Side, TICK_SCALE};
