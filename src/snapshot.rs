//! Aggregated L2 depth snapshots.
//!
//! A snapshot reduces each price level to its total remaining quantity, bids
//! descending and asks ascending. The four strategies produce identical
//! output and differ only in how the per-level reductions execute: inline,
//! on two scoped tasks, or on a caller-supplied [`WorkerPool`] (one shard per
//! available core, or one task per level).

use crate::order_book::{LevelQueue, OrderBook};
use crate::pool::{TaskHandle, WorkerPool};
use crate::types::{Order, Price, Quantity, Side};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

/// Aggregated depth at one price.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
}

/// L2 view of the book: bids best-first (descending price), asks best-first
/// (ascending price).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// How a depth snapshot is computed. Every strategy yields the same result.
#[derive(Clone, Copy)]
pub enum SnapshotStrategy<'a> {
    /// One pass over each side on the calling thread.
    Sequential,
    /// One scoped task per side; join and combine.
    TwoTask,
    /// Each side split into contiguous shards dispatched to the pool; the
    /// last shard absorbs the remainder. Shard order preserves price order.
    PoolPartitioned(&'a WorkerPool),
    /// One pool task per price level, collected in iteration order.
    PoolPerLevel(&'a WorkerPool),
}

impl OrderBook {
    /// Builds an aggregated depth snapshot of the current book.
    pub fn depth(&self, strategy: SnapshotStrategy<'_>) -> DepthSnapshot {
        match strategy {
            SnapshotStrategy::Sequential => DepthSnapshot {
                bids: collect_side(self, Side::Buy),
                asks: collect_side(self, Side::Sell),
            },
            SnapshotStrategy::TwoTask => thread::scope(|scope| {
                let bids = scope.spawn(|| collect_side(self, Side::Buy));
                let asks = scope.spawn(|| collect_side(self, Side::Sell));
                DepthSnapshot {
                    bids: bids.join().expect("bid-side reduction panicked"),
                    asks: asks.join().expect("ask-side reduction panicked"),
                }
            }),
            SnapshotStrategy::PoolPartitioned(pool) => DepthSnapshot {
                bids: partitioned_side(self, Side::Buy, pool),
                asks: partitioned_side(self, Side::Sell, pool),
            },
            SnapshotStrategy::PoolPerLevel(pool) => DepthSnapshot {
                bids: per_level_side(self, Side::Buy, pool),
                asks: per_level_side(self, Side::Sell, pool),
            },
        }
    }
}

fn collect_side(book: &OrderBook, side: Side) -> Vec<DepthLevel> {
    let reduce = |(&price, queue): (&Price, &LevelQueue)| DepthLevel {
        price,
        quantity: book.queue_total(queue),
    };
    match side {
        Side::Buy => book.bids.iter().rev().map(reduce).collect(),
        Side::Sell => book.asks.iter().map(reduce).collect(),
    }
}

fn partitioned_side(book: &OrderBook, side: Side, pool: &WorkerPool) -> Vec<DepthLevel> {
    let levels = book.side_levels(side);
    let level_count = levels.len();
    if level_count == 0 {
        return Vec::new();
    }

    let shard_count = thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(level_count);
    let shard_size = level_count / shard_count;

    let mut handles = Vec::with_capacity(shard_count);
    let mut rest = levels;
    for index in 0..shard_count {
        let take = if index == shard_count - 1 {
            rest.len()
        } else {
            shard_size
        };
        let tail = rest.split_off(take);
        let shard = std::mem::replace(&mut rest, tail);
        handles.push(pool.submit(move || reduce_levels(shard)));
    }

    let mut combined = Vec::with_capacity(level_count);
    for handle in handles {
        combined.extend(handle.wait());
    }
    combined
}

fn per_level_side(book: &OrderBook, side: Side, pool: &WorkerPool) -> Vec<DepthLevel> {
    let handles: Vec<_> = book
        .side_levels(side)
        .into_iter()
        .map(|(price, orders)| {
            pool.submit(move || DepthLevel {
                price,
                quantity: orders.iter().map(|order| order.remaining_quantity()).sum(),
            })
        })
        .collect();
    handles.into_iter().map(TaskHandle::wait).collect()
}

fn reduce_levels(levels: Vec<(Price, Vec<Arc<Order>>)>) -> Vec<DepthLevel> {
    levels
        .into_iter()
        .map(|(price, orders)| DepthLevel {
            price,
            quantity: orders.iter().map(|order| order.remaining_quantity()).sum(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Order, OrderId, OrderType};

    fn populated_book() -> OrderBook {
        let mut book = OrderBook::new();
        let mut id = 1;
        for (side, price, quantity) in [
            (Side::Buy, 99, 10),
            (Side::Buy, 99, 5),
            (Side::Buy, 98, 7),
            (Side::Buy, 95, 1),
            (Side::Sell, 101, 4),
            (Side::Sell, 101, 6),
            (Side::Sell, 102, 9),
            (Side::Sell, 110, 2),
        ] {
            book.submit(Order::new(
                OrderType::GoodTillCancel,
                OrderId(id),
                side,
                price,
                quantity,
            ));
            id += 1;
        }
        book
    }

    #[test]
    fn sequential_snapshot_orders_sides_best_first() {
        let book = populated_book();
        let depth = book.depth(SnapshotStrategy::Sequential);

        let bids: Vec<(Price, Quantity)> = depth.bids.iter().map(|l| (l.price, l.quantity)).collect();
        let asks: Vec<(Price, Quantity)> = depth.asks.iter().map(|l| (l.price, l.quantity)).collect();
        assert_eq!(bids, vec![(99, 15), (98, 7), (95, 1)]);
        assert_eq!(asks, vec![(101, 10), (102, 9), (110, 2)]);
    }

    #[test]
    fn all_strategies_agree() {
        let book = populated_book();
        let pool = WorkerPool::new(3);

        let sequential = book.depth(SnapshotStrategy::Sequential);
        assert_eq!(sequential, book.depth(SnapshotStrategy::TwoTask));
        assert_eq!(sequential, book.depth(SnapshotStrategy::PoolPartitioned(&pool)));
        assert_eq!(sequential, book.depth(SnapshotStrategy::PoolPerLevel(&pool)));
    }

    #[test]
    fn empty_book_snapshots_are_empty_for_every_strategy() {
        let book = OrderBook::new();
        let pool = WorkerPool::new(2);
        for strategy in [
            SnapshotStrategy::Sequential,
            SnapshotStrategy::TwoTask,
            SnapshotStrategy::PoolPartitioned(&pool),
            SnapshotStrategy::PoolPerLevel(&pool),
        ] {
            let depth = book.depth(strategy);
            assert!(depth.bids.is_empty());
            assert!(depth.asks.is_empty());
        }
    }

    #[test]
    fn partitioning_handles_fewer_levels_than_cores() {
        let mut book = OrderBook::new();
        book.submit(Order::new(OrderType::GoodTillCancel, OrderId(1), Side::Sell, 101, 3));
        let pool = WorkerPool::new(4);
        let depth = book.depth(SnapshotStrategy::PoolPartitioned(&pool));
        assert_eq!(depth.asks, vec![DepthLevel { price: 101, quantity: 3 }]);
        assert!(depth.bids.is_empty());
    }

    #[test]
    fn snapshot_reflects_partial_fills() {
        let mut book = populated_book();
        // Lift 6 of the 15 resting at the best bid.
        book.submit(Order::new(OrderType::GoodTillCancel, OrderId(90), Side::Sell, 99, 6));
        let depth = book.depth(SnapshotStrategy::Sequential);
        assert_eq!(depth.bids[0], DepthLevel { price: 99, quantity: 9 });
    }
}
