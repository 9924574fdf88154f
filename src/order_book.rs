//! Single-instrument order book state: price-indexed FIFO queues, the order
//! index, and per-level depth aggregates.
//!
//! Queue nodes live in a slab arena and are linked into one doubly-linked
//! FIFO list per price, so a cancellation unlinks its node in O(1) once the
//! level is found. Bids and asks are `BTreeMap`s keyed by price; best bid is
//! the last bid key, best ask the first ask key. Empty levels are erased
//! eagerly so the first key of each map is always the best price.

use crate::types::{Order, OrderId, OrderType, Price, Quantity, Side};
use slab::Slab;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Stable handle to an order's position in its price-level queue. Handles of
/// other orders stay valid when a node is unlinked.
pub(crate) type NodeKey = usize;

pub(crate) struct Node {
    order: Arc<Order>,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

/// FIFO queue of the orders resting at one price.
#[derive(Default)]
pub(crate) struct LevelQueue {
    head: Option<NodeKey>,
    tail: Option<NodeKey>,
    len: usize,
}

impl LevelQueue {
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn front<'a>(&self, nodes: &'a Slab<Node>) -> Option<&'a Arc<Order>> {
        self.head.map(|key| &nodes[key].order)
    }

    fn push_back(&mut self, nodes: &mut Slab<Node>, order: Arc<Order>) -> NodeKey {
        let key = nodes.insert(Node {
            order,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(tail) => nodes[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
        key
    }

    /// Unlinks the node at `key` and returns its order. Panics if the key
    /// does not name a live node (a corrupt handle).
    fn unlink(&mut self, nodes: &mut Slab<Node>, key: NodeKey) -> Arc<Order> {
        let node = nodes.remove(key);
        match node.prev {
            Some(prev) => nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
        self.len -= 1;
        node.order
    }

    /// Iterates the resting orders head to tail (arrival order).
    pub(crate) fn iter<'a>(&self, nodes: &'a Slab<Node>) -> LevelIter<'a> {
        LevelIter {
            nodes,
            cursor: self.head,
        }
    }
}

pub(crate) struct LevelIter<'a> {
    nodes: &'a Slab<Node>,
    cursor: Option<NodeKey>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a Arc<Order>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let node = &self.nodes[key];
        self.cursor = node.next;
        Some(&node.order)
    }
}

/// Aggregate depth at one price: total remaining quantity and live order
/// count. The sole source of truth for FillOrKill feasibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct LevelData {
    pub(crate) quantity: Quantity,
    pub(crate) count: u64,
}

/// How a level aggregate changes: a new resting order, an order leaving the
/// level, or a partial fill that leaves the order in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LevelAction {
    Add,
    Remove,
    Match,
}

struct OrderEntry {
    order: Arc<Order>,
    node: NodeKey,
}

/// In-memory single-instrument limit order book with price-time priority.
///
/// Single-threaded core; [`crate::Engine`] wraps it behind a mutex for
/// concurrent use. Submit orders with [`OrderBook::submit`] (defined with the
/// matching logic), cancel with [`OrderBook::cancel`], and read aggregated
/// depth with [`OrderBook::depth`].
#[derive(Default)]
pub struct OrderBook {
    pub(crate) nodes: Slab<Node>,
    pub(crate) bids: BTreeMap<Price, LevelQueue>,
    pub(crate) asks: BTreeMap<Price, LevelQueue>,
    orders: HashMap<OrderId, OrderEntry>,
    pub(crate) levels: HashMap<Price, LevelData>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    /// Highest resting bid price.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    /// Lowest resting ask price.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    pub(crate) fn worst_bid(&self) -> Option<Price> {
        self.bids.keys().next().copied()
    }

    pub(crate) fn worst_ask(&self) -> Option<Price> {
        self.asks.keys().next_back().copied()
    }

    pub(crate) fn order_type(&self, id: OrderId) -> Option<OrderType> {
        self.orders.get(&id).map(|entry| entry.order.order_type())
    }

    /// Rests `order` at the back of its price-level queue, indexes it, and
    /// bumps the level aggregate.
    pub(crate) fn insert_resting(&mut self, order: Arc<Order>) {
        let price = order.price();
        let queue = match order.side() {
            Side::Buy => self.bids.entry(price).or_default(),
            Side::Sell => self.asks.entry(price).or_default(),
        };
        let node = queue.push_back(&mut self.nodes, Arc::clone(&order));
        let quantity = order.remaining_quantity();
        self.orders.insert(order.id(), OrderEntry { order, node });
        self.update_level(price, quantity, LevelAction::Add);
    }

    /// Removes the order with `id` from the book. Unknown ids are a no-op;
    /// returns whether an order was removed.
    pub fn cancel(&mut self, id: OrderId) -> bool {
        let Some(entry) = self.orders.remove(&id) else {
            return false;
        };
        let order = entry.order;
        let price = order.price();
        let queue = match order.side() {
            Side::Buy => self.bids.get_mut(&price),
            Side::Sell => self.asks.get_mut(&price),
        }
        .expect("order index names a price level that is not in the book");
        queue.unlink(&mut self.nodes, entry.node);
        if queue.is_empty() {
            match order.side() {
                Side::Buy => self.bids.remove(&price),
                Side::Sell => self.asks.remove(&price),
            };
        }
        self.update_level(price, order.remaining_quantity(), LevelAction::Remove);
        true
    }

    /// Unlinks the head of the `(side, price)` queue without touching the
    /// order index or the level aggregate; the match loop owns those updates.
    pub(crate) fn pop_front(&mut self, side: Side, price: Price) -> Option<Arc<Order>> {
        let queue = match side {
            Side::Buy => self.bids.get_mut(&price),
            Side::Sell => self.asks.get_mut(&price),
        }?;
        let key = queue.head?;
        Some(queue.unlink(&mut self.nodes, key))
    }

    /// Drops the order with `id` from the index after a full fill.
    pub(crate) fn remove_index(&mut self, id: OrderId) {
        self.orders.remove(&id);
    }

    /// Applies the aggregate update rule; erases the entry when its count
    /// drops to zero.
    pub(crate) fn update_level(&mut self, price: Price, quantity: Quantity, action: LevelAction) {
        let data = self.levels.entry(price).or_default();
        match action {
            LevelAction::Add => {
                data.count += 1;
                data.quantity += quantity;
            }
            LevelAction::Remove => {
                data.count -= 1;
                data.quantity -= quantity;
            }
            LevelAction::Match => {
                data.quantity -= quantity;
            }
        }
        if data.count == 0 {
            self.levels.remove(&price);
        }
    }

    /// Ids of all resting GoodForDay orders, for the day-boundary pruner.
    pub(crate) fn good_for_day_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|entry| entry.order.order_type() == OrderType::GoodForDay)
            .map(|entry| entry.order.id())
            .collect()
    }

    /// Sum of remaining quantity over a level's queue.
    pub(crate) fn queue_total(&self, queue: &LevelQueue) -> Quantity {
        queue
            .iter(&self.nodes)
            .map(|order| order.remaining_quantity())
            .sum()
    }

    /// Levels of one side in side-native order (bids descending, asks
    /// ascending), each with its resting orders in arrival order. The
    /// pool-backed snapshot strategies ship these to worker threads.
    pub(crate) fn side_levels(&self, side: Side) -> Vec<(Price, Vec<Arc<Order>>)> {
        let collect = |(&price, queue): (&Price, &LevelQueue)| {
            (price, queue.iter(&self.nodes).cloned().collect())
        };
        match side {
            Side::Buy => self.bids.iter().rev().map(collect).collect(),
            Side::Sell => self.asks.iter().map(collect).collect(),
        }
    }

    /// Checks every structural invariant: no empty level in either side map,
    /// aggregates equal to queue sums, index handles resolving to their own
    /// orders, and an uncrossed book.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut queued = 0usize;
        for (side, map) in [(Side::Buy, &self.bids), (Side::Sell, &self.asks)] {
            for (&price, queue) in map {
                assert!(!queue.is_empty(), "{side:?} level {price} is empty but retained");
                let data = self
                    .levels
                    .get(&price)
                    .unwrap_or_else(|| panic!("{side:?} level {price} has no aggregate"));
                assert_eq!(data.quantity, self.queue_total(queue), "aggregate quantity drift at {price}");
                assert_eq!(data.count, queue.len as u64, "aggregate count drift at {price}");
                queued += queue.len;
            }
        }
        assert_eq!(queued, self.orders.len(), "index size differs from queued orders");
        assert!(
            self.levels.values().all(|data| data.count > 0),
            "aggregate retained with zero count"
        );
        for price in self.levels.keys() {
            assert!(
                self.bids.contains_key(price) || self.asks.contains_key(price),
                "aggregate at {price} has no backing level"
            );
        }
        for (&id, entry) in &self.orders {
            assert_eq!(entry.order.id(), id, "index key does not match order id");
            let node = &self.nodes[entry.node];
            assert!(
                Arc::ptr_eq(&node.order, &entry.order),
                "index handle for {} resolves to a different order",
                id.0
            );
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            assert!(bid < ask, "book is crossed: best bid {bid} >= best ask {ask}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderType;

    fn gtc(id: u64, side: Side, price: Price, quantity: Quantity) -> Arc<Order> {
        Arc::new(Order::new(
            OrderType::GoodTillCancel,
            OrderId(id),
            side,
            price,
            quantity,
        ))
    }

    #[test]
    fn insert_and_cancel_restores_empty_book() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Buy, 100, 10));
        assert_eq!(book.best_bid(), Some(100));
        assert_eq!(book.len(), 1);
        book.assert_consistent();

        assert!(book.cancel(OrderId(1)));
        assert!(book.best_bid().is_none());
        assert!(book.is_empty());
        assert!(book.levels.is_empty());
        book.assert_consistent();
    }

    #[test]
    fn cancel_unknown_id_is_a_no_op() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Sell, 101, 5));
        assert!(!book.cancel(OrderId(99)));
        assert_eq!(book.len(), 1);
        book.assert_consistent();
    }

    #[test]
    fn cancelling_the_middle_order_keeps_fifo_order() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Buy, 100, 1));
        book.insert_resting(gtc(2, Side::Buy, 100, 2));
        book.insert_resting(gtc(3, Side::Buy, 100, 3));
        assert!(book.cancel(OrderId(2)));
        book.assert_consistent();

        let queue = book.bids.get(&100).expect("level retained");
        let ids: Vec<u64> = queue.iter(&book.nodes).map(|o| o.id().0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(book.levels[&100].quantity, 4);
        assert_eq!(book.levels[&100].count, 2);
    }

    #[test]
    fn best_and_worst_prices_follow_side_order() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Buy, 98, 1));
        book.insert_resting(gtc(2, Side::Buy, 100, 1));
        book.insert_resting(gtc(3, Side::Sell, 103, 1));
        book.insert_resting(gtc(4, Side::Sell, 101, 1));
        assert_eq!(book.best_bid(), Some(100));
        assert_eq!(book.worst_bid(), Some(98));
        assert_eq!(book.best_ask(), Some(101));
        assert_eq!(book.worst_ask(), Some(103));
    }

    #[test]
    fn empty_level_is_erased_when_last_order_leaves() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Sell, 101, 5));
        book.insert_resting(gtc(2, Side::Sell, 102, 5));
        assert!(book.cancel(OrderId(1)));
        assert_eq!(book.best_ask(), Some(102));
        assert!(!book.levels.contains_key(&101));
        book.assert_consistent();
    }

    #[test]
    fn good_for_day_ids_selects_only_that_type() {
        let mut book = OrderBook::new();
        book.insert_resting(gtc(1, Side::Buy, 100, 5));
        book.insert_resting(Arc::new(Order::new(
            OrderType::GoodForDay,
            OrderId(2),
            Side::Buy,
            99,
            5,
        )));
        book.insert_resting(Arc::new(Order::new(
            OrderType::GoodForDay,
            OrderId(3),
            Side::Sell,
            105,
            5,
        )));
        let mut ids = book.good_for_day_ids();
        ids.sort();
        assert_eq!(ids, vec![OrderId(2), OrderId(3)]);
    }
}
