//! Thread-safe engine facade.
//!
//! [`Engine`] owns the order book behind a single mutex and a background
//! pruner thread that cancels GoodForDay orders at the 16:00 day boundary.
//! All mutations and reads serialize through the mutex, so operations are
//! linearizable; snapshot parallelism happens inside the lock, across pool
//! workers over disjoint shards.

use crate::order_book::OrderBook;
use crate::snapshot::{DepthSnapshot, SnapshotStrategy};
use crate::trade::Trade;
use crate::types::{ModifyRequest, Order, OrderId, Price};
use chrono::{Local, NaiveTime, TimeDelta, Timelike};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Local wall-clock hour at which GoodForDay orders expire.
const PRUNE_HOUR: u32 = 16;
/// Tolerance added past the boundary before the pruner wakes.
const PRUNE_GRACE: Duration = Duration::from_millis(100);

struct Shared {
    book: Mutex<OrderBook>,
    shutdown: AtomicBool,
    shutdown_signal: Condvar,
}

/// Single-instrument matching engine.
///
/// Cheap to share across threads behind an `Arc`; every method takes `&self`
/// and serializes on the internal mutex. Dropping the engine signals the
/// pruner thread and joins it.
pub struct Engine {
    shared: Arc<Shared>,
    pruner: Option<thread::JoinHandle<()>>,
}

impl Engine {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            book: Mutex::new(OrderBook::new()),
            shutdown: AtomicBool::new(false),
            shutdown_signal: Condvar::new(),
        });
        let pruner = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("depthbook-gfd-pruner".into())
                .spawn(move || run_pruner(&shared))
                .expect("failed to spawn pruner thread")
        };
        Self {
            shared,
            pruner: Some(pruner),
        }
    }

    /// Submits an order and returns the trades it produced. See
    /// [`OrderBook::submit`] for the admission rules.
    pub fn add_order(&self, order: Order) -> Vec<Trade> {
        self.shared.book.lock().submit(order)
    }

    /// Cancels a resting order. Unknown ids are a no-op.
    pub fn cancel_order(&self, id: OrderId) {
        self.shared.book.lock().cancel(id);
    }

    /// Replaces a resting order, keeping its type but losing its time
    /// priority. Returns the trades generated by the resubmission.
    pub fn modify_order(&self, request: ModifyRequest) -> Vec<Trade> {
        self.shared.book.lock().modify(request)
    }

    /// Number of live orders.
    pub fn len(&self) -> usize {
        self.shared.book.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.shared.book.lock().best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.shared.book.lock().best_ask()
    }

    /// Builds an aggregated depth snapshot under the engine lock.
    pub fn depth(&self, strategy: SnapshotStrategy<'_>) -> DepthSnapshot {
        self.shared.book.lock().depth(strategy)
    }

    /// Runs one pruning pass immediately (test hook for the day-boundary
    /// path).
    #[cfg(test)]
    pub(crate) fn prune_now(&self) {
        prune_good_for_day(&self.shared);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Raise the flag under the book lock so the pruner cannot be between
        // its shutdown check and the wait when the notification fires.
        {
            let _book = self.shared.book.lock();
            self.shared.shutdown.store(true, Ordering::Release);
        }
        self.shared.shutdown_signal.notify_all();
        if let Some(pruner) = self.pruner.take() {
            let _ = pruner.join();
        }
    }
}

fn run_pruner(shared: &Shared) {
    loop {
        let deadline = next_prune_deadline();
        let mut book = shared.book.lock();
        let mut expired = false;
        while !shared.shutdown.load(Ordering::Acquire) {
            if shared
                .shutdown_signal
                .wait_until(&mut book, deadline)
                .timed_out()
            {
                expired = true;
                break;
            }
        }
        drop(book);
        if shared.shutdown.load(Ordering::Acquire) {
            debug!("pruner shutting down");
            return;
        }
        if expired {
            prune_good_for_day(shared);
        }
    }
}

fn prune_good_for_day(shared: &Shared) {
    let expired = shared.book.lock().good_for_day_ids();
    if expired.is_empty() {
        return;
    }
    debug!("pruning {} good-for-day orders", expired.len());
    // Each cancellation re-acquires the lock: same contract as an external
    // cancel, so submissions can interleave with a large prune.
    for id in expired {
        shared.book.lock().cancel(id);
    }
}

/// Instant of the next local 16:00 boundary (tomorrow's if already past),
/// plus the grace interval.
fn next_prune_deadline() -> Instant {
    let now = Local::now();
    let boundary = NaiveTime::from_hms_opt(PRUNE_HOUR, 0, 0).expect("valid wall-clock time");
    let mut date = now.date_naive();
    if now.hour() >= PRUNE_HOUR {
        date = date.succ_opt().expect("calendar overflow");
    }
    let target = date
        .and_time(boundary)
        .and_local_timezone(Local)
        .earliest()
        // 16:00 fell into a DST gap; take the boundary a day later.
        .unwrap_or_else(|| now + TimeDelta::hours(24));
    let until = (target - now).to_std().unwrap_or_default();
    Instant::now() + until + PRUNE_GRACE
}
