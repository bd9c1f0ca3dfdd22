// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Delivery of transient query results.
//!
//! The tasks executing a transient query push rows into a bounded
//! [`TransientQueryQueue`], from which a single consumer pulls them for the
//! client. A full queue blocks producers, which is how backpressure from a
//! slow client reaches the query.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use rill_repr::Row;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// The default number of rows a queue buffers.
pub const BLOCKING_QUEUE_CAPACITY: usize = 500;

/// The default time a producer waits for space before rechecking whether the
/// queue was closed.
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_millis(100);

/// The identifier of a running query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> QueryId {
        QueryId(id.into())
    }

    /// Generates a fresh identifier for a transient query.
    pub fn transient() -> QueryId {
        QueryId(format!("transient_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What became of a row offered to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Queued,
    /// There was no row to queue.
    NullRow,
    /// The row limit had already been reached.
    LimitReached,
    /// The queue was closed before the row could be queued.
    Closed,
}

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Tracks how many rows may still be queued and notifies interested parties
/// as rows are.
struct RowCallbacks {
    limit: Option<usize>,
    /// Slots not yet claimed by a producer.
    remaining: AtomicUsize,
    queued: AtomicUsize,
    limit_handler: Mutex<Option<Callback>>,
    queued_callback: Mutex<Option<Callback>>,
}

impl RowCallbacks {
    fn new(limit: Option<usize>) -> RowCallbacks {
        RowCallbacks {
            limit,
            remaining: AtomicUsize::new(limit.unwrap_or(0)),
            queued: AtomicUsize::new(0),
            limit_handler: Mutex::new(None),
            queued_callback: Mutex::new(None),
        }
    }

    /// Claims a slot for one row. Claims are never returned, so at most
    /// `limit` rows are ever queued.
    fn should_queue(&self) -> bool {
        match self.limit {
            None => true,
            Some(_) => self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
                .is_ok(),
        }
    }

    fn on_queued(&self) {
        let queued = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(queued) == self.limit {
            let handler = self.limit_handler.lock().expect("lock poisoned").clone();
            if let Some(handler) = handler {
                handler();
            }
        }
        let callback = self.queued_callback.lock().expect("lock poisoned").clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

/// A bounded queue of result rows with an optional row limit.
pub struct TransientQueryQueue {
    tx: Sender<Row>,
    rx: Receiver<Row>,
    offer_timeout: Duration,
    callbacks: RowCallbacks,
    closed: AtomicBool,
    query_id: Option<QueryId>,
}

impl fmt::Debug for TransientQueryQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TransientQueryQueue")
            .field("query_id", &self.query_id)
            .field("len", &self.rx.len())
            .field("capacity", &self.rx.capacity())
            .field("limit", &self.callbacks.limit)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl TransientQueryQueue {
    /// Constructs a queue with the default capacity and offer timeout that
    /// accepts at most `limit` rows, if a limit is given.
    pub fn new(limit: Option<usize>) -> TransientQueryQueue {
        TransientQueryQueue::with_capacity(limit, BLOCKING_QUEUE_CAPACITY, DEFAULT_OFFER_TIMEOUT)
    }

    pub fn with_capacity(
        limit: Option<usize>,
        capacity: usize,
        offer_timeout: Duration,
    ) -> TransientQueryQueue {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        TransientQueryQueue {
            tx,
            rx,
            offer_timeout,
            callbacks: RowCallbacks::new(limit),
            closed: AtomicBool::new(false),
            query_id: None,
        }
    }

    /// Tags the queue with the query it serves, for logging.
    pub fn with_query_id(mut self, query_id: QueryId) -> TransientQueryQueue {
        self.query_id = Some(query_id);
        self
    }

    pub fn query_id(&self) -> Option<&QueryId> {
        self.query_id.as_ref()
    }

    fn display_id(&self) -> &str {
        self.query_id.as_ref().map_or("<unknown>", QueryId::as_str)
    }

    /// Registers a handler to run, once, when the row that reaches the
    /// limit is queued.
    pub fn set_limit_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.callbacks.limit_handler.lock().expect("lock poisoned") = Some(Arc::new(handler));
    }

    /// Registers a callback to run after every queued row.
    pub fn set_queued_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.callbacks.queued_callback.lock().expect("lock poisoned") = Some(Arc::new(callback));
    }

    /// Offers a row to the queue.
    ///
    /// Blocks while the queue is full, rechecking every offer timeout whether
    /// it has been closed. Absent rows, rows beyond the limit and rows
    /// offered after close are dropped without blocking.
    pub fn accept_row(&self, row: impl Into<Option<Row>>) -> AcceptOutcome {
        let Some(mut row) = row.into() else {
            debug!(query_id = self.display_id(), "null row found");
            return AcceptOutcome::NullRow;
        };
        if self.is_closed() {
            debug!(query_id = self.display_id(), "row dropped, queue closed");
            return AcceptOutcome::Closed;
        }
        if !self.callbacks.should_queue() {
            trace!(query_id = self.display_id(), "row dropped, limit reached");
            return AcceptOutcome::LimitReached;
        }

        while !self.is_closed() {
            match self.tx.send_timeout(row, self.offer_timeout) {
                Ok(()) => {
                    self.callbacks.on_queued();
                    return AcceptOutcome::Queued;
                }
                Err(SendTimeoutError::Timeout(r)) => {
                    trace!(query_id = self.display_id(), "queue full, retrying");
                    row = r;
                }
                Err(SendTimeoutError::Disconnected(_)) => break,
            }
        }
        debug!(
            query_id = self.display_id(),
            "row not accepted because queue is already closed"
        );
        AcceptOutcome::Closed
    }

    /// Removes the oldest row, waiting up to `timeout` for one to arrive.
    pub fn poll(&self, timeout: Duration) -> Option<Row> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Removes the oldest row, if any, without waiting.
    pub fn try_poll(&self) -> Option<Row> {
        self.rx.try_recv().ok()
    }

    /// Moves the rows buffered at the time of the call into `out`, in queue
    /// order. Returns how many rows were moved.
    ///
    /// Rows that producers queue while the drain is in progress stay queued
    /// for a later call.
    pub fn drain_to(&self, out: &mut Vec<Row>) -> usize {
        let available = self.rx.len();
        out.reserve(available);
        let mut drained = 0;
        while drained < available {
            match self.rx.try_recv() {
                Ok(row) => {
                    out.push(row);
                    drained += 1;
                }
                Err(_) => break,
            }
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Closes the queue to further rows. Buffered rows remain available.
    ///
    /// Producers blocked on a full queue give up within one offer timeout.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(query_id = self.display_id(), "queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
