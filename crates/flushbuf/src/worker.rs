// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Coordination loop.
//!
//! The worker thread is the only owner of the pending batch and the flush
//! timer, and the only caller of the sink. Facade calls reach it through
//! rendezvous channels:
//!
//! ```text
//!   push()  --items-->  +-------------------------+
//!   flush() --flush-->  |  select! {              |          +------+
//!   close() --close-->  |    items | tick |       |--batch-->| Sink |
//!                       |    flush | close }      |          +------+
//!                       +-----------+-------------+
//!                                   |
//!                     drop(done_tx) on exit  -->  close() / is_closed()
//! ```
//!
//! One event is handled per iteration, and a flush runs to completion before
//! the next event is taken, so batches never overlap and keep push order.

use crate::config::Timings;
use crate::metrics::{BufferMetrics, FlushTrigger};
use crate::sink::Sink;
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Upper bound on the batch vector preallocation, for very large capacities.
const MAX_PREALLOCATED_ITEMS: usize = 4096;

/// Receiving ends of the facade request channels.
pub(crate) struct Requests<T> {
    pub items: Receiver<T>,
    pub flush: Receiver<()>,
    pub close: Receiver<()>,
}

pub(crate) struct Worker<T> {
    sink: Box<dyn Sink<T>>,
    capacity: usize,
    flush_interval: Option<Duration>,
    metrics: Arc<BufferMetrics>,
}

impl<T> Worker<T> {
    pub(crate) fn new(sink: Box<dyn Sink<T>>, timings: &Timings, metrics: Arc<BufferMetrics>) -> Self {
        Self {
            sink,
            capacity: timings.capacity,
            flush_interval: timings.flush_interval,
            metrics,
        }
    }

    /// Run until a close request arrives or the facade goes away.
    ///
    /// `done` is never sent on. Dropping it when this returns (or unwinds out
    /// of a panicking sink) is the lifecycle signal every receiver observes.
    pub(crate) fn run(mut self, requests: Requests<T>, done: Sender<()>) {
        log::debug!(
            "[flushbuf] worker started (capacity={}, interval={:?})",
            self.capacity,
            self.flush_interval
        );

        let mut batch = self.fresh_batch();
        let mut ticker = self.new_ticker();
        let mut open = true;

        while open {
            let trigger = crossbeam::select! {
                recv(requests.items) -> msg => match msg {
                    Ok(item) => {
                        batch.push(item);
                        self.metrics.items_pushed.fetch_add(1, Ordering::Relaxed);
                        (batch.len() >= self.capacity).then_some(FlushTrigger::Capacity)
                    }
                    Err(_) => {
                        open = false;
                        Some(FlushTrigger::Close)
                    }
                },
                recv(ticker) -> _ => Some(FlushTrigger::Interval),
                recv(requests.flush) -> msg => match msg {
                    Ok(()) => Some(FlushTrigger::Manual),
                    Err(_) => {
                        open = false;
                        Some(FlushTrigger::Close)
                    }
                },
                recv(requests.close) -> msg => {
                    if msg.is_err() {
                        log::debug!("[flushbuf] buffer dropped while open, draining");
                    }
                    open = false;
                    Some(FlushTrigger::Close)
                },
            };

            let Some(trigger) = trigger else {
                continue;
            };
            if batch.is_empty() {
                continue;
            }

            // Stop the timer for the duration of the sink call; a fresh one
            // starts afterwards so the interval counts from this flush.
            drop(ticker);
            let full = std::mem::replace(&mut batch, self.fresh_batch());
            self.deliver(full, trigger);
            ticker = if open { self.new_ticker() } else { channel::never() };
        }

        drop(ticker);
        drop(done);
        drop(requests);
        log::debug!("[flushbuf] worker exited");
    }

    fn deliver(&mut self, batch: Vec<T>, trigger: FlushTrigger) {
        let len = batch.len();
        let start = Instant::now();
        self.sink.write(batch);
        self.metrics.record_flush(trigger, len);
        log::debug!(
            "[flushbuf] flushed {} items ({}) in {:?}",
            len,
            trigger.as_str(),
            start.elapsed()
        );
    }

    fn fresh_batch(&self) -> Vec<T> {
        Vec::with_capacity(self.capacity.min(MAX_PREALLOCATED_ITEMS))
    }

    fn new_ticker(&self) -> Receiver<Instant> {
        match self.flush_interval {
            Some(interval) => channel::tick(interval),
            None => channel::never(),
        }
    }
}
