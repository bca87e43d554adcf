// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Flush destinations.
//!
//! A [`Sink`] receives every batch the worker flushes, in order, one call at a
//! time. The worker blocks on `write` until it returns, so a slow sink applies
//! back-pressure to all producers.

use crossbeam::channel::{self, Receiver, Sender};

/// Destination of flushed batches.
///
/// Called from the worker thread only, never concurrently. Delivery failures
/// are the sink's own concern: the buffer neither inspects nor retries them.
pub trait Sink<T>: Send {
    /// Deliver one batch. Items are in push order.
    fn write(&mut self, batch: Vec<T>);
}

impl<T, F> Sink<T> for F
where
    F: FnMut(Vec<T>) + Send,
{
    fn write(&mut self, batch: Vec<T>) {
        self(batch)
    }
}

/// Sink forwarding each batch over a crossbeam channel.
///
/// Useful to move delivery onto a thread the caller already owns, or to
/// observe batches in tests.
pub struct ChannelSink<T> {
    tx: Sender<Vec<T>>,
}

impl<T> ChannelSink<T> {
    /// Wrap an existing sender.
    pub fn new(tx: Sender<Vec<T>>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end of an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<Vec<T>>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }
}

impl<T: Send> Sink<T> for ChannelSink<T> {
    fn write(&mut self, batch: Vec<T>) {
        let len = batch.len();
        if self.tx.send(batch).is_err() {
            log::warn!(
                "[flushbuf] ChannelSink receiver dropped, discarding batch of {} items",
                len
            );
        }
    }
}
