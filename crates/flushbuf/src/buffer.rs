// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer facade: lazy start, bounded-wait requests, close protocol.

use crate::config::{duration_to_ms, BufferSettings, Timings};
use crate::error::{BufferError, ConfigError, Operation};
use crate::metrics::{BufferMetrics, MetricsSnapshot};
use crate::sink::Sink;
use crate::worker::{Requests, Worker};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Batching buffer flushed to a [`Sink`] by a dedicated worker thread.
///
/// A batch is flushed when it reaches capacity, when the flush interval has
/// elapsed since the previous flush, or on [`Buffer::flush`]. [`Buffer::close`]
/// flushes what is left and stops the worker for good.
///
/// All methods take `&self`; share the buffer across threads with `Arc`.
///
/// # Example
///
/// ```
/// use flushbuf::Buffer;
/// use std::time::Duration;
///
/// let buffer = Buffer::builder()
///     .capacity(100)
///     .flush_interval(Duration::from_secs(1))
///     .sink(|batch: Vec<String>| println!("{} lines", batch.len()))
///     .build();
///
/// buffer.push("hello".to_string())?;
/// buffer.close()?;
/// # Ok::<(), flushbuf::BufferError>(())
/// ```
pub struct Buffer<T> {
    settings: BufferSettings,
    /// Sink parked until the worker starts. The lock also serializes startup.
    pending_sink: Mutex<Option<Box<dyn Sink<T>>>>,
    running: OnceLock<Running<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Set by the one `close` call that observed the worker exit.
    close_confirmed: AtomicBool,
    metrics: Arc<BufferMetrics>,
}

/// Facade side of a started worker.
struct Running<T> {
    items: Sender<T>,
    flush: Sender<()>,
    close: Sender<()>,
    /// Disconnected once the worker has exited.
    done: Receiver<()>,
    timings: Timings,
}

impl<T> Running<T> {
    fn is_done(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }
}

impl<T: Send + 'static> Buffer<T> {
    /// Start configuring a buffer.
    pub fn builder() -> BufferBuilder<T> {
        BufferBuilder::default()
    }

    /// Append an item.
    ///
    /// Starts the worker on first use. Waits up to the push timeout for the
    /// worker to take the item; a successful return means the item is queued,
    /// not that it has been flushed.
    ///
    /// # Errors
    ///
    /// - `Config` if the settings are invalid (first use only, item dropped)
    /// - `Closed` if the worker has exited
    /// - `Timeout` if the worker did not take the item in time
    pub fn push(&self, item: T) -> Result<(), BufferError> {
        let running = self.running()?;
        if running.is_done() {
            return Err(BufferError::Closed);
        }

        match running.items.send_timeout(item, running.timings.push_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(self.timed_out(Operation::Push, &self.metrics.push_timeouts))
            }
            Err(SendTimeoutError::Disconnected(_)) => Err(BufferError::Closed),
        }
    }

    /// Ask the worker to flush the pending batch.
    ///
    /// Returns once the worker has accepted the request; the flush itself may
    /// still be running. Flushing an empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// `Closed`, `Timeout` (after the flush timeout), or `Config` on first use.
    pub fn flush(&self) -> Result<(), BufferError> {
        let running = self.running()?;
        if running.is_done() {
            return Err(BufferError::Closed);
        }

        match running.flush.send_timeout((), running.timings.flush_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(())) => {
                Err(self.timed_out(Operation::Flush, &self.metrics.flush_timeouts))
            }
            Err(SendTimeoutError::Disconnected(())) => Err(BufferError::Closed),
        }
    }

    /// Flush what is pending and stop the worker.
    ///
    /// Two bounded waits, each up to the close timeout: one for the worker to
    /// accept the request, one for it to finish the final flush and exit.
    /// After a `Timeout` it is always safe to call `close` again: a retry
    /// that finds the worker already gone skips straight to confirming the
    /// shutdown.
    ///
    /// # Errors
    ///
    /// - `Closed` if an earlier `close` already confirmed shutdown
    /// - `Timeout` if either wait expired
    /// - `Config` on first use with invalid settings
    pub fn close(&self) -> Result<(), BufferError> {
        if self.close_confirmed.load(Ordering::Acquire) {
            return Err(BufferError::Closed);
        }

        let running = self.running()?;
        let timeout = running.timings.close_timeout;

        if !running.is_done() {
            match running.close.send_timeout((), timeout) {
                // Disconnected: the worker exited after an earlier request
                Ok(()) | Err(SendTimeoutError::Disconnected(())) => {}
                Err(SendTimeoutError::Timeout(())) => {
                    return Err(self.timed_out(Operation::Close, &self.metrics.close_timeouts));
                }
            }
        }

        match running.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                return Err(self.timed_out(Operation::Close, &self.metrics.close_timeouts));
            }
        }

        if self.close_confirmed.swap(true, Ordering::AcqRel) {
            // A concurrent close got there first
            return Err(BufferError::Closed);
        }
        self.join_worker();
        log::debug!("[flushbuf] buffer closed");
        Ok(())
    }

    /// Validate the settings and start the worker without pushing anything.
    ///
    /// Idempotent while the buffer is open.
    pub fn start(&self) -> Result<(), BufferError> {
        if self.running()?.is_done() {
            return Err(BufferError::Closed);
        }
        Ok(())
    }

    /// Start the worker on first use. Concurrent first callers start it once.
    fn running(&self) -> Result<&Running<T>, BufferError> {
        if let Some(running) = self.running.get() {
            return Ok(running);
        }

        let mut pending = self.pending_sink.lock();
        if let Some(running) = self.running.get() {
            return Ok(running);
        }

        let timings = self.settings.validate(pending.is_some())?;
        let sink = pending.take().ok_or(ConfigError::MissingSink)?;

        let (items_tx, items_rx) = channel::bounded(0);
        let (flush_tx, flush_rx) = channel::bounded(0);
        let (close_tx, close_rx) = channel::bounded(0);
        let (done_tx, done_rx) = channel::bounded(0);

        let worker = Worker::new(sink, &timings, Arc::clone(&self.metrics));
        let requests = Requests {
            items: items_rx,
            flush: flush_rx,
            close: close_rx,
        };

        #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
        let handle = std::thread::Builder::new()
            .name("flushbuf-worker".to_string())
            .spawn(move || worker.run(requests, done_tx))
            .expect("Failed to spawn flushbuf worker thread");
        *self.worker.lock() = Some(handle);

        Ok(self.running.get_or_init(|| Running {
            items: items_tx,
            flush: flush_tx,
            close: close_tx,
            done: done_rx,
            timings,
        }))
    }

    fn timed_out(&self, op: Operation, counter: &AtomicU64) -> BufferError {
        counter.fetch_add(1, Ordering::Relaxed);
        log::warn!("[flushbuf] {} timed out", op);
        BufferError::Timeout { op }
    }

    fn join_worker(&self) {
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("[flushbuf] worker thread panicked, the sink did not return normally");
            }
        }
    }
}

impl<T> Buffer<T> {
    /// True once the worker has been started.
    pub fn is_initialized(&self) -> bool {
        self.running.get().is_some()
    }

    /// True once the worker has exited. `push` and `flush` fail with
    /// `Closed` from then on.
    pub fn is_closed(&self) -> bool {
        self.running.get().is_some_and(Running::is_done)
    }

    /// The settings this buffer was built with.
    pub fn settings(&self) -> &BufferSettings {
        &self.settings
    }

    /// Get snapshot of metrics
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        // Dropping the request senders makes the worker drain and exit on
        // its own; nothing here waits for it.
        if self.is_initialized() && !self.close_confirmed.load(Ordering::Acquire) {
            log::debug!("[flushbuf] buffer dropped without close, worker will drain");
        }
    }
}

/// Builder for [`Buffer`].
///
/// Defaults: no capacity, no sink, interval disabled, 1s timeouts. Nothing is
/// validated until the buffer is first used.
pub struct BufferBuilder<T> {
    settings: BufferSettings,
    sink: Option<Box<dyn Sink<T>>>,
}

impl<T> Default for BufferBuilder<T> {
    fn default() -> Self {
        Self {
            settings: BufferSettings::default(),
            sink: None,
        }
    }
}

impl<T: Send + 'static> BufferBuilder<T> {
    /// Items per batch.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.settings.capacity = capacity;
        self
    }

    /// Destination of flushed batches.
    pub fn sink<S: Sink<T> + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Flush a non-empty batch this long after the previous flush.
    /// `Duration::ZERO` disables time-based flushing.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.settings.flush_interval_ms = duration_to_ms(interval);
        self
    }

    pub fn push_timeout(mut self, timeout: Duration) -> Self {
        self.settings.push_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.settings.flush_timeout_ms = duration_to_ms(timeout);
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.settings.close_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Replace capacity, interval and timeouts, e.g. with values loaded by
    /// [`BufferSettings::from_file`]. The sink is kept.
    pub fn settings(mut self, settings: BufferSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Buffer<T> {
        Buffer {
            settings: self.settings,
            pending_sink: Mutex::new(self.sink),
            running: OnceLock::new(),
            worker: Mutex::new(None),
            close_confirmed: AtomicBool::new(false),
            metrics: Arc::new(BufferMetrics::new()),
        }
    }
}
