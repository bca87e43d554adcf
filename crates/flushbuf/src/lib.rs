// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! flushbuf - batching buffer with asynchronous flushing
//!
//! Producers on any thread push items; a single worker thread accumulates
//! them and hands batches to a pluggable [`Sink`]. A flush happens on
//! whichever comes first:
//!
//! - the batch reaches its capacity
//! - the flush interval elapses since the previous flush
//! - a caller asks for it with [`Buffer::flush`]
//!
//! [`Buffer::close`] flushes what is left and stops the worker for good.
//!
//! # Overview
//!
//! ```text
//! push() ──┐
//! push() ──┼──> rendezvous channels ──> worker (owns batch + timer) ──> Sink::write(Vec<T>)
//! flush()──┤
//! close()──┘
//! ```
//!
//! Every facade call is a bounded wait: it returns
//! [`BufferError::Timeout`] if the worker does not take the request within
//! the configured timeout, and [`BufferError::Closed`] once the worker is
//! gone. Timeouts are always safe to retry.
//!
//! # Guarantees
//!
//! - At most one flush in flight; the sink is never called concurrently
//! - Batches arrive in push order, items within a batch in push order
//! - The flush timer restarts after every flush
//!
//! # Configuration
//!
//! Programmatic, through [`Buffer::builder`], or from YAML with
//! [`BufferSettings::from_file`]. Settings are validated on first use.

mod buffer;
pub mod config;
mod error;
pub mod metrics;
pub mod sink;
mod worker;

pub use buffer::{Buffer, BufferBuilder};
pub use config::{BufferSettings, DEFAULT_TIMEOUT_MS};
pub use error::{BufferError, ConfigError, Operation, SettingsError};
pub use metrics::{BufferMetrics, FlushTrigger, MetricsSnapshot};
pub use sink::{ChannelSink, Sink};
