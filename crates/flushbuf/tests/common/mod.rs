// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared test sinks.

#![allow(dead_code)]

use crossbeam::channel::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// One sink invocation as seen by the test.
#[derive(Debug)]
pub struct Recorded<T> {
    /// When the sink was entered (before any simulated delay).
    pub at: Instant,
    pub items: Vec<T>,
}

/// Sink that reports every batch on a channel, after sleeping `delay`.
pub fn recording_sink<T: Send + 'static>(
    delay: Duration,
) -> (impl FnMut(Vec<T>) + Send + 'static, Receiver<Recorded<T>>) {
    let (tx, rx) = channel::unbounded();
    let sink = move |items: Vec<T>| {
        let at = Instant::now();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let _ = tx.send(Recorded { at, items });
    };
    (sink, rx)
}

/// Assert that no batch shows up within `wait`.
pub fn assert_no_batch<T: std::fmt::Debug>(rx: &Receiver<Recorded<T>>, wait: Duration) {
    if let Ok(batch) = rx.recv_timeout(wait) {
        panic!("unexpected flush: {:?}", batch.items);
    }
}

/// Receive the next batch or fail after 2 seconds.
pub fn next_batch<T>(rx: &Receiver<Recorded<T>>) -> Recorded<T> {
    rx.recv_timeout(Duration::from_secs(2))
        .expect("sink was not invoked in time")
}
