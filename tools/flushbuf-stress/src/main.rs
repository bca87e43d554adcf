// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! flushbuf-stress - Load generator for the flushbuf batching buffer
//!
//! Pushes tagged integers from many producer threads into one buffer, then
//! checks that every accepted item reached the sink exactly once and in the
//! order its producer pushed it.
//!
//! Usage:
//!   flushbuf-stress --producers 8 --items 100000 --capacity 512
//!   flushbuf-stress --config buffer.yaml --sink-delay-us 200 --flush-every 1000

use anyhow::{bail, Context, Result};
use clap::Parser;
use flushbuf::{Buffer, BufferError, BufferSettings};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Default batch size when neither --capacity nor --config gives one.
const DEFAULT_CAPACITY: usize = 256;

/// Give up on an item after this many consecutive push timeouts.
const MAX_PUSH_RETRIES: u32 = 50;

#[derive(Parser, Debug)]
#[command(name = "flushbuf-stress")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Stress test a flushbuf buffer with concurrent producers")]
struct Args {
    /// Number of producer threads
    #[arg(short, long, default_value = "4")]
    producers: u32,

    /// Items pushed by each producer
    #[arg(short = 'n', long, default_value = "10000")]
    items: u32,

    /// YAML settings file (capacity, flush_interval_ms, *_timeout_ms)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Batch capacity (overrides the settings file)
    #[arg(long)]
    capacity: Option<usize>,

    /// Flush interval in milliseconds, 0 disables (overrides the settings file)
    #[arg(long)]
    interval_ms: Option<i64>,

    /// Push timeout in milliseconds (overrides the settings file)
    #[arg(long)]
    push_timeout_ms: Option<i64>,

    /// Simulated sink latency per batch, in microseconds
    #[arg(long, default_value = "0")]
    sink_delay_us: u64,

    /// Each producer requests a manual flush every N pushes (0 = never)
    #[arg(long, default_value = "0")]
    flush_every: u32,

    /// Verbose output (debug logs from the buffer)
    #[arg(short, long)]
    verbose: bool,
}

/// What the sink observed, per producer.
#[derive(Debug, Default)]
struct Tally {
    delivered: Vec<u64>,
    next_seq: Vec<u32>,
    out_of_order: u64,
    batches: u64,
    largest_batch: usize,
}

impl Tally {
    fn new(producers: usize) -> Self {
        Self {
            delivered: vec![0; producers],
            next_seq: vec![0; producers],
            ..Default::default()
        }
    }

    fn record(&mut self, batch: &[u64]) {
        self.batches += 1;
        self.largest_batch = self.largest_batch.max(batch.len());
        for &tagged in batch {
            let (producer, seq) = untag(tagged);
            let Some(next) = self.next_seq.get_mut(producer) else {
                self.out_of_order += 1;
                continue;
            };
            if seq != *next {
                self.out_of_order += 1;
            }
            *next = seq.wrapping_add(1);
            self.delivered[producer] += 1;
        }
    }
}

fn tag(producer: u32, seq: u32) -> u64 {
    (u64::from(producer) << 32) | u64::from(seq)
}

fn untag(tagged: u64) -> (usize, u32) {
    ((tagged >> 32) as usize, tagged as u32)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("flushbuf_stress=debug,flushbuf=debug")
    } else {
        EnvFilter::new("flushbuf_stress=info,flushbuf=warn")
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let settings = build_settings(&args)?;
    info!(
        producers = args.producers,
        items = args.items,
        capacity = settings.capacity,
        interval_ms = settings.flush_interval_ms,
        sink_delay_us = args.sink_delay_us,
        "Starting stress run"
    );

    run(&args, settings)
}

fn build_settings(args: &Args) -> Result<BufferSettings> {
    let mut settings = match &args.config {
        Some(path) => BufferSettings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => BufferSettings {
            capacity: DEFAULT_CAPACITY,
            ..Default::default()
        },
    };

    if let Some(capacity) = args.capacity {
        settings.capacity = capacity;
    }
    if let Some(interval) = args.interval_ms {
        settings.flush_interval_ms = interval;
    }
    if let Some(timeout) = args.push_timeout_ms {
        settings.push_timeout_ms = timeout;
    }
    Ok(settings)
}

fn run(args: &Args, settings: BufferSettings) -> Result<()> {
    let producers = args.producers as usize;
    let tally = Arc::new(Mutex::new(Tally::new(producers)));
    let sink_delay = Duration::from_micros(args.sink_delay_us);

    let sink_tally = Arc::clone(&tally);
    let buffer = Arc::new(
        Buffer::builder()
            .settings(settings)
            .sink(move |batch: Vec<u64>| {
                if !sink_delay.is_zero() {
                    thread::sleep(sink_delay);
                }
                sink_tally.lock().record(&batch);
            })
            .build(),
    );
    buffer.start().context("starting buffer")?;

    let accepted = Arc::new(AtomicU64::new(0));
    let dropped = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..args.producers)
        .map(|producer| {
            let buffer = Arc::clone(&buffer);
            let accepted = Arc::clone(&accepted);
            let dropped = Arc::clone(&dropped);
            let items = args.items;
            let flush_every = args.flush_every;
            thread::Builder::new()
                .name(format!("producer-{}", producer))
                .spawn(move || {
                    produce(&buffer, producer, items, flush_every, &accepted, &dropped)
                })
        })
        .collect::<Result<_, _>>()
        .context("spawning producer threads")?;

    for handle in handles {
        if let Err(e) = handle.join().map_err(|_| anyhow::anyhow!("producer panicked"))? {
            warn!("Producer stopped early: {}", e);
        }
    }
    let produce_elapsed = start.elapsed();

    close_with_retry(&buffer)?;
    let total_elapsed = start.elapsed();

    let tally = tally.lock();
    let accepted = accepted.load(Ordering::Relaxed);
    let delivered: u64 = tally.delivered.iter().sum();
    let metrics = buffer.metrics();

    println!("=== flushbuf stress: {} producers x {} items ===\n", args.producers, args.items);
    println!("  Accepted:        {}", accepted);
    println!("  Dropped:         {}", dropped.load(Ordering::Relaxed));
    println!("  Delivered:       {}", delivered);
    println!("  Batches:         {}", tally.batches);
    println!("  Largest batch:   {}", tally.largest_batch);
    println!("  Out of order:    {}", tally.out_of_order);
    println!(
        "  Push phase:      {:?} ({:.0} items/s)",
        produce_elapsed,
        accepted as f64 / produce_elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("  Total:           {:?}", total_elapsed);
    println!("\n  Metrics: {:?}", metrics);

    if delivered != accepted {
        bail!("{} accepted items, {} delivered", accepted, delivered);
    }
    if tally.out_of_order > 0 {
        bail!("{} items delivered out of order", tally.out_of_order);
    }
    info!("Stress run passed");
    Ok(())
}

fn produce(
    buffer: &Buffer<u64>,
    producer: u32,
    items: u32,
    flush_every: u32,
    accepted: &AtomicU64,
    dropped: &AtomicU64,
) -> Result<(), BufferError> {
    for seq in 0..items {
        let mut retries = 0;
        loop {
            match buffer.push(tag(producer, seq)) {
                Ok(()) => {
                    accepted.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Err(e) if e.is_timeout() && retries < MAX_PUSH_RETRIES => retries += 1,
                Err(e) if e.is_timeout() => {
                    // Later items from this producer would look out of order
                    dropped.fetch_add(u64::from(items - seq), Ordering::Relaxed);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        if flush_every > 0 && (seq + 1) % flush_every == 0 {
            match buffer.flush() {
                Ok(()) => {}
                Err(e) if e.is_timeout() => warn!("Manual flush timed out (producer {})", producer),
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

fn close_with_retry(buffer: &Buffer<u64>) -> Result<()> {
    for attempt in 1..=10 {
        match buffer.close() {
            Ok(()) => return Ok(()),
            Err(e) if e.is_timeout() => warn!("Close attempt {} timed out, retrying", attempt),
            Err(e) => return Err(e).context("closing buffer"),
        }
    }
    bail!("buffer did not close after 10 attempts")
}
