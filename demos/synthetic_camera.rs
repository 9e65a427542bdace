//! Synthetic camera fan-out demo
//!
//! Run with: cargo run --example synthetic_camera [DELAY_MS] [VIEWERS]
//!
//! Examples:
//!   cargo run --example synthetic_camera              # no throttle, 3 viewers
//!   cargo run --example synthetic_camera 100          # at most 10 wakes/sec
//!   cargo run --example synthetic_camera 40 5         # 5 viewers
//!
//! Each viewer polls at a different pace. The fastest sees every broadcast,
//! the slowest skips frames instead of holding the camera back. One viewer
//! walks away after a few frames and gets evicted. When every viewer is
//! gone the camera goes idle and shuts down after 10 seconds.

use std::time::Duration;

use bytes::Bytes;
use framecast::{parse_delay_ms, FrameRelay, IntervalSource};

const FRAME_PERIOD: Duration = Duration::from_millis(33);

fn print_usage() {
    println!("Usage: synthetic_camera [DELAY_MS] [VIEWERS]");
    println!();
    println!("  DELAY_MS  minimum milliseconds between broadcasts (default 0)");
    println!("  VIEWERS   number of concurrent viewers (default 3)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let delay = match args.get(1) {
        Some(raw) => match parse_delay_ms(raw) {
            Ok(delay) => delay,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => Duration::ZERO,
    };

    let viewers: usize = match args.get(2) {
        Some(raw) => raw.parse()?,
        None => 3,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framecast=debug".parse()?)
                .add_directive("synthetic_camera=debug".parse()?),
        )
        .init();

    let camera = IntervalSource::new(FRAME_PERIOD, |i| {
        Ok(Bytes::from(format!("synthetic frame {}", i)))
    });
    let relay = FrameRelay::new(camera);

    println!(
        "Camera at {:?}/frame, throttle {:?}, {} viewers",
        FRAME_PERIOD, delay, viewers
    );

    let mut tasks = Vec::new();
    for viewer in 0..viewers {
        let mut session = relay.connect_with_delay(delay).await?;
        // Viewer 0 is fast, later viewers are progressively slower
        let pace = Duration::from_millis(20 * (viewer as u64 + 1) * (viewer as u64 + 1));
        // The last viewer leaves early without closing its session
        let frames = if viewer + 1 == viewers && viewers > 1 { 5 } else { 200 };

        tasks.push(tokio::spawn(async move {
            let mut last_sequence = 0;
            let mut skipped = 0;

            for _ in 0..frames {
                let frame = session.get_frame().await;
                if last_sequence > 0 {
                    skipped += frame.sequence.saturating_sub(last_sequence + 1);
                }
                last_sequence = frame.sequence;
                tokio::time::sleep(pace).await;
            }

            println!(
                "[viewer {}] done at frame #{}, skipped {} frames",
                viewer, last_sequence, skipped
            );

            if frames < 200 {
                // Hold the session without reading; the broadcaster evicts it
                std::mem::forget(session);
            }
        }));
    }

    let stats_relay = relay.clone();
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(2));
        loop {
            ticker.tick().await;
            let stats = stats_relay.stats().await;
            println!(
                "Stats: running={} frames={} broadcasts={} evictions={} consumers={}",
                stats.running,
                stats.frames_produced,
                stats.broadcasts,
                stats.evictions,
                stats.consumers,
            );
        }
    });

    tokio::select! {
        _ = async {
            for task in tasks {
                let _ = task.await;
            }
            println!("All viewers finished, waiting for idle shutdown...");
            relay.wait_stopped().await;
        } => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            relay.shutdown().await;
        }
    }

    reporter.abort();
    let stats = relay.stats().await;
    println!(
        "Final: frames={} dropped={} broadcasts={} evictions={} producer_starts={}",
        stats.frames_produced,
        stats.frames_dropped,
        stats.broadcasts,
        stats.evictions,
        stats.producer_starts
    );

    Ok(())
}
