//! Frame Ticker: Dedicated thread producing display-frame boundaries.
//!
//! Each tick is one "animation frame": the engine fires at most one
//! scheduled render per session on it. Ticks never queue up behind a slow
//! receiver; a late frame is simply skipped.

use super::messages::Tick;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Frame ticker actor.
pub struct FrameTicker {
    /// Handle to the ticker thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
    /// Receiver for tick events.
    tick_rx: Receiver<Tick>,
    /// Interval between ticks.
    interval: Duration,
}

impl FrameTicker {
    /// Spawn a ticker running at `fps` frames per second.
    pub fn with_fps(fps: u32) -> Self {
        Self::spawn(Duration::from_secs(1) / fps.max(1))
    }

    /// Spawn a ticker with the given interval.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to spawn the ticker thread.
    pub fn spawn(interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        // Small buffer: frames must not pile up.
        let (tick_tx, tick_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("streamark-frames".to_string())
            .spawn(move || {
                Self::run_loop(&tick_tx, &shutdown_clone, interval);
            })
            .expect("Failed to spawn ticker thread");

        Self {
            handle: Some(handle),
            shutdown,
            tick_rx,
            interval,
        }
    }

    /// Tick receiver, for use with `select!`.
    #[inline]
    pub const fn receiver(&self) -> &Receiver<Tick> {
        &self.tick_rx
    }

    /// Interval between frames.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Signal the ticker to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the ticker thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn run_loop(tick_tx: &Sender<Tick>, shutdown: &AtomicBool, interval: Duration) {
        let start = Instant::now();
        let mut frame = 0u64;
        let mut next_tick = start + interval;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            let now = Instant::now();
            if now >= next_tick {
                let tick = Tick {
                    frame,
                    elapsed: now - start,
                };
                // Receiver is behind: drop the frame.
                let _ = tick_tx.try_send(tick);

                frame += 1;
                next_tick += interval;
                if next_tick < now {
                    next_tick = now + interval;
                }
            } else {
                thread::sleep((next_tick - now).min(Duration::from_millis(1)));
            }
        }
    }
}

impl Drop for FrameTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
