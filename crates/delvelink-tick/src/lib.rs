//! Fixed-timestep tick scheduler for the Delvelink simulation loop.
//!
//! The whole sync core is driven by one single-threaded cooperative loop:
//! every tick it drains the inbound queue, dispatches handlers, and polls
//! the battle coordinator's deadlines. This scheduler provides that
//! heartbeat at a fixed rate (~60 Hz by default) without ever letting the
//! loop block on I/O.
//!
//! # Integration
//!
//! ```ignore
//! let mut ticks = TickScheduler::with_rate(60);
//! loop {
//!     let info = ticks.wait_for_tick().await;
//!     session.drain_and_dispatch()?;
//!     session.poll_deadlines(info.dt);
//! }
//! ```
//!
//! Overruns are handled by skipping: a tick that fires late schedules the
//! next one from *now*, trading momentary slowdown for a bounded loop.

use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

/// Default simulation rate.
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { tick_rate_hz: DEFAULT_TICK_RATE_HZ }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self { tick_rate_hz }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            warn!("tick_rate_hz of 0 is not supported; using 1");
            self.tick_rate_hz = 1;
        }
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum; clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self
    }

    /// Duration of a single tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }
}

/// Information about a fired tick, returned by
/// [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed delta time (always `1 / tick_rate`). Game logic uses this,
    /// not wall-clock elapsed time, so both peers step identically.
    pub dt: Duration,
    /// `true` if this tick fired late.
    pub overrun: bool,
    /// How many ticks were skipped because of the overrun.
    pub ticks_skipped: u64,
}

/// Fixed-timestep tick scheduler. One per process.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    paused: bool,
    total_overruns: u64,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );
        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick: TokioInstant::now() + tick_duration,
            paused: false,
            total_overruns: 0,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// While paused this future pends forever; a surrounding
    /// `tokio::select!` still services its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
            unreachable!()
        }

        time::sleep_until(self.next_tick).await;

        let now = TokioInstant::now();
        self.tick_count += 1;

        // Late by more than a tenth of a tick counts as an overrun.
        let late_by = now.saturating_duration_since(self.next_tick);
        let overrun = late_by > self.tick_duration / 10;
        let mut ticks_skipped = 0u64;

        if overrun {
            ticks_skipped = late_by.as_nanos() as u64
                / self.tick_duration.as_nanos() as u64;
            self.total_overruns += 1;
            if ticks_skipped > 0 {
                warn!(
                    tick = self.tick_count,
                    skipped = ticks_skipped,
                    late_ms = late_by.as_secs_f64() * 1000.0,
                    "tick overrun; skipping ahead"
                );
            }
            // Reschedule from now, not from the missed deadline.
            self.next_tick = now + self.tick_duration;
        } else {
            self.next_tick += self.tick_duration;
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            overrun,
            ticks_skipped,
        }
    }

    /// Pause the loop (e.g. while the process sits in a menu with no
    /// session). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick scheduler paused");
        }
    }

    /// Resume after a pause. The next deadline is reset to
    /// `now + tick_duration` so the paused time doesn't burst back.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_tick = TokioInstant::now() + self.tick_duration;
            debug!(tick = self.tick_count, "tick scheduler resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Total overruns observed since creation.
    pub fn total_overruns(&self) -> u64 {
        self.total_overruns
    }
}
