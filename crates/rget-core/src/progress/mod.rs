//! Progress reporting (bytes done, speed, ETA) and the throughput ceiling.
//!
//! `ProgressReporter` turns the driver's byte counts into snapshots at a
//! bounded frequency; the terminal `finished` / `error` snapshots and the
//! initial `starting` one are always delivered.

mod rate;

pub use rate::RateLimiter;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Window used for the instantaneous speed estimate.
const SPEED_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Starting,
    InProgress,
    Finished,
    Error,
}

/// Snapshot of one transfer's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    /// Bytes present in the output (including bytes resumed from disk).
    pub bytes_done: u64,
    pub total_bytes: Option<u64>,
    pub elapsed_secs: f64,
    /// Bytes per second over the recent window.
    pub speed: Option<f64>,
    pub eta_secs: Option<f64>,
    /// Human-readable failure reason for `Error`.
    pub message: Option<String>,
}

impl ProgressSnapshot {
    /// Fraction complete in [0.0, 1.0], if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_done as f64 / total as f64).min(1.0)
            }
        })
    }
}

/// Receiver of progress snapshots. Implemented for closures.
pub trait ProgressSink {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot);
}

impl<F: FnMut(&ProgressSnapshot)> ProgressSink for F {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Sink that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Builds snapshots and rate-limits the in-progress ones.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
    started: Instant,
    last_emit: Option<Instant>,
    samples: VecDeque<(Instant, u64)>,
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            started: now,
            last_emit: None,
            samples: VecDeque::new(),
        }
    }

    pub fn starting(&mut self, bytes_done: u64, total: Option<u64>) -> ProgressSnapshot {
        let now = Instant::now();
        self.record(bytes_done, now);
        self.snapshot(ProgressStatus::Starting, bytes_done, total, now, None)
    }

    /// Record a new byte count; returns a snapshot only if the interval since
    /// the last one has passed.
    pub fn observe(
        &mut self,
        bytes_done: u64,
        total: Option<u64>,
        now: Instant,
    ) -> Option<ProgressSnapshot> {
        self.record(bytes_done, now);
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        self.last_emit = Some(now);
        Some(self.snapshot(ProgressStatus::InProgress, bytes_done, total, now, None))
    }

    pub fn finished(&mut self, bytes_done: u64) -> ProgressSnapshot {
        let now = Instant::now();
        self.record(bytes_done, now);
        let mut s = self.snapshot(ProgressStatus::Finished, bytes_done, Some(bytes_done), now, None);
        s.eta_secs = Some(0.0);
        s
    }

    pub fn error(&mut self, bytes_done: u64, total: Option<u64>, reason: String) -> ProgressSnapshot {
        let now = Instant::now();
        let mut s = self.snapshot(ProgressStatus::Error, bytes_done, total, now, Some(reason));
        s.eta_secs = None;
        s
    }

    fn record(&mut self, bytes_done: u64, now: Instant) {
        // A restart moves the count backwards; old samples no longer apply.
        if self.samples.back().is_some_and(|(_, b)| *b > bytes_done) {
            self.samples.clear();
        }
        self.samples.push_back((now, bytes_done));
        while self.samples.len() > 2
            && self
                .samples
                .front()
                .is_some_and(|(t, _)| now.saturating_duration_since(*t) > SPEED_WINDOW)
        {
            self.samples.pop_front();
        }
    }

    fn speed(&self) -> Option<f64> {
        let (t0, b0) = self.samples.front()?;
        let (t1, b1) = self.samples.back()?;
        let dt = t1.saturating_duration_since(*t0).as_secs_f64();
        if dt <= 0.0 {
            return None;
        }
        Some(b1.saturating_sub(*b0) as f64 / dt)
    }

    fn snapshot(
        &self,
        status: ProgressStatus,
        bytes_done: u64,
        total: Option<u64>,
        now: Instant,
        message: Option<String>,
    ) -> ProgressSnapshot {
        let speed = self.speed();
        let eta_secs = match (total, speed) {
            (Some(total), _) if bytes_done >= total => Some(0.0),
            (Some(total), Some(speed)) if speed > 0.0 => {
                Some(total.saturating_sub(bytes_done) as f64 / speed)
            }
            _ => None,
        };
        ProgressSnapshot {
            status,
            bytes_done,
            total_bytes: total,
            elapsed_secs: now.saturating_duration_since(self.started).as_secs_f64(),
            speed,
            eta_secs,
            message,
        }
    }
}
