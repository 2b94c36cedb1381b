//! # Recording Session
//!
//! Builds a spatially deduplicated, time-stamped trace of a run while it is
//! active.
//!
//! - Points closer than `min_movement_meters` to the last accepted point are
//!   dropped as GPS jitter (no append, no distance).
//! - Elapsed time excludes paused time; it is refreshed by [`RecordingSession::tick`].
//! - Each time the whole-kilometer count grows a
//!   [`TrackingEvent::DistanceMilestone`] is returned.
//! - `stop()` keeps the buffer in a pending-save state until the host either
//!   takes it for persistence or discards it.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Result, TrackerError};
use crate::events::TrackingEvent;
use crate::geo_utils::haversine_distance;
use crate::{Coordinate, TrackingConfig};

/// Lifecycle of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum RecordingPhase {
    Idle,
    Recording,
    Paused,
    /// Stopped with data; waiting for the host to save or discard it
    PendingSave,
}

/// Why a position was not added to the trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    Inactive,
    Paused,
    InvalidCoordinate,
    /// Moved less than the minimum movement since the last accepted point
    Jitter { distance_meters: f64 },
}

/// Outcome of [`RecordingSession::add_position`].
#[derive(Debug, Clone, PartialEq)]
pub enum PositionDecision {
    Rejected(RejectReason),
    Accepted {
        /// The stored point, stamped with the recording clock
        point: Coordinate,
        milestone: Option<TrackingEvent>,
    },
}

impl PositionDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PositionDecision::Accepted { .. })
    }
}

/// What a stopped recording hands to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    /// Proposed default title derived from the start time
    pub title: String,
    /// Unix timestamp (seconds)
    pub start_time: f64,
    /// Active (non-paused) time in seconds
    pub elapsed_seconds: f64,
    pub distance_meters: f64,
    pub coordinates: Vec<Coordinate>,
}

/// Live capture of a single run's GPS trace.
pub struct RecordingSession {
    clock: Arc<dyn Clock>,
    min_movement_meters: f64,

    coordinates: Vec<Coordinate>,
    start_time: f64,
    elapsed_seconds: f64,
    distance_meters: f64,
    is_paused: bool,
    is_active: bool,
    pending_save: bool,

    // Pause bookkeeping
    paused_at: Option<f64>,
    accumulated_pause: f64,

    last_announced_km: u32,
}

impl RecordingSession {
    pub fn new(config: &TrackingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            min_movement_meters: config.min_movement_meters,
            coordinates: Vec::new(),
            start_time: 0.0,
            elapsed_seconds: 0.0,
            distance_meters: 0.0,
            is_paused: false,
            is_active: false,
            pending_save: false,
            paused_at: None,
            accumulated_pause: 0.0,
            last_announced_km: 0,
        }
    }

    /// Reset all buffers and begin recording.
    pub fn start(&mut self) -> TrackingEvent {
        self.reset();
        self.start_time = self.clock.now();
        self.is_active = true;
        info!("[RecordingSession] Started at {:.0}", self.start_time);
        TrackingEvent::RunStarted
    }

    /// Freeze elapsed-time accumulation. No-op unless actively recording.
    pub fn pause(&mut self) -> Option<TrackingEvent> {
        if !self.is_active || self.is_paused {
            return None;
        }
        self.tick();
        self.paused_at = Some(self.clock.now());
        self.is_paused = true;
        info!(
            "[RecordingSession] Paused at {:.0}s, {:.0}m",
            self.elapsed_seconds, self.distance_meters
        );
        Some(TrackingEvent::Paused)
    }

    /// Resume elapsed-time accumulation. No-op unless paused.
    pub fn resume(&mut self) -> Option<TrackingEvent> {
        if !self.is_active || !self.is_paused {
            return None;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.accumulated_pause += (self.clock.now() - paused_at).max(0.0);
        }
        self.is_paused = false;
        info!(
            "[RecordingSession] Resumed, {:.0}s paused in total",
            self.accumulated_pause
        );
        Some(TrackingEvent::Resumed)
    }

    /// Refresh `elapsed_seconds`. Only moves while recording and not paused.
    pub fn tick(&mut self) -> f64 {
        if self.is_active && !self.is_paused {
            let elapsed = self.clock.now() - self.start_time - self.accumulated_pause;
            self.elapsed_seconds = elapsed.max(0.0);
        }
        self.elapsed_seconds
    }

    /// Offer a position to the trace.
    pub fn add_position(&mut self, coord: Coordinate) -> PositionDecision {
        if !self.is_active {
            return PositionDecision::Rejected(RejectReason::Inactive);
        }
        if self.is_paused {
            return PositionDecision::Rejected(RejectReason::Paused);
        }
        if !coord.is_valid() {
            return PositionDecision::Rejected(RejectReason::InvalidCoordinate);
        }

        if let Some(last) = self.coordinates.last() {
            let step = haversine_distance(last, &coord);
            if step < self.min_movement_meters {
                debug!("[RecordingSession] Dropped jitter point ({:.1}m)", step);
                return PositionDecision::Rejected(RejectReason::Jitter {
                    distance_meters: step,
                });
            }
            self.distance_meters += step;
        }

        let point = coord.with_timestamp(self.clock.now());
        self.coordinates.push(point);

        let km = (self.distance_meters / 1000.0).floor() as u32;
        let milestone = if km > self.last_announced_km {
            self.last_announced_km = km;
            info!("[RecordingSession] Reached {} km", km);
            Some(TrackingEvent::DistanceMilestone(km))
        } else {
            None
        };

        PositionDecision::Accepted { point, milestone }
    }

    /// Stop recording.
    ///
    /// Always leaves the session inactive. Returns [`TrackerError::NoData`]
    /// when nothing was recorded; otherwise the session holds the trace in
    /// [`RecordingPhase::PendingSave`] and returns its summary.
    pub fn stop(&mut self) -> Result<RecordingSummary> {
        if self.is_active {
            self.tick();
            self.is_active = false;
            self.is_paused = false;
            self.paused_at = None;
        }

        if self.coordinates.is_empty() {
            self.pending_save = false;
            info!("[RecordingSession] Stopped with no data");
            return Err(TrackerError::NoData);
        }

        self.pending_save = true;
        info!(
            "[RecordingSession] Stopped: {} points, {:.0}m, {:.0}s",
            self.coordinates.len(),
            self.distance_meters,
            self.elapsed_seconds
        );
        Ok(self.summary())
    }

    /// The stopped trace waiting to be saved, without consuming it.
    pub fn pending_summary(&self) -> Option<RecordingSummary> {
        self.pending_save.then(|| self.summary())
    }

    /// Hand the pending trace to the caller and return to idle.
    pub fn take_pending(&mut self) -> Option<RecordingSummary> {
        if !self.pending_save {
            return None;
        }
        let summary = self.summary();
        self.reset();
        Some(summary)
    }

    /// Drop whatever was recorded and return to idle.
    pub fn discard(&mut self) {
        if self.pending_save || self.is_active {
            info!(
                "[RecordingSession] Discarded {} points",
                self.coordinates.len()
            );
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.coordinates.clear();
        self.start_time = 0.0;
        self.elapsed_seconds = 0.0;
        self.distance_meters = 0.0;
        self.is_paused = false;
        self.is_active = false;
        self.pending_save = false;
        self.paused_at = None;
        self.accumulated_pause = 0.0;
        self.last_announced_km = 0;
    }

    fn summary(&self) -> RecordingSummary {
        RecordingSummary {
            title: default_title(self.start_time),
            start_time: self.start_time,
            elapsed_seconds: self.elapsed_seconds,
            distance_meters: self.distance_meters,
            coordinates: self.coordinates.clone(),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> RecordingPhase {
        if self.is_active && self.is_paused {
            RecordingPhase::Paused
        } else if self.is_active {
            RecordingPhase::Recording
        } else if self.pending_save {
            RecordingPhase::PendingSave
        } else {
            RecordingPhase::Idle
        }
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn last_position(&self) -> Option<&Coordinate> {
        self.coordinates.last()
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused
    }
}

/// Default run title, e.g. `Run 2024.03.09 07:05` (UTC).
pub fn default_title(start_time: f64) -> String {
    let secs = start_time.floor() as i64;
    match chrono::DateTime::from_timestamp(secs, 0) {
        Some(dt) => format!("Run {}", dt.format("%Y.%m.%d %H:%M")),
        None => "Run".to_string(),
    }
}
