//! Tracking configuration.
//!
//! Every distance threshold and interval the recording session, tracking
//! engine and announcement policy use lives here, so hosts can tune them
//! without touching the state machines.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Configuration for recording, course following and announcements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum movement between accepted recording points.
    /// Smaller moves are treated as GPS jitter at rest. Default: 5.0 meters
    pub min_movement_meters: f64,

    /// Distance from the closest path point beyond which the runner is off course.
    /// Default: 50.0 meters
    pub off_course_threshold_meters: f64,

    /// Path distance ahead of the current index used to pick the next waypoint.
    /// Default: 200.0 meters
    pub waypoint_lookahead_meters: f64,

    /// When fewer than this many points remain, the next waypoint is the finish.
    /// Default: 10
    pub waypoint_tail_points: u32,

    /// Straight-line distance to the finish that counts as arrival.
    /// Default: 50.0 meters
    pub completion_radius_meters: f64,

    /// Progress that must be exceeded before completion can trigger.
    /// Default: 0.8
    pub completion_min_progress: f64,

    /// Distance to the next waypoint reported as "arrived". Default: 10.0 meters
    pub arrival_radius_meters: f64,

    /// Distance to the next waypoint at which the distance is read out.
    /// Default: 50.0 meters
    pub approach_radius_meters: f64,

    /// Progress milestone step in percent. Must divide 100. Default: 25
    pub progress_bucket_percent: u32,

    /// Minimum gap between normal-priority announcements. Default: 5.0 seconds
    pub announcement_interval_secs: f64,

    /// Elapsed-time tick period. Default: 1000 ms
    pub tick_interval_millis: u64,

    /// Stored run trails keep every Nth recorded point. Default: 10
    pub trail_sample_step: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_movement_meters: 5.0,
            off_course_threshold_meters: 50.0,
            waypoint_lookahead_meters: 200.0,
            waypoint_tail_points: 10,
            completion_radius_meters: 50.0,
            completion_min_progress: 0.8,
            arrival_radius_meters: 10.0,
            approach_radius_meters: 50.0,
            progress_bucket_percent: 25,
            announcement_interval_secs: 5.0,
            tick_interval_millis: 1000,
            trail_sample_step: 10,
        }
    }
}

impl TrackingConfig {
    /// Parse a configuration from JSON. Missing keys keep their defaults.
    ///
    /// # Example
    /// ```
    /// use course_tracker::TrackingConfig;
    /// let config = TrackingConfig::from_json(r#"{"off_course_threshold_meters": 30.0}"#).unwrap();
    /// assert_eq!(config.off_course_threshold_meters, 30.0);
    /// assert_eq!(config.waypoint_lookahead_meters, 200.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the state machines cannot honor.
    pub fn validate(&self) -> Result<()> {
        let distances = [
            ("min_movement_meters", self.min_movement_meters),
            ("off_course_threshold_meters", self.off_course_threshold_meters),
            ("waypoint_lookahead_meters", self.waypoint_lookahead_meters),
            ("completion_radius_meters", self.completion_radius_meters),
            ("arrival_radius_meters", self.arrival_radius_meters),
            ("approach_radius_meters", self.approach_radius_meters),
        ];
        for (name, value) in distances {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_error(format!("{} must be positive, got {}", name, value)));
            }
        }
        if self.progress_bucket_percent == 0
            || self.progress_bucket_percent >= 100
            || 100 % self.progress_bucket_percent != 0
        {
            return Err(config_error(format!(
                "progress_bucket_percent must divide 100, got {}",
                self.progress_bucket_percent
            )));
        }
        if !(self.completion_min_progress > 0.0 && self.completion_min_progress <= 1.0) {
            return Err(config_error(format!(
                "completion_min_progress must be in (0, 1], got {}",
                self.completion_min_progress
            )));
        }
        if !(self.announcement_interval_secs.is_finite() && self.announcement_interval_secs >= 0.0)
        {
            return Err(config_error(
                "announcement_interval_secs must be non-negative".to_string(),
            ));
        }
        if self.tick_interval_millis == 0 || self.trail_sample_step == 0 {
            return Err(config_error(
                "tick_interval_millis and trail_sample_step must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_error(message: String) -> TrackerError {
    TrackerError::Config { message }
}
