//! # Course Tracking Engine
//!
//! State machine that maps a live position stream onto progress along a
//! fixed reference course.
//!
//! ```text
//! Idle --start--> Following --finish reached--> Completed
//!   ^                 |                             |
//!   +------stop-------+-------------stop------------+
//! ```
//!
//! Each [`CourseTrackingEngine::update`] call:
//! 1. scans the whole path for the closest point (ties go to the earliest index)
//! 2. flags off-course when that point is further than the threshold, emitting
//!    an event only on the edges
//! 3. advances progress, never backwards
//! 4. emits one progress milestone per bucket crossed (never 0% or 100%)
//! 5. moves the next waypoint ~200 m of path distance ahead
//! 6. recomputes the remaining path distance
//! 7. completes when the runner is near the finish and past 80% progress

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::events::TrackingEvent;
use crate::geo_utils::{
    closest_point, haversine_distance, index_after_path_distance, remaining_path_length,
};
use crate::{Coordinate, Course, TrackingConfig};

/// Engine lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum EngineState {
    Idle,
    Following,
    Completed,
}

/// Observable progress of a follow session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    /// Fraction of the path passed, 0.0 to 1.0
    pub progress_fraction: f64,
    /// Furthest path index reached; never decreases
    pub current_index: usize,
    /// Distance from the runner to the closest path point
    pub distance_from_course_meters: f64,
    pub is_off_course: bool,
    pub next_waypoint: Option<Coordinate>,
    /// Path distance from the current index to the finish
    pub remaining_distance_meters: f64,
    /// Last progress bucket announced (percent)
    pub last_announced_progress_bucket: u32,
    pub was_off_course: bool,
    /// Last position passed to `update`
    pub last_position: Option<Coordinate>,
}

/// Short-range guidance derived from the current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavigationInstruction {
    OffCourse,
    /// Within the arrival radius of the next waypoint
    Arrived,
    /// Within the approach radius of the next waypoint
    Approaching { meters: u32 },
    Continue,
}

impl fmt::Display for NavigationInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationInstruction::OffCourse => {
                write!(f, "You are off the course. Return to the route.")
            }
            NavigationInstruction::Arrived => write!(f, "You have reached the waypoint."),
            NavigationInstruction::Approaching { meters } => {
                write!(f, "Waypoint in {}m.", meters)
            }
            NavigationInstruction::Continue => write!(f, "Continue along the course."),
        }
    }
}

/// Matches live positions against a reference course.
pub struct CourseTrackingEngine {
    config: TrackingConfig,
    course: Option<Arc<Course>>,
    phase: EngineState,
    state: TrackingState,
}

impl CourseTrackingEngine {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            course: None,
            phase: EngineState::Idle,
            state: TrackingState::default(),
        }
    }

    /// Begin following `course`, replacing any previous follow session.
    ///
    /// A course without coordinates still enters `Following`, but every
    /// update is a no-op; the caller gets [`TrackerError::InvalidCourse`].
    pub fn start(&mut self, course: Arc<Course>) -> Result<TrackingEvent> {
        self.state = TrackingState {
            next_waypoint: course.coordinates.first().copied(),
            remaining_distance_meters: course.distance_meters,
            ..TrackingState::default()
        };
        self.phase = EngineState::Following;

        let event = TrackingEvent::CourseFollowStarted {
            title: course.title.clone(),
        };
        let empty = course.coordinates.is_empty();
        let course_id = course.id.clone();
        info!(
            "[CourseTracker] Following '{}' ({} points, {:.0}m)",
            course.title,
            course.coordinates.len(),
            course.distance_meters
        );
        self.course = Some(course);

        if empty {
            warn!("[CourseTracker] Course '{}' has no coordinates", course_id);
            return Err(TrackerError::InvalidCourse { course_id });
        }
        Ok(event)
    }

    /// Stop following and clear all state. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.phase != EngineState::Idle {
            info!("[CourseTracker] Stopped ({:?})", self.phase);
        }
        self.course = None;
        self.phase = EngineState::Idle;
        self.state = TrackingState::default();
    }

    /// Feed one accepted position. Returns the events it triggered.
    ///
    /// No-op unless following a course with at least one point.
    pub fn update(&mut self, position: &Coordinate) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        if self.phase != EngineState::Following {
            return events;
        }
        let Some(course) = self.course.clone() else {
            return events;
        };
        let path = &course.coordinates;
        let Some((closest_index, closest_distance)) = closest_point(path, position) else {
            return events;
        };

        self.state.last_position = Some(*position);
        self.state.distance_from_course_meters = closest_distance;

        // Off-course edges
        let off_course = closest_distance > self.config.off_course_threshold_meters;
        self.state.is_off_course = off_course;
        if off_course && !self.state.was_off_course {
            info!(
                "[CourseTracker] Off course: {:.0}m from path",
                closest_distance
            );
            events.push(TrackingEvent::OffCourse);
        } else if !off_course && self.state.was_off_course {
            info!("[CourseTracker] Back on course");
            events.push(TrackingEvent::BackOnCourse);
        }
        self.state.was_off_course = off_course;

        // Progress never regresses
        let progress_index = closest_index.max(self.state.current_index);
        self.state.progress_fraction = if path.len() > 1 {
            progress_index as f64 / (path.len() - 1) as f64
        } else {
            0.0
        };

        if let Some(bucket) = self.cross_progress_bucket() {
            events.push(TrackingEvent::ProgressMilestone(bucket));
        }

        if progress_index > self.state.current_index {
            self.state.current_index = progress_index;
            self.state.next_waypoint = self.compute_next_waypoint(path);
        }

        self.state.remaining_distance_meters = remaining_path_length(path, progress_index);

        debug!(
            "[CourseTracker] closest={} ({:.1}m) progress={:.3} remaining={:.0}m",
            closest_index,
            closest_distance,
            self.state.progress_fraction,
            self.state.remaining_distance_meters
        );

        // Completion
        if let Some(finish) = path.last() {
            let to_finish = haversine_distance(position, finish);
            if to_finish <= self.config.completion_radius_meters
                && self.state.progress_fraction > self.config.completion_min_progress
            {
                self.phase = EngineState::Completed;
                info!("[CourseTracker] Completed '{}'", course.title);
                events.push(TrackingEvent::Completed);
            }
        }

        events
    }

    /// Bucket the current progress; return the bucket if it is new and
    /// strictly between 0 and 100.
    fn cross_progress_bucket(&mut self) -> Option<u32> {
        let step = self.config.progress_bucket_percent.max(1);
        let percent = (self.state.progress_fraction * 100.0).floor() as u32;
        let bucket = percent / step * step;
        if bucket <= self.state.last_announced_progress_bucket {
            return None;
        }
        self.state.last_announced_progress_bucket = bucket;
        if bucket > 0 && bucket < 100 {
            info!("[CourseTracker] Progress {}%", bucket);
            Some(bucket)
        } else {
            None
        }
    }

    fn compute_next_waypoint(&self, path: &[Coordinate]) -> Option<Coordinate> {
        let from = self.state.current_index;
        let points_left = path.len().saturating_sub(from);
        if points_left < self.config.waypoint_tail_points as usize {
            return path.last().copied();
        }
        index_after_path_distance(path, from, self.config.waypoint_lookahead_meters)
            .and_then(|index| path.get(index).copied())
    }

    /// Guidance for the runner's current situation. Pure; callable anytime.
    pub fn navigation_instruction(&self) -> NavigationInstruction {
        if self.state.is_off_course {
            return NavigationInstruction::OffCourse;
        }
        let (Some(position), Some(waypoint)) = (self.state.last_position, self.state.next_waypoint)
        else {
            return NavigationInstruction::Continue;
        };
        let distance = haversine_distance(&position, &waypoint);
        if distance < self.config.arrival_radius_meters {
            NavigationInstruction::Arrived
        } else if distance < self.config.approach_radius_meters {
            NavigationInstruction::Approaching {
                meters: distance.round() as u32,
            }
        } else {
            NavigationInstruction::Continue
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> EngineState {
        self.phase
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    pub fn course(&self) -> Option<&Arc<Course>> {
        self.course.as_ref()
    }

    pub fn is_following(&self) -> bool {
        self.phase == EngineState::Following
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================
