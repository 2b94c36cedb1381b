//! # Course Tracker
//!
//! Run recording and live course following for GPS running apps.
//!
//! This library provides:
//! - Run recording with jitter filtering, pause/resume and distance milestones
//! - Course following: progress, off-course detection, next waypoint,
//!   remaining distance and completion
//! - An announcement policy that turns tracking events into debounced
//!   voice/haptic notifications
//!
//! ## Features
//!
//! - **`persistence`** - Enable SQLite storage for courses and runs
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use course_tracker::{Coordinate, Course, CourseTrackingEngine, TrackingConfig};
//!
//! let course = Arc::new(Course::new(
//!     "course-1",
//!     "Riverside",
//!     vec![
//!         Coordinate::new(0.0, 0.0),
//!         Coordinate::new(0.0, 0.001),
//!         Coordinate::new(0.0, 0.002),
//!     ],
//! ));
//!
//! let mut engine = CourseTrackingEngine::new(TrackingConfig::default());
//! engine.start(course).unwrap();
//!
//! let events = engine.update(&Coordinate::new(0.0, 0.001));
//! assert!(engine.state().progress_fraction > 0.0);
//! assert!(!engine.state().is_off_course);
//! println!("{} events, {}", events.len(), engine.navigation_instruction());
//! ```

use rstar::{RTreeObject, AABB};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackerError};

// Thresholds and tunables
pub mod config;
pub use config::TrackingConfig;

// Injectable time source
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Geographic utilities (distance, path length, closest point)
pub mod geo_utils;

// Events emitted by recording and tracking
pub mod events;
pub use events::{Priority, TrackingEvent};

// Run recording
pub mod recording;
pub use recording::{RecordingPhase, RecordingSession, RecordingSummary};

// Course following state machine
pub mod tracking;
pub use tracking::{CourseTrackingEngine, EngineState, NavigationInstruction, TrackingState};

// Announcement debounce and dispatch
pub mod announcements;
pub use announcements::{
    deliver_all, Announcement, AnnouncementDispatcher, AnnouncementPolicy, Announcer,
    CollectingAnnouncer, HapticPattern, LogAnnouncer,
};

// Persistence collaborator interface and run records
pub mod store;
pub use store::{CourseDraft, CourseStore, InMemoryCourseStore, RunRecord};

// SQLite-backed course store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteCourseStore;

// Loaded courses with spatial lookup
pub mod library;
pub use library::CourseLibrary;

// Periodic elapsed-time tick
pub mod ticker;
pub use ticker::ElapsedTicker;

// Session orchestration (single serialized entry point)
pub mod session;
pub use session::{
    replace_session, session_ticker_running, start_session_ticker, stop_session_ticker,
    with_session, PositionOutcome, RunSession, SaveOutcome, SaveRequest, SessionSnapshot, SESSION,
};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("CourseTrackerRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with a unix timestamp (seconds).
///
/// For authored courses the timestamp is informational only; path order is
/// the order of the sequence.
///
/// # Example
/// ```
/// use course_tracker::Coordinate;
/// let point = Coordinate::new(37.5665, 126.9780).with_timestamp(1_700_000_000.0);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub timestamp: f64,
}

impl Coordinate {
    /// Create a coordinate with a zero timestamp.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            timestamp: 0.0,
        }
    }

    /// Return a copy carrying the given timestamp.
    pub fn with_timestamp(self, timestamp: f64) -> Self {
        Self { timestamp, ..self }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// The `{lat, lng}` map shape used by stored documents.
    pub fn to_lat_lng(&self) -> LatLng {
        LatLng {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// A bare latitude/longitude pair, the document shape of stored paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Serialize a coordinate sequence into `{lat, lng}` maps.
pub fn to_lat_lng_maps(points: &[Coordinate]) -> Vec<LatLng> {
    points.iter().map(Coordinate::to_lat_lng).collect()
}

/// Bounding box for a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from coordinates.
    pub fn from_points(points: &[Coordinate]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }
}

/// A named, ordered reference path a user can follow.
///
/// Immutable once handed to the tracking engine; the engine holds it behind
/// an `Arc` so a follow session never copies the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    /// Path length in meters
    pub distance_meters: f64,
    /// Path points in traversal order
    pub coordinates: Vec<Coordinate>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub created_at: f64,
    /// User id of the author
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub is_public: bool,
    /// Number of runs recorded against this course
    #[serde(default)]
    pub run_count: u32,
}

impl Course {
    /// Create a private course, computing its distance from the path.
    pub fn new(id: &str, title: &str, coordinates: Vec<Coordinate>) -> Self {
        let distance_meters = geo_utils::path_length(&coordinates);
        Self {
            id: id.to_string(),
            title: title.to_string(),
            distance_meters,
            coordinates,
            created_at: 0.0,
            created_by: String::new(),
            is_public: false,
            run_count: 0,
        }
    }

    /// Parse a course from its JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrackerError::InvalidState {
            message: format!("invalid course document: {}", e),
        })
    }

    /// Serialize the course to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Bounding box of the path, if it has any points.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.coordinates)
    }

    /// Number of points in the path.
    pub fn point_count(&self) -> usize {
        self.coordinates.len()
    }
}

// ============================================================================
// Spatial Indexing Types
// ============================================================================

/// Bounding box of a course (used for spatial indexing).
#[derive(Debug, Clone)]
pub struct CourseBounds {
    pub course_id: String,
    pub bounds: Bounds,
}

impl RTreeObject for CourseBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
