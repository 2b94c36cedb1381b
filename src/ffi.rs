//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module exposes the global run session to Kotlin and Swift through
//! UniFFI. All FFI functions are prefixed with `ffi_` to avoid naming
//! conflicts with the internal API. Structured results cross the boundary as
//! JSON strings.

use std::sync::Arc;

use log::{info, warn};

use crate::announcements::{Announcer, HapticPattern};
use crate::events::Priority;
use crate::session::{
    replace_session, start_session_ticker, stop_session_ticker, with_session, RunSession,
};
use crate::{init_logging, Coordinate, Course, LogAnnouncer, SystemClock, TrackingConfig};

// ============================================================================
// Announcement Callback Interface
// ============================================================================

/// Speech and haptic playback on the host.
/// Implement this in Kotlin/Swift and install it with `ffi_set_announcer`.
///
/// Called after the session lock is released, so implementations may call
/// other `ffi_*` functions.
#[uniffi::export(callback_interface)]
pub trait AnnouncementCallback: Send + Sync {
    /// Speak a message. Playback errors stay on the host.
    fn on_announce(&self, message: String, priority: Priority);

    /// Play a haptic pattern.
    fn on_haptic(&self, pattern: HapticPattern);
}

struct HostAnnouncer(Box<dyn AnnouncementCallback>);

impl Announcer for HostAnnouncer {
    fn announce(&self, message: &str, priority: Priority) {
        self.0.on_announce(message.to_string(), priority);
    }

    fn haptic(&self, pattern: HapticPattern) {
        self.0.on_haptic(pattern);
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

// ============================================================================
// Session Setup
// ============================================================================

/// Install the host announcer on the global session.
#[uniffi::export]
pub fn ffi_set_announcer(callback: Box<dyn AnnouncementCallback>) {
    init_logging();
    with_session(|s| s.set_announcer(Box::new(HostAnnouncer(callback))));
    info!("[CourseTrackerRust] Host announcer installed");
}

/// Replace the global session with one using the given config JSON.
///
/// Any recording in progress is dropped and announcements go to the log
/// until `ffi_set_announcer` is called again.
#[uniffi::export]
pub fn ffi_configure_session(config_json: String) -> bool {
    init_logging();
    match TrackingConfig::from_json(&config_json) {
        Ok(config) => {
            replace_session(RunSession::new(
                config,
                Arc::new(SystemClock),
                Box::new(LogAnnouncer),
            ));
            true
        }
        Err(e) => {
            warn!("[CourseTrackerRust] Rejected config: {}", e);
            false
        }
    }
}

/// Default tunables as JSON.
#[uniffi::export]
pub fn ffi_default_tracking_config() -> String {
    to_json(&TrackingConfig::default())
}

// ============================================================================
// Recording
// ============================================================================

/// Start recording and the elapsed-time ticker.
#[uniffi::export]
pub fn ffi_start_run() {
    init_logging();
    info!("[CourseTrackerRust] ffi_start_run");
    with_session(|s| s.start_run());
    start_session_ticker();
}

#[uniffi::export]
pub fn ffi_pause_run() -> bool {
    with_session(|s| s.pause()).unwrap_or(false)
}

#[uniffi::export]
pub fn ffi_resume_run() -> bool {
    with_session(|s| s.resume()).unwrap_or(false)
}

/// Feed one position. Returns the triggered events as a JSON array.
#[uniffi::export]
pub fn ffi_on_position(lat: f64, lng: f64, timestamp: f64) -> String {
    let coord = Coordinate::new(lat, lng).with_timestamp(timestamp);
    let events = with_session(|s| s.on_position(coord).events).unwrap_or_default();
    to_json(&events)
}

/// Stop recording and following. Returns the recording summary as JSON, or
/// `None` when nothing was recorded.
#[uniffi::export]
pub fn ffi_stop_run() -> Option<String> {
    init_logging();
    stop_session_ticker();
    match with_session(|s| s.stop_run())? {
        Ok(summary) => Some(to_json(&summary)),
        Err(e) => {
            info!("[CourseTrackerRust] ffi_stop_run: {}", e);
            None
        }
    }
}

/// Save the stopped recording to the SQLite store at `db_path`.
/// `request_json` is a `SaveRequest`. Returns the assigned ids as JSON.
#[cfg(feature = "persistence")]
#[uniffi::export]
pub fn ffi_save_run(db_path: String, request_json: String) -> Option<String> {
    init_logging();
    let request: crate::SaveRequest = match serde_json::from_str(&request_json) {
        Ok(r) => r,
        Err(e) => {
            warn!("[CourseTrackerRust] Invalid save request: {}", e);
            return None;
        }
    };
    let mut store = match crate::SqliteCourseStore::new(&db_path) {
        Ok(store) => store,
        Err(e) => {
            warn!("[CourseTrackerRust] Failed to open {}: {}", db_path, e);
            return None;
        }
    };
    match with_session(|s| s.save(&mut store, &request))? {
        Ok(outcome) => Some(to_json(&outcome)),
        Err(e) => {
            warn!("[CourseTrackerRust] Save failed: {}", e);
            None
        }
    }
}

/// Drop the current or pending recording.
#[uniffi::export]
pub fn ffi_discard_run() {
    stop_session_ticker();
    with_session(|s| s.discard());
}

// ============================================================================
// Course Following
// ============================================================================

/// Start following a course given as its JSON document.
#[uniffi::export]
pub fn ffi_follow_course_json(course_json: String) -> bool {
    init_logging();
    let course = match Course::from_json(&course_json) {
        Ok(course) => course,
        Err(e) => {
            warn!("[CourseTrackerRust] {}", e);
            return false;
        }
    };
    info!(
        "[CourseTrackerRust] ffi_follow_course_json: {} ({} points)",
        course.id,
        course.coordinates.len()
    );
    match with_session(|s| s.follow_course(Arc::new(course))) {
        Some(Ok(())) => true,
        Some(Err(e)) => {
            warn!("[CourseTrackerRust] {}", e);
            false
        }
        None => false,
    }
}

#[uniffi::export]
pub fn ffi_stop_following() {
    with_session(|s| s.stop_following());
}

/// Current guidance as a spoken-style sentence.
#[uniffi::export]
pub fn ffi_navigation_instruction() -> String {
    with_session(|s| s.navigation_instruction().to_string()).unwrap_or_default()
}

/// Offer the current guidance to the announcer (debounced).
#[uniffi::export]
pub fn ffi_announce_navigation() -> bool {
    with_session(|s| s.announce_navigation()).unwrap_or(false)
}

/// Full session state as JSON.
#[uniffi::export]
pub fn ffi_session_snapshot_json() -> String {
    with_session(|s| to_json(&s.snapshot())).unwrap_or_else(|| "{}".to_string())
}
