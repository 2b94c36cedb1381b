//! Unified error handling for the course-tracker library.
//!
//! Nothing in this crate is fatal to the host process. Every failure is
//! reported through a [`TrackerError`] value and the component that produced
//! it stays usable (typically in an idle or inert state).

use thiserror::Error;

/// Unified error type for course-tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// A recording was stopped before any position was accepted
    #[error("Nothing to save: no positions were recorded")]
    NoData,

    /// The tracking engine was started with a course that has no path points
    #[error("Course '{course_id}' has no coordinates to follow")]
    InvalidCourse { course_id: String },

    /// A course id did not resolve to a loaded or stored course
    #[error("Course '{course_id}' not found")]
    CourseNotFound { course_id: String },

    /// An operation was called in a state that does not support it
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Persistence/storage error
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for course-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Config {
            message: err.to_string(),
        }
    }
}

/// Extension trait for converting Option to TrackerError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a course-not-found error.
    fn ok_or_course_not_found(self, course_id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_course_not_found(self, course_id: &str) -> Result<T> {
        self.ok_or_else(|| TrackerError::CourseNotFound {
            course_id: course_id.to_string(),
        })
    }
}
