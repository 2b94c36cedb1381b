//! Discrete events produced by the recording session and the tracking engine.
//!
//! State machines return these values instead of talking to speech or
//! haptics directly; the announcement dispatcher consumes them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tracking::NavigationInstruction;

/// Announcement priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum Priority {
    /// Subject to the minimum-interval debounce
    Normal,
    /// Always delivered; resets the debounce window
    High,
}

/// Event emitted by a recording or course-following state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum TrackingEvent {
    RunStarted,
    CourseFollowStarted { title: String },
    Paused,
    Resumed,
    /// Whole kilometers covered so far
    DistanceMilestone(u32),
    OffCourse,
    BackOnCourse,
    /// Percent of the course passed (25, 50, 75 with default config)
    ProgressMilestone(u32),
    Completed,
    Navigation(NavigationInstruction),
}

impl TrackingEvent {
    pub fn priority(&self) -> Priority {
        match self {
            TrackingEvent::ProgressMilestone(_) | TrackingEvent::Navigation(_) => Priority::Normal,
            _ => Priority::High,
        }
    }

    /// Spoken text for this event.
    pub fn message(&self) -> String {
        match self {
            TrackingEvent::RunStarted => "Run started.".to_string(),
            TrackingEvent::CourseFollowStarted { title } => {
                format!("Starting course {}. Follow the route.", title)
            }
            TrackingEvent::Paused => "Run paused.".to_string(),
            TrackingEvent::Resumed => "Run resumed.".to_string(),
            TrackingEvent::DistanceMilestone(km) => {
                if *km == 1 {
                    "1 kilometer completed.".to_string()
                } else {
                    format!("{} kilometers completed.", km)
                }
            }
            TrackingEvent::OffCourse => {
                "You are off the course. Head back to the route.".to_string()
            }
            TrackingEvent::BackOnCourse => "You are back on course.".to_string(),
            TrackingEvent::ProgressMilestone(percent) => {
                format!("{} percent of the course completed.", percent)
            }
            TrackingEvent::Completed => "Course completed. Great job!".to_string(),
            TrackingEvent::Navigation(instruction) => instruction.to_string(),
        }
    }
}

impl fmt::Display for TrackingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}
