//! Persistence collaborator interface.
//!
//! The core never waits on storage while tracking. A finished recording is
//! converted into a [`RunRecord`] (and optionally a [`CourseDraft`]) and
//! handed to a [`CourseStore`] when the user confirms the save.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::recording::RecordingSummary;
use crate::{to_lat_lng_maps, Coordinate, Course, LatLng};

/// A course about to be created from a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub title: String,
    pub is_public: bool,
    pub coordinates: Vec<Coordinate>,
    pub distance_meters: f64,
    pub created_by: String,
    /// Unix timestamp (seconds)
    pub created_at: f64,
}

impl CourseDraft {
    pub fn from_summary(
        summary: &RecordingSummary,
        title: Option<&str>,
        is_public: bool,
        user_id: &str,
    ) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| summary.title.clone()),
            is_public,
            coordinates: summary.coordinates.clone(),
            distance_meters: summary.distance_meters,
            created_by: user_id.to_string(),
            created_at: summary.start_time,
        }
    }

    /// Materialize the draft under a store-assigned id.
    pub fn into_course(self, id: String) -> Course {
        Course {
            id,
            title: self.title,
            distance_meters: self.distance_meters,
            coordinates: self.coordinates,
            created_at: self.created_at,
            created_by: self.created_by,
            is_public: self.is_public,
            run_count: 0,
        }
    }
}

/// A completed run as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Course followed or created by this run
    pub course_id: Option<String>,
    pub user_id: String,
    /// Unix timestamp (seconds)
    pub started_at: f64,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub pace_seconds_per_km: f64,
    /// Every Nth recorded point as `{lat, lng}` maps
    pub trail: Vec<LatLng>,
}

impl RunRecord {
    pub fn from_summary(
        summary: &RecordingSummary,
        course_id: Option<String>,
        user_id: &str,
        trail_sample_step: u32,
    ) -> Self {
        Self {
            course_id,
            user_id: user_id.to_string(),
            started_at: summary.start_time,
            distance_meters: summary.distance_meters,
            duration_seconds: summary.elapsed_seconds,
            pace_seconds_per_km: pace_seconds_per_km(
                summary.distance_meters,
                summary.elapsed_seconds,
            ),
            trail: sample_trail(&summary.coordinates, trail_sample_step),
        }
    }
}

/// Average pace in seconds per kilometer; 0 when no distance was covered.
pub fn pace_seconds_per_km(distance_meters: f64, duration_seconds: f64) -> f64 {
    if distance_meters <= 0.0 {
        return 0.0;
    }
    duration_seconds / (distance_meters / 1000.0)
}

/// Keep every `step`-th point (indices 0, step, 2*step, ...).
pub fn sample_trail(points: &[Coordinate], step: u32) -> Vec<LatLng> {
    let step = step.max(1) as usize;
    let sampled: Vec<Coordinate> = points.iter().step_by(step).copied().collect();
    to_lat_lng_maps(&sampled)
}

/// Course and run storage, implemented by the host or by
/// [`crate::InMemoryCourseStore`] / `SqliteCourseStore`.
pub trait CourseStore: Send {
    /// Store a new course; returns its id.
    fn save_course(&mut self, draft: &CourseDraft) -> Result<String>;

    /// Store a run; returns its id. Increments the followed course's run count.
    fn save_run(&mut self, run: &RunRecord) -> Result<String>;

    fn load_course(&self, id: &str) -> Result<Option<Course>>;

    fn list_courses(&self) -> Result<Vec<Course>>;
}

/// Course store kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCourseStore {
    courses: Vec<Course>,
    runs: Vec<(String, RunRecord)>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> &[(String, RunRecord)] {
        &self.runs
    }
}

impl CourseStore for InMemoryCourseStore {
    fn save_course(&mut self, draft: &CourseDraft) -> Result<String> {
        let id = format!("course-{}", self.courses.len() + 1);
        self.courses.push(draft.clone().into_course(id.clone()));
        info!(
            "[CourseStore] Saved course {} ({} points)",
            id,
            draft.coordinates.len()
        );
        Ok(id)
    }

    fn save_run(&mut self, run: &RunRecord) -> Result<String> {
        let id = format!("run-{}", self.runs.len() + 1);
        if let Some(course_id) = &run.course_id {
            match self.courses.iter_mut().find(|c| &c.id == course_id) {
                Some(course) => course.run_count += 1,
                None => debug!("[CourseStore] Run for unknown course {}", course_id),
            }
        }
        self.runs.push((id.clone(), run.clone()));
        info!(
            "[CourseStore] Saved run {} ({:.0}m, {:.0}s)",
            id, run.distance_meters, run.duration_seconds
        );
        Ok(id)
    }

    fn load_course(&self, id: &str) -> Result<Option<Course>> {
        Ok(self.courses.iter().find(|c| c.id == id).cloned())
    }

    fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.clone())
    }
}
