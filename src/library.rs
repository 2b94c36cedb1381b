//! Loaded courses with spatial lookup.
//!
//! Courses are kept behind `Arc` so a follow session shares the path with
//! the library instead of copying it. An R-tree over course bounding boxes
//! answers "which courses start or pass near me" without scanning every path.

use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use rstar::{RTree, AABB};

use crate::error::{OptionExt, Result};
use crate::geo_utils::{closest_point, meters_to_degrees};
use crate::store::CourseStore;
use crate::{Coordinate, Course, CourseBounds};

/// In-memory set of courses available to follow.
#[derive(Default)]
pub struct CourseLibrary {
    courses: HashMap<String, Arc<Course>>,
    spatial_index: RTree<CourseBounds>,
}

impl CourseLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from every course in a store.
    pub fn from_store(store: &dyn CourseStore) -> Result<Self> {
        let mut library = Self::new();
        for course in store.list_courses()? {
            library.insert(course);
        }
        info!("[CourseLibrary] Loaded {} courses", library.len());
        Ok(library)
    }

    /// Add or replace a course. Returns the shared handle.
    pub fn insert(&mut self, course: Course) -> Arc<Course> {
        let course = Arc::new(course);
        let replaced = self
            .courses
            .insert(course.id.clone(), course.clone())
            .is_some();
        if replaced {
            self.rebuild_spatial_index();
        } else if let Some(bounds) = course.bounds() {
            self.spatial_index.insert(CourseBounds {
                course_id: course.id.clone(),
                bounds,
            });
        }
        course
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<Course>> {
        let removed = self.courses.remove(id);
        if removed.is_some() {
            self.rebuild_spatial_index();
        }
        removed
    }

    fn rebuild_spatial_index(&mut self) {
        let entries: Vec<CourseBounds> = self
            .courses
            .values()
            .filter_map(|course| {
                course.bounds().map(|bounds| CourseBounds {
                    course_id: course.id.clone(),
                    bounds,
                })
            })
            .collect();
        self.spatial_index = RTree::bulk_load(entries);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Course>> {
        self.courses.get(id).cloned()
    }

    /// Like [`CourseLibrary::get`] but reports a missing id as an error.
    pub fn require(&self, id: &str) -> Result<Arc<Course>> {
        self.get(id).ok_or_course_not_found(id)
    }

    /// Courses with at least one path point within `radius_meters` of
    /// `point`, nearest first.
    pub fn find_nearby(&self, point: &Coordinate, radius_meters: f64) -> Vec<Arc<Course>> {
        let (dlat, dlng) = meters_to_degrees(radius_meters, point.lat);
        let envelope = AABB::from_corners(
            [point.lng - dlng, point.lat - dlat],
            [point.lng + dlng, point.lat + dlat],
        );

        let mut hits: Vec<(f64, Arc<Course>)> = self
            .spatial_index
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|entry| self.courses.get(&entry.course_id))
            .filter_map(|course| {
                closest_point(&course.coordinates, point)
                    .filter(|(_, distance)| *distance <= radius_meters)
                    .map(|(_, distance)| (distance, course.clone()))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.into_iter().map(|(_, course)| course).collect()
    }

    /// Public courses, sorted by title.
    pub fn public_courses(&self) -> Vec<Arc<Course>> {
        let mut courses: Vec<Arc<Course>> = self
            .courses
            .values()
            .filter(|c| c.is_public)
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        courses
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
