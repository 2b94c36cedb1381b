//! SQLite round trip: record a run, save it as a course, reload the course
//! library from disk and follow the saved course in a second run.
//!
//! Run with: `cargo test --features persistence --test persistence`

#![cfg(feature = "persistence")]

use std::sync::Arc;

use course_tracker::{
    CollectingAnnouncer, Coordinate, CourseLibrary, CourseStore, EngineState, ManualClock,
    RunSession, SaveRequest, SqliteCourseStore, TrackingConfig, TrackingEvent,
};
use tempfile::TempDir;

const T0: f64 = 1_709_967_900.0;

fn setup() -> (RunSession, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let session = RunSession::new(
        TrackingConfig::default(),
        clock.clone(),
        Box::new(Arc::new(CollectingAnnouncer::new())),
    );
    (session, clock)
}

/// 25 points heading east, ~22m apart.
fn route() -> Vec<Coordinate> {
    (0..25)
        .map(|i| Coordinate::new(37.5, 127.1 + i as f64 * 0.00025))
        .collect()
}

#[test]
fn test_record_save_reload_and_follow() {
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("courses.db");
    let db_path = db_path.to_str().expect("utf-8 path");

    // First run creates the course
    let (mut session, clock) = setup();
    session.start_run();
    for point in route() {
        clock.advance(5.0);
        assert!(session.on_position(point).accepted);
    }
    session.stop_run().unwrap();

    let course_id = {
        let mut store = SqliteCourseStore::new(db_path).expect("failed to open store");
        let outcome = session
            .save(
                &mut store,
                &SaveRequest {
                    user_id: "author".to_string(),
                    save_as_course: true,
                    title: Some("Lakeside".to_string()),
                    is_public: true,
                },
            )
            .unwrap();
        let course_id = outcome.course_id.expect("course created");
        let runs = store.runs_for_course(&course_id).unwrap();
        assert_eq!(runs.len(), 1);
        // Every 10th of 25 points
        assert_eq!(runs[0].trail.len(), 3);
        course_id
    };

    // Reopen from disk
    let store = SqliteCourseStore::new(db_path).expect("failed to reopen store");
    let library = CourseLibrary::from_store(&store).unwrap();
    let course = library.require(&course_id).unwrap();
    assert_eq!(course.title, "Lakeside");
    assert_eq!(course.coordinates.len(), 25);
    assert_eq!(course.run_count, 1);
    assert_eq!(
        library.find_nearby(&Coordinate::new(37.5, 127.1), 200.0)[0].id,
        course_id
    );

    // Second run follows it to completion
    let (mut follower, clock) = setup();
    follower.start_run();
    follower.follow_course(course.clone()).unwrap();
    let mut completed = 0;
    for point in route() {
        clock.advance(5.0);
        completed += follower
            .on_position(point)
            .events
            .iter()
            .filter(|e| **e == TrackingEvent::Completed)
            .count();
    }
    assert_eq!(completed, 1);
    assert_eq!(follower.engine().phase(), EngineState::Completed);
    follower.stop_run().unwrap();

    let mut store = store;
    let outcome = follower
        .save(
            &mut store,
            &SaveRequest {
                user_id: "follower".to_string(),
                ..SaveRequest::default()
            },
        )
        .unwrap();
    assert_eq!(outcome.course_id, None);

    let reloaded = store.load_course(&course_id).unwrap().unwrap();
    assert_eq!(reloaded.run_count, 2);
    assert_eq!(store.runs_for_course(&course_id).unwrap().len(), 2);
}
