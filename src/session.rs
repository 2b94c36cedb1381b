//! # Run Session
//!
//! Ties one recording session, one course tracking engine and one
//! announcement dispatcher together behind a single serialized entry point.
//!
//! Positions go to the recording first; only accepted points reach the
//! engine. Every resulting event is run through the announcement policy and
//! approved announcements are queued; the session never calls the host while
//! it is mutating state.
//!
//! The process-wide [`SESSION`] singleton lets FFI calls share one session
//! without passing state across the boundary; all access goes through its
//! mutex, so updates for a session never run concurrently. [`with_session`]
//! plays the queued announcements after the lock is released, so a host
//! announcer may call back into the session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::announcements::{
    deliver_all, Announcement, AnnouncementDispatcher, Announcer, LogAnnouncer,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TrackerError};
use crate::events::TrackingEvent;
use crate::recording::{PositionDecision, RecordingPhase, RecordingSession, RecordingSummary};
use crate::store::{CourseDraft, CourseStore, RunRecord};
use crate::ticker::ElapsedTicker;
use crate::tracking::{CourseTrackingEngine, EngineState, NavigationInstruction, TrackingState};
use crate::{Coordinate, Course, TrackingConfig};

/// What the user chose when confirming a save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveRequest {
    pub user_id: String,
    /// Also store the trace as a new reusable course
    pub save_as_course: bool,
    /// Course title; the recording's default title when empty
    pub title: Option<String>,
    pub is_public: bool,
}

/// Ids assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub run_id: String,
    pub course_id: Option<String>,
}

/// Result of feeding one position into the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionOutcome {
    /// Whether the recording kept the point
    pub accepted: bool,
    pub events: Vec<TrackingEvent>,
    /// How many of the events passed the announcement policy
    pub announced: usize,
}

/// Read-only view of the session for UI layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub recording_phase: RecordingPhase,
    pub elapsed_seconds: f64,
    pub distance_meters: f64,
    pub point_count: usize,
    pub engine_state: EngineState,
    pub course_id: Option<String>,
    pub tracking: TrackingState,
    pub navigation: String,
    pub announcements_delivered: u64,
    pub announcements_suppressed: u64,
}

/// One user's run: recording plus optional course following.
pub struct RunSession {
    config: TrackingConfig,
    recording: RecordingSession,
    engine: CourseTrackingEngine,
    dispatcher: AnnouncementDispatcher,
    announcer: Arc<dyn Announcer>,
    /// Approved announcements not yet played
    outbox: Vec<Announcement>,
    /// Kept after the engine stops so the run can be saved against the course
    followed_course_id: Option<String>,
}

impl RunSession {
    pub fn new(config: TrackingConfig, clock: Arc<dyn Clock>, announcer: Box<dyn Announcer>) -> Self {
        Self {
            recording: RecordingSession::new(&config, clock.clone()),
            engine: CourseTrackingEngine::new(config.clone()),
            dispatcher: AnnouncementDispatcher::new(config.announcement_interval_secs, clock),
            announcer: Arc::from(announcer),
            outbox: Vec::new(),
            followed_course_id: None,
            config,
        }
    }

    /// Wall clock, default config, announcements to the log.
    pub fn with_defaults() -> Self {
        Self::new(
            TrackingConfig::default(),
            Arc::new(SystemClock),
            Box::new(LogAnnouncer),
        )
    }

    pub fn set_announcer(&mut self, announcer: Box<dyn Announcer>) {
        self.announcer = Arc::from(announcer);
    }

    pub fn announcer(&self) -> Arc<dyn Announcer> {
        self.announcer.clone()
    }

    fn queue(&mut self, event: &TrackingEvent) -> bool {
        match self.dispatcher.dispatch(event) {
            Some(announcement) => {
                self.outbox.push(announcement);
                true
            }
            None => false,
        }
    }

    /// Hand over the approved announcements that have not been played yet.
    pub fn take_announcements(&mut self) -> Vec<Announcement> {
        std::mem::take(&mut self.outbox)
    }

    /// Play queued announcements on the installed announcer. Returns how many
    /// were played.
    ///
    /// Call this without holding any lock the announcer may need;
    /// [`with_session`] does it after releasing the global session.
    pub fn flush_announcements(&mut self) -> usize {
        let pending = self.take_announcements();
        deliver_all(self.announcer.as_ref(), &pending);
        pending.len()
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Begin a new recording, dropping any unsaved one.
    ///
    /// The run is attached to a course only if one is being followed now.
    pub fn start_run(&mut self) {
        if self.recording.phase() == RecordingPhase::PendingSave {
            warn!("[RunSession] Starting over an unsaved recording");
        }
        if !self.engine.is_following() {
            self.followed_course_id = None;
        }
        let event = self.recording.start();
        self.queue(&event);
    }

    pub fn pause(&mut self) -> bool {
        match self.recording.pause() {
            Some(event) => self.queue(&event),
            None => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        match self.recording.resume() {
            Some(event) => self.queue(&event),
            None => false,
        }
    }

    /// Refresh elapsed time. Returns the elapsed seconds.
    pub fn tick(&mut self) -> f64 {
        self.recording.tick()
    }

    /// Feed one position from the position source.
    pub fn on_position(&mut self, coord: Coordinate) -> PositionOutcome {
        let mut events = Vec::new();
        let accepted = match self.recording.add_position(coord) {
            PositionDecision::Accepted { point, milestone } => {
                events.extend(milestone);
                events.extend(self.engine.update(&point));
                true
            }
            PositionDecision::Rejected(_) => false,
        };
        let approved = self.dispatcher.dispatch_all(&events);
        let announced = approved.len();
        self.outbox.extend(approved);
        PositionOutcome {
            accepted,
            events,
            announced,
        }
    }

    /// Stop recording and course following.
    ///
    /// On success the trace waits for [`RunSession::save`] or
    /// [`RunSession::discard`].
    pub fn stop_run(&mut self) -> Result<RecordingSummary> {
        self.engine.stop();
        let result = self.recording.stop();
        if result.is_err() {
            self.followed_course_id = None;
        }
        result
    }

    /// Persist the pending recording. The recording stays pending if the
    /// store fails, so the save can be retried.
    pub fn save(&mut self, store: &mut dyn CourseStore, request: &SaveRequest) -> Result<SaveOutcome> {
        let summary = self
            .recording
            .pending_summary()
            .ok_or_else(|| TrackerError::InvalidState {
                message: "no stopped recording to save".to_string(),
            })?;

        let created_course_id = if request.save_as_course {
            let draft = CourseDraft::from_summary(
                &summary,
                request.title.as_deref(),
                request.is_public,
                &request.user_id,
            );
            Some(store.save_course(&draft)?)
        } else {
            None
        };

        let run_course_id = self
            .followed_course_id
            .clone()
            .or_else(|| created_course_id.clone());
        let run = RunRecord::from_summary(
            &summary,
            run_course_id,
            &request.user_id,
            self.config.trail_sample_step,
        );
        let run_id = store.save_run(&run)?;

        self.recording.discard();
        self.followed_course_id = None;
        info!("[RunSession] Saved run {}", run_id);
        Ok(SaveOutcome {
            run_id,
            course_id: created_course_id,
        })
    }

    /// Drop the current or pending recording.
    pub fn discard(&mut self) {
        self.recording.discard();
        self.engine.stop();
        self.followed_course_id = None;
    }

    // ========================================================================
    // Course following
    // ========================================================================

    /// Start following a course. An empty course leaves the engine inert and
    /// returns [`TrackerError::InvalidCourse`].
    pub fn follow_course(&mut self, course: Arc<Course>) -> Result<()> {
        let course_id = course.id.clone();
        match self.engine.start(course) {
            Ok(event) => {
                self.followed_course_id = Some(course_id);
                self.queue(&event);
                Ok(())
            }
            Err(err) => {
                self.followed_course_id = None;
                Err(err)
            }
        }
    }

    pub fn stop_following(&mut self) {
        self.engine.stop();
        self.followed_course_id = None;
    }

    pub fn navigation_instruction(&self) -> NavigationInstruction {
        self.engine.navigation_instruction()
    }

    /// Offer the current guidance to the announcer (normal priority).
    pub fn announce_navigation(&mut self) -> bool {
        let instruction = self.engine.navigation_instruction();
        self.queue(&TrackingEvent::Navigation(instruction))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            recording_phase: self.recording.phase(),
            elapsed_seconds: self.recording.elapsed_seconds(),
            distance_meters: self.recording.distance_meters(),
            point_count: self.recording.coordinates().len(),
            engine_state: self.engine.phase(),
            course_id: self.followed_course_id.clone(),
            tracking: self.engine.state().clone(),
            navigation: self.engine.navigation_instruction().to_string(),
            announcements_delivered: self.dispatcher.delivered_count(),
            announcements_suppressed: self.dispatcher.suppressed_count(),
        }
    }

    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    pub fn engine(&self) -> &CourseTrackingEngine {
        &self.engine
    }

    pub fn dispatcher(&self) -> &AnnouncementDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global session instance.
pub static SESSION: Lazy<Mutex<RunSession>> = Lazy::new(|| Mutex::new(RunSession::with_defaults()));

static TICKER: Lazy<Mutex<Option<ElapsedTicker>>> = Lazy::new(|| Mutex::new(None));

/// Run `f` with exclusive access to the global session, then play any
/// announcements it queued once the lock is released.
///
/// Returns `None` if the session lock is poisoned.
pub fn with_session<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut RunSession) -> R,
{
    let (result, announcer, pending) = {
        let mut guard = SESSION.lock().ok()?;
        let result = f(&mut guard);
        (result, guard.announcer(), guard.take_announcements())
    };
    deliver_all(announcer.as_ref(), &pending);
    Some(result)
}

/// Replace the global session (e.g. with a custom config or clock).
pub fn replace_session(session: RunSession) {
    stop_session_ticker();
    if let Some(()) = with_session(|s| *s = session) {
        info!("[RunSession] Global session replaced");
    }
}

/// Start ticking the global session's elapsed time. Replaces any running ticker.
///
/// Call after `start_run`. The ticker exits on its own at the first tick
/// that finds the recording inactive, so stopping or discarding the run
/// through [`with_session`] also ends it; [`stop_session_ticker`] ends it
/// immediately.
pub fn start_session_ticker() {
    let interval = with_session(|s| s.config().tick_interval_millis).unwrap_or(1000);
    let ticker = ElapsedTicker::spawn(Duration::from_millis(interval), || {
        with_session(|s| {
            s.tick();
            s.recording().is_active()
        })
        .unwrap_or(false)
    });
    if let Ok(mut guard) = TICKER.lock() {
        *guard = Some(ticker);
    }
}

/// Whether the global ticker thread is still alive.
pub fn session_ticker_running() -> bool {
    TICKER
        .lock()
        .map(|guard| guard.as_ref().is_some_and(ElapsedTicker::is_running))
        .unwrap_or(false)
}

/// Stop the global ticker. Must not be called while holding the session lock
/// if the caller needs the thread gone before continuing.
pub fn stop_session_ticker() {
    if let Ok(mut guard) = TICKER.lock() {
        if let Some(mut ticker) = guard.take() {
            ticker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::announcements::CollectingAnnouncer;
    use crate::clock::ManualClock;
    use crate::store::InMemoryCourseStore;

    fn session() -> (RunSession, Arc<ManualClock>, Arc<CollectingAnnouncer>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let announcer = Arc::new(CollectingAnnouncer::new());
        let session = RunSession::new(
            TrackingConfig::default(),
            clock.clone(),
            Box::new(announcer.clone()),
        );
        (session, clock, announcer)
    }

    fn line_course(points: usize) -> Arc<Course> {
        let coords = (0..points)
            .map(|i| Coordinate::new(0.0, i as f64 * 0.0001))
            .collect();
        Arc::new(Course::new("course-line", "Line", coords))
    }

    #[test]
    fn test_rejected_points_skip_engine() {
        let (mut s, _, _) = session();
        s.follow_course(line_course(20)).unwrap();
        // Not recording yet
        let outcome = s.on_position(Coordinate::new(0.0, 0.001));
        assert!(!outcome.accepted);
        assert_eq!(s.engine().state().current_index, 0);
    }

    #[test]
    fn test_follow_and_announce() {
        let (mut s, clock, announcer) = session();
        s.start_run();
        s.follow_course(line_course(20)).unwrap();
        clock.advance(1.0);
        let outcome = s.on_position(Coordinate::new(0.0, 0.0));
        assert!(outcome.accepted);

        clock.advance(1.0);
        let outcome = s.on_position(Coordinate::new(0.001, 0.0));
        assert_eq!(outcome.events, vec![TrackingEvent::OffCourse]);
        assert_eq!(outcome.announced, 1);

        // Queued, not yet played
        assert!(announcer.messages().is_empty());
        assert_eq!(s.flush_announcements(), 3);
        let messages = announcer.messages();
        assert_eq!(messages[0], "Run started.");
        assert!(messages[1].starts_with("Starting course Line"));
        assert!(messages[2].contains("off the course"));
    }

    #[test]
    fn test_save_with_course_creation() {
        let (mut s, clock, _) = session();
        let mut store = InMemoryCourseStore::new();
        s.start_run();
        s.on_position(Coordinate::new(0.0, 0.0));
        clock.advance(30.0);
        s.on_position(Coordinate::new(0.0, 0.001));
        s.stop_run().unwrap();

        let outcome = s
            .save(
                &mut store,
                &SaveRequest {
                    user_id: "u1".to_string(),
                    save_as_course: true,
                    title: Some("Lunch loop".to_string()),
                    is_public: true,
                },
            )
            .unwrap();
        assert_eq!(outcome.course_id.as_deref(), Some("course-1"));
        assert_eq!(store.runs()[0].1.course_id.as_deref(), Some("course-1"));
        assert_eq!(s.recording().phase(), RecordingPhase::Idle);

        // Nothing left to save
        assert!(matches!(
            s.save(&mut store, &SaveRequest::default()),
            Err(TrackerError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_stop_run_without_points() {
        let (mut s, _, _) = session();
        s.start_run();
        s.follow_course(line_course(5)).unwrap();
        assert_eq!(s.stop_run(), Err(TrackerError::NoData));
        let snapshot = s.snapshot();
        assert_eq!(snapshot.recording_phase, RecordingPhase::Idle);
        assert_eq!(snapshot.engine_state, EngineState::Idle);
        assert_eq!(snapshot.course_id, None);
    }

    #[test]
    fn test_new_run_drops_stale_course() {
        let (mut s, clock, _) = session();
        s.start_run();
        s.follow_course(line_course(20)).unwrap();
        s.on_position(Coordinate::new(0.0, 0.0));
        s.stop_run().unwrap();
        assert_eq!(s.snapshot().course_id.as_deref(), Some("course-line"));

        // Unsaved run replaced by an unguided one
        s.start_run();
        assert_eq!(s.snapshot().course_id, None);
        clock.advance(10.0);
        s.on_position(Coordinate::new(0.0, 0.0));

        // Following before starting keeps the course attached
        s.discard();
        s.follow_course(line_course(20)).unwrap();
        s.start_run();
        assert_eq!(s.snapshot().course_id.as_deref(), Some("course-line"));
    }

    #[test]
    fn test_pause_resume_announced() {
        let (mut s, clock, announcer) = session();
        s.start_run();
        assert!(s.pause());
        assert!(!s.pause());
        clock.advance(1.0);
        assert!(s.resume());
        s.flush_announcements();
        assert_eq!(
            announcer.messages(),
            vec!["Run started.", "Run paused.", "Run resumed."]
        );
    }

    #[test]
    fn test_navigation_announcement_debounced() {
        let (mut s, clock, _) = session();
        s.start_run();
        // RunStarted just went out; normal chatter waits for the window
        assert!(!s.announce_navigation());
        clock.advance(5.0);
        assert!(s.announce_navigation());
        assert!(!s.announce_navigation());

        let snapshot = s.snapshot();
        assert_eq!(snapshot.announcements_delivered, 2);
        assert_eq!(snapshot.announcements_suppressed, 2);
    }
}
