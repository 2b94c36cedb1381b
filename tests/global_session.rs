//! Tests against the process-wide `SESSION`: announcer re-entry and the
//! elapsed-time ticker. They share global state, so each one holds `SERIAL`.
//!
//! Run with: `cargo test --test global_session`

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use course_tracker::{
    replace_session, session_ticker_running, start_session_ticker, stop_session_ticker,
    with_session, Announcer, Priority, RunSession, SystemClock, TrackingConfig, SESSION,
};

static SERIAL: Mutex<()> = Mutex::new(());

/// Records whether the session was unlocked during each announcement, and
/// reads the session back when it was.
#[derive(Default)]
struct ReentrantAnnouncer {
    unlocked: Mutex<Vec<bool>>,
}

impl Announcer for ReentrantAnnouncer {
    fn announce(&self, _message: &str, _priority: Priority) {
        let free = SESSION.try_lock().is_ok();
        if free {
            assert!(with_session(|s| s.snapshot()).is_some());
        }
        if let Ok(mut unlocked) = self.unlocked.lock() {
            unlocked.push(free);
        }
    }
}

#[test]
fn test_announcer_can_reenter_session() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

    let announcer = Arc::new(ReentrantAnnouncer::default());
    replace_session(RunSession::new(
        TrackingConfig::default(),
        Arc::new(SystemClock),
        Box::new(announcer.clone()),
    ));

    with_session(|s| s.start_run()).unwrap();
    with_session(|s| s.pause()).unwrap();

    let unlocked = announcer.unlocked.lock().unwrap().clone();
    assert_eq!(unlocked, vec![true, true]);

    with_session(|s| s.discard());
}

#[test]
fn test_ticker_advances_and_ends_with_run() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

    let config = TrackingConfig {
        tick_interval_millis: 10,
        ..TrackingConfig::default()
    };
    replace_session(RunSession::new(
        config,
        Arc::new(SystemClock),
        Box::new(course_tracker::LogAnnouncer),
    ));

    with_session(|s| s.start_run()).unwrap();
    start_session_ticker();
    thread::sleep(Duration::from_millis(250));

    let elapsed = with_session(|s| s.snapshot().elapsed_seconds).unwrap();
    assert!(elapsed > 0.0, "elapsed was {}", elapsed);
    assert!(session_ticker_running());

    // Nothing recorded, so this is NoData, but the recording is inactive
    assert!(with_session(|s| s.stop_run()).unwrap().is_err());
    thread::sleep(Duration::from_millis(150));
    assert!(!session_ticker_running());

    let frozen = with_session(|s| s.snapshot().elapsed_seconds).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(with_session(|s| s.snapshot().elapsed_seconds).unwrap(), frozen);

    stop_session_ticker();
}
