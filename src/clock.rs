//! Time sources.
//!
//! Recording timestamps, elapsed time and the announcement debounce all read
//! an injected [`Clock`] so runs can be replayed and tested deterministically.

use std::sync::Mutex;

/// A source of unix time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: f64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, seconds: f64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += seconds;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|guard| *guard).unwrap_or(0.0)
    }
}
