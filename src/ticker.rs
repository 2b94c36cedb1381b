//! Periodic tick on a background thread.
//!
//! Drives the recording session's elapsed-time refresh. The thread sleeps on
//! a channel with a timeout, so stopping wakes it immediately and no tick
//! fires after the stop signal has been received. The tick callback can also
//! end the thread by returning `false`.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

/// Handle to a running ticker. Dropping it stops the thread.
pub struct ElapsedTicker {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ElapsedTicker {
    /// Call `on_tick` every `interval` until stopped or until it returns `false`.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !on_tick() {
                        debug!("[Ticker] Finished");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        debug!("[Ticker] Started ({:?})", interval);
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signal the thread to exit without waiting for it.
    ///
    /// Use this when the tick callback may be blocked on a lock the caller
    /// holds; the thread finishes its current callback and exits.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
            debug!("[Ticker] Stopped");
        }
        self.handle = None;
    }

    /// Signal the thread to exit and wait until it has.
    pub fn stop_and_join(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
            && self
                .handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_ticks_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let mut ticker = ElapsedTicker::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        thread::sleep(Duration::from_millis(100));
        ticker.stop_and_join();
        assert!(!ticker.is_running());

        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 1);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_drop_stops_thread() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let ticker = ElapsedTicker::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        drop(ticker);
        thread::sleep(Duration::from_millis(30));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_callback_can_finish() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let ticker = ElapsedTicker::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst) + 1 < 3
        });
        thread::sleep(Duration::from_millis(200));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!ticker.is_running());
    }
}
