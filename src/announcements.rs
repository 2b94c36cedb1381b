//! # Announcement Policy
//!
//! Turns [`TrackingEvent`]s into at most one spoken/haptic notification each,
//! globally rate-limited.
//!
//! - Normal-priority announcements are dropped if one was delivered less than
//!   `announcement_interval_secs` ago.
//! - High-priority announcements are always delivered and restart the window.
//!
//! Deduplication of repeated states is not done here; the recording session
//! and tracking engine only emit events on edges.

use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::events::{Priority, TrackingEvent};

/// Haptic feedback hook triggered alongside some announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum HapticPattern {
    /// Off course
    Warning,
    /// Back on course, course completed
    Success,
    /// Distance and progress milestones
    Notice,
}

impl HapticPattern {
    pub fn for_event(event: &TrackingEvent) -> Option<Self> {
        match event {
            TrackingEvent::OffCourse => Some(HapticPattern::Warning),
            TrackingEvent::BackOnCourse | TrackingEvent::Completed => Some(HapticPattern::Success),
            TrackingEvent::DistanceMilestone(_) | TrackingEvent::ProgressMilestone(_) => {
                Some(HapticPattern::Notice)
            }
            _ => None,
        }
    }
}

/// Speech/haptic playback, implemented by the host.
///
/// Calls are fire-and-forget; playback failures stay on the host side.
pub trait Announcer: Send + Sync {
    fn announce(&self, message: &str, priority: Priority);

    fn haptic(&self, _pattern: HapticPattern) {}
}

impl<T: Announcer + ?Sized> Announcer for Arc<T> {
    fn announce(&self, message: &str, priority: Priority) {
        (**self).announce(message, priority)
    }

    fn haptic(&self, pattern: HapticPattern) {
        (**self).haptic(pattern)
    }
}

/// Announcer that writes to the log. Default until the host installs one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&self, message: &str, priority: Priority) {
        info!("[Announcer] ({:?}) {}", priority, message);
    }
}

/// Announcer that keeps everything it is asked to play.
/// Useful for testing and for hosts that render announcements as text.
#[derive(Debug, Default)]
pub struct CollectingAnnouncer {
    pub messages: Mutex<Vec<(String, Priority)>>,
    pub haptics: Mutex<Vec<HapticPattern>>,
}

impl CollectingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.iter().map(|(text, _)| text.clone()).collect())
            .unwrap_or_default()
    }

    pub fn haptics(&self) -> Vec<HapticPattern> {
        self.haptics.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl Announcer for CollectingAnnouncer {
    fn announce(&self, message: &str, priority: Priority) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((message.to_string(), priority));
        }
    }

    fn haptic(&self, pattern: HapticPattern) {
        if let Ok(mut haptics) = self.haptics.lock() {
            haptics.push(pattern);
        }
    }
}

/// Global minimum-interval gate.
#[derive(Debug, Clone)]
pub struct AnnouncementPolicy {
    min_interval_secs: f64,
    last_announced_at: Option<f64>,
}

impl AnnouncementPolicy {
    pub fn new(min_interval_secs: f64) -> Self {
        Self {
            min_interval_secs,
            last_announced_at: None,
        }
    }

    /// Decide whether an announcement at `now` goes out, updating the window
    /// if it does.
    pub fn should_announce(&mut self, priority: Priority, now: f64) -> bool {
        if priority == Priority::Normal {
            if let Some(last) = self.last_announced_at {
                if now - last < self.min_interval_secs {
                    return false;
                }
            }
        }
        self.last_announced_at = Some(now);
        true
    }

    pub fn last_announced_at(&self) -> Option<f64> {
        self.last_announced_at
    }
}

/// An announcement that passed the policy and is waiting to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub message: String,
    pub priority: Priority,
    pub haptic: Option<HapticPattern>,
}

impl Announcement {
    pub fn for_event(event: &TrackingEvent) -> Self {
        Self {
            message: event.message(),
            priority: event.priority(),
            haptic: HapticPattern::for_event(event),
        }
    }

    /// Play on the host announcer.
    pub fn deliver(&self, announcer: &dyn Announcer) {
        announcer.announce(&self.message, self.priority);
        if let Some(pattern) = self.haptic {
            announcer.haptic(pattern);
        }
    }
}

/// Play a batch of approved announcements in order.
pub fn deliver_all(announcer: &dyn Announcer, announcements: &[Announcement]) {
    for announcement in announcements {
        announcement.deliver(announcer);
    }
}

/// Runs events through the policy.
///
/// Returns the approved [`Announcement`]s instead of playing them, so callers
/// holding a lock can hand them to the host after releasing it.
pub struct AnnouncementDispatcher {
    policy: AnnouncementPolicy,
    clock: Arc<dyn Clock>,
    delivered: u64,
    suppressed: u64,
}

impl AnnouncementDispatcher {
    pub fn new(min_interval_secs: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy: AnnouncementPolicy::new(min_interval_secs),
            clock,
            delivered: 0,
            suppressed: 0,
        }
    }

    /// Approve one event if the policy allows.
    pub fn dispatch(&mut self, event: &TrackingEvent) -> Option<Announcement> {
        if !self.policy.should_announce(event.priority(), self.clock.now()) {
            self.suppressed += 1;
            debug!("[Announcer] Suppressed: {}", event);
            return None;
        }
        self.delivered += 1;
        Some(Announcement::for_event(event))
    }

    /// Approve events in order.
    pub fn dispatch_all(&mut self, events: &[TrackingEvent]) -> Vec<Announcement> {
        events.iter().filter_map(|event| self.dispatch(event)).collect()
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    pub fn policy(&self) -> &AnnouncementPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::tracking::NavigationInstruction;

    #[test]
    fn test_normal_priority_debounced() {
        let mut policy = AnnouncementPolicy::new(5.0);
        assert!(policy.should_announce(Priority::Normal, 0.0));
        assert!(!policy.should_announce(Priority::Normal, 4.9));
        assert!(policy.should_announce(Priority::Normal, 5.0));
    }

    #[test]
    fn test_high_priority_always_fires_and_resets_window() {
        let mut policy = AnnouncementPolicy::new(5.0);
        assert!(policy.should_announce(Priority::Normal, 0.0));
        assert!(policy.should_announce(Priority::High, 1.0));
        assert!(policy.should_announce(Priority::High, 1.5));
        // Window now measured from 1.5
        assert!(!policy.should_announce(Priority::Normal, 6.0));
        assert!(policy.should_announce(Priority::Normal, 6.5));
    }

    #[test]
    fn test_dispatcher_counts_and_haptics() {
        let clock = Arc::new(ManualClock::new(0.0));
        let announcer = CollectingAnnouncer::new();
        let mut dispatcher = AnnouncementDispatcher::new(5.0, clock.clone());

        let approved = dispatcher.dispatch_all(&[
            TrackingEvent::OffCourse,
            TrackingEvent::ProgressMilestone(25),
            TrackingEvent::Navigation(NavigationInstruction::Continue),
        ]);
        assert_eq!(approved.len(), 1);
        assert_eq!(dispatcher.suppressed_count(), 2);
        // Nothing is played until the caller delivers
        assert!(announcer.messages().is_empty());
        deliver_all(&announcer, &approved);

        clock.advance(6.0);
        let milestone = dispatcher
            .dispatch(&TrackingEvent::ProgressMilestone(50))
            .unwrap();
        milestone.deliver(&announcer);

        assert_eq!(dispatcher.delivered_count(), 2);
        assert_eq!(announcer.messages().len(), 2);
        assert_eq!(
            announcer.haptics(),
            vec![HapticPattern::Warning, HapticPattern::Notice]
        );
    }

    #[test]
    fn test_haptic_mapping() {
        assert_eq!(HapticPattern::for_event(&TrackingEvent::RunStarted), None);
        assert_eq!(
            HapticPattern::for_event(&TrackingEvent::Completed),
            Some(HapticPattern::Success)
        );
    }
}
