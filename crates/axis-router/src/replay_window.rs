//! The sliding replay window: rejects a `messageId` seen within the
//! configured window (spec §4.2 "Verification" step 3, GLOSSARY "Replay
//! window").
//!
//! Bounded by `max_size` (spec §6 `maxReplayWindowSize`) the same way
//! `axis-cache`'s caches are bounded - oldest-first eviction once the
//! size cap is hit, independent of whether entries have aged out yet.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

pub struct ReplayWindow {
    window: Duration,
    max_size: usize,
    seen: Mutex<Seen>,
}

struct Seen {
    ids: HashMap<String, DateTime<Utc>>,
    order: VecDeque<String>,
}

impl ReplayWindow {
    pub fn new(window_ms: u64, max_size: usize) -> Self {
        Self {
            window: Duration::milliseconds(window_ms as i64),
            max_size,
            seen: Mutex::new(Seen {
                ids: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// The configured window, so callers can apply the same staleness bound
    /// to a timestamp check before the message id is even recorded.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// `true` iff `message_id` had not been recorded within the window as
    /// of `now`. Also performs the recording, so this doubles as
    /// "check-and-insert" - callers must treat a single call as the
    /// authoritative replay check, not call it speculatively.
    pub fn check_and_record(&self, message_id: &str, now: DateTime<Utc>) -> bool {
        let mut guard = self.seen.lock().expect("replay window poisoned");
        self.prune(&mut guard, now);

        if let Some(seen_at) = guard.ids.get(message_id) {
            if now - *seen_at <= self.window {
                return false;
            }
        }

        guard.ids.insert(message_id.to_string(), now);
        guard.order.push_back(message_id.to_string());

        while guard.order.len() > self.max_size {
            if let Some(oldest) = guard.order.pop_front() {
                guard.ids.remove(&oldest);
            }
        }

        true
    }

    fn prune(&self, guard: &mut Seen, now: DateTime<Utc>) {
        while let Some(front) = guard.order.front() {
            match guard.ids.get(front) {
                Some(seen_at) if now - *seen_at > self.window => {
                    let id = guard.order.pop_front().unwrap();
                    guard.ids.remove(&id);
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_accepted() {
        let window = ReplayWindow::new(60_000, 10_000);
        assert!(window.check_and_record("msg-1", Utc::now()));
    }

    #[test]
    fn duplicate_within_window_is_rejected() {
        let window = ReplayWindow::new(60_000, 10_000);
        let now = Utc::now();
        assert!(window.check_and_record("msg-1", now));
        assert!(!window.check_and_record("msg-1", now + Duration::seconds(10)));
    }

    #[test]
    fn id_reusable_after_window_expires() {
        let window = ReplayWindow::new(60_000, 10_000);
        let now = Utc::now();
        assert!(window.check_and_record("msg-1", now));
        assert!(window.check_and_record("msg-1", now + Duration::seconds(61)));
    }

    #[test]
    fn oldest_entries_evicted_once_max_size_exceeded() {
        let window = ReplayWindow::new(60_000, 2);
        let now = Utc::now();
        assert!(window.check_and_record("msg-1", now));
        assert!(window.check_and_record("msg-2", now));
        assert!(window.check_and_record("msg-3", now));
        // msg-1 was evicted to make room, so it's treated as unseen again.
        assert!(window.check_and_record("msg-1", now));
    }
}
