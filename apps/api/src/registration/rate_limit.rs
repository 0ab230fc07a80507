use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Abuse mitigation for the registration endpoint: a fixed window of
/// attempts per client address. In-process and non-durable on purpose; it
/// resets on restart and is not part of the correctness-critical path.
pub struct FixedWindowLimiter {
    window: Duration,
    max_attempts: u32,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// 3 registration attempts per 15 minutes per address.
pub const REGISTRATION_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const REGISTRATION_MAX_ATTEMPTS: u32 = 3;

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_attempts: u32) -> Self {
        FixedWindowLimiter {
            window,
            max_attempts,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt for `key` and reports whether it is allowed.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get_mut(key) {
            Some(entry) if now < entry.reset_at => {
                if entry.count >= self.max_attempts {
                    return false;
                }
                entry.count += 1;
                true
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        FixedWindowLimiter::new(REGISTRATION_WINDOW, REGISTRATION_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_attempts() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 3);
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now));
        assert!(limiter.check_at("5.6.7.8", now));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now));
        assert!(!limiter.check_at("1.2.3.4", now + Duration::from_secs(59)));
        assert!(limiter.check_at("1.2.3.4", now + Duration::from_secs(61)));
    }

    #[test]
    fn test_blocked_attempts_do_not_extend_window() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.check_at("1.2.3.4", now));
        for i in 0..5 {
            assert!(!limiter.check_at("1.2.3.4", now + Duration::from_secs(i)));
        }
        assert!(limiter.check_at("1.2.3.4", now + Duration::from_secs(61)));
    }
}
