//! Cooldown tracking for failed proxies

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct CooldownTracker {
    /// proxy name -> (available_at, reason)
    entries: DashMap<String, (Instant, String)>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Put a proxy on cooldown
    pub fn mark(&self, name: &str, duration: Duration, reason: &str) {
        let until = Instant::now() + duration;
        // Keep long reasons (solver stack traces) readable in logs
        let reason: String = reason.chars().take(200).collect();
        tracing::warn!("Proxy {} cooling down for {}s: {}", name, duration.as_secs(), reason);
        self.entries.insert(name.to_string(), (until, reason));
    }

    /// Check if proxy is currently cooling down
    pub fn is_cooling(&self, name: &str) -> bool {
        if let Some(entry) = self.entries.get(name) {
            if Instant::now() < entry.0 {
                return true;
            }
            // Expired, remove it
            drop(entry);
            self.entries.remove(name);
        }
        false
    }

    /// Remaining cooldown (None if available)
    pub fn remaining(&self, name: &str) -> Option<Duration> {
        let entry = self.entries.get(name)?;
        let now = Instant::now();
        if now < entry.0 {
            Some(entry.0 - now)
        } else {
            None
        }
    }

    pub fn reason(&self, name: &str) -> Option<String> {
        self.entries.get(name).map(|e| e.1.clone())
    }

    /// Clear cooldown for proxy
    pub fn clear(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Cleanup expired entries
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, (until, _)| {
            if now >= *until {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_and_expire() {
        let tracker = CooldownTracker::new();
        tracker.mark("vpn1", Duration::from_secs(60), "tunnel failed");
        tracker.mark("vpn2", Duration::ZERO, "challenge");

        assert!(tracker.is_cooling("vpn1"));
        assert!(!tracker.is_cooling("vpn2"));
        assert!(!tracker.is_cooling("vpn3"));

        let remaining = tracker.remaining("vpn1").unwrap();
        assert!(remaining > Duration::from_secs(58) && remaining <= Duration::from_secs(60));
        assert_eq!(tracker.reason("vpn1").as_deref(), Some("tunnel failed"));
    }

    #[test]
    fn test_clear_and_cleanup() {
        let tracker = CooldownTracker::new();
        tracker.mark("vpn1", Duration::from_secs(60), "x");
        tracker.mark("vpn2", Duration::ZERO, "y");
        tracker.mark("vpn3", Duration::ZERO, "z");

        assert_eq!(tracker.cleanup_expired(), 2);
        assert!(tracker.clear("vpn1"));
        assert!(!tracker.clear("vpn1"));
        assert!(tracker.remaining("vpn1").is_none());
    }

    #[test]
    fn test_reason_is_truncated() {
        let tracker = CooldownTracker::new();
        tracker.mark("vpn1", Duration::from_secs(1), &"x".repeat(500));
        assert_eq!(tracker.reason("vpn1").unwrap().len(), 200);
    }
}
