//! Throttling for network map requests. Building the map keeps the radio busy
//! for minutes, so requests are rate limited while one is outstanding.

use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;

pub const COOLDOWN: Duration = Duration::from_secs(3 * 60);

/// Shown instead of an empty map while a request is being throttled.
pub const PLACEHOLDER_MAP: &str = r#"digraph G { "Breathe in" -> "Breathe out" "Breathe out" -> "Relax"}"#;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MapRequestOutcome {
    Accepted,
    Throttled,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct MapStatus {
    pub pending: bool,
    pub map: String,
}

#[derive(Debug)]
pub struct MapRequest {
    pending: bool,
    last_request: Option<Instant>,
    cooldown: Duration,
    last_map: String,
}

impl Default for MapRequest {
    fn default() -> Self {
        MapRequest::new(COOLDOWN)
    }
}

impl MapRequest {
    pub fn new(cooldown: Duration) -> MapRequest {
        MapRequest {
            pending: false,
            last_request: None,
            cooldown,
            last_map: String::new(),
        }
    }

    /// A request is allowed when none is outstanding, or when the outstanding
    /// one is older than the cooldown. The second case lets callers recover
    /// from a response that never arrived.
    pub fn check(&self, now: Instant) -> MapRequestOutcome {
        let cooled_down = self
            .last_request
            .map_or(true, |last| now.saturating_duration_since(last) >= self.cooldown);

        if self.pending && !cooled_down {
            debug!("map request throttled");
            return MapRequestOutcome::Throttled;
        }

        MapRequestOutcome::Accepted
    }

    /// Records a request that actually reached the bus.
    pub fn mark_requested(&mut self, now: Instant) {
        self.pending = true;
        self.last_request = Some(now);
    }

    pub fn on_response(&mut self, map: String) {
        self.pending = false;
        self.last_map = map;
    }

    pub fn status(&self) -> MapStatus {
        MapStatus {
            pending: self.pending,
            map: self.last_map.clone(),
        }
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_within_cooldown() {
        let start = Instant::now();
        let mut map = MapRequest::default();

        assert_eq!(map.check(start), MapRequestOutcome::Accepted);
        map.mark_requested(start);
        assert!(map.status().pending);

        let later = start + Duration::from_secs(60);
        assert_eq!(map.check(later), MapRequestOutcome::Throttled);
        assert_eq!(map.last_request(), Some(start));

        let after_cooldown = start + COOLDOWN;
        assert_eq!(map.check(after_cooldown), MapRequestOutcome::Accepted);
        map.mark_requested(after_cooldown);
        assert_eq!(map.last_request(), Some(after_cooldown));
    }

    #[test]
    fn test_response_unblocks_requests() {
        let start = Instant::now();
        let mut map = MapRequest::default();

        map.mark_requested(start);

        map.on_response("digraph G {}".to_string());
        assert_eq!(
            map.status(),
            MapStatus {
                pending: false,
                map: "digraph G {}".to_string()
            }
        );

        let soon = start + Duration::from_secs(1);
        assert_eq!(map.check(soon), MapRequestOutcome::Accepted);
        assert_eq!(map.status().map, "digraph G {}");
    }

    #[test]
    fn test_check_leaves_state_untouched() {
        let map = MapRequest::default();

        assert_eq!(map.check(Instant::now()), MapRequestOutcome::Accepted);
        assert_eq!(map.check(Instant::now()), MapRequestOutcome::Accepted);
        assert!(!map.status().pending);
        assert_eq!(map.last_request(), None);
    }

    #[test]
    fn test_initial_status() {
        let map = MapRequest::new(Duration::from_secs(1));

        assert_eq!(
            map.status(),
            MapStatus {
                pending: false,
                map: String::new()
            }
        );
        assert_eq!(map.last_request(), None);
    }
}
