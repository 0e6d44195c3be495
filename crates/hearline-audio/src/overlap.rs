use std::collections::HashMap;

/// How long a speaker counts as active after their last attributed speech.
pub const ACTIVITY_WINDOW_SECS: f64 = 2.0;

/// Tracks speaker activity recency to flag concurrent multi-speaker speech.
/// State is only the last-active time per speaker; overlap itself is derived
/// on demand and can be evaluated on every frame tick, between flushes.
#[derive(Debug, Default)]
pub struct OverlapTracker {
    active: HashMap<String, f64>,
}

impl OverlapTracker {
    pub fn new() -> Self {
        OverlapTracker::default()
    }

    pub fn mark_active(&mut self, speaker_id: &str, timestamp: f64) {
        self.active.insert(speaker_id.to_string(), timestamp);
    }

    /// Speakers active within the last `ACTIVITY_WINDOW_SECS`, sorted for
    /// stable output.
    pub fn active_at(&self, now: f64) -> Vec<String> {
        let mut speakers: Vec<String> = self
            .active
            .iter()
            .filter(|(_, &t)| now - t < ACTIVITY_WINDOW_SECS)
            .map(|(s, _)| s.clone())
            .collect();
        speakers.sort();
        speakers
    }

    pub fn overlap_at(&self, now: f64) -> bool {
        self.active
            .values()
            .filter(|&&t| now - t < ACTIVITY_WINDOW_SECS)
            .count()
            >= 2
    }
}
