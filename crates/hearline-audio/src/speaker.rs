use std::collections::HashMap;

/// Maps opaque backend speaker tags to stable session-scoped labels in
/// first-seen order: the first distinct tag becomes `S1`, the next `S2` and
/// so on. Entries are never reassigned or removed for the session's
/// lifetime, so identical tag sequences always label identically.
#[derive(Debug, Default)]
pub struct SpeakerMap {
    labels: HashMap<String, String>,
}

impl SpeakerMap {
    pub fn new() -> Self {
        SpeakerMap::default()
    }

    pub fn canonical(&mut self, backend_tag: &str) -> String {
        if let Some(label) = self.labels.get(backend_tag) {
            return label.clone();
        }
        let label = format!("S{}", self.labels.len() + 1);
        self.labels.insert(backend_tag.to_string(), label.clone());
        label
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
