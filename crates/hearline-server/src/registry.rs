use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hearline_core::TranscriptSegment;
use serde::Serialize;
use uuid::Uuid;

/// Live streaming session lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    Connecting,
    Streaming,
    Closing,
    Closed,
}

/// Batch (file) session lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Processing,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchSession {
    pub state: BatchState,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<TranscriptSegment>,
    pub speakers: Vec<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LiveSessionInfo {
    pub state: LiveState,
    pub connected_at: DateTime<Utc>,
    /// Session-relative seconds of audio received so far.
    pub duration_secs: f64,
    pub user_name: Option<String>,
    pub segment_count: usize,
    pub overlap: bool,
}

/// Concurrency-safe keyed store for all session state, owned by the app
/// state and injected where needed — there is no process-wide singleton.
/// Handlers and background workers create, look up and delete entries
/// concurrently; per-session mutation still happens only from that
/// session's own task.
#[derive(Default)]
pub struct SessionRegistry {
    batch: DashMap<String, BatchSession>,
    live: DashMap<String, LiveSessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn new_session_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
    }

    // ---- batch sessions ----

    pub fn insert_batch(&self, id: &str) {
        self.batch.insert(
            id.to_string(),
            BatchSession {
                state: BatchState::Processing,
                created_at: Utc::now(),
                segments: Vec::new(),
                speakers: Vec::new(),
                error: None,
            },
        );
    }

    pub fn complete_batch(&self, id: &str, segments: Vec<TranscriptSegment>, speakers: Vec<String>) {
        if let Some(mut session) = self.batch.get_mut(id) {
            session.state = BatchState::Completed;
            session.segments = segments;
            session.speakers = speakers;
        }
    }

    pub fn fail_batch(&self, id: &str, error: String) {
        if let Some(mut session) = self.batch.get_mut(id) {
            session.state = BatchState::Failed;
            session.error = Some(error);
        }
    }

    pub fn get_batch(&self, id: &str) -> Option<BatchSession> {
        self.batch.get(id).map(|s| s.value().clone())
    }

    pub fn remove_batch(&self, id: &str) -> bool {
        self.batch.remove(id).is_some()
    }

    pub fn list_batch(&self) -> Vec<(String, BatchSession)> {
        let mut sessions: Vec<(String, BatchSession)> = self
            .batch
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions
    }

    // ---- live sessions ----

    pub fn insert_live(&self, id: &str) {
        self.live.insert(
            id.to_string(),
            LiveSessionInfo {
                state: LiveState::Connecting,
                connected_at: Utc::now(),
                duration_secs: 0.0,
                user_name: None,
                segment_count: 0,
                overlap: false,
            },
        );
    }

    pub fn update_live(&self, id: &str, update: impl FnOnce(&mut LiveSessionInfo)) {
        if let Some(mut info) = self.live.get_mut(id) {
            update(&mut info);
        }
    }

    pub fn get_live(&self, id: &str) -> Option<LiveSessionInfo> {
        self.live.get(id).map(|s| s.value().clone())
    }

    pub fn remove_live(&self, id: &str) -> bool {
        self.live.remove(id).is_some()
    }

    pub fn list_live(&self) -> Vec<(String, LiveSessionInfo)> {
        let mut sessions: Vec<(String, LiveSessionInfo)> = self
            .live
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        sessions.sort_by(|a, b| a.0.cmp(&b.0));
        sessions
    }
}
