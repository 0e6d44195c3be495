use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::HearlineError;
use crate::types::TranscriptSegment;

static SUMMARY_API_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("HEARLINE_SUMMARY_API_URL")
        .unwrap_or_else(|_| "https://openrouter.ai/api/v1/chat/completions".to_string())
});

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const OVERALL_MAX_WORDS: usize = 100;
const SPEAKER_MAX_WORDS: usize = 50;

/// Remote summarization capability. The session summarizer works without one
/// (extractive fallback), so absence of a credential is a configuration
/// choice rather than an error.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn summarize(&self, instruction: &str, text: &str) -> Result<String, HearlineError>;
}

/// Chat-completion style client for the summarization service.
pub struct ChatCompletionBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ChatCompletionBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self, HearlineError> {
        if api_key.is_empty() {
            return Err(HearlineError::Configuration(
                "summarization api key is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HearlineError::Configuration(format!("http client: {e}")))?;
        Ok(ChatCompletionBackend {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SummaryBackend for ChatCompletionBackend {
    async fn summarize(&self, instruction: &str, text: &str) -> Result<String, HearlineError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": instruction},
                {"role": "user", "content": text},
            ],
            "max_tokens": 150,
            "temperature": 0.3,
        });

        let resp = self
            .client
            .post(SUMMARY_API_URL.as_str())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let result: Value = resp
            .json()
            .await
            .map_err(|e| HearlineError::Backend(format!("invalid summary response: {e}")))?;

        if !status.is_success() {
            return Err(HearlineError::Backend(format!(
                "summary api error {status}: {result}"
            )));
        }

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| HearlineError::Backend("summary response had no content".into()))
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SpeakerStats {
    pub segments: usize,
    pub words: usize,
    pub duration_seconds: f64,
}

#[derive(Debug, Default, Serialize)]
pub struct SessionStats {
    pub total_speakers: usize,
    pub total_segments: usize,
    pub speakers: BTreeMap<String, SpeakerStats>,
}

/// Accumulates transcript segments per speaker and produces an overall plus
/// per-speaker summary at session end (or on demand).
pub struct SessionSummarizer {
    transcripts: BTreeMap<String, Vec<TranscriptSegment>>,
    backend: Option<std::sync::Arc<dyn SummaryBackend>>,
}

impl SessionSummarizer {
    pub fn new(backend: Option<std::sync::Arc<dyn SummaryBackend>>) -> Self {
        SessionSummarizer {
            transcripts: BTreeMap::new(),
            backend,
        }
    }

    pub fn add_segment(&mut self, segment: &TranscriptSegment) {
        self.transcripts
            .entry(segment.speaker_id.clone())
            .or_default()
            .push(segment.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    fn speaker_text(&self, speaker_id: &str) -> String {
        self.transcripts
            .get(speaker_id)
            .map(|segments| {
                segments
                    .iter()
                    .filter(|s| !s.text.is_empty())
                    .map(|s| s.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// All segments in chronological order, formatted one line per segment.
    fn conversation_text(&self) -> String {
        let mut segments: Vec<&TranscriptSegment> =
            self.transcripts.values().flatten().collect();
        segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        segments
            .iter()
            .map(|s| format!("{}: {}", s.speaker_id, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Overall plus per-speaker summaries. Backend failures degrade to the
    /// extractive fallback; this never errors and never blocks a session.
    pub async fn generate_summary(&self) -> BTreeMap<String, String> {
        let mut summaries = BTreeMap::new();

        if self.transcripts.is_empty() {
            summaries.insert("overall".to_string(), "No conversation recorded.".to_string());
            return summaries;
        }

        let full_text = self.conversation_text();
        let overall_instruction = "Summarize this conversation in 2-3 sentences. \
             Focus on key topics discussed and main points. Be concise but informative.";
        summaries.insert(
            "overall".to_string(),
            self.summarize_or_extract(overall_instruction, &full_text, OVERALL_MAX_WORDS)
                .await,
        );

        for speaker_id in self.transcripts.keys() {
            let text = self.speaker_text(speaker_id);
            if text.split_whitespace().count() < 5 {
                summaries.insert(speaker_id.clone(), "Brief contribution".to_string());
                continue;
            }
            let instruction = format!(
                "Summarize what {speaker_id} said in 1-2 sentences. \
                 Focus on their main points and contributions."
            );
            summaries.insert(
                speaker_id.clone(),
                self.summarize_or_extract(&instruction, &text, SPEAKER_MAX_WORDS)
                    .await,
            );
        }

        summaries
    }

    async fn summarize_or_extract(
        &self,
        instruction: &str,
        text: &str,
        max_words: usize,
    ) -> String {
        if let Some(backend) = &self.backend {
            match backend.summarize(instruction, text).await {
                Ok(summary) => return summary,
                Err(e) => warn!("summary backend failed, falling back to extractive: {e}"),
            }
        } else {
            debug!("no summary backend configured, using extractive summary");
        }
        extractive_summary(text, max_words)
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            total_speakers: self.transcripts.len(),
            total_segments: self.transcripts.values().map(Vec::len).sum(),
            speakers: BTreeMap::new(),
        };

        for (speaker_id, segments) in &self.transcripts {
            let words = segments
                .iter()
                .map(|s| s.text.split_whitespace().count())
                .sum();
            let duration: f64 = segments.iter().map(|s| s.end_time - s.start_time).sum();
            stats.speakers.insert(
                speaker_id.clone(),
                SpeakerStats {
                    segments: segments.len(),
                    words,
                    duration_seconds: (duration * 10.0).round() / 10.0,
                },
            );
        }

        stats
    }
}

/// Deterministic fallback: keep the head and tail of the text around an
/// ellipsis marker.
fn extractive_summary(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return words.join(" ");
    }
    let head = &words[..max_words / 2];
    let tail = &words[words.len() - max_words / 2..];
    format!("{} [...] {}", head.join(" "), tail.join(" "))
}
