mod scribe;

pub use scribe::ScribeClient;

use async_trait::async_trait;
use hearline_core::{HearlineError, WordTiming};

use crate::chunker::AudioBatch;

/// What a transcription call produced. The assembler only ever sees these
/// two shapes; failures stay on the error path.
#[derive(Clone, Debug, PartialEq)]
pub enum TranscriptionOutput {
    /// Ordered word-level output with per-word backend speaker tags, offsets
    /// relative to the batch start.
    Words(Vec<WordTiming>),
    /// Full text only, when the backend could not produce word timings.
    FullText(String),
}

/// The external speech-to-text/diarization service, behind a narrow
/// request/response contract. One call per flushed batch; the coordinator
/// never retries.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(
        &self,
        batch: &AudioBatch,
        max_speakers: u32,
    ) -> Result<TranscriptionOutput, HearlineError>;
}
