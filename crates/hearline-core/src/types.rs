use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One chunk of captured audio. Timestamps are session-relative seconds and
/// non-decreasing within a session; a frame is never mutated after creation.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    pub timestamp: f64,
    pub samples: Arc<Vec<i16>>,
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(timestamp: f64, samples: Vec<i16>, sample_rate: u32) -> Self {
        AudioFrame {
            timestamp,
            samples: Arc::new(samples),
            sample_rate,
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Session-relative timestamp of the last sample in this frame.
    pub fn end(&self) -> f64 {
        self.timestamp + self.duration()
    }
}

/// One word as returned by the transcription backend, with offsets relative
/// to the start of the submitted batch and an opaque backend speaker tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub speaker_tag: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A run of consecutive same-speaker words, stamped with absolute session
/// time. Produced only by the segment assembler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker_id: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<WordTiming>,
}
