use std::env;
use std::str::FromStr;

use crate::error::HearlineError;

/// Fixed pipeline sample rate. Capture and file input are converted to this
/// rate before anything downstream sees them; network clients must send it.
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u16 = 1;

#[derive(Clone, Debug)]
pub struct Config {
    /// Transcription backend credential. Required for any transcription to
    /// happen; surfaces that can run degraded read it as optional.
    pub scribe_api_key: String,
    /// Seconds of buffered audio per transcription request.
    pub chunk_duration_secs: f64,
    /// Size of the frames the capture path emits, in milliseconds.
    pub capture_block_ms: u32,
    pub use_vad: bool,
    pub vad_aggressiveness: u8,
    /// Upper bound passed to the backend's diarizer, not a promise.
    pub num_speakers: u32,
    pub sample_rate: u32,
    pub channels: u16,
    /// Summarization credential. Absent means extractive summaries only.
    pub summary_api_key: Option<String>,
    pub summary_model: String,
}

impl Config {
    /// Reads the environment and fails when the transcription credential is
    /// missing. Use this wherever a session is about to be created.
    pub fn from_env() -> Result<Self, HearlineError> {
        let config = Self::from_env_unchecked();
        if config.scribe_api_key.is_empty() {
            return Err(HearlineError::Configuration(
                "ELEVEN_API_KEY is required (set it in the environment)".into(),
            ));
        }
        Ok(config)
    }

    /// Reads the environment without requiring credentials, for surfaces that
    /// must come up in a degraded state (health checks, the server binary).
    pub fn from_env_unchecked() -> Self {
        let mut vad_aggressiveness: u8 = env_parse("HEARLINE_VAD_AGGRESSIVENESS", 2);
        if vad_aggressiveness > 3 {
            vad_aggressiveness = 2;
        }

        Config {
            scribe_api_key: env::var("ELEVEN_API_KEY").unwrap_or_default(),
            chunk_duration_secs: env_parse("HEARLINE_CHUNK_SECS", 5.0),
            capture_block_ms: env_parse("HEARLINE_BLOCK_MS", 320),
            use_vad: env_flag("HEARLINE_USE_VAD", true),
            vad_aggressiveness,
            num_speakers: env_parse("HEARLINE_NUM_SPEAKERS", 2),
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            summary_api_key: env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            summary_model: env::var("HEARLINE_SUMMARY_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4o-mini".to_string()),
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(default)
}
