use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use once_cell::sync::Lazy;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info};

use hearline_core::{HearlineError, WordTiming};

use crate::chunker::AudioBatch;

use super::{TranscriptionBackend, TranscriptionOutput};

static SCRIBE_API_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("SCRIBE_API_URL")
        .unwrap_or_else(|_| "https://api.elevenlabs.io/v1/speech-to-text".to_string())
});

/// Upper bound on any single transcription call. Exceeding it is a transport
/// failure like any other.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_MODEL_ID: &str = "scribe_v1";

/// Batch speech-to-text client with diarization and word-level timestamps.
#[derive(Debug)]
pub struct ScribeClient {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
}

impl ScribeClient {
    pub fn new(api_key: &str) -> Result<Self, HearlineError> {
        if api_key.is_empty() {
            return Err(HearlineError::Configuration(
                "transcription api key is empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HearlineError::Configuration(format!("http client: {e}")))?;
        Ok(ScribeClient {
            client,
            api_key: api_key.to_string(),
            model_id: std::env::var("SCRIBE_MODEL_ID")
                .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string()),
        })
    }
}

fn create_wav_file(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, HearlineError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| HearlineError::Backend(format!("wav encode: {e}")))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| HearlineError::Backend(format!("wav encode: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| HearlineError::Backend(format!("wav encode: {e}")))?;
    }
    Ok(cursor.into_inner())
}

fn parse_response(result: &Value) -> TranscriptionOutput {
    if let Some(words) = result["words"].as_array() {
        if !words.is_empty() {
            let timings = words
                .iter()
                .map(|w| WordTiming {
                    speaker_tag: w["speaker_id"].as_str().unwrap_or("speaker_0").to_string(),
                    text: w["text"].as_str().unwrap_or("").to_string(),
                    start: w["start"].as_f64().unwrap_or(0.0),
                    end: w["end"].as_f64().unwrap_or_else(|| w["start"].as_f64().unwrap_or(0.0)),
                })
                .collect();
            return TranscriptionOutput::Words(timings);
        }
    }

    if let Some(text) = result["text"].as_str() {
        if !text.trim().is_empty() {
            return TranscriptionOutput::FullText(text.to_string());
        }
    }

    // nothing recognized, possibly silence
    TranscriptionOutput::Words(Vec::new())
}

#[async_trait]
impl TranscriptionBackend for ScribeClient {
    async fn transcribe(
        &self,
        batch: &AudioBatch,
        max_speakers: u32,
    ) -> Result<TranscriptionOutput, HearlineError> {
        debug!(
            "sending {:.1}s window ({} samples) to transcription backend",
            batch.duration(),
            batch.samples.len()
        );

        let wav_data = create_wav_file(&batch.samples, batch.sample_rate)?;

        let part = Part::bytes(wav_data)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| HearlineError::Backend(format!("multipart: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("model_id", self.model_id.clone())
            .text("diarize", "true")
            .text("num_speakers", max_speakers.to_string())
            .text("timestamps_granularity", "word");

        let resp = self
            .client
            .post(SCRIBE_API_URL.as_str())
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HearlineError::Backend(format!(
                "transcription api error {status}: {body}"
            )));
        }

        let result: Value = resp
            .json()
            .await
            .map_err(|e| HearlineError::Backend(format!("invalid response: {e}")))?;

        let output = parse_response(&result);
        match &output {
            TranscriptionOutput::Words(words) if words.is_empty() => {
                info!("transcription returned nothing, possibly silence")
            }
            TranscriptionOutput::Words(words) => {
                debug!("transcription returned {} words", words.len())
            }
            TranscriptionOutput::FullText(text) => debug!(
                "transcription returned full text only ({} chars)",
                text.len()
            ),
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_word_level_output() {
        let result = json!({
            "text": "hi there",
            "words": [
                {"speaker_id": "speaker_0", "text": "hi", "start": 0.1, "end": 0.4},
                {"speaker_id": "speaker_1", "text": "there", "start": 0.5, "end": 0.9},
            ],
        });
        match parse_response(&result) {
            TranscriptionOutput::Words(words) => {
                assert_eq!(words.len(), 2);
                assert_eq!(words[0].speaker_tag, "speaker_0");
                assert_eq!(words[1].text, "there");
                assert!((words[1].end - 0.9).abs() < 1e-9);
            }
            other => panic!("expected word output, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_full_text_without_words() {
        let result = json!({"text": "all in one piece"});
        assert_eq!(
            parse_response(&result),
            TranscriptionOutput::FullText("all in one piece".to_string())
        );
    }

    #[test]
    fn silence_is_an_empty_word_list() {
        assert_eq!(
            parse_response(&json!({"text": ""})),
            TranscriptionOutput::Words(vec![])
        );
        assert_eq!(
            parse_response(&json!({})),
            TranscriptionOutput::Words(vec![])
        );
    }

    #[test]
    fn missing_word_end_defaults_to_start() {
        let result = json!({
            "words": [{"speaker_id": "s", "text": "x", "start": 1.5}],
        });
        match parse_response(&result) {
            TranscriptionOutput::Words(words) => {
                assert!((words[0].end - 1.5).abs() < 1e-9);
            }
            other => panic!("expected word output, got {other:?}"),
        }
    }

    #[test]
    fn wav_header_is_valid() {
        let wav = create_wav_file(&[0i16; 1600], 16000).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1600);
    }

    #[test]
    fn empty_key_is_a_configuration_error() {
        match ScribeClient::new("") {
            Err(HearlineError::Configuration(_)) => {}
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
