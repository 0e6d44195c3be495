use std::collections::VecDeque;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use hearline_audio::{AudioBatch, TranscriptionBackend, TranscriptionOutput};
use hearline_core::{Config, HearlineError, WordTiming};
use hearline_server::{create_router, AppState, SessionRegistry};

struct ScriptedBackend {
    responses: Mutex<VecDeque<TranscriptionOutput>>,
}

#[async_trait]
impl TranscriptionBackend for ScriptedBackend {
    async fn transcribe(
        &self,
        _batch: &AudioBatch,
        _max_speakers: u32,
    ) -> Result<TranscriptionOutput, HearlineError> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TranscriptionOutput::Words(vec![])))
    }
}

fn test_config() -> Config {
    Config {
        scribe_api_key: "test-key".into(),
        chunk_duration_secs: 5.0,
        capture_block_ms: 320,
        use_vad: false,
        vad_aggressiveness: 2,
        num_speakers: 2,
        sample_rate: 16000,
        channels: 1,
        summary_api_key: None,
        summary_model: String::new(),
    }
}

async fn start_server(responses: Vec<TranscriptionOutput>) -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Arc::new(test_config()),
        registry: Arc::new(SessionRegistry::new()),
        transcriber: Some(Arc::new(ScriptedBackend {
            responses: Mutex::new(responses.into()),
        })),
        summarizer: None,
        app_start_time: Utc::now(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    (addr, state)
}

fn word(tag: &str, text: &str, start: f64, end: f64) -> WordTiming {
    WordTiming {
        speaker_tag: tag.to_string(),
        text: text.to_string(),
        start,
        end,
    }
}

/// Three seconds of audio as an in-memory WAV file.
fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..48000 {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn upload_form() -> reqwest::multipart::Form {
    let part = reqwest::multipart::Part::bytes(wav_bytes())
        .file_name("meeting.wav")
        .mime_str("audio/wav")
        .unwrap();
    reqwest::multipart::Form::new().part("file", part)
}

#[tokio::test]
async fn synchronous_transcription_returns_segments_and_summary() {
    let (addr, _state) = start_server(vec![TranscriptionOutput::Words(vec![
        word("spk_a", "good", 0.0, 0.5),
        word("spk_a", "morning", 0.5, 1.0),
        word("spk_b", "hello", 1.5, 2.0),
    ])])
    .await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/transcribe"))
        .multipart(upload_form())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["speakers_detected"], 2);
    let segments = body["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0]["speaker_id"], "S1");
    assert_eq!(segments[0]["text"], "good morning");
    assert_eq!(segments[1]["speaker_id"], "S2");
    assert!((body["duration"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    assert!(body["summary"]["stats"]["total_segments"].as_u64().unwrap() == 2);
}

#[tokio::test]
async fn async_transcription_completes_in_the_background() {
    let (addr, _state) = start_server(vec![TranscriptionOutput::FullText(
        "one long utterance".into(),
    )])
    .await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/transcribe/stream"))
        .multipart(upload_form())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "processing");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // poll until the background task finishes
    let mut status = String::new();
    for _ in 0..100 {
        let session: Value = client
            .get(format!("http://{addr}/session/{session_id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        status = session["status"].as_str().unwrap().to_string();
        if status != "processing" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, "completed");

    let transcript: Value = client
        .get(format!("http://{addr}/session/{session_id}/transcript"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transcript["status"], "completed");
    let segments = transcript["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0]["speaker_id"], "S1");
    assert_eq!(segments[0]["text"], "one long utterance");

    // the finished session shows up in the listing and can be deleted
    let listing: Value = client
        .get(format!("http://{addr}/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["total"], 1);

    let deleted = client
        .delete(format!("http://{addr}/session/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);

    let gone = client
        .get(format!("http://{addr}/session/{session_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn transcript_distinguishes_not_ready_from_not_found() {
    let (addr, state) = start_server(vec![]).await;
    let client = reqwest::Client::new();

    // unknown session
    let resp = client
        .get(format!("http://{addr}/session/nope/transcript"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // known but still processing
    state.registry.insert_batch("pending");
    let resp = client
        .get(format!("http://{addr}/session/pending/transcript"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 425);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let (addr, _state) = start_server(vec![]).await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("chunk_duration", "5");
    let resp = client
        .post(format!("http://{addr}/transcribe"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn health_reports_capability_presence() {
    let (addr, _state) = start_server(vec![]).await;
    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["transcription"], true);
    assert_eq!(body["summarization"], false);
}
