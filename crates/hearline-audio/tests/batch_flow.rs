use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hearline_audio::capture::frames_from_wav;
use hearline_audio::{
    ActivityGate, AudioBatch, PipelineSettings, SessionPipeline, TranscriptionBackend,
    TranscriptionOutput,
};
use hearline_core::{HearlineError, WordTiming};

struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<TranscriptionOutput, HearlineError>>>,
    windows: Mutex<Vec<(f64, f64)>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<TranscriptionOutput, HearlineError>>) -> Arc<Self> {
        Arc::new(ScriptedBackend {
            responses: Mutex::new(responses.into()),
            windows: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TranscriptionBackend for ScriptedBackend {
    async fn transcribe(
        &self,
        batch: &AudioBatch,
        _max_speakers: u32,
    ) -> Result<TranscriptionOutput, HearlineError> {
        self.windows
            .lock()
            .unwrap()
            .push((batch.start_time, batch.end_time));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(TranscriptionOutput::Words(vec![])))
    }
}

fn word(tag: &str, text: &str, start: f64, end: f64) -> WordTiming {
    WordTiming {
        speaker_tag: tag.to_string(),
        text: text.to_string(),
        start,
        end,
    }
}

fn write_wav(path: &std::path::Path, seconds: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..(16000.0 * seconds) as usize {
        writer.write_sample((i % 64) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// A 12 second file with 5 second chunks flows through the same pipeline the
/// live paths use: two full windows plus a final partial one, with segment
/// times in absolute session time and speaker labels stable across windows.
#[tokio::test]
async fn file_flows_through_the_pipeline_like_live_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meeting.wav");
    write_wav(&path, 12.0);

    let backend = ScriptedBackend::new(vec![
        Ok(TranscriptionOutput::Words(vec![
            word("spk_a", "good", 0.2, 0.6),
            word("spk_a", "morning", 0.6, 1.1),
            word("spk_b", "hello", 1.4, 1.9),
        ])),
        Ok(TranscriptionOutput::Words(vec![word(
            "spk_b", "continuing", 0.3, 1.0,
        )])),
        Ok(TranscriptionOutput::FullText("tail end of the meeting".into())),
    ]);

    let frames = frames_from_wav(&path, 16000, 500).unwrap();
    assert_eq!(frames.len(), 24);

    let (mut pipeline, mut segments_rx) = SessionPipeline::spawn(
        backend.clone(),
        ActivityGate::disabled(),
        PipelineSettings {
            chunk_duration: 5.0,
            num_speakers: 2,
        },
    );

    for frame in &frames {
        pipeline.ingest(frame);
        pipeline.flush_if_due().await;
    }
    pipeline.flush_remaining().await;

    let worker = pipeline.finish();
    let mut all = Vec::new();
    while let Some(segments) = segments_rx.recv().await {
        all.extend(segments);
    }
    worker.await.unwrap();

    let windows = backend.windows.lock().unwrap().clone();
    assert_eq!(windows.len(), 3);
    assert!((windows[0].1 - 5.5).abs() < 1e-9);
    assert!((windows[2].1 - 12.0).abs() < 1e-9);

    assert_eq!(all.len(), 4);
    // first window: two speakers, absolute times
    assert_eq!(all[0].speaker_id, "S1");
    assert_eq!(all[0].text, "good morning");
    assert!((all[0].start_time - 0.2).abs() < 1e-9);
    assert_eq!(all[1].speaker_id, "S2");
    // second window: spk_b keeps its label
    assert_eq!(all[2].speaker_id, "S2");
    assert!((all[2].start_time - 5.8).abs() < 1e-9);
    // full-text fallback spans its window under the default label
    assert_eq!(all[3].speaker_id, "S1");
    assert!((all[3].start_time - 11.0).abs() < 1e-9);
    assert!((all[3].end_time - 12.0).abs() < 1e-9);
}
