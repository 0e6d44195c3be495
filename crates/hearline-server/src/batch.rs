use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use hearline_core::TranscriptSegment;
use tracing::info;

use hearline_audio::capture::frames_from_wav;
use hearline_audio::{ActivityGate, PipelineSettings, SessionPipeline, TranscriptionBackend};

/// Windows shorter than this at end-of-stream are not worth a backend call.
const MIN_FLUSH_SECS: f64 = 0.5;

/// Runs a pre-recorded file through the same pipeline logic as live audio:
/// fixed-size frames, time-windowed flushes, then a final flush for the
/// remainder at end-of-stream.
///
/// The activity gate stays disabled here: the caller chose to pay for the
/// whole file, and silence costs at most one call per window.
pub async fn process_audio_file(
    path: &Path,
    backend: Arc<dyn TranscriptionBackend>,
    sample_rate: u32,
    block_ms: u32,
    chunk_duration: f64,
    num_speakers: u32,
) -> Result<Vec<TranscriptSegment>> {
    let frames = frames_from_wav(path, sample_rate, block_ms)?;
    info!(
        "processing {} ({} frames, {:.1}s chunks)",
        path.display(),
        frames.len(),
        chunk_duration
    );

    let (mut pipeline, mut segments_rx) = SessionPipeline::spawn(
        backend,
        ActivityGate::disabled(),
        PipelineSettings {
            chunk_duration,
            num_speakers,
        },
    );

    // drain segments while frames are still being fed so a long file cannot
    // back both bounded channels up against each other
    let collector = tokio::spawn(async move {
        let mut segments = Vec::new();
        while let Some(batch_segments) = segments_rx.recv().await {
            segments.extend(batch_segments);
        }
        segments
    });

    for frame in &frames {
        pipeline.ingest(frame);
        pipeline.flush_if_due().await;
    }
    if pipeline.pending_secs() >= MIN_FLUSH_SECS {
        pipeline.flush_remaining().await;
    }

    let worker = pipeline.finish();
    let _ = worker.await;
    let segments = collector.await?;

    Ok(segments)
}

/// Speaker labels in order of first appearance.
pub fn unique_speakers(segments: &[TranscriptSegment]) -> Vec<String> {
    let mut speakers = Vec::new();
    for segment in segments {
        if !speakers.contains(&segment.speaker_id) {
            speakers.push(segment.speaker_id.clone());
        }
    }
    speakers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(speaker: &str) -> TranscriptSegment {
        TranscriptSegment {
            speaker_id: speaker.to_string(),
            text: String::new(),
            start_time: 0.0,
            end_time: 0.0,
            words: vec![],
        }
    }

    #[test]
    fn unique_speakers_keep_first_appearance_order() {
        let segments = vec![segment("S2"), segment("S1"), segment("S2"), segment("S3")];
        assert_eq!(unique_speakers(&segments), vec!["S2", "S1", "S3"]);
    }
}
