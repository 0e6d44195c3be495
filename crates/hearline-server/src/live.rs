use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use tracing::{info, warn};

use hearline_audio::capture::{default_input_device, AudioDevice, CaptureStream};
use hearline_audio::recorder::Recorder;
use hearline_audio::{
    ActivityGate, OverlapTracker, PipelineSettings, ScribeClient, SessionPipeline, WebRtcDetector,
};
use hearline_core::summarize::{ChatCompletionBackend, SessionSummarizer, SummaryBackend};
use hearline_core::{Config, HearlineError};

fn speaker_label(speaker_id: &str) -> ColoredString {
    let idx = speaker_id
        .strip_prefix('S')
        .and_then(|n| n.parse::<usize>().ok())
        .unwrap_or(1)
        .saturating_sub(1);
    match idx % 6 {
        0 => speaker_id.cyan().bold(),
        1 => speaker_id.green().bold(),
        2 => speaker_id.yellow().bold(),
        3 => speaker_id.magenta().bold(),
        4 => speaker_id.blue().bold(),
        _ => speaker_id.red().bold(),
    }
}

fn build_gate(config: &Config) -> ActivityGate {
    if !config.use_vad {
        info!("speech gating disabled, sending all audio");
        return ActivityGate::disabled();
    }
    match WebRtcDetector::new(config.vad_aggressiveness, config.sample_rate) {
        Ok(detector) => {
            info!("speech gating enabled (bandwidth saver mode)");
            ActivityGate::new(Box::new(detector))
        }
        Err(e) => {
            warn!("speech classifier unavailable, sending all audio: {}", e);
            ActivityGate::disabled()
        }
    }
}

/// Live console transcription on a local input device. Prints one line per
/// segment, flags overlapping speech, and ends with a session summary on
/// ctrl-c.
pub async fn run_live(
    config: Config,
    device_name: Option<String>,
    record_dir: Option<PathBuf>,
) -> Result<()> {
    // fatal at startup when the credential is missing
    let backend = Arc::new(ScribeClient::new(&config.scribe_api_key)?);
    let summary_backend: Option<Arc<dyn SummaryBackend>> = config
        .summary_api_key
        .as_deref()
        .and_then(|key| ChatCompletionBackend::new(key, &config.summary_model).ok())
        .map(|backend| Arc::new(backend) as Arc<dyn SummaryBackend>);

    let device = match device_name {
        Some(name) => AudioDevice::from_name(&name)?,
        None => default_input_device()
            .map_err(|e| HearlineError::Device(e.to_string()))
            .context("no usable input device")?,
    };

    let (stream, mut frames) = CaptureStream::open(
        &device,
        config.sample_rate,
        config.capture_block_ms,
    )
    .map_err(|e| HearlineError::Device(e.to_string()))?;

    let (mut pipeline, mut segments_rx) = SessionPipeline::spawn(
        backend,
        build_gate(&config),
        PipelineSettings {
            chunk_duration: config.chunk_duration_secs,
            num_speakers: config.num_speakers,
        },
    );

    let mut recorder = match &record_dir {
        Some(dir) => Some(Recorder::create(dir, config.sample_rate)?),
        None => None,
    };
    let mut summarizer = SessionSummarizer::new(summary_backend);
    let mut overlap = OverlapTracker::new();
    let mut overlap_shown = false;

    println!("{}", "listening (ctrl-c to stop)...".dimmed());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let device_lost: Result<()> = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),

            frame = frames.recv() => {
                let Some(frame) = frame else {
                    break Err(HearlineError::Device(format!(
                        "capture stream for {} ended unexpectedly", device
                    )).into());
                };

                if let Some(recorder) = recorder.as_mut() {
                    recorder.write_audio(&frame)?;
                }

                pipeline.ingest(&frame);
                pipeline.flush_if_due().await;

                // overlap is re-evaluated on every frame tick, not just when
                // a transcription call lands
                let now = frame.end();
                if overlap.overlap_at(now) {
                    if !overlap_shown {
                        let speakers = overlap.active_at(now).join(", ");
                        println!("{}", format!("[overlap] {speakers}").red().bold());
                        overlap_shown = true;
                    }
                } else {
                    overlap_shown = false;
                }
            }

            segments = segments_rx.recv() => {
                let Some(segments) = segments else { break Ok(()) };
                for segment in segments {
                    summarizer.add_segment(&segment);
                    overlap.mark_active(&segment.speaker_id, segment.end_time);
                    if let Some(recorder) = recorder.as_mut() {
                        recorder.log_segment(&segment)?;
                    }
                    println!(
                        "[{:7.1}s] {}: {}",
                        segment.start_time,
                        speaker_label(&segment.speaker_id),
                        segment.text
                    );
                }
            }
        }
    };

    println!("\n{}", "stopping...".dimmed());

    if !summarizer.is_empty() {
        let summary = summarizer.generate_summary().await;
        println!("\n{}", "session summary".bold());
        for (who, text) in &summary {
            println!("  {}: {}", speaker_label(who), text);
        }
        let stats = summarizer.stats();
        println!(
            "  {} speakers, {} segments",
            stats.total_speakers, stats.total_segments
        );
    }

    if let Some(recorder) = recorder.take() {
        recorder.finalize()?;
    }
    pipeline.abort();
    // closing the frame receiver unblocks the capture bridge before the join
    drop(frames);
    if let Err(e) = stream.stop() {
        warn!("failed to stop capture cleanly: {}", e);
    }

    device_lost
}
