use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hearline_core::{AudioFrame, TranscriptSegment};
use serde_json::json;
use tracing::info;

/// Optional sink that records the session to disk: captured audio as a WAV
/// file and transcript segments as a line-delimited JSON event log. Receives
/// values as they are produced; the pipeline has no other durable state.
pub struct Recorder {
    wav: hound::WavWriter<BufWriter<File>>,
    events: BufWriter<File>,
    audio_path: PathBuf,
    transcript_path: PathBuf,
}

impl Recorder {
    pub fn create(output_dir: &Path, sample_rate: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create {}", output_dir.display()))?;

        let session_id = format!("session_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        let audio_path = output_dir.join(format!("{session_id}.wav"));
        let transcript_path = output_dir.join(format!("{session_id}_transcript.jsonl"));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav = hound::WavWriter::create(&audio_path, spec)
            .with_context(|| format!("failed to create {}", audio_path.display()))?;
        let events = BufWriter::new(
            File::create(&transcript_path)
                .with_context(|| format!("failed to create {}", transcript_path.display()))?,
        );

        info!(
            "recording to {} (transcript log: {})",
            audio_path.display(),
            transcript_path.display()
        );

        Ok(Recorder {
            wav,
            events,
            audio_path,
            transcript_path,
        })
    }

    pub fn write_audio(&mut self, frame: &AudioFrame) -> Result<()> {
        for &sample in frame.samples.iter() {
            self.wav.write_sample(sample)?;
        }
        Ok(())
    }

    pub fn log_segment(&mut self, segment: &TranscriptSegment) -> Result<()> {
        let event = json!({
            "timestamp": segment.start_time,
            "type": "transcript",
            "data": segment,
        });
        writeln!(self.events, "{event}")?;
        self.events.flush()?;
        Ok(())
    }

    /// Finalizes both files and returns their paths.
    pub fn finalize(mut self) -> Result<(PathBuf, PathBuf)> {
        self.wav.finalize()?;
        self.events.flush()?;
        info!(
            "recording saved: {} / {}",
            self.audio_path.display(),
            self.transcript_path.display()
        );
        Ok((self.audio_path, self.transcript_path))
    }
}
