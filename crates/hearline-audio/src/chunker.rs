use hearline_core::AudioFrame;
use tracing::debug;

/// A finalized batch of contiguous audio handed to the transcription client.
#[derive(Clone, Debug)]
pub struct AudioBatch {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub start_time: f64,
    pub end_time: f64,
}

impl AudioBatch {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Per-session buffer of pending frames plus the time-based flush policy.
///
/// The watermark (`last_flush_time`) only moves forward, and it advances as
/// part of `take_batch` — before the caller talks to the backend — so a
/// failing backend can neither grow the buffer without bound nor get retried
/// against the same window.
#[derive(Debug)]
pub struct ChunkAccumulator {
    frames: Vec<AudioFrame>,
    chunk_duration: f64,
    last_flush_time: f64,
}

impl ChunkAccumulator {
    pub fn new(chunk_duration: f64) -> Self {
        ChunkAccumulator {
            frames: Vec::new(),
            chunk_duration,
            last_flush_time: 0.0,
        }
    }

    /// Appends a frame. Frames are assumed temporally contiguous and are
    /// never reordered.
    pub fn push(&mut self, frame: AudioFrame) {
        self.frames.push(frame);
    }

    /// True exactly when the elapsed time since the last flush has reached
    /// the chunk duration and there is something to flush.
    pub fn should_flush(&self, now: f64) -> bool {
        !self.frames.is_empty() && now - self.last_flush_time >= self.chunk_duration
    }

    /// Concatenates the buffered frames in arrival order, advances the
    /// watermark to the end of the last buffered frame and clears the buffer.
    pub fn take_batch(&mut self) -> Option<AudioBatch> {
        let last = self.frames.last()?;
        let start_time = self.frames[0].timestamp;
        let end_time = last.end();
        let sample_rate = last.sample_rate;

        let mut samples = Vec::with_capacity(self.frames.iter().map(|f| f.samples.len()).sum());
        for frame in self.frames.drain(..) {
            samples.extend_from_slice(&frame.samples);
        }

        self.last_flush_time = end_time;
        debug!(
            "flushed {:.2}s window [{:.2}, {:.2}]",
            end_time - start_time,
            start_time,
            end_time
        );

        Some(AudioBatch {
            samples,
            sample_rate,
            start_time,
            end_time,
        })
    }

    pub fn last_flush_time(&self) -> f64 {
        self.last_flush_time
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Seconds of audio currently buffered.
    pub fn pending_secs(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.end() - first.timestamp,
            _ => 0.0,
        }
    }
}
