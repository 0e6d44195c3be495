use std::sync::Arc;

use hearline_core::{AudioFrame, TranscriptSegment};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::chunker::{AudioBatch, ChunkAccumulator};
use crate::segment::assemble_segments;
use crate::speaker::SpeakerMap;
use crate::transcription::TranscriptionBackend;
use crate::vad::ActivityGate;

/// How many finalized batches may wait for the transcription worker before
/// flushing applies backpressure to the session's message loop.
const BATCH_QUEUE_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug)]
pub struct PipelineSettings {
    pub chunk_duration: f64,
    pub num_speakers: u32,
}

/// One session's path from gated frames to transcript segments.
///
/// Ingestion is synchronous and cheap. Finalized batches go to a dedicated
/// worker task that talks to the backend and assembles segments, so a slow
/// remote call never stalls frame intake; batches for one session are
/// processed strictly in order by that single worker. Backend failures cost
/// only their own window — the watermark was already advanced when the batch
/// was taken.
pub struct SessionPipeline {
    gate: ActivityGate,
    accumulator: ChunkAccumulator,
    clock: f64,
    batch_tx: Option<mpsc::Sender<AudioBatch>>,
    worker: JoinHandle<()>,
}

impl SessionPipeline {
    pub fn spawn(
        backend: Arc<dyn TranscriptionBackend>,
        gate: ActivityGate,
        settings: PipelineSettings,
    ) -> (Self, mpsc::Receiver<Vec<TranscriptSegment>>) {
        let (batch_tx, mut batch_rx) = mpsc::channel::<AudioBatch>(BATCH_QUEUE_CAPACITY);
        let (segment_tx, segment_rx) = mpsc::channel::<Vec<TranscriptSegment>>(64);

        let num_speakers = settings.num_speakers;
        let worker = tokio::spawn(async move {
            let mut speakers = SpeakerMap::new();
            while let Some(batch) = batch_rx.recv().await {
                let segments = match backend.transcribe(&batch, num_speakers).await {
                    Ok(output) => {
                        assemble_segments(&output, batch.start_time, batch.end_time, &mut speakers)
                    }
                    Err(e) => {
                        // window lost, watermark already advanced; no retry
                        warn!(
                            "transcription failed for window [{:.1}s, {:.1}s]: {}",
                            batch.start_time, batch.end_time, e
                        );
                        Vec::new()
                    }
                };
                if segment_tx.send(segments).await.is_err() {
                    break;
                }
            }
        });

        (
            SessionPipeline {
                gate,
                accumulator: ChunkAccumulator::new(settings.chunk_duration),
                clock: 0.0,
                batch_tx: Some(batch_tx),
                worker,
            },
            segment_rx,
        )
    }

    /// Runs the frame through the activity gate and, if accepted, into the
    /// accumulator. Returns whether the frame was accepted.
    pub fn ingest(&mut self, frame: &AudioFrame) -> bool {
        if !self.gate.accepts(frame) {
            return false;
        }
        self.clock = frame.timestamp;
        self.accumulator.push(frame.clone());
        true
    }

    pub fn flush_due(&self) -> bool {
        self.accumulator.should_flush(self.clock)
    }

    /// Flushes when the chunk duration has elapsed. Returns true when a
    /// batch was handed to the transcription worker.
    pub async fn flush_if_due(&mut self) -> bool {
        if !self.flush_due() {
            return false;
        }
        self.flush_now().await
    }

    /// Unconditionally flushes whatever is buffered (end-of-stream path).
    pub async fn flush_remaining(&mut self) -> bool {
        self.flush_now().await
    }

    async fn flush_now(&mut self) -> bool {
        let Some(batch) = self.accumulator.take_batch() else {
            return false;
        };
        if let Some(tx) = &self.batch_tx {
            if tx.send(batch).await.is_err() {
                warn!("transcription worker is gone, dropping batch");
                return false;
            }
        }
        true
    }

    /// Latest ingested frame timestamp.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn watermark(&self) -> f64 {
        self.accumulator.last_flush_time()
    }

    pub fn buffer_empty(&self) -> bool {
        self.accumulator.is_empty()
    }

    pub fn pending_secs(&self) -> f64 {
        self.accumulator.pending_secs()
    }

    /// Closes the batch channel so the worker drains and exits. The returned
    /// handle completes once every queued batch has been processed.
    pub fn finish(mut self) -> JoinHandle<()> {
        self.batch_tx.take();
        self.worker
    }

    /// Hard cancellation: aborts the worker, abandoning any in-flight
    /// backend call. Buffered-but-unflushed audio is discarded.
    pub fn abort(&self) {
        self.worker.abort();
    }
}
