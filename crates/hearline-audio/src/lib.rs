pub mod capture;
pub mod chunker;
pub mod overlap;
pub mod pipeline;
pub mod recorder;
pub mod segment;
pub mod speaker;
pub mod transcription;
mod utils;
pub mod vad;

pub use capture::{default_input_device, list_audio_devices, AudioDevice, CaptureStream};
pub use chunker::{AudioBatch, ChunkAccumulator};
pub use overlap::{OverlapTracker, ACTIVITY_WINDOW_SECS};
pub use pipeline::{PipelineSettings, SessionPipeline};
pub use segment::assemble_segments;
pub use speaker::SpeakerMap;
pub use transcription::{ScribeClient, TranscriptionBackend, TranscriptionOutput};
pub use utils::audio::{pcm_bytes_to_samples, resample};
pub use vad::{ActivityGate, PassthroughDetector, SpeechDetector, WebRtcDetector};
