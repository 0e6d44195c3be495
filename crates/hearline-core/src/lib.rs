pub mod config;
pub mod error;
pub mod summarize;
mod types;

pub use config::Config;
pub use error::HearlineError;
pub use types::{AudioFrame, TranscriptSegment, WordTiming};
