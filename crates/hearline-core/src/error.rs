use thiserror::Error;

/// Error taxonomy for the transcription pipeline.
///
/// `Transport` and `Backend` are handled identically by the coordinator: the
/// affected window produces zero segments, the flush watermark still advances
/// and processing continues. `Configuration` and `Device` are terminal for
/// the surface that hit them. `Protocol` is reported in-band and never
/// terminates a session.
#[derive(Error, Debug)]
pub enum HearlineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for HearlineError {
    fn from(e: reqwest::Error) -> Self {
        HearlineError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_and_message() {
        let err = HearlineError::Configuration("ELEVEN_API_KEY is required".into());
        assert_eq!(
            err.to_string(),
            "configuration error: ELEVEN_API_KEY is required"
        );

        let err = HearlineError::Protocol("unknown command: jump".into());
        assert!(err.to_string().starts_with("protocol error:"));
    }
}
