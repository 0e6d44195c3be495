mod webrtc;

pub use webrtc::WebRtcDetector;

use anyhow::Result;
use hearline_core::AudioFrame;
use tracing::debug;

/// Sub-window size the gate feeds to the classifier.
pub const GATE_WINDOW_MS: u32 = 30;

/// Speech/non-speech classifier capability. Selected at configuration time;
/// absence degrades to accept-everything, never to a failure.
pub trait SpeechDetector: Send {
    fn is_speech(&mut self, window: &[i16], sample_rate: u32) -> Result<bool>;
}

/// Classifier that accepts everything, for configurations without a VAD.
#[derive(Debug, Default)]
pub struct PassthroughDetector;

impl SpeechDetector for PassthroughDetector {
    fn is_speech(&mut self, _window: &[i16], _sample_rate: u32) -> Result<bool> {
        Ok(true)
    }
}

/// Sliding-window accept/reject filter in front of the chunk accumulator.
///
/// A frame is accepted if any full 30 ms sub-window classifies as speech, so
/// partial utterances survive at the cost of some silence getting through.
/// Classifier errors also accept.
pub struct ActivityGate {
    detector: Option<Box<dyn SpeechDetector>>,
}

impl ActivityGate {
    pub fn new(detector: Box<dyn SpeechDetector>) -> Self {
        ActivityGate {
            detector: Some(detector),
        }
    }

    pub fn disabled() -> Self {
        ActivityGate { detector: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.detector.is_some()
    }

    pub fn accepts(&mut self, frame: &AudioFrame) -> bool {
        let Some(detector) = self.detector.as_mut() else {
            return true;
        };

        let window = (frame.sample_rate * GATE_WINDOW_MS / 1000) as usize;
        for sub in frame.samples.chunks_exact(window) {
            match detector.is_speech(sub, frame.sample_rate) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    debug!("speech classifier error, accepting frame: {}", e);
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct ScriptedDetector {
        verdicts: Vec<Result<bool>>,
    }

    impl SpeechDetector for ScriptedDetector {
        fn is_speech(&mut self, _window: &[i16], _sample_rate: u32) -> Result<bool> {
            self.verdicts.remove(0)
        }
    }

    fn frame(seconds: f64) -> AudioFrame {
        AudioFrame::new(0.0, vec![0i16; (16000.0 * seconds) as usize], 16000)
    }

    #[test]
    fn disabled_gate_accepts_every_frame() {
        let mut gate = ActivityGate::disabled();
        for _ in 0..100 {
            assert!(gate.accepts(&frame(0.32)));
        }
    }

    #[test]
    fn any_speech_sub_window_accepts_the_frame() {
        // 90 ms frame = three 30 ms sub-windows, only the last one is speech
        let mut gate = ActivityGate::new(Box::new(ScriptedDetector {
            verdicts: vec![Ok(false), Ok(false), Ok(true)],
        }));
        assert!(gate.accepts(&frame(0.09)));
    }

    #[test]
    fn all_silence_sub_windows_reject_the_frame() {
        let mut gate = ActivityGate::new(Box::new(ScriptedDetector {
            verdicts: vec![Ok(false), Ok(false), Ok(false)],
        }));
        assert!(!gate.accepts(&frame(0.09)));
    }

    #[test]
    fn classifier_error_accepts_the_frame() {
        let mut gate = ActivityGate::new(Box::new(ScriptedDetector {
            verdicts: vec![Ok(false), Err(anyhow!("classifier broke"))],
        }));
        assert!(gate.accepts(&frame(0.09)));
    }
}
