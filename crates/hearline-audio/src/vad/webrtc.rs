use anyhow::{anyhow, Result};
use webrtc_vad::{SampleRate, Vad, VadMode};

use super::SpeechDetector;

pub struct WebRtcDetector {
    vad: Vad,
    sample_rate: u32,
}

// `webrtc_vad::Vad` wraps a `*mut Fvad` C handle, which makes it `!Send`. The
// handle is owned exclusively by this struct and only ever touched through
// `&mut self`, so moving it between threads is sound. The `SpeechDetector`
// trait requires `Send`, so assert it here.
unsafe impl Send for WebRtcDetector {}

impl WebRtcDetector {
    /// `aggressiveness` follows the classifier's 0..=3 scale; higher filters
    /// more audio out.
    pub fn new(aggressiveness: u8, sample_rate: u32) -> Result<Self> {
        let rate = match sample_rate {
            8000 => SampleRate::Rate8kHz,
            16000 => SampleRate::Rate16kHz,
            32000 => SampleRate::Rate32kHz,
            48000 => SampleRate::Rate48kHz,
            other => return Err(anyhow!("unsupported vad sample rate: {}", other)),
        };
        let mode = match aggressiveness {
            0 => VadMode::Quality,
            1 => VadMode::LowBitrate,
            2 => VadMode::Aggressive,
            _ => VadMode::VeryAggressive,
        };
        Ok(WebRtcDetector {
            vad: Vad::new_with_rate_and_mode(rate, mode),
            sample_rate,
        })
    }
}

impl SpeechDetector for WebRtcDetector {
    fn is_speech(&mut self, window: &[i16], sample_rate: u32) -> Result<bool> {
        if sample_rate != self.sample_rate {
            return Err(anyhow!(
                "vad configured for {} hz, got {} hz",
                self.sample_rate,
                sample_rate
            ));
        }
        self.vad
            .is_voice_segment(window)
            .map_err(|_| anyhow!("webrtc vad rejected a {}-sample window", window.len()))
    }
}
