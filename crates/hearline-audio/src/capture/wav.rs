use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hearline_core::AudioFrame;
use tracing::debug;

use crate::utils::audio::{f32_to_i16, resample};

/// Decodes a WAV file into the same frame sequence live capture produces:
/// mono 16-bit blocks at `target_rate`, stamped with sample-counted
/// timestamps. Finite and restartable, for the batch path.
pub fn frames_from_wav(path: &Path, target_rate: u32, block_ms: u32) -> Result<Vec<AudioFrame>> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open wav file {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()?,
        (hound::SampleFormat::Int, bits) if bits < 32 => {
            let shift = 32 - bits;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| ((v << shift) >> 16) as i16))
                .collect::<std::result::Result<_, _>>()?
        }
        (hound::SampleFormat::Float, _) => {
            let floats: Vec<f32> = reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?;
            f32_to_i16(&floats)
        }
        (format, bits) => {
            return Err(anyhow!(
                "unsupported wav encoding: {:?} at {} bits",
                format,
                bits
            ))
        }
    };

    let mono = mixdown(&samples, spec.channels);
    let mono = resample(&mono, spec.sample_rate, target_rate);

    debug!(
        "decoded {}: {} samples at {} hz ({} channels) -> {} mono samples at {} hz",
        path.display(),
        samples.len(),
        spec.sample_rate,
        spec.channels,
        mono.len(),
        target_rate
    );

    let block_samples = (target_rate * block_ms / 1000) as usize;
    let mut frames = Vec::with_capacity(mono.len() / block_samples + 1);
    for (i, block) in mono.chunks(block_samples).enumerate() {
        frames.push(AudioFrame::new(
            (i * block_samples) as f64 / target_rate as f64,
            block.to_vec(),
            target_rate,
        ));
    }

    Ok(frames)
}

fn mixdown(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f64) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let total = (sample_rate as f64 * seconds) as usize * channels as usize;
        for i in 0..total {
            writer.write_sample((i % 128) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_into_fixed_blocks_with_monotonic_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        write_wav(&path, 16000, 1, 2.0);

        let frames = frames_from_wav(&path, 16000, 500).unwrap();
        assert_eq!(frames.len(), 4);
        for (i, frame) in frames.iter().enumerate() {
            assert!((frame.timestamp - i as f64 * 0.5).abs() < 1e-9);
            assert_eq!(frame.sample_rate, 16000);
        }
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 32000);
    }

    #[test]
    fn stereo_input_is_folded_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 16000, 2, 1.0);

        let frames = frames_from_wav(&path, 16000, 320).unwrap();
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 16000);
    }

    #[test]
    fn high_rate_input_is_resampled_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hi.wav");
        write_wav(&path, 48000, 1, 1.0);

        let frames = frames_from_wav(&path, 16000, 320).unwrap();
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 16000);
    }
}
