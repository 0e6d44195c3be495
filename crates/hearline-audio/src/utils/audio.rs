pub fn audio_to_mono(audio: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return audio.to_vec();
    }

    let mut mono_samples = Vec::with_capacity(audio.len() / channels as usize);
    for chunk in audio.chunks(channels as usize) {
        let sum: f32 = chunk.iter().sum();
        mono_samples.push(sum / channels as f32);
    }
    mono_samples
}

pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Interprets a raw little-endian 16-bit PCM payload. A trailing odd byte is
/// dropped rather than rejected.
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Linear-interpolation resampler. Good enough for speech going into a
/// transcription backend; not meant for playback quality.
pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = samples[idx] as f64;
        let b = samples.get(idx + 1).copied().unwrap_or(samples[idx]) as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }
    out
}
