use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamError;
use hearline_core::AudioFrame;
use tracing::{error, info, warn};

use crate::utils::audio::{audio_to_mono, f32_to_i16, resample};

use super::device::{get_cpal_device_and_config, AudioDevice};

/// Capacity of the queue between the real-time audio callback and the
/// consumer. When the consumer falls this far behind, the newest chunk is
/// dropped; the callback never blocks.
const CAPTURE_QUEUE_CAPACITY: usize = 512;
const FRAME_CHANNEL_CAPACITY: usize = 512;

enum StreamControl {
    Stop(mpsc::Sender<()>),
}

/// Live microphone capture. A dedicated thread owns the cpal stream and
/// pushes mono chunks into a bounded queue; a bridge thread converts them to
/// fixed-size 16-bit frames at the pipeline sample rate, stamped with a
/// sample-counted session clock.
pub struct CaptureStream {
    pub device: AudioDevice,
    pub sample_rate: u32,
    control_tx: mpsc::Sender<StreamControl>,
    is_disconnected: Arc<AtomicBool>,
    stream_thread: Option<thread::JoinHandle<()>>,
    bridge_thread: Option<thread::JoinHandle<()>>,
}

impl CaptureStream {
    pub fn open(
        device: &AudioDevice,
        target_rate: u32,
        block_ms: u32,
    ) -> Result<(Self, tokio::sync::mpsc::Receiver<AudioFrame>)> {
        let (cpal_device, config) = get_cpal_device_and_config(device)?;
        let device_rate = config.sample_rate().0;
        let channels = config.channels();

        let (chunk_tx, chunk_rx) = crossbeam::channel::bounded::<Vec<f32>>(CAPTURE_QUEUE_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel::<StreamControl>();
        let (frame_tx, frame_rx) =
            tokio::sync::mpsc::channel::<AudioFrame>(FRAME_CHANNEL_CAPACITY);

        let is_disconnected = Arc::new(AtomicBool::new(false));
        let is_disconnected_cb = is_disconnected.clone();
        let control_tx_cb = control_tx.clone();
        let device_name = device.to_string();

        let stream_thread = thread::spawn(move || {
            let error_callback = move |err: StreamError| {
                error!("audio stream error on {}: {}", device_name, err);
                if err.to_string().contains("no longer available")
                    || err.to_string().contains("no longer valid")
                {
                    warn!("audio device {} disconnected, stopping capture", device_name);
                    is_disconnected_cb.store(true, Ordering::Relaxed);
                    let _ = control_tx_cb.send(StreamControl::Stop(mpsc::channel().0));
                }
            };

            let data_callback = {
                let chunk_tx = chunk_tx.clone();
                move |mono: Vec<f32>| {
                    if chunk_tx.try_send(mono).is_err() {
                        warn!("capture queue full, dropping audio chunk");
                    }
                }
            };

            let stream = match config.sample_format() {
                cpal::SampleFormat::F32 => cpal_device.build_input_stream(
                    &config.into(),
                    {
                        let emit = data_callback.clone();
                        move |data: &[f32], _: &_| emit(audio_to_mono(data, channels))
                    },
                    error_callback,
                    None,
                ),
                cpal::SampleFormat::I16 => cpal_device.build_input_stream(
                    &config.into(),
                    {
                        let emit = data_callback.clone();
                        move |data: &[i16], _: &_| {
                            let as_f32: Vec<f32> = data
                                .iter()
                                .map(|&s| s as f32 / i16::MAX as f32)
                                .collect();
                            emit(audio_to_mono(&as_f32, channels))
                        }
                    },
                    error_callback,
                    None,
                ),
                other => {
                    error!("unsupported sample format: {}", other);
                    return;
                }
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("failed to build input stream: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                error!("failed to start audio stream: {}", e);
                return;
            }

            if let Ok(StreamControl::Stop(ack)) = control_rx.recv() {
                info!("stopping audio capture stream");
                stream.pause().ok();
                drop(stream);
                ack.send(()).ok();
            }
        });

        let bridge_thread = thread::spawn(move || {
            let block_samples = (target_rate * block_ms / 1000) as usize;
            let mut pending: Vec<i16> = Vec::with_capacity(block_samples * 2);
            let mut emitted: u64 = 0;

            loop {
                match chunk_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(chunk) => {
                        let samples = f32_to_i16(&chunk);
                        pending.extend(resample(&samples, device_rate, target_rate));

                        while pending.len() >= block_samples {
                            let block: Vec<i16> = pending.drain(..block_samples).collect();
                            let frame = AudioFrame::new(
                                emitted as f64 / target_rate as f64,
                                block,
                                target_rate,
                            );
                            emitted += block_samples as u64;
                            if frame_tx.blocking_send(frame).is_err() {
                                return;
                            }
                        }
                    }
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam::channel::RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        Ok((
            CaptureStream {
                device: device.clone(),
                sample_rate: target_rate,
                control_tx,
                is_disconnected,
                stream_thread: Some(stream_thread),
                bridge_thread: Some(bridge_thread),
            },
            frame_rx,
        ))
    }

    pub fn is_disconnected(&self) -> bool {
        self.is_disconnected.load(Ordering::Relaxed)
    }

    pub fn stop(mut self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.control_tx.send(StreamControl::Stop(ack_tx)).is_ok() {
            ack_rx.recv_timeout(Duration::from_secs(2)).ok();
        }

        if let Some(handle) = self.stream_thread.take() {
            handle
                .join()
                .map_err(|_| anyhow!("failed to join capture thread"))?;
        }
        if let Some(handle) = self.bridge_thread.take() {
            handle
                .join()
                .map_err(|_| anyhow!("failed to join capture bridge thread"))?;
        }
        Ok(())
    }
}
