//! Microphone capture using CPAL
//!
//! A capture is opened per listen step and dropped afterwards so the
//! microphone is released between commands.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Raw 16-bit little-endian mono PCM
pub type AudioData = Vec<u8>;

/// Formats we know how to convert, in order of preference
const PREFERRED_FORMATS: [SampleFormat; 4] = [
    SampleFormat::F32,
    SampleFormat::I16,
    SampleFormat::I32,
    SampleFormat::U16,
];

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Sample rate in Hz (default: 16000 for speech recognition)
    pub sample_rate: u32,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self { sample_rate: 16000 }
    }
}

/// Mono f32 capture from the default input device
pub struct AudioCapture {
    device: Device,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(AudioCaptureConfig::default())
    }

    pub fn with_config(config: AudioCaptureConfig) -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("No input device available".to_string()))?;

        #[allow(deprecated)]
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        debug!("Using input device: {}", device_name);

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(format!("Failed to query input configs: {e}")))?
            .collect();

        let (range, sample_format) = PREFERRED_FORMATS
            .iter()
            .find_map(|&format| {
                ranges
                    .iter()
                    .copied()
                    .filter(|r| r.sample_format() == format)
                    .min_by_key(|r| r.channels())
                    .map(|r| (r, format))
            })
            .ok_or_else(|| Error::Audio("No usable input format".to_string()))?;

        let sample_rate = config
            .sample_rate
            .clamp(range.min_sample_rate(), range.max_sample_rate());
        let stream_config = range.with_sample_rate(sample_rate).config();

        Ok(Self {
            device,
            stream_config,
            sample_format,
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start recording into a fresh buffer
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.buffer.lock().clear();

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>()?,
            SampleFormat::I16 => self.build_stream::<i16>()?,
            SampleFormat::I32 => self.build_stream::<i32>()?,
            SampleFormat::U16 => self.build_stream::<u16>()?,
            other => {
                return Err(Error::Audio(format!("Unsupported sample format: {other:?}")));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Audio(format!("Failed to start stream: {e}")))?;
        self.stream = Some(stream);

        info!("Microphone open at {} Hz", self.sample_rate);
        Ok(())
    }

    /// Stop recording and return everything captured as PCM
    pub fn stop(&mut self) -> AudioData {
        self.stream = None;
        let samples = std::mem::take(&mut *self.buffer.lock());
        debug!("Microphone closed, {} samples captured", samples.len());
        samples_to_pcm(&samples)
    }

    /// Copy samples recorded at or after `offset`
    pub fn samples_since(&self, offset: usize) -> Vec<f32> {
        let buffer = self.buffer.lock();
        buffer.get(offset..).map(<[f32]>::to_vec).unwrap_or_default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn build_stream<T>(&self) -> Result<Stream>
    where
        T: Sample + SizedSample,
        f32: FromSample<T>,
    {
        let channels = self.stream_config.channels as usize;
        let buffer = Arc::clone(&self.buffer);

        self.device
            .build_input_stream(
                &self.stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // downmix interleaved frames to mono
                    let mut buf = buffer.lock();
                    for frame in data.chunks_exact(channels.max(1)) {
                        let sum: f32 = frame.iter().map(|s| s.to_sample::<f32>()).sum();
                        buf.push(sum / frame.len() as f32);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Audio(format!("Failed to build stream: {e}")))
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stream = None;
    }
}

/// Convert f32 samples to 16-bit little-endian PCM
pub fn samples_to_pcm(samples: &[f32]) -> AudioData {
    samples
        .iter()
        .flat_map(|&sample| {
            let pcm = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            pcm.to_le_bytes()
        })
        .collect()
}
