//! Voice Activity Detection
//!
//! Energy-based speech detection plus the gate that turns it into a bounded
//! listen step: wait up to a timeout for speech to start, then record until
//! speech stops or the phrase limit is reached.

use std::time::Duration;

use tracing::debug;

/// Chunk length fed to the detector
pub const VAD_CHUNK_MS: u32 = 32;

/// Voice Activity Detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceActivity {
    Silence,
    Speech,
}

/// Simple RMS-threshold detector with hysteresis
pub struct SimpleVad {
    /// Energy threshold for speech detection (RMS)
    threshold: f32,
    /// Consecutive loud chunks before speech starts
    min_speech_chunks: usize,
    /// Consecutive quiet chunks before speech ends
    min_silence_chunks: usize,
    speech_run: usize,
    silence_run: usize,
    state: VoiceActivity,
}

impl Default for SimpleVad {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleVad {
    pub fn new() -> Self {
        Self {
            threshold: 0.01,
            min_speech_chunks: 3,   // ~96ms of speech to trigger
            min_silence_chunks: 25, // ~800ms of silence to end a phrase
            speech_run: 0,
            silence_run: 0,
            state: VoiceActivity::Silence,
        }
    }

    /// Set the energy threshold (lower = more sensitive)
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.001, 0.5);
    }

    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
        (sum_squares / samples.len() as f32).sqrt()
    }

    /// Feed one chunk and return the resulting state
    pub fn update(&mut self, samples: &[f32]) -> VoiceActivity {
        let rms = Self::rms(samples);

        if rms >= self.threshold {
            self.speech_run += 1;
            self.silence_run = 0;
            if self.state == VoiceActivity::Silence && self.speech_run >= self.min_speech_chunks {
                self.state = VoiceActivity::Speech;
                debug!("VAD: speech started (rms: {:.4})", rms);
            }
        } else {
            self.silence_run += 1;
            self.speech_run = 0;
            if self.state == VoiceActivity::Speech && self.silence_run >= self.min_silence_chunks {
                self.state = VoiceActivity::Silence;
                debug!("VAD: speech ended (rms: {:.4})", rms);
            }
        }

        self.state
    }

    pub fn state(&self) -> VoiceActivity {
        self.state
    }
}

/// Why a listen step stopped recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEnd {
    /// Speech never started within the timeout
    TimedOut,
    /// Speaker paused long enough to end the phrase
    SpeechEnded,
    /// The phrase ran into the length limit
    PhraseLimit,
}

/// Progress of a listen step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Waiting,
    Recording,
    Finished(GateEnd),
}

/// Applies listen timeouts to a stream of audio chunks, counted in samples
pub struct ListenGate {
    vad: SimpleVad,
    sample_rate: u32,
    timeout: Duration,
    phrase_limit: Duration,
    elapsed_samples: u64,
    speech_started_at: Option<u64>,
    state: GateState,
}

impl ListenGate {
    pub fn new(sample_rate: u32, timeout: Duration, phrase_limit: Duration) -> Self {
        Self {
            vad: SimpleVad::new(),
            sample_rate: sample_rate.max(1),
            timeout,
            phrase_limit,
            elapsed_samples: 0,
            speech_started_at: None,
            state: GateState::Waiting,
        }
    }

    /// Samples per detector chunk at this gate's sample rate
    pub fn chunk_len(&self) -> usize {
        (self.sample_rate * VAD_CHUNK_MS / 1000).max(1) as usize
    }

    fn samples_to_duration(&self, samples: u64) -> Duration {
        Duration::from_millis(samples * 1000 / self.sample_rate as u64)
    }

    /// Feed one chunk of mono audio
    pub fn feed(&mut self, chunk: &[f32]) -> GateState {
        if let GateState::Finished(_) = self.state {
            return self.state;
        }

        self.elapsed_samples += chunk.len() as u64;
        let activity = self.vad.update(chunk);

        self.state = match self.speech_started_at {
            None if activity == VoiceActivity::Speech => {
                self.speech_started_at = Some(self.elapsed_samples);
                GateState::Recording
            }
            None if self.samples_to_duration(self.elapsed_samples) >= self.timeout => {
                GateState::Finished(GateEnd::TimedOut)
            }
            None => GateState::Waiting,
            Some(_) if activity == VoiceActivity::Silence => {
                GateState::Finished(GateEnd::SpeechEnded)
            }
            Some(start) => {
                let spoken = self.samples_to_duration(self.elapsed_samples - start);
                if spoken >= self.phrase_limit {
                    GateState::Finished(GateEnd::PhraseLimit)
                } else {
                    GateState::Recording
                }
            }
        };

        self.state
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Wall-clock bound after which the caller should stop feeding regardless
    pub fn deadline(&self) -> Duration {
        self.timeout + self.phrase_limit + Duration::from_secs(1)
    }
}
