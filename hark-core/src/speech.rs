//! Speech input and output capabilities
//!
//! The assistant only talks to [`Speaker`] and [`Listener`]. The shipped
//! speaker shells out to the platform TTS command; listeners either record
//! the microphone and transcribe it, or read typed lines from stdin.

use std::io::{BufRead, Write};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::audio::{AudioCapture, AudioCaptureConfig};
use crate::config::ListenBounds;
use crate::error::{Error, Result};
use crate::providers::{TranscriptionProvider, TranscriptionRequest};
use crate::vad::{GateEnd, GateState, ListenGate};

/// Speaking rate in words per minute
#[cfg_attr(target_os = "windows", allow(dead_code))]
const SPEECH_RATE: u32 = 170;

/// Announces text to the user and waits until it has been spoken
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

/// Produces one utterance per call
pub trait Listener: Send + Sync {
    /// Wait up to `bounds.timeout` for speech and record at most
    /// `bounds.phrase_limit`. Returns an empty string on silence or
    /// unrecognized audio, `Error::SpeechNetwork` when the recognizer is
    /// unreachable.
    fn listen(&self, bounds: ListenBounds) -> Result<String>;
}

/// Platform text-to-speech through a system command
pub struct SystemSpeaker {
    voice_enabled: bool,
    /// Serializes output so overlapping announcements don't interleave
    lock: Mutex<()>,
}

impl SystemSpeaker {
    /// Probe the platform TTS command; falls back to text-only output
    pub fn detect() -> Self {
        let voice_enabled = match tts_command("").output() {
            Ok(_) => true,
            Err(e) => {
                warn!("Text-to-speech unavailable ({}), printing only", e);
                false
            }
        };
        Self {
            voice_enabled,
            lock: Mutex::new(()),
        }
    }

    /// Print only, never invoke TTS
    pub fn text_only() -> Self {
        Self {
            voice_enabled: false,
            lock: Mutex::new(()),
        }
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&self, text: &str) {
        let _guard = self.lock.lock();
        println!("Assistant: {}", text);
        let _ = std::io::stdout().flush();

        if !self.voice_enabled || text.trim().is_empty() {
            return;
        }
        match tts_command(text).status() {
            Ok(status) if !status.success() => warn!("TTS exited with {}", status),
            Ok(_) => {}
            Err(e) => warn!("TTS failed: {}", e),
        }
    }
}

#[cfg(target_os = "macos")]
fn tts_command(text: &str) -> Command {
    let mut cmd = Command::new("say");
    cmd.arg("-r").arg(SPEECH_RATE.to_string()).arg(text);
    cmd
}

#[cfg(target_os = "windows")]
fn tts_command(text: &str) -> Command {
    let script = format!(
        "Add-Type -AssemblyName System.Speech; \
         (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
        text.replace('\'', "''")
    );
    let mut cmd = Command::new("powershell");
    cmd.arg("-NoProfile").arg("-Command").arg(script);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn tts_command(text: &str) -> Command {
    let mut cmd = Command::new("espeak");
    cmd.arg("-s").arg(SPEECH_RATE.to_string()).arg(text);
    cmd
}

/// Reads typed commands from stdin
pub struct ConsoleListener {
    lock: Mutex<()>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl Default for ConsoleListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Listener for ConsoleListener {
    fn listen(&self, _bounds: ListenBounds) -> Result<String> {
        let _guard = self.lock.lock();
        print!("You: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(Error::InputClosed);
        }
        Ok(line.trim().to_string())
    }
}

/// Records the default microphone and transcribes it
pub struct MicrophoneListener {
    provider: Arc<dyn TranscriptionProvider>,
    runtime: Handle,
    capture_config: AudioCaptureConfig,
    /// Only one listen step may own the microphone at a time
    lock: Mutex<()>,
}

impl MicrophoneListener {
    /// Fails when there is no input device or the provider lacks credentials
    pub fn new(provider: Arc<dyn TranscriptionProvider>, runtime: Handle) -> Result<Self> {
        if !provider.is_configured() {
            return Err(Error::ProviderNotConfigured(format!(
                "{} is not configured",
                provider.name()
            )));
        }

        let capture_config = AudioCaptureConfig::default();
        // probe the device once so a missing microphone fails at startup
        AudioCapture::with_config(capture_config.clone())?;

        info!("Microphone listener using {}", provider.name());
        Ok(Self {
            provider,
            runtime,
            capture_config,
            lock: Mutex::new(()),
        })
    }

    fn record(&self, bounds: ListenBounds) -> Result<Option<(Vec<u8>, u32)>> {
        let mut capture = AudioCapture::with_config(self.capture_config.clone())?;
        capture.start()?;

        let mut gate = ListenGate::new(capture.sample_rate(), bounds.timeout(), bounds.phrase_limit());
        let chunk_len = gate.chunk_len();
        let deadline = Instant::now() + gate.deadline();
        let mut offset = 0;

        let end = loop {
            std::thread::sleep(Duration::from_millis(20));

            let fresh = capture.samples_since(offset);
            for chunk in fresh.chunks_exact(chunk_len) {
                offset += chunk.len();
                if matches!(gate.feed(chunk), GateState::Finished(_)) {
                    break;
                }
            }

            if let GateState::Finished(end) = gate.state() {
                break end;
            }
            if Instant::now() >= deadline {
                // the device stopped delivering audio
                break GateEnd::TimedOut;
            }
        };

        let audio = capture.stop();
        debug!("Listen step ended: {:?}", end);

        Ok(match end {
            GateEnd::TimedOut => None,
            GateEnd::SpeechEnded | GateEnd::PhraseLimit => Some((audio, capture.sample_rate())),
        })
    }
}

impl Listener for MicrophoneListener {
    fn listen(&self, bounds: ListenBounds) -> Result<String> {
        let _guard = self.lock.lock();

        let Some((audio, sample_rate)) = self.record(bounds)? else {
            return Ok(String::new());
        };

        let request = TranscriptionRequest::new(audio, sample_rate).with_language("en");
        let text = match self.runtime.block_on(self.provider.transcribe(request)) {
            Ok(response) => response.text,
            Err(Error::Network(e)) => return Err(Error::SpeechNetwork(e.to_string())),
            Err(Error::Transcription(e)) => return Err(Error::SpeechNetwork(e)),
            Err(e) => return Err(e),
        };

        if !text.is_empty() {
            println!("You said: {}", text);
        }
        Ok(text)
    }
}
