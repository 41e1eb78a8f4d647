//! Speech-to-text provider abstraction
//!
//! The microphone listener hands captured audio to a [`TranscriptionProvider`];
//! OpenAI Whisper is the shipped implementation.

mod openai;
mod transcription;

pub use openai::OpenAITranscriptionProvider;
pub use transcription::{TranscriptionProvider, TranscriptionRequest, TranscriptionResponse};
