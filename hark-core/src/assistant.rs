//! The foreground listen/dispatch loop

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::voice_commands::{StopPhrases, normalize_utterance};

const GREETING: &str = "Voice assistant active. Say a command after the beep.";
const FAREWELL: &str = "Shutting down. Bye!";

/// Drives the dispatcher from the listener until asked to stop
pub struct Assistant {
    dispatcher: Arc<Dispatcher>,
    stop_phrases: StopPhrases,
}

impl Assistant {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            stop_phrases: StopPhrases::new(),
        }
    }

    /// Run until an exit phrase or end of input
    ///
    /// The reminder scheduler is stopped on every way out, so pending
    /// reminders never outlive the loop.
    pub fn run(&self) -> Result<()> {
        let result = self.turns();
        self.dispatcher.shutdown();
        result
    }

    fn turns(&self) -> Result<()> {
        let bounds = self.dispatcher.config().listen.command;
        self.dispatcher.speak(GREETING);

        loop {
            self.dispatcher.speak("Listening...");

            let text = match self.dispatcher.listen(bounds) {
                Ok(text) => normalize_utterance(&text),
                Err(Error::SpeechNetwork(e)) => {
                    warn!("Speech recognition unavailable: {}", e);
                    self.dispatcher.speak("Network error for speech recognition.");
                    continue;
                }
                Err(Error::InputClosed) => {
                    info!("Input closed, leaving the loop");
                    return Ok(());
                }
                Err(e) => {
                    error!("Listening failed: {}", e);
                    return Err(e);
                }
            };

            if text.is_empty() {
                continue;
            }
            if self.stop_phrases.matches(&text) {
                self.dispatcher.speak(FAREWELL);
                return Ok(());
            }

            self.dispatcher.execute(&text);
        }
    }
}
