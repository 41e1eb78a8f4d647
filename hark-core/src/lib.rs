//! Hark - voice-driven personal assistant
//!
//! Listens for short spoken commands, classifies each into an [`Intent`] and
//! acts on it: web search, opening sites and apps, creating files and
//! folders on the desktop, sending mail and scheduling spoken reminders.
//! Speech, launching, mail and time parsing sit behind traits so the shipped
//! OS-backed implementations can be swapped for fakes.

pub mod assistant;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod mail;
pub mod providers;
pub mod reminder;
pub mod server;
pub mod speech;
pub mod timeparse;
pub mod types;
pub mod vad;
pub mod voice_commands;

pub use error::{Error, Result};
pub use types::*;

/// Re-export the main components for convenience
pub use assistant::Assistant;
pub use config::Config;
pub use dispatch::{Capabilities, Dispatcher};
pub use launcher::{Launcher, SystemLauncher};
pub use mail::{CredentialPrompt, CredentialStore, Mailer, SmtpMailer, TerminalPrompt};
pub use reminder::ReminderScheduler;
pub use speech::{ConsoleListener, Listener, MicrophoneListener, Speaker, SystemSpeaker};
pub use timeparse::{PhraseTimeParser, TimeParser};
pub use voice_commands::IntentMatcher;
