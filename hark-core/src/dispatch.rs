//! Command dispatch
//!
//! Classifies an utterance and runs the matching action handler. Every
//! handler reports its outcome through the speaker; nothing is surfaced to
//! the caller as an error.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::config::{Config, ListenBounds};
use crate::error::{Error, Result};
use crate::launcher::Launcher;
use crate::mail::{CredentialPrompt, CredentialStore, Mailer};
use crate::reminder::ReminderScheduler;
use crate::speech::{Listener, Speaker};
use crate::timeparse::TimeParser;
use crate::types::{Intent, MailMessage, ReminderJob, ScheduleOutcome};
use crate::voice_commands::{IntentMatcher, normalize_utterance};

const UNKNOWN_COMMAND: &str = "Sorry, I didn't understand that command. Try: Search, Open, Create folder, Create file, Send mail, or Remind me to ...";
const MALFORMED_MAIL: &str =
    "Couldn't parse the email command. Say: Send mail to abc@example.com about subject.";
const ASK_BODY: &str = "Do you want to dictate the body of the email? Say 'yes' to dictate or 'no' to send without body.";
const START_DICTATION: &str = "Start dictating the email body after the beep.";
const MAIL_AUTH_FAILED: &str =
    "Authentication failed. Check your email/password or use an app password for Gmail.";
const ASK_REMINDER_TIME: &str = "When should I remind you? Please say a time like 'tomorrow 8 am' or 'on 25 december 7 pm'.";
const REMINDER_REJECTED: &str = "Couldn't understand the task or time for reminder.";
const REMINDER_UNPARSEABLE: &str =
    "I couldn't parse the time. Try: 'tomorrow 8 am' or 'on 25 december 7 pm'.";
const SPEECH_NETWORK_ERROR: &str = "Network error for speech recognition.";

/// The side-effecting capabilities the handlers act through
pub struct Capabilities {
    pub speaker: Arc<dyn Speaker>,
    pub listener: Arc<dyn Listener>,
    pub launcher: Arc<dyn Launcher>,
    pub mailer: Arc<dyn Mailer>,
    pub prompt: Arc<dyn CredentialPrompt>,
    pub time_parser: Box<dyn TimeParser>,
}

/// Routes utterances to action handlers
///
/// Shared between the foreground loop and the HTTP trigger behind an `Arc`.
pub struct Dispatcher {
    config: Arc<Config>,
    matcher: IntentMatcher,
    speaker: Arc<dyn Speaker>,
    listener: Arc<dyn Listener>,
    launcher: Arc<dyn Launcher>,
    mailer: Arc<dyn Mailer>,
    prompt: Arc<dyn CredentialPrompt>,
    credentials: Arc<CredentialStore>,
    time_parser: Box<dyn TimeParser>,
    scheduler: ReminderScheduler,
    runtime: Handle,
}

impl Dispatcher {
    /// Build the dispatcher and start the reminder scheduler on `runtime`
    pub fn new(
        config: Arc<Config>,
        capabilities: Capabilities,
        credentials: Arc<CredentialStore>,
        runtime: Handle,
    ) -> Result<Self> {
        let matcher = IntentMatcher::new()?;

        let announcer = Arc::clone(&capabilities.speaker);
        let scheduler = ReminderScheduler::start(
            &runtime,
            Arc::new(move |job: ReminderJob| {
                info!("Reminder {} fired", job.id);
                announcer.speak(&format!("Reminder: {}", job.task));
            }),
        );

        debug!("Dispatcher ready with rules {:?}", matcher.rule_names());

        Ok(Self {
            config,
            matcher,
            speaker: capabilities.speaker,
            listener: capabilities.listener,
            launcher: capabilities.launcher,
            mailer: capabilities.mailer,
            prompt: capabilities.prompt,
            credentials,
            time_parser: capabilities.time_parser,
            scheduler,
            runtime,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn speak(&self, text: &str) {
        self.speaker.speak(text);
    }

    /// Raw listen, errors included; the loop needs to see `InputClosed`
    pub fn listen(&self, bounds: ListenBounds) -> Result<String> {
        self.listener.listen(bounds)
    }

    /// Stop the reminder scheduler, discarding pending reminders
    pub fn shutdown(&self) {
        if self.scheduler.is_running() {
            self.scheduler.shutdown();
        }
    }

    /// One listen-then-dispatch cycle, as run by the web trigger
    pub fn trigger_cycle(&self) -> Option<Intent> {
        self.speak("Listening...");
        let text = self.hear(self.config.listen.trigger);
        self.execute(&text)
    }

    /// Classify and act on one utterance
    ///
    /// Returns the intent that was handled, or `None` for an empty utterance.
    pub fn execute(&self, raw: &str) -> Option<Intent> {
        let utterance = normalize_utterance(raw);
        if utterance.is_empty() {
            return None;
        }

        let intent = self.matcher.classify(&utterance);
        info!("Handling {} command", intent.label());

        match &intent {
            Intent::Search { query } => self.search(query),
            Intent::Open { target } => self.open(target),
            Intent::CreateFolder { name } => self.create_folder(name),
            Intent::CreateFile { name } => self.create_file(name),
            Intent::SendMail { to, subject, body } => self.send_mail(to, subject, body.as_deref()),
            Intent::MalformedMail => self.speak(MALFORMED_MAIL),
            Intent::SetReminder { task, time } => self.set_reminder(task, time.as_deref()),
            Intent::Unknown => self.speak(UNKNOWN_COMMAND),
        }

        Some(intent)
    }

    /// Listen inside a handler; failures degrade to an empty answer
    fn hear(&self, bounds: ListenBounds) -> String {
        match self.listener.listen(bounds) {
            Ok(text) => normalize_utterance(&text),
            Err(Error::SpeechNetwork(e)) => {
                warn!("Speech recognition unavailable: {}", e);
                self.speak(SPEECH_NETWORK_ERROR);
                String::new()
            }
            Err(e) => {
                debug!("Listen failed: {}", e);
                String::new()
            }
        }
    }

    pub fn search_url(&self, query: &str) -> String {
        format!("{}{}", self.config.search_url, urlencoding::encode(query))
    }

    fn search(&self, query: &str) {
        if query.is_empty() {
            self.speak("What would you like me to search for?");
            return;
        }
        self.launcher.open_url(&self.search_url(query));
        self.speak(&format!("Searching for {} on the web.", query));
    }

    fn open(&self, target: &str) {
        if target.is_empty() {
            self.speak("What should I open?");
            return;
        }

        if let Some(url) = self.config.site_shortcut(target) {
            self.launcher.open_url(url);
            self.speak(&format!("Opening {}.", target));
            return;
        }

        if target.contains('.') {
            let url = with_scheme(target);
            self.launcher.open_url(&url);
            self.speak(&format!("Opening website {}.", url));
            return;
        }

        if let Some(path) = self.config.app_path(target) {
            match self.launcher.launch_app(path) {
                Ok(()) => {
                    self.speak(&format!("Opening {}.", target));
                    return;
                }
                Err(e) => {
                    warn!("App launch failed: {}", e);
                    self.speak(&format!("Could not open {}. Error: {}", target, e));
                }
            }
        }

        match self.launcher.open_by_name(target) {
            Ok(()) => {
                self.speak(&format!("Opening {}.", target));
                return;
            }
            Err(e) => debug!("Open by name failed: {}", e),
        }

        self.launcher.open_url(&self.search_url(target));
        self.speak(&format!("Couldn't find {}. Searching on the web.", target));
    }

    fn create_folder(&self, name: &str) {
        if name.is_empty() {
            self.speak("Folder name not provided.");
            return;
        }

        let path = self.config.desktop_dir.join(name);
        let created = ensure_parent(&path).and_then(|()| std::fs::create_dir(&path));
        match created {
            Ok(()) => {
                info!("Created folder {}", path.display());
                self.speak(&format!("Folder {} created on desktop.", name));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.speak(&format!(
                    "A folder named {} already exists on your desktop.",
                    name
                ));
            }
            Err(e) => self.speak(&format!("Failed to create folder: {}", e)),
        }
    }

    fn create_file(&self, name: &str) {
        if name.is_empty() {
            self.speak("File name not provided.");
            return;
        }

        let name = with_default_extension(name);
        let path = self.config.desktop_dir.join(&name);

        let created = ensure_parent(&path).and_then(|()| {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map(|_| ())
        });
        match created {
            Ok(()) => {
                info!("Created file {}", path.display());
                self.speak(&format!("File {} created on desktop.", name));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.speak(&format!("A file named {} already exists. Opening it.", name));
            }
            Err(e) => {
                self.speak(&format!("Failed to create file: {}", e));
                return;
            }
        }

        if let Err(e) = self.launcher.open_by_name(&path.to_string_lossy()) {
            debug!("Could not open {}: {}", path.display(), e);
        }
    }

    fn send_mail(&self, to: &str, subject: &str, body: Option<&str>) {
        let body = match body {
            Some(body) => body.to_string(),
            None => {
                self.speak(ASK_BODY);
                let answer = self.hear(self.config.listen.confirm);
                if answer.contains("yes") {
                    self.speak(START_DICTATION);
                    self.hear(self.config.listen.dictation)
                } else {
                    String::new()
                }
            }
        };

        // prompting happens here so it never competes with a background thread for the terminal
        let credentials = match self.credentials.resolve(self.prompt.as_ref()) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!("No mail credentials: {}", e);
                self.speak(&format!("Failed to send email: {}", e));
                return;
            }
        };

        let message = MailMessage::new(to, subject, body.as_str());
        let mailer = Arc::clone(&self.mailer);
        let speaker = Arc::clone(&self.speaker);
        let to = to.to_string();
        let subject = subject.to_string();

        debug!("Dispatching mail to {} in the background", to);
        self.runtime.spawn_blocking(move || {
            match mailer.send(&credentials, &message) {
                Ok(()) => {
                    speaker.speak(&format!("Email sent to {} with subject {}.", to, subject))
                }
                Err(Error::MailAuth(e)) => {
                    warn!("Mail authentication failed: {}", e);
                    speaker.speak(MAIL_AUTH_FAILED);
                }
                Err(e) => {
                    warn!("Mail send failed: {}", e);
                    speaker.speak(&format!("Failed to send email: {}", e));
                }
            }
        });
    }

    fn set_reminder(&self, task: &str, time: Option<&str>) {
        if task.is_empty() {
            self.speak(REMINDER_REJECTED);
            return;
        }

        let phrase = match time {
            Some(time) => time.to_string(),
            None => {
                self.speak(ASK_REMINDER_TIME);
                self.hear(self.config.listen.reminder_time)
            }
        };
        if phrase.trim().is_empty() {
            self.speak(REMINDER_REJECTED);
            return;
        }

        let Some(fire_at) = self.time_parser.parse(&phrase, Local::now()) else {
            debug!("Unparseable reminder time {:?}", phrase);
            self.speak(REMINDER_UNPARSEABLE);
            return;
        };

        let job = ReminderJob::new(task, fire_at);
        match self.scheduler.schedule(job) {
            Ok(outcome) => {
                if outcome == ScheduleOutcome::Replaced {
                    info!("Replaced an identical pending reminder");
                }
                self.speak(&format!(
                    "Reminder set for {} to {}.",
                    fire_at.format("%Y-%m-%d %H:%M"),
                    task
                ));
            }
            Err(e) => self.speak(&format!("Couldn't set the reminder: {}", e)),
        }
    }
}

/// Prefix `http://` unless the target already starts with a scheme
fn with_scheme(target: &str) -> String {
    if has_scheme(target) {
        target.to_string()
    } else {
        format!("http://{}", target)
    }
}

/// True for a leading `scheme://`, where the scheme is a letter followed by
/// letters, digits, `+`, `-` or `.`
fn has_scheme(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Append `.txt` when the name has no extension
fn with_default_extension(name: &str) -> String {
    if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.txt", name)
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent),
        None => Ok(()),
    }
}
