//! Core types used throughout Hark

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving reminder identifiers from task text
const REMINDER_NAMESPACE: Uuid = Uuid::from_u128(0x6861_726b_2d72_656d_696e_6465_7273_0001);

/// Default subject when the spoken subject is blank
pub const DEFAULT_SUBJECT: &str = "(no subject)";

/// Default body when nothing was dictated
pub const DEFAULT_BODY: &str = "Sent via AI Voice Assistant";

/// The classified meaning of one utterance, with extracted arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Web search; an empty query means "ask what to search for"
    Search { query: String },
    Open { target: String },
    CreateFolder { name: String },
    CreateFile { name: String },
    SendMail {
        to: String,
        subject: String,
        body: Option<String>,
    },
    /// A mail command was recognized but recipient/subject could not be extracted
    MalformedMail,
    /// `time` is None when the phrase carried no time marker
    SetReminder { task: String, time: Option<String> },
    Unknown,
}

impl Intent {
    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Open { .. } => "open",
            Self::CreateFolder { .. } => "create_folder",
            Self::CreateFile { .. } => "create_file",
            Self::SendMail { .. } => "send_mail",
            Self::MalformedMail => "malformed_mail",
            Self::SetReminder { .. } => "set_reminder",
            Self::Unknown => "unknown",
        }
    }
}

/// A one-shot reminder waiting in the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub id: String,
    pub fire_at: DateTime<Local>,
    pub task: String,
}

impl ReminderJob {
    /// Build a job whose id is derived from the fire time and task text,
    /// so re-issuing the same reminder yields the same id
    pub fn new(task: impl Into<String>, fire_at: DateTime<Local>) -> Self {
        let task = task.into();
        Self {
            id: reminder_id(&task, fire_at),
            fire_at,
            task,
        }
    }
}

/// `reminder_<unix seconds>_<uuid v5 of task>`
pub fn reminder_id(task: &str, fire_at: DateTime<Local>) -> String {
    let digest = Uuid::new_v5(&REMINDER_NAMESPACE, task.as_bytes());
    format!("reminder_{}_{}", fire_at.timestamp(), digest.simple())
}

/// Result of registering a job with the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// No job with this id was pending
    Scheduled,
    /// A pending job with the same id was overwritten
    Replaced,
}

/// Sender credentials for outbound mail
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub address: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An outbound message ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    /// Build a message, filling blank subject/body with defaults
    pub fn new(to: impl Into<String>, subject: &str, body: &str) -> Self {
        let subject = subject.trim();
        let body = body.trim();
        Self {
            to: to.into(),
            subject: if subject.is_empty() {
                DEFAULT_SUBJECT.to_string()
            } else {
                subject.to_string()
            },
            body: if body.is_empty() {
                DEFAULT_BODY.to_string()
            } else {
                body.to_string()
            },
        }
    }
}
