//! Outbound mail
//!
//! Credentials come from the environment at startup and are filled in
//! interactively the first time they are needed. Transport is SMTP over
//! implicit TLS via lettre.

use std::io::{BufRead, Write};

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::{Message, SmtpTransport, Transport};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::SmtpConfig;
use crate::error::{Error, Result};
use crate::types::{Credentials, MailMessage};

/// Environment variables holding the sender address, in lookup order
const ADDRESS_VARS: [&str; 2] = ["USER_Email", "EMAIL_ADDRESS"];

/// Environment variables holding the sender secret, in lookup order
const SECRET_VARS: [&str; 2] = ["PASSWORD", "EMAIL_PASSWORD"];

/// SMTP reply codes that mean the relay rejected our login
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// Delivers a message with the given sender credentials
pub trait Mailer: Send + Sync {
    fn send(&self, credentials: &Credentials, message: &MailMessage) -> Result<()>;
}

/// Asks the user for missing credentials
pub trait CredentialPrompt: Send + Sync {
    fn ask_address(&self) -> Result<String>;

    /// Must not echo what the user types
    fn ask_secret(&self) -> Result<String>;
}

/// Lazily filled sender credentials
///
/// Each field is filled at most once. The lock is held while prompting, so a
/// second caller waits and then sees the value the first one stored.
#[derive(Default)]
pub struct CredentialStore {
    address: Mutex<Option<String>>,
    secret: Mutex<Option<String>>,
}

impl CredentialStore {
    pub fn new(address: Option<String>, secret: Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            address: Mutex::new(non_empty(address)),
            secret: Mutex::new(non_empty(secret)),
        }
    }

    /// Read credentials from the environment; missing ones are prompted later
    pub fn from_env() -> Self {
        let lookup = |vars: &[&str]| vars.iter().find_map(|v| std::env::var(v).ok());
        let store = Self::new(lookup(&ADDRESS_VARS), lookup(&SECRET_VARS));
        debug!(
            "Mail credentials from environment: address={}, secret={}",
            store.address.lock().is_some(),
            store.secret.lock().is_some()
        );
        store
    }

    /// Return complete credentials, prompting for any missing field
    pub fn resolve(&self, prompt: &dyn CredentialPrompt) -> Result<Credentials> {
        let address = fill(&self.address, "sender address", || prompt.ask_address())?;
        let secret = fill(&self.secret, "mail password", || prompt.ask_secret())?;
        Ok(Credentials { address, secret })
    }

    pub fn is_complete(&self) -> bool {
        self.address.lock().is_some() && self.secret.lock().is_some()
    }
}

fn fill(
    slot: &Mutex<Option<String>>,
    what: &str,
    ask: impl FnOnce() -> Result<String>,
) -> Result<String> {
    let mut slot = slot.lock();
    if let Some(value) = slot.as_ref() {
        return Ok(value.clone());
    }

    let value = ask()?.trim().to_string();
    if value.is_empty() {
        return Err(Error::MissingCredentials(format!("no {what} provided")));
    }
    *slot = Some(value.clone());
    Ok(value)
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn ask_address(&self) -> Result<String> {
        print!("Sender email address (Gmail recommended): ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn ask_secret(&self) -> Result<String> {
        Ok(rpassword::prompt_password("Email password / app password: ")?)
    }
}

/// SMTP submission over implicit TLS
pub struct SmtpMailer {
    host: String,
    port: u16,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, credentials: &Credentials, message: &MailMessage) -> Result<()> {
        let from: Mailbox = credentials
            .address
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", credentials.address, e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", message.to, e)))?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| Error::MailTransport(format!("message build failed: {e}")))?;

        let transport = SmtpTransport::relay(&self.host)
            .map_err(|e| Error::MailTransport(format!("relay init failed: {e}")))?
            .port(self.port)
            .credentials(SmtpCredentials::new(
                credentials.address.clone(),
                credentials.secret.clone(),
            ))
            .build();

        debug!("Submitting mail to {} via {}:{}", message.to, self.host, self.port);
        transport.send(&email).map_err(classify_smtp_error)?;
        info!("Mail delivered to relay for {}", message.to);
        Ok(())
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> Error {
    let code = err.status().map(|c| c.to_string());
    match code {
        Some(code) if AUTH_FAILURE_CODES.contains(&code.as_str()) => {
            Error::MailAuth(err.to_string())
        }
        _ => Error::MailTransport(err.to_string()),
    }
}
