//! Fake capabilities shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Handle, Runtime};

use hark::config::{Config, ListenBounds};
use hark::dispatch::{Capabilities, Dispatcher};
use hark::launcher::Launcher;
use hark::mail::{CredentialPrompt, CredentialStore, Mailer};
use hark::speech::{Listener, Speaker};
use hark::timeparse::PhraseTimeParser;
use hark::{Credentials, Error, MailMessage, Result};

// ============ Speaker ============

#[derive(Default)]
pub struct RecordingSpeaker {
    lines: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn said(&self, fragment: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(fragment))
    }

    /// Poll until a line containing `fragment` shows up (background speech)
    pub fn wait_for(&self, fragment: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.said(fragment) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        self.said(fragment)
    }
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}

// ============ Listener ============

/// Answers listen calls from a script; an exhausted script means input closed
#[derive(Default)]
pub struct ScriptedListener {
    answers: Mutex<VecDeque<Result<String>>>,
    bounds: Mutex<Vec<ListenBounds>>,
}

impl ScriptedListener {
    pub fn new(answers: &[&str]) -> Self {
        let listener = Self::default();
        for answer in answers {
            listener.push(answer);
        }
        listener
    }

    pub fn push(&self, answer: &str) {
        self.answers.lock().push_back(Ok(answer.to_string()));
    }

    pub fn push_error(&self, error: Error) {
        self.answers.lock().push_back(Err(error));
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().len()
    }

    pub fn bounds_seen(&self) -> Vec<ListenBounds> {
        self.bounds.lock().clone()
    }
}

impl Listener for ScriptedListener {
    fn listen(&self, bounds: ListenBounds) -> Result<String> {
        self.bounds.lock().push(bounds);
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(Err(Error::InputClosed))
    }
}

// ============ Launcher ============

#[derive(Default)]
pub struct RecordingLauncher {
    pub urls: Mutex<Vec<String>>,
    pub apps: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    /// Names `open_by_name` resolves besides existing paths
    pub known_names: Vec<String>,
    pub fail_apps: bool,
}

impl RecordingLauncher {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub fn apps(&self) -> Vec<String> {
        self.apps.lock().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn open_url(&self, url: &str) {
        self.urls.lock().push(url.to_string());
    }

    fn launch_app(&self, path: &str) -> Result<()> {
        if self.fail_apps {
            return Err(Error::Launch {
                target: path.to_string(),
                reason: "permission denied".to_string(),
            });
        }
        self.apps.lock().push(path.to_string());
        Ok(())
    }

    fn open_by_name(&self, target: &str) -> Result<()> {
        if self.known_names.iter().any(|n| n == target) || Path::new(target).exists() {
            self.opened.lock().push(target.to_string());
            Ok(())
        } else {
            Err(Error::Launch {
                target: target.to_string(),
                reason: "not found".to_string(),
            })
        }
    }
}

// ============ Mail ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MailOutcome {
    #[default]
    Deliver,
    RejectLogin,
    Fail,
}

#[derive(Default)]
pub struct RecordingMailer {
    pub outcome: MailOutcome,
    sent: Mutex<Vec<(Credentials, MailMessage)>>,
}

impl RecordingMailer {
    pub fn failing(outcome: MailOutcome) -> Self {
        Self {
            outcome,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(Credentials, MailMessage)> {
        self.sent.lock().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, credentials: &Credentials, message: &MailMessage) -> Result<()> {
        match self.outcome {
            MailOutcome::Deliver => {
                self.sent
                    .lock()
                    .push((credentials.clone(), message.clone()));
                Ok(())
            }
            MailOutcome::RejectLogin => Err(Error::MailAuth("535 bad credentials".to_string())),
            MailOutcome::Fail => Err(Error::MailTransport("connection refused".to_string())),
        }
    }
}

pub struct FixedPrompt {
    pub calls: AtomicUsize,
}

impl FixedPrompt {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CredentialPrompt for FixedPrompt {
    fn ask_address(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("me@example.com".to_string())
    }

    fn ask_secret(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("app-password".to_string())
    }
}

// ============ Harness ============

pub struct HarnessBuilder {
    config: Config,
    answers: Vec<String>,
    launcher: RecordingLauncher,
    mailer: RecordingMailer,
}

impl HarnessBuilder {
    pub fn answers(mut self, answers: &[&str]) -> Self {
        self.answers = answers.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn config(mut self, edit: impl FnOnce(&mut Config)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn launcher(mut self, launcher: RecordingLauncher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn mailer(mut self, mailer: RecordingMailer) -> Self {
        self.mailer = mailer;
        self
    }

    /// Build with a private runtime, for plain `#[test]`s
    pub fn build(self) -> Harness {
        let runtime = Runtime::new().unwrap();
        let handle = runtime.handle().clone();
        self.finish(handle, Some(runtime))
    }

    /// Build on the current runtime, for `#[tokio::test]`s
    pub fn build_on(self, handle: Handle) -> Harness {
        self.finish(handle, None)
    }

    fn finish(mut self, handle: Handle, runtime: Option<Runtime>) -> Harness {
        let desktop = tempfile::tempdir().unwrap();
        self.config.desktop_dir = desktop.path().to_path_buf();

        let speaker = Arc::new(RecordingSpeaker::default());
        let listener = Arc::new(ScriptedListener::default());
        for answer in &self.answers {
            listener.push(answer);
        }
        let launcher = Arc::new(self.launcher);
        let mailer = Arc::new(self.mailer);
        let prompt = Arc::new(FixedPrompt::new());

        let capabilities = Capabilities {
            speaker: speaker.clone(),
            listener: listener.clone(),
            launcher: launcher.clone(),
            mailer: mailer.clone(),
            prompt: prompt.clone(),
            time_parser: Box::new(PhraseTimeParser::new().unwrap()),
        };

        let dispatcher = Arc::new(
            Dispatcher::new(
                Arc::new(self.config),
                capabilities,
                Arc::new(CredentialStore::new(None, None)),
                handle,
            )
            .unwrap(),
        );

        Harness {
            dispatcher,
            speaker,
            listener,
            launcher,
            mailer,
            prompt,
            desktop,
            runtime,
        }
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub speaker: Arc<RecordingSpeaker>,
    pub listener: Arc<ScriptedListener>,
    pub launcher: Arc<RecordingLauncher>,
    pub mailer: Arc<RecordingMailer>,
    pub prompt: Arc<FixedPrompt>,
    pub desktop: tempfile::TempDir,
    // dropped last so the scheduler can still reach it on shutdown
    runtime: Option<Runtime>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            config: Config::default(),
            answers: Vec::new(),
            launcher: RecordingLauncher::default(),
            mailer: RecordingMailer::default(),
        }
    }

    pub fn new() -> Harness {
        Self::builder().build()
    }

    pub fn desktop(&self) -> &Path {
        self.desktop.path()
    }
}
