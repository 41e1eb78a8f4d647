//! `hark` binary: wires the shipped capabilities together and runs the loop

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hark::config::Config;
use hark::dispatch::{Capabilities, Dispatcher};
use hark::launcher::SystemLauncher;
use hark::mail::{CredentialStore, SmtpMailer, TerminalPrompt};
use hark::providers::OpenAITranscriptionProvider;
use hark::speech::{ConsoleListener, Listener, MicrophoneListener, SystemSpeaker};
use hark::timeparse::PhraseTimeParser;
use hark::{Assistant, server};

#[derive(Parser, Debug)]
#[command(name = "hark", version, about = "Voice-driven personal assistant")]
struct Cli {
    /// JSON file overriding the built-in app/site tables and relay settings
    #[arg(long, env = "HARK_CONFIG")]
    config: Option<PathBuf>,

    /// Read commands from stdin instead of the microphone
    #[arg(long)]
    typed: bool,

    /// Do not start the local web trigger
    #[arg(long)]
    no_server: bool,

    /// Port for the web trigger
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the conversation, logs go to stderr
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hark=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_server {
        config.server.enabled = false;
    }
    let config = Arc::new(config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let handle = runtime.handle().clone();

    let listener: Arc<dyn Listener> = if cli.typed {
        info!("Typed input mode");
        Arc::new(ConsoleListener::new())
    } else {
        let provider = Arc::new(OpenAITranscriptionProvider::new(None));
        let microphone = MicrophoneListener::new(provider, handle.clone()).context(
            "voice input unavailable: set OPENAI_API_KEY and check the microphone, or run with --typed",
        )?;
        Arc::new(microphone)
    };

    let capabilities = Capabilities {
        speaker: Arc::new(SystemSpeaker::detect()),
        listener,
        launcher: Arc::new(SystemLauncher),
        mailer: Arc::new(SmtpMailer::new(&config.smtp)),
        prompt: Arc::new(TerminalPrompt),
        time_parser: Box::new(PhraseTimeParser::new().context("failed to build the time parser")?),
    };

    let dispatcher = Arc::new(
        Dispatcher::new(
            Arc::clone(&config),
            capabilities,
            Arc::new(CredentialStore::from_env()),
            handle.clone(),
        )
        .context("failed to build the command dispatcher")?,
    );

    if config.server.enabled {
        let addr = config.server_addr();
        let tcp = runtime
            .block_on(TcpListener::bind(&addr))
            .with_context(|| format!("failed to bind the web trigger on {addr}"))?;
        println!("Web UI available at http://{addr}");

        let shared = Arc::clone(&dispatcher);
        runtime.spawn(async move {
            if let Err(e) = server::serve_on(tcp, shared).await {
                warn!("Web trigger stopped: {}", e);
            }
        });
    }

    let interrupted = Arc::clone(&dispatcher);
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tokio::task::spawn_blocking(move || {
                interrupted.speak("Interrupted by user. Exiting.");
                interrupted.shutdown();
            })
            .await;
            std::process::exit(0);
        }
    });

    Assistant::new(dispatcher)
        .run()
        .context("assistant loop failed")?;

    info!("Goodbye");
    Ok(())
}
