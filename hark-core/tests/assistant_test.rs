//! Foreground loop and web trigger tests

mod common;

use std::sync::Arc;

use common::Harness;
use hark::Assistant;
use hark::Error;
use hark::config::ListenBounds;

// ============ Assistant loop ============

#[test]
fn test_loop_runs_commands_until_exit_phrase() {
    let h = Harness::builder()
        .answers(&["open youtube", "", "please quit now", "search for never"])
        .build();

    Assistant::new(Arc::clone(&h.dispatcher)).run().unwrap();

    assert_eq!(
        h.speaker.lines(),
        vec![
            "Voice assistant active. Say a command after the beep.",
            "Listening...",
            "Opening youtube.",
            "Listening...",
            "Listening...",
            "Shutting down. Bye!",
        ]
    );
    // the command after the exit phrase is never heard
    assert_eq!(h.listener.remaining(), 1);
    assert!(
        h.listener
            .bounds_seen()
            .iter()
            .all(|b| *b == ListenBounds::new(8, 10))
    );
    assert!(!h.dispatcher.scheduler().is_running());
}

#[test]
fn test_loop_stops_when_input_closes() {
    let h = Harness::builder()
        .answers(&["remind me to call mom at 6 pm"])
        .build();

    Assistant::new(Arc::clone(&h.dispatcher)).run().unwrap();

    assert!(h.speaker.said("Reminder set for"));
    assert!(!h.dispatcher.scheduler().is_running());
    // shutdown discards what was pending
    assert!(h.dispatcher.scheduler().pending().is_empty());
}

#[test]
fn test_loop_survives_speech_outage() {
    let h = Harness::new();
    h.listener
        .push_error(Error::SpeechNetwork("timed out".to_string()));
    h.listener.push("exit");

    Assistant::new(Arc::clone(&h.dispatcher)).run().unwrap();

    assert!(h.speaker.said("Network error for speech recognition."));
    assert!(h.speaker.said("Shutting down. Bye!"));
}

#[test]
fn test_loop_returns_device_errors() {
    let h = Harness::new();
    h.listener
        .push_error(Error::Audio("device unplugged".to_string()));

    let result = Assistant::new(Arc::clone(&h.dispatcher)).run();

    assert!(matches!(result, Err(Error::Audio(_))));
    assert!(!h.dispatcher.scheduler().is_running());
}

// ============ Web trigger ============

async fn start_server(h: &Harness) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let dispatcher = Arc::clone(&h.dispatcher);
    tokio::spawn(async move {
        hark::server::serve_on(listener, dispatcher).await.unwrap();
    });
    addr
}

#[tokio::test(flavor = "multi_thread")]
async fn test_control_page_is_served() {
    let h = Harness::builder().build_on(tokio::runtime::Handle::current());
    let addr = start_server(&h).await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert!(response.status().is_success());
    let page = response.text().await.unwrap();
    assert!(page.contains("Listen"));
    assert!(page.contains("/listen"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listen_trigger_runs_one_cycle() {
    let h = Harness::builder()
        .answers(&["search for weather"])
        .build_on(tokio::runtime::Handle::current());
    let addr = start_server(&h).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/listen"))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");

    assert_eq!(
        h.launcher.urls(),
        vec!["https://www.google.com/search?q=weather"]
    );
    assert_eq!(h.listener.bounds_seen(), vec![ListenBounds::new(6, 10)]);
    assert_eq!(
        h.speaker.lines(),
        vec!["Listening...", "Searching for weather on the web."]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listen_trigger_answers_ok_on_silence() {
    let h = Harness::builder()
        .answers(&[""])
        .build_on(tokio::runtime::Handle::current());
    let addr = start_server(&h).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/listen"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "OK");
    assert_eq!(h.speaker.lines(), vec!["Listening..."]);
}
