//! Local HTTP trigger
//!
//! `GET /` serves the control page, `POST /listen` runs one listen and
//! dispatch cycle and always answers `OK`.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::Result;

const CONTROL_PAGE: &str = include_str!("../assets/assistant_ui.html");

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(control_page))
        .route("/listen", post(trigger_listen))
        .with_state(dispatcher)
}

async fn control_page() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

async fn trigger_listen(State(dispatcher): State<Arc<Dispatcher>>) -> &'static str {
    // the cycle blocks on the microphone and TTS
    let cycle = tokio::task::spawn_blocking(move || dispatcher.trigger_cycle()).await;
    match cycle {
        Ok(Some(intent)) => info!("Web trigger handled {}", intent.label()),
        Ok(None) => info!("Web trigger heard nothing"),
        Err(e) => warn!("Web trigger cycle panicked: {}", e),
    }
    "OK"
}

/// Bind `addr` and serve until the runtime shuts down
pub async fn serve(addr: &str, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Control page at http://{}", listener.local_addr()?);
    serve_on(listener, dispatcher).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, dispatcher: Arc<Dispatcher>) -> Result<()> {
    axum::serve(listener, router(dispatcher).into_make_service()).await?;
    Ok(())
}
