// HTTP surface: dashboard page, static assets and the /ws subscriber endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::distribution::subscribers::{Subscriber, SubscriberSet};
use crate::error::SubscriberError;
use crate::shutdown::Shutdown;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub subscribers: Arc<SubscriberSet>,
    pub static_dir: PathBuf,
    pub shutdown: Shutdown,
}

/// A browser (or any websocket client) receiving snapshot JSON.
pub struct WsSubscriber {
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

#[async_trait]
impl Subscriber for WsSubscriber {
    async fn send(&self, payload: &str) -> Result<(), SubscriberError> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(SEND_TIMEOUT, sink.send(Message::Text(payload.to_string()))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SubscriberError::Write(e.to_string())),
            Err(_) => Err(SubscriberError::Write("send timed out".to_string())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .nest_service("/static", assets)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` fires. Open subscriber sockets are closed as part of it.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let mut shutdown = state.shutdown.clone();
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn index(State(state): State<AppState>) -> Response {
    let path = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Dashboard page unavailable");
            (StatusCode::NOT_FOUND, "index.html not found").into_response()
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state.subscribers, state.shutdown))
}

async fn serve_subscriber(socket: WebSocket, subscribers: Arc<SubscriberSet>, mut shutdown: Shutdown) {
    let (sink, mut stream) = socket.split();
    let id = subscribers.register(Arc::new(WsSubscriber::new(sink)));

    // inbound traffic is ignored; reading keeps ping/pong and close handling alive
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            msg = stream.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(id, error = %e, "Subscriber socket error");
                    break;
                }
            },
        }
    }
    subscribers.remove(id);
}
