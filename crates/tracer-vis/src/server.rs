//! Axum web server with WebSocket streaming of playback updates.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use tracer_core::{
    FleetSnapshot, LoadSummary, PayloadRecord, PlaybackDriver, PlaybackSpeed, PlaybackStatus,
    PlaybackUpdate, VehicleId, VehiclePathOverlay,
};
use tracer_graph::GraphDocument;

/// Shared application state.
pub struct AppState {
    driver: PlaybackDriver,
}

/// Visualization server.
pub struct VisServer {
    state: Arc<AppState>,
    assets: Option<PathBuf>,
}

impl VisServer {
    /// Create a server over a playback session.
    pub fn new(driver: PlaybackDriver) -> Self {
        Self {
            state: Arc::new(AppState { driver }),
            assets: None,
        }
    }

    /// Serve the renderer's static files from `dir` for any non-API path.
    pub fn with_assets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets = Some(dir.into());
        self
    }

    pub fn driver(&self) -> &PlaybackDriver {
        &self.state.driver
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/graph", get(graph_handler))
            .route("/api/snapshot", get(snapshot_handler))
            .route("/api/overlays", get(overlays_handler))
            .route("/api/payloads", get(payloads_handler).post(load_payloads_handler))
            .route("/api/logs", post(load_logs_handler))
            .route("/api/playback", get(playback_status_handler))
            .route("/api/playback/play", post(play_handler))
            .route("/api/playback/pause", post(pause_handler))
            .route("/api/playback/reset", post(reset_handler))
            .route("/api/playback/seek", post(seek_handler))
            .route("/api/playback/speed", post(speed_handler))
            // WebSocket for real-time updates
            .route("/ws", get(ws_handler));

        let router = match &self.assets {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router,
        };

        router
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), std::io::Error> {
        info!(addr = %listener.local_addr()?, "visualization server listening");
        axum::serve(listener, self.router()).await
    }
}

/// Error body returned by the API.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug)]
enum ApiError {
    Rejected(tracer_core::Error),
    BadSpeed(f64),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Rejected(e) => {
                let kind = match &e {
                    tracer_core::Error::MalformedData { .. } => "malformed_data",
                    tracer_core::Error::UnknownLocation { .. } => "unknown_location",
                    tracer_core::Error::Json(_) => "invalid_json",
                };
                (StatusCode::UNPROCESSABLE_ENTITY, kind, e.to_string())
            }
            ApiError::BadSpeed(multiplier) => (
                StatusCode::BAD_REQUEST,
                "invalid_speed",
                format!("speed {multiplier} is not one of 0.5, 1, 2, 5"),
            ),
        };
        (status, Json(ErrorResponse { error, kind })).into_response()
    }
}

impl From<tracer_core::Error> for ApiError {
    fn from(e: tracer_core::Error) -> Self {
        ApiError::Rejected(e)
    }
}

/// Server status response.
#[derive(Debug, Serialize)]
struct StatusResponse {
    status: String,
    node_count: usize,
    edge_count: usize,
    vehicle_count: usize,
    event_count: usize,
    max_timestamp: u64,
    payload_count: usize,
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state
        .driver
        .read(|engine| StatusResponse {
            status: "ok".to_string(),
            node_count: engine.graph().node_count(),
            edge_count: engine.graph().edge_count(),
            vehicle_count: engine.store().vehicle_count(),
            event_count: engine.store().len(),
            max_timestamp: engine.store().max_timestamp(),
            payload_count: engine.payloads().len(),
        })
        .await;
    Json(status)
}

async fn graph_handler(State(state): State<Arc<AppState>>) -> Json<GraphDocument> {
    let doc = state
        .driver
        .read(|engine| GraphDocument::from(&**engine.graph()))
        .await;
    Json(doc)
}

async fn snapshot_handler(State(state): State<Arc<AppState>>) -> Json<FleetSnapshot> {
    Json(state.driver.snapshot().await)
}

async fn overlays_handler(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<VehicleId, VehiclePathOverlay>> {
    Json(state.driver.overlays().await)
}

async fn payloads_handler(State(state): State<Arc<AppState>>) -> Json<Vec<PayloadRecord>> {
    Json(state.driver.payloads().await)
}

#[derive(Debug, Serialize)]
struct PayloadsLoaded {
    rows: usize,
}

async fn load_payloads_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<PayloadsLoaded>, ApiError> {
    let rows = state.driver.load_payloads_json(&body).await?;
    Ok(Json(PayloadsLoaded { rows }))
}

async fn load_logs_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<LoadSummary>, ApiError> {
    Ok(Json(state.driver.load_logs_json(&body).await?))
}

async fn playback_status_handler(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.driver.status().await)
}

async fn play_handler(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.driver.start().await)
}

async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.driver.pause().await)
}

async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<PlaybackStatus> {
    Json(state.driver.reset().await.status)
}

#[derive(Debug, Deserialize)]
struct SeekRequest {
    time: u64,
}

async fn seek_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SeekRequest>,
) -> Json<PlaybackStatus> {
    Json(state.driver.scrub(req.time).await.status)
}

#[derive(Debug, Deserialize)]
struct SpeedRequest {
    multiplier: f64,
}

async fn speed_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SpeedRequest>,
) -> Result<Json<PlaybackStatus>, ApiError> {
    let speed =
        PlaybackSpeed::from_multiplier(req.multiplier).ok_or(ApiError::BadSpeed(req.multiplier))?;
    Ok(Json(state.driver.set_speed(speed).await))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before reading the initial update so nothing falls between.
    let mut updates = state.driver.subscribe();
    let initial = WsResponse::Update(state.driver.update().await);
    if send_json(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(msg)) = incoming else { break };
                match msg {
                    Message::Text(text) => {
                        let response = match serde_json::from_str::<WsCommand>(text.as_str()) {
                            Ok(cmd) => handle_ws_command(&state, cmd).await,
                            Err(e) => WsResponse::Error { error: e.to_string() },
                        };
                        if send_json(&mut socket, &response).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if send_json(&mut socket, &WsResponse::Update(update)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, dropped updates");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("websocket client disconnected");
}

async fn send_json(socket: &mut WebSocket, response: &WsResponse) -> Result<(), axum::Error> {
    match serde_json::to_string(response) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "failed to encode websocket message");
            Ok(())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsCommand {
    GetSnapshot,
    GetStatus,
    Seek { time: u64 },
    Play,
    Pause,
    Reset,
    Speed { multiplier: f64 },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsResponse {
    Update(PlaybackUpdate),
    Snapshot(FleetSnapshot),
    Status(PlaybackStatus),
    Error { error: String },
}

async fn handle_ws_command(state: &AppState, cmd: WsCommand) -> WsResponse {
    let driver = &state.driver;
    match cmd {
        WsCommand::GetSnapshot => WsResponse::Snapshot(driver.snapshot().await),
        WsCommand::GetStatus => WsResponse::Status(driver.status().await),
        // Seek and reset also push an update to every subscriber.
        WsCommand::Seek { time } => WsResponse::Status(driver.scrub(time).await.status),
        WsCommand::Play => WsResponse::Status(driver.start().await),
        WsCommand::Pause => WsResponse::Status(driver.pause().await),
        WsCommand::Reset => WsResponse::Status(driver.reset().await.status),
        WsCommand::Speed { multiplier } => match PlaybackSpeed::from_multiplier(multiplier) {
            Some(speed) => WsResponse::Status(driver.set_speed(speed).await),
            None => WsResponse::Error {
                error: format!("speed {multiplier} is not one of 0.5, 1, 2, 5"),
            },
        },
    }
}
