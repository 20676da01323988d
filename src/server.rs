//! HTTP API server: axum router and request handlers.
//!
//! The server runs on the tokio async runtime while the simulation thread
//! runs on a plain `std::thread`. Communication is via `std::sync::mpsc`.
//!
//! ## Rust concepts
//! - axum extractors: `State`, `Path`, `Json`
//! - `Arc` for sharing state across async tasks
//! - Serde `Deserialize` for parsing JSON request bodies
//! - `tower-http` middleware for CORS and request tracing

use crate::runner::{Button, FrameSnapshot, SimCommand, SimState, SimStatus};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::Deserialize;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// ── App State ────────────────────────────────────────────────────────

/// Shared application state, passed to every handler via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Channel to send commands to the simulation thread
    pub command_tx: Sender<SimCommand>,
    /// Shared status (simulation thread writes, handlers read)
    pub status: Arc<Mutex<SimStatus>>,
}

// ── OpenAPI Documentation ────────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_status,
        get_frame,
        post_button,
        post_button_tap,
        post_sim_pause,
        post_sim_resume,
        post_sim_reset,
        post_sim_rate,
    ),
    components(schemas(
        SimStatus,
        SimState,
        FrameSnapshot,
        Button,
        ButtonRequest,
        RateRequest,
    )),
    tags(
        (name = "buttons", description = "Drive the raw button lines"),
        (name = "simulation", description = "Clock control"),
        (name = "system", description = "System status endpoints"),
    ),
    info(
        title = "LED Scan API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for a simulated 4x4 LED matrix scanner"
    )
)]
pub struct ApiDoc;

// ── Request types ────────────────────────────────────────────────────

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ButtonRequest {
    /// Line level: true holds the button, false releases it
    #[schema(example = true)]
    pressed: bool,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RateRequest {
    /// Ticks per second. 0 stops the clock without pausing.
    #[schema(example = 1000)]
    hz: u32,
}

// ── Router ───────────────────────────────────────────────────────────

/// Build the axum router with all API endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/frame", get(get_frame))
        .route("/api/v1/buttons/{button}", post(post_button))
        .route("/api/v1/buttons/{button}/tap", post(post_button_tap))
        .route("/api/v1/sim/pause", post(post_sim_pause))
        .route("/api/v1/sim/resume", post(post_sim_resume))
        .route("/api/v1/sim/reset", post(post_sim_reset))
        .route("/api/v1/sim/rate", post(post_sim_rate))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────

/// GET /api/v1/status — current simulation state
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "Current simulation status", body = SimStatus)
    )
)]
async fn get_status(State(state): State<AppState>) -> Json<SimStatus> {
    Json(read_status(&state))
}

/// GET /api/v1/frame — averaged brightness of the matrix
#[utoipa::path(
    get,
    path = "/api/v1/frame",
    tag = "system",
    responses(
        (status = 200, description = "Perceived brightness of every cell", body = FrameSnapshot)
    )
)]
async fn get_frame(State(state): State<AppState>) -> Json<FrameSnapshot> {
    Json(read_status(&state).frame)
}

/// POST /api/v1/buttons/{button} — hold or release a button line
#[utoipa::path(
    post,
    path = "/api/v1/buttons/{button}",
    tag = "buttons",
    params(("button" = String, Path, description = "`step` or `ffwd`")),
    request_body = ButtonRequest,
    responses(
        (status = 200, description = "Line level updated"),
        (status = 404, description = "Unknown button")
    )
)]
async fn post_button(
    State(state): State<AppState>,
    Path(button): Path<String>,
    Json(req): Json<ButtonRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let button = parse_button(&button)?;
    send(
        &state,
        SimCommand::SetButton {
            button,
            pressed: req.pressed,
        },
    )
}

/// POST /api/v1/buttons/{button}/tap — hold a button line for one tick
#[utoipa::path(
    post,
    path = "/api/v1/buttons/{button}/tap",
    tag = "buttons",
    params(("button" = String, Path, description = "`step` or `ffwd`")),
    responses(
        (status = 200, description = "Tap queued"),
        (status = 404, description = "Unknown button")
    )
)]
async fn post_button_tap(
    State(state): State<AppState>,
    Path(button): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let button = parse_button(&button)?;
    send(&state, SimCommand::Tap(button))
}

/// POST /api/v1/sim/pause — stop clocking
#[utoipa::path(
    post,
    path = "/api/v1/sim/pause",
    tag = "simulation",
    responses(
        (status = 200, description = "Simulation paused"),
    )
)]
async fn post_sim_pause(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, SimCommand::Pause)
}

/// POST /api/v1/sim/resume — resume clocking
#[utoipa::path(
    post,
    path = "/api/v1/sim/resume",
    tag = "simulation",
    responses(
        (status = 200, description = "Simulation resumed"),
    )
)]
async fn post_sim_resume(
    State(state): State<AppState>,
) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, SimCommand::Resume)
}

/// POST /api/v1/sim/reset — return every register to power-up values
#[utoipa::path(
    post,
    path = "/api/v1/sim/reset",
    tag = "simulation",
    responses(
        (status = 200, description = "Simulation reset"),
    )
)]
async fn post_sim_reset(State(state): State<AppState>) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, SimCommand::Reset)
}

/// POST /api/v1/sim/rate — set the tick rate
#[utoipa::path(
    post,
    path = "/api/v1/sim/rate",
    tag = "simulation",
    request_body = RateRequest,
    responses(
        (status = 200, description = "Tick rate updated"),
    )
)]
async fn post_sim_rate(
    State(state): State<AppState>,
    Json(req): Json<RateRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    send(&state, SimCommand::SetTickRate(req.hz))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn read_status(state: &AppState) -> SimStatus {
    match state.status.lock() {
        Ok(s) => s.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

fn parse_button(name: &str) -> Result<Button, (StatusCode, String)> {
    name.parse().map_err(|e| (StatusCode::NOT_FOUND, e))
}

fn send(state: &AppState, cmd: SimCommand) -> Result<StatusCode, (StatusCode, String)> {
    state.command_tx.send(cmd).map_err(|_| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Simulation thread gone".to_string(),
        )
    })?;

    Ok(StatusCode::OK)
}
