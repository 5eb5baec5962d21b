//! JSON HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `PUT`  | `/faces` | Insert or replace a face record |
//! | `DELETE` | `/photos/{photo_id}/faces` | Remove every face of a photo |
//! | `POST` | `/events/{event_id}/search` | Rank an event's faces against an embedding |
//! | `POST` | `/shares` | Create a share over ready photos |
//! | `GET`  | `/shares` | Newest-first share listing (`?event_id=&limit=`) |
//! | `GET`  | `/shares/{code}` | Fetch an active share |
//! | `POST` | `/shares/{code}/downloads` | Count one photo download |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "expired", "message": "share Ab3… expired at …" } }
//! ```
//!
//! Error codes: `invalid_input` (400), `not_found` (404), `expired` (410),
//! `internal` (500). Request bodies with unknown fields are rejected as
//! `invalid_input`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the gallery frontend
//! can be served from another origin.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use facefind_core::models::{Face, FaceMatch, Share, ShareSummary};
use facefind_core::{Error, FaceIndex, ShareManager};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Default page size for `GET /shares`.
const DEFAULT_LIST_LIMIT: usize = 50;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    index: Arc<FaceIndex<Arc<SqliteStore>>>,
    shares: Arc<ShareManager<Arc<SqliteStore>, Arc<SqliteStore>>>,
    /// Floor applied when a search request omits `min_similarity`.
    default_min_similarity: f64,
}

impl AppState {
    pub fn new(store: Arc<SqliteStore>, config: &Config) -> Self {
        Self {
            index: Arc::new(FaceIndex::new(store.clone(), config.index.dims)),
            shares: Arc::new(ShareManager::new(
                store.clone(),
                store,
                config.shares.policy(),
            )),
            default_min_similarity: config.index.min_similarity,
        }
    }
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the database, applies migrations, and serves until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let state = AppState::new(Arc::new(SqliteStore::new(pool)), config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "facefind server listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Build the router with CORS and request tracing layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/faces", put(handle_upsert_face))
        .route("/photos/{photo_id}/faces", delete(handle_remove_faces))
        .route("/events/{event_id}/search", post(handle_search))
        .route("/shares", post(handle_create_share).get(handle_list_shares))
        .route("/shares/{code}", get(handle_get_share))
        .route("/shares/{code}/downloads", post(handle_track_download))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid_input".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Expired { .. } => StatusCode::GONE,
            Error::Conflict(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            error!(error = %err, "request failed");
            "internal server error".to_string()
        } else {
            err.to_string()
        };
        AppError {
            status,
            code: err.code().to_string(),
            message,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Faces ============

#[derive(Serialize)]
struct UpsertFaceResponse {
    face_id: String,
    event_id: String,
}

async fn handle_upsert_face(
    State(state): State<AppState>,
    payload: Result<Json<Face>, JsonRejection>,
) -> Result<Json<UpsertFaceResponse>, AppError> {
    let Json(face) = payload?;
    state.index.upsert(&face).await?;
    Ok(Json(UpsertFaceResponse {
        face_id: face.face_id,
        event_id: face.event_id,
    }))
}

#[derive(Serialize)]
struct RemoveFacesResponse {
    photo_id: String,
    removed: u64,
}

async fn handle_remove_faces(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
) -> Result<Json<RemoveFacesResponse>, AppError> {
    let removed = state.index.remove(&photo_id).await?;
    Ok(Json(RemoveFacesResponse { photo_id, removed }))
}

// ============ POST /events/{event_id}/search ============

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchRequest {
    embedding: Vec<f64>,
    min_similarity: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    event_id: String,
    matches: Vec<FaceMatch>,
    total_matches: usize,
    threshold_used: f64,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(req) = payload?;
    let threshold = req.min_similarity.unwrap_or(state.default_min_similarity);
    let matches = state
        .index
        .query(&event_id, &req.embedding, threshold)
        .await?;

    Ok(Json(SearchResponse {
        event_id,
        total_matches: matches.len(),
        matches,
        threshold_used: threshold,
    }))
}

// ============ Shares ============

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateShareRequest {
    event_id: String,
    #[serde(default)]
    origin_face_id: Option<String>,
    photo_ids: Vec<String>,
}

async fn handle_create_share(
    State(state): State<AppState>,
    payload: Result<Json<CreateShareRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Share>), AppError> {
    let Json(req) = payload?;
    let share = state
        .shares
        .create(&req.event_id, req.origin_face_id.as_deref(), &req.photo_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(share)))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListSharesQuery {
    event_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ListSharesResponse {
    shares: Vec<ShareSummary>,
}

async fn handle_list_shares(
    State(state): State<AppState>,
    query: Result<Query<ListSharesQuery>, QueryRejection>,
) -> Result<Json<ListSharesResponse>, AppError> {
    let Query(q) = query?;
    let shares = state
        .shares
        .list(q.event_id.as_deref(), q.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(ListSharesResponse { shares }))
}

async fn handle_get_share(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Share>, AppError> {
    Ok(Json(state.shares.get(&code).await?))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DownloadRequest {
    photo_id: String,
}

#[derive(Serialize)]
struct DownloadResponse {
    share_code: String,
    photo_id: String,
    downloads_count: u64,
}

async fn handle_track_download(
    State(state): State<AppState>,
    Path(code): Path<String>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, AppError> {
    let Json(req) = payload?;
    let downloads_count = state.shares.track_download(&code, &req.photo_id).await?;
    Ok(Json(DownloadResponse {
        share_code: code,
        photo_id: req.photo_id,
        downloads_count,
    }))
}
