use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use serde::{Deserialize, Serialize};
use std::any::Any as PanicPayload;
use std::sync::Arc;
use anyhow::{anyhow, Result};
use chrono::Local;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::config::Config;
use crate::event::StructuredEvent;
use crate::export::{
    export_file_name, write_export, CalendarRecord, CalendarSerializer, ExportError,
};
use crate::parser::{EventBuilder, ParseError, ResolverChain};
use crate::table::{csv_source, normalize_rows, ColumnMapping, RawRow, TableEvent};

// API state shared across handlers
pub struct ApiState {
    pub config: Config,
    pub builder: EventBuilder,
    pub serializer: CalendarSerializer,
}

impl ApiState {
    pub fn new(config: Config) -> Self {
        let builder =
            EventBuilder::new(Arc::new(ResolverChain::standard()), config.parser.defaults());
        let serializer = CalendarSerializer::new(config.export.settings());
        Self { config, builder, serializer }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<StructuredEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyMappingRequest {
    #[serde(default)]
    pub raw_rows: Vec<RawRow>,
    #[serde(default)]
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub filters: String,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    pub events: Vec<TableEvent>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub events: Vec<CalendarRecord>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

// Health check endpoint
async fn health_check() -> &'static str {
    "CalendMe API is running"
}

// Parse a free-text phrase into a single event
async fn parse_nl_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ParseRequest>,
) -> (StatusCode, Json<ParseResponse>) {
    let request_id = Uuid::new_v4();
    let input = request.input.unwrap_or_default();
    debug!("parse_nl[{}]: '{}'", request_id, input);

    match state.builder.parse(&input) {
        Ok(event) => (
            StatusCode::OK,
            Json(ParseResponse { success: true, event: Some(event), error: None }),
        ),
        Err(e) => {
            if let ParseError::Internal(_) = e {
                error!("parse_nl[{}]: {}", request_id, e);
            } else {
                debug!("parse_nl[{}]: rejected: {}", request_id, e);
            }
            (
                StatusCode::BAD_REQUEST,
                Json(ParseResponse { success: false, event: None, error: Some(e.to_string()) }),
            )
        }
    }
}

// Read an uploaded CSV document into raw rows for the mapping step
async fn upload_preview_handler(body: Bytes) -> Result<Json<PreviewResponse>, ApiError> {
    match csv_source::read_rows(&body) {
        Ok(rows) => {
            debug!("upload_preview: {} rows", rows.len());
            Ok(Json(PreviewResponse { rows }))
        }
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

async fn apply_mapping_handler(Json(request): Json<ApplyMappingRequest>) -> Json<MappingResponse> {
    let events = normalize_rows(&request.raw_rows, &request.mapping, &request.filters);
    Json(MappingResponse { events })
}

// Serialize events to iCalendar, keep a copy in the export directory and return it as a download
async fn generate_ics_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4();
    let export = state.serializer.serialize(&request.events).map_err(|e| {
        match &e {
            ExportError::NoEvents => debug!("generate_ics[{}]: empty request", request_id),
            ExportError::NothingExportable(_) => warn!("generate_ics[{}]: {}", request_id, e),
        }
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let now = Local::now();
    let directory = state.config.export.directory();
    let path = write_export(&directory, &export, now).map_err(|e| {
        error!("generate_ics[{}]: failed to write export: {}", request_id, e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to write calendar file: {}", e),
        )
    })?;
    info!("generate_ics[{}]: {} events saved to {}", request_id, export.emitted, path.display());

    let disposition = format!("attachment; filename={}", export_file_name(now));
    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.text,
    )
        .into_response())
}

// A handler panic becomes a generic 500 instead of a dropped connection
fn handle_panic(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {}", detail);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error while handling the request")
        .into_response()
}

/// All API routes with permissive CORS
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/parse_nl", post(parse_nl_handler))
        .route("/upload_preview", post(upload_preview_handler))
        .route("/apply_mapping", post(apply_mapping_handler))
        .route("/generate_ics", post(generate_ics_handler))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

// Create and start the API server
pub async fn start_api_server(config: Config, addr: Option<String>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.address());
    let state = Arc::new(ApiState::new(config));
    let app = router(state);

    info!("API server starting on http://{}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to address {}: {}", addr, e))?;

    info!("API server successfully bound to {}. Waiting for connections...", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}
