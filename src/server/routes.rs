use crate::config::omo::{self, OmoDocument};
use crate::config::{self, expand_home, validate_document, ConfigDocument, ValidationIssue};
use crate::error::Error;
use crate::models::list_catalog;
use crate::permission::Resolution;
use crate::server::AppState;
use crate::templates::{
    builtin_templates, builtin_templates_by_category, BuiltinTemplate, TemplateCategory, TemplateUpdate,
    UserTemplate,
};

use axum::{
    extract::{DefaultBodyLimit, OriginalUri, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Request bodies up to 10 MB.
const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Build all routes: the JSON API under `/api`, the web UI everywhere else.
pub fn build_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        // Config file
        .route("/config/path", get(config_path_handler))
        .route("/config", get(config_read_handler).post(config_write_handler))
        .route("/config/effective", get(config_effective_handler))
        .route("/config/validate", post(config_validate_handler))
        // oh-my-opencode.json
        .route("/omo-config/path", get(omo_config_path_handler))
        .route("/omo-config", get(omo_config_read_handler).post(omo_config_write_handler))
        // Models
        .route("/models", get(models_handler))
        // Templates
        .route("/templates", get(builtin_templates_handler))
        .route(
            "/templates/user",
            get(user_templates_list_handler)
                .post(user_templates_create_handler)
                .delete(user_templates_clear_handler),
        )
        .route("/templates/user/import", post(user_templates_import_handler))
        .route("/templates/user/import-all", post(user_templates_import_all_handler))
        .route("/templates/user/export-all", get(user_templates_export_all_handler))
        .route(
            "/templates/user/{id}",
            patch(user_template_update_handler).delete(user_template_delete_handler),
        )
        .route("/templates/user/{id}/export", get(user_template_export_handler))
        .route("/templates/user/{id}/duplicate", post(user_template_duplicate_handler))
        // Permissions
        .route("/permissions/resolve", post(permissions_resolve_handler))
        .fallback(api_not_found_handler);

    let static_dir = state.settings.static_dir.clone();
    let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .fallback_service(spa)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&state.settings.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin.trim() == "*" {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origin
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

// ============================================================================
// Errors
// ============================================================================

/// JSON error body: `{error, message?, path?}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: None,
            path: None,
            method: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::Format(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ExternalToolUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Io { .. } | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(kind = err.kind(), "request failed: {err}");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(&self)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn api_not_found_handler(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError {
        path: Some(uri.path().to_string()),
        method: Some(method.to_string()),
        ..ApiError::new(StatusCode::NOT_FOUND, "API endpoint not found")
    }
}

/// Raw JSON text response.
fn json_text(text: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], text).into_response()
}

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: String,
    uptime: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        version: state.version.clone(),
        uptime: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Config file
// ============================================================================

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: Option<String>,
}

fn document_path(state: &AppState, requested: Option<&str>) -> PathBuf {
    match requested.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => expand_home(p),
        None => state.settings.document_path(),
    }
}

#[derive(Serialize)]
struct PathResponse {
    path: String,
}

async fn config_path_handler(State(state): State<AppState>) -> Json<PathResponse> {
    Json(PathResponse {
        path: state.settings.document_path().display().to_string(),
    })
}

async fn config_read_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Response> {
    let path = document_path(&state, query.path.as_deref());
    let text = config::read_document_text(&path)?;
    Ok(json_text(text))
}

#[derive(Debug, Deserialize)]
struct WriteConfigRequest {
    path: Option<String>,
    content: String,
}

#[derive(Serialize)]
struct WriteConfigResponse {
    success: bool,
    path: String,
}

async fn config_write_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteConfigRequest>,
) -> ApiResult<Json<WriteConfigResponse>> {
    let path = document_path(&state, req.path.as_deref());
    // Reject text that would not load back.
    config::parse_document(&req.content)?;
    config::write_document_text(&path, &req.content)?;
    Ok(Json(WriteConfigResponse {
        success: true,
        path: path.display().to_string(),
    }))
}

fn omo_document_path(state: &AppState, requested: Option<&str>) -> PathBuf {
    match requested.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => expand_home(p),
        None => state.settings.omo_document_path(),
    }
}

async fn omo_config_path_handler(State(state): State<AppState>) -> Json<PathResponse> {
    Json(PathResponse {
        path: state.settings.omo_document_path().display().to_string(),
    })
}

async fn omo_config_read_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Response> {
    let path = omo_document_path(&state, query.path.as_deref());
    Ok(json_text(omo::read_omo_text(&path)?))
}

async fn omo_config_write_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteConfigRequest>,
) -> ApiResult<Json<WriteConfigResponse>> {
    let path = omo_document_path(&state, req.path.as_deref());
    omo::parse_omo_document(&req.content)?;
    config::write_document_text(&path, &req.content)?;
    Ok(Json(WriteConfigResponse {
        success: true,
        path: path.display().to_string(),
    }))
}

async fn config_effective_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<ConfigDocument>> {
    let path = document_path(&state, query.path.as_deref());
    Ok(Json(config::read_document(&path)?.effective()))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    content: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    valid: bool,
    issues: Vec<ValidationIssue>,
}

async fn config_validate_handler(Json(req): Json<ValidateRequest>) -> ApiResult<Json<ValidateResponse>> {
    let doc = config::parse_document(&req.content)?;
    let issues = validate_document(&doc);
    Ok(Json(ValidateResponse {
        valid: issues.iter().all(|i| i.severity != config::Severity::Error),
        issues,
    }))
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelsQuery {
    provider: Option<String>,
}

async fn models_handler(State(state): State<AppState>, Query(query): Query<ModelsQuery>) -> Response {
    let provider = query.provider.as_deref().map(str::trim).filter(|p| !p.is_empty());
    match list_catalog(state.models.as_ref(), provider).await {
        Ok(listing) => Json(listing).into_response(),
        Err(err @ Error::ExternalToolUnavailable { .. }) => {
            warn!("model listing unavailable: {err}");
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "opencode command not found")
                .with_message(err.to_string())
                .into_response()
        }
        Err(err) => {
            error!("model listing failed: {err}");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to run opencode models")
                .with_message(err.to_string())
                .into_response()
        }
    }
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Deserialize)]
struct CategoryQuery {
    category: Option<String>,
}

async fn builtin_templates_handler(Query(query): Query<CategoryQuery>) -> ApiResult<Json<Vec<BuiltinTemplate>>> {
    let templates = match query.category.as_deref() {
        Some(raw) => {
            let category: TemplateCategory = raw.parse().map_err(Error::Format)?;
            builtin_templates_by_category(category).into_iter().cloned().collect()
        }
        None => builtin_templates().to_vec(),
    };
    Ok(Json(templates))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn user_templates_list_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<UserTemplate>> {
    let store = state.templates.lock();
    let found = store
        .search(query.q.as_deref().unwrap_or(""))
        .into_iter()
        .cloned()
        .collect();
    Json(found)
}

#[derive(Debug, Deserialize)]
struct CreateTemplateRequest {
    name: String,
    #[serde(default)]
    description: String,
    config: ConfigDocument,
}

async fn user_templates_create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<UserTemplate>)> {
    if req.name.trim().is_empty() {
        return Err(Error::format("Template name must not be empty").into());
    }
    let template = state
        .templates
        .lock()
        .save_as_template(&req.name, &req.description, &req.config)?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Serialize)]
struct CountResponse {
    count: usize,
}

async fn user_templates_clear_handler(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.templates.lock().clear_all_templates()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_templates_import_handler(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<(StatusCode, Json<UserTemplate>)> {
    let template = state.templates.lock().import_template(&body)?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn user_templates_import_all_handler(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<CountResponse>> {
    let count = state.templates.lock().import_all_templates(&body)?;
    Ok(Json(CountResponse { count }))
}

async fn user_templates_export_all_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let text = state.templates.lock().export_all_templates()?;
    Ok(json_text(text))
}

async fn user_template_update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(updates): Json<TemplateUpdate>,
) -> ApiResult<Json<UserTemplate>> {
    state
        .templates
        .lock()
        .update_template(&id, updates)?
        .map(Json)
        .ok_or_else(|| Error::NotFound(id).into())
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn user_template_delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.templates.lock().delete_template(&id)?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn user_template_export_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let text = state.templates.lock().export_template(&id)?;
    Ok(json_text(text))
}

#[derive(Debug, Default, Deserialize)]
struct DuplicateRequest {
    name: Option<String>,
}

async fn user_template_duplicate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> ApiResult<(StatusCode, Json<UserTemplate>)> {
    // The body is optional; an empty one keeps the default name.
    let req: DuplicateRequest = if body.trim().is_empty() {
        DuplicateRequest::default()
    } else {
        serde_json::from_str(&body).map_err(|e| Error::format(format!("Invalid request body: {e}")))?
    };
    let copy = state
        .templates
        .lock()
        .duplicate_template(&id, req.name.as_deref())?;
    Ok((StatusCode::CREATED, Json(copy)))
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    tool: String,
    subject: Option<String>,
    agent: Option<String>,
    /// Inline document; when absent the file at `path` (or the default) is read.
    config: Option<ConfigDocument>,
    path: Option<String>,
    /// Inline oh-my-opencode document. With an inline `config` only this one
    /// is used; otherwise the file at `omoPath` (or the default) is read.
    omo: Option<OmoDocument>,
    #[serde(rename = "omoPath")]
    omo_path: Option<String>,
}

async fn permissions_resolve_handler(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> ApiResult<Json<Resolution>> {
    let (doc, overrides) = match req.config {
        Some(doc) => (doc, req.omo),
        None => {
            let doc = config::read_document(&document_path(&state, req.path.as_deref()))?;
            let overrides = match req.omo {
                Some(inline) => inline,
                None => omo::read_omo_document(&omo_document_path(&state, req.omo_path.as_deref()))?,
            };
            (doc, Some(overrides))
        }
    };
    let resolution = state.resolver.resolve_with_overrides(
        &doc.effective(),
        overrides.as_ref(),
        req.agent.as_deref(),
        &req.tool,
        req.subject.as_deref(),
    );
    Ok(Json(resolution))
}
