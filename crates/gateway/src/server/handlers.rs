//! Axum request handlers for all gateway endpoints.

use std::path::Path as FsPath;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::{protocol::ErrorResponse, ServiceError};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, warn};

use super::state::AppState;
use crate::frontend::INDEX_HTML;
use crate::packages::resolve_package_file;

/// `GET /models/packages/{package}/{path...}` — a file from an installed package.
///
/// The path is confined to the package root; escapes get `403`, unknown
/// packages and files get `404`.
pub async fn package_file(
    State(state): State<AppState>,
    Path((package, file)): Path<(String, String)>,
    request: Request,
) -> Response {
    let locator = state.packages.clone();
    let (pkg, rel) = (package.clone(), file.clone());
    let resolved =
        tokio::task::spawn_blocking(move || resolve_package_file(locator.as_ref(), &pkg, &rel))
            .await;

    let path = match resolved {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => {
            warn!(package = %package, file = %file, reason = %e, "package file rejected");
            return error_response(e.into());
        }
        Err(e) => {
            error!(error = %e, "package resolver task failed");
            return error_response(ServiceError::Internal("error serving file".into()));
        }
    };

    debug!(package = %package, file = %file, "serving package file");
    match serve_file(&path, request).await {
        Ok(response) => response,
        Err(StatusCode::NOT_FOUND) => {
            warn!(package = %package, file = %file, "package file vanished before it was served");
            error_response(ServiceError::NotFound(format!(
                "file {file} not found in package {package}"
            )))
        }
        Err(status) => {
            error!(package = %package, file = %file, %status, "error serving package file");
            error_response(ServiceError::Internal("error serving file".into()))
        }
    }
}

/// `GET /config.yaml` — the current config text, verbatim.
pub async fn config_yaml(State(state): State<AppState>) -> impl IntoResponse {
    let text = state.config.current();
    (
        [(header::CONTENT_TYPE, "text/yaml")],
        text.as_str().to_owned(),
    )
}

/// `GET /` — the frontend entry document.
pub async fn index(State(state): State<AppState>, request: Request) -> Response {
    match serve_file(&state.frontend_root.join(INDEX_HTML), request).await {
        Ok(response) => response,
        Err(StatusCode::NOT_FOUND) => {
            warn!("frontend bundle has no index.html");
            error_response(ServiceError::NotFound("index.html not found".into()))
        }
        Err(status) => {
            error!(%status, "error serving index.html");
            error_response(ServiceError::Internal("error serving file".into()))
        }
    }
}

/// Fallback service for every other path: a file from the frontend bundle
/// when one exists, otherwise `index.html` so client-side routes survive a
/// page reload.
///
/// Directories are never listed or redirected; they fall back like missing files.
pub fn frontend_assets(frontend_root: &FsPath) -> ServeDir<ServeFile> {
    ServeDir::new(frontend_root)
        .append_index_html_on_directories(false)
        .fallback(ServeFile::new(frontend_root.join(INDEX_HTML)))
}

/// Stream `path` with a content type inferred from its extension.
///
/// Non-success statuses (other than conditional/range outcomes) are returned
/// as `Err` so callers can render them as structured errors.
async fn serve_file(path: &FsPath, request: Request) -> Result<Response, StatusCode> {
    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();
    if (status.is_client_error() && status != StatusCode::RANGE_NOT_SATISFIABLE)
        || status.is_server_error()
    {
        return Err(status);
    }
    Ok(response.map(Body::new))
}

fn error_response(err: ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(&err))).into_response()
}
