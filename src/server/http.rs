//! HTTP routes of the dashboard server.
//!
//! - `GET /api/meta` reports the repository root the server was started for.
//! - Everything else is served from the UI directory. Paths that do not name
//!   a file there get the UI's `index.html` so client-side routing can take
//!   over. Directories are never listed.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;

use crate::assets::UI_ENTRY_DOCUMENT;
use crate::config::LaunchConfig;

/// Body of `GET /api/meta`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub ok: bool,
    pub repo_root: String,
}

/// Build the dashboard router for one server instance.
pub fn router(config: Arc<LaunchConfig>) -> Router {
    Router::new()
        .route("/api/meta", get(meta))
        .fallback(serve_ui)
        .with_state(config)
}

async fn meta(State(config): State<Arc<LaunchConfig>>) -> Json<Meta> {
    Json(Meta {
        ok: true,
        repo_root: config.repo_root.to_string_lossy().into_owned(),
    })
}

async fn serve_ui(State(config): State<Arc<LaunchConfig>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, HeaderValue::from_static("GET, HEAD"))],
        )
            .into_response();
    }

    let target = match resolve_static(&config.ui_dir, uri.path()).await {
        Some(path) => path,
        None => config.ui_dir.join(UI_ENTRY_DOCUMENT),
    };

    let bytes = match tokio::fs::read(&target).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %target.display(), error = %e, "failed to read UI file");
            return (StatusCode::NOT_FOUND, "Not found").into_response();
        }
    };

    let mime = mime_guess::from_path(&target).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.essence_str())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let length = bytes.len();
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(bytes)
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response()
}

/// Map a request path onto a file under `root`.
///
/// Returns `None` when the path does not name a servable file: missing
/// entries, directories without their own entry document, undecodable or
/// escaping paths (`..`, absolute segments, symlinks leaving `root`).
pub async fn resolve_static(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(request_path)?;

    let mut candidate = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment.contains('\\') {
            return None;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => candidate.push(name),
            _ => return None,
        }
    }

    let metadata = tokio::fs::metadata(&candidate).await.ok()?;
    let file = if metadata.is_dir() {
        let index = candidate.join(UI_ENTRY_DOCUMENT);
        match tokio::fs::metadata(&index).await {
            Ok(m) if m.is_file() => index,
            _ => return None,
        }
    } else if metadata.is_file() {
        candidate
    } else {
        return None;
    };

    let root_canon = tokio::fs::canonicalize(root).await.ok()?;
    let file_canon = tokio::fs::canonicalize(&file).await.ok()?;
    if !file_canon.starts_with(&root_canon) {
        tracing::debug!(path = %file.display(), "refusing to serve file outside UI directory");
        return None;
    }

    Some(file)
}

/// Decode `%XX` escapes. Returns `None` on malformed escapes or non-UTF-8
/// results.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                if !hex.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
