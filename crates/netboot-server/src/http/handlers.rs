// SPDX-License-Identifier: Apache-2.0

use super::AppState;
use crate::store::{join_path, DirEntry, FileSource, StoreError};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use netboot_model::DISTRO_URL_PREFIX;
use std::fmt::Write as _;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub(crate) async fn index_handler() -> impl IntoResponse {
    Html(
        "<pre>\n\
         <a href=\"/boot.ipxe\">/boot.ipxe</a>\n\
         <a href=\"/distros/\">/distros/</a>\n\
         </pre>\n",
    )
}

/// First-stage script: chain to the per-MAC menu on this server.
#[must_use]
pub fn ipxe_redirect_script(http_server: &str) -> String {
    format!(
        "#!ipxe\nset http_server {http_server}\nchain --replace ${{http_server}}/${{net0/mac}}/boot.ipxe\n"
    )
}

pub(crate) async fn ipxe_redirect_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, TEXT_PLAIN)],
        ipxe_redirect_script(&state.http_server),
    )
}

pub(crate) async fn ipxe_menu_handler(
    State(state): State<AppState>,
    Path(mac): Path<String>,
) -> Response {
    match state.renderer.render().await {
        Ok(body) => ([(CONTENT_TYPE, TEXT_PLAIN)], body).into_response(),
        Err(err) => {
            error!(mac = %mac, error = %err, "iPXE menu render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "menu render failed").into_response()
        }
    }
}

pub(crate) async fn distro_root_handler(State(state): State<AppState>) -> Response {
    serve_distro_path(&state, String::new()).await
}

pub(crate) async fn distro_file_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    serve_distro_path(&state, path.trim_end_matches('/').to_string()).await
}

enum DistroNode {
    File(FileSource),
    Directory(Vec<DirEntry>),
}

async fn serve_distro_path(state: &AppState, path: String) -> Response {
    let store = Arc::clone(&state.distros);
    let lookup = path.clone();
    let node = tokio::task::spawn_blocking(move || match store.open_file(&lookup) {
        Err(StoreError::IsDirectory(_)) => store.read_dir(&lookup).map(DistroNode::Directory),
        other => other.map(DistroNode::File),
    })
    .await;
    match node {
        Ok(Ok(DistroNode::File(source))) => file_response(&path, source).await,
        Ok(Ok(DistroNode::Directory(entries))) => {
            Html(directory_listing(&path, &entries)).into_response()
        }
        Ok(Err(StoreError::NotFound(_))) => (StatusCode::NOT_FOUND, "not found").into_response(),
        Ok(Err(StoreError::InvalidPath(_))) => {
            (StatusCode::BAD_REQUEST, "invalid path").into_response()
        }
        Ok(Err(err)) => {
            warn!(path = %path, error = %err, "distribution file read failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response()
        }
        Err(err) => {
            error!(path = %path, error = %err, "distribution file task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response()
        }
    }
}

fn content_type_for(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("ipxe" | "txt" | "cfg" | "conf" | "yaml" | "yml" | "sh") => TEXT_PLAIN,
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

// Disk-backed files are streamed, never buffered whole.
async fn file_response(path: &str, source: FileSource) -> Response {
    let content_type = content_type_for(path);
    let (disk_path, len) = match source {
        FileSource::Bytes(bytes) => {
            return ([(CONTENT_TYPE, content_type)], bytes).into_response();
        }
        FileSource::Disk { path, len } => (path, len),
    };
    let file = match tokio::fs::File::open(&disk_path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path, error = %err, "distribution file open failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response();
        }
    };
    let len = file.metadata().await.map_or(len, |meta| meta.len());
    (
        [
            (CONTENT_TYPE, content_type.to_string()),
            (CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn directory_listing(path: &str, entries: &[DirEntry]) -> String {
    let mut body = String::from("<pre>\n");
    for entry in entries {
        let suffix = if entry.is_dir() { "/" } else { "" };
        let href = escape_html(&join_path(path, &entry.name));
        let name = escape_html(&entry.name);
        let _ = writeln!(
            body,
            "<a href=\"{DISTRO_URL_PREFIX}/{href}{suffix}\">{name}{suffix}</a>"
        );
    }
    body.push_str("</pre>\n");
    body
}

pub(crate) async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.accepting_requests.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not-ready")
    }
}

pub(crate) async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = state.catalog.metrics().render_prometheus();
    body.push_str(&state.requests.render_prometheus());
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

pub(crate) async fn rescan_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.rescan.request();
    (StatusCode::ACCEPTED, "rescan scheduled")
}

pub(crate) async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntryKind;

    #[test]
    fn redirect_script_chains_to_mac_menu() {
        assert_eq!(
            ipxe_redirect_script("http://10.0.0.1:8080"),
            "#!ipxe\nset http_server http://10.0.0.1:8080\n\
             chain --replace ${http_server}/${net0/mac}/boot.ipxe\n"
        );
    }

    #[test]
    fn listing_links_are_absolute_and_escaped() {
        let body = directory_listing(
            "alpine",
            &[
                DirEntry {
                    name: "3.18.4".to_string(),
                    kind: EntryKind::Directory,
                },
                DirEntry {
                    name: "a<b".to_string(),
                    kind: EntryKind::File,
                },
            ],
        );
        assert!(body.contains("<a href=\"/distros/alpine/3.18.4/\">3.18.4/</a>"));
        assert!(body.contains("<a href=\"/distros/alpine/a&lt;b\">a&lt;b</a>"));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("alpine/boot.IPXE"), TEXT_PLAIN);
        assert_eq!(content_type_for("vars.yaml"), TEXT_PLAIN);
        assert_eq!(content_type_for("index.html"), "text/html; charset=utf-8");
        assert_eq!(
            content_type_for("alpine/3.18.4/x86_64/vmlinuz-lts"),
            "application/octet-stream"
        );
        assert_eq!(content_type_for(""), "application/octet-stream");
    }
}
