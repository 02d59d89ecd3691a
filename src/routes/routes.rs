//! Defines routes for the file-manager API.
//!
//! ## Structure
//! - **Health endpoints**
//!   - `GET    /healthz` — liveness
//!   - `GET    /readyz` — readiness (probes the bucket)
//!
//! - **Filesystem endpoints** (all keyed by `?path=` or `?key=`)
//!   - `GET    /api/entries` — list one folder level
//!   - `POST   /api/folders` — create folder marker
//!   - `POST   /api/files` — multipart upload
//!   - `GET    /api/files/download` — buffered download
//!   - `DELETE /api/objects` — delete file or folder subtree
//!   - `POST   /api/objects/rename` — copy-then-delete rename
//!   - `GET    /api/search` — recursive filename search
//!   - `GET    /api/usage` — recursive folder size
//!   - `GET    /api/metadata` — single-object head
//!   - `GET    /api/share` — presigned link
//!   - `GET    /api/preview` — typed preview, always 200

use crate::{
    handlers::{
        fs_handlers::{
            create_folder, delete_object, download_file, folder_usage, list_entries,
            object_metadata, preview_object, rename_object, search, share_link, upload_files,
        },
        health_handlers::{healthz, readyz},
    },
    services::filesystem::VirtualFilesystem,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Upload bodies are capped at 100 MiB; everything is buffered in memory.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`VirtualFilesystem`) to all handlers.
pub fn routes() -> Router<VirtualFilesystem> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // filesystem endpoints
        .route("/api/entries", get(list_entries))
        .route("/api/folders", post(create_folder))
        .route("/api/files", post(upload_files))
        .route("/api/files/download", get(download_file))
        .route("/api/objects", delete(delete_object))
        .route("/api/objects/rename", post(rename_object))
        .route("/api/search", get(search))
        .route("/api/usage", get(folder_usage))
        .route("/api/metadata", get(object_metadata))
        .route("/api/share", get(share_link))
        .route("/api/preview", get(preview_object))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
