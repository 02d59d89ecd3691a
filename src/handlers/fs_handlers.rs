//! HTTP handlers for the file-manager API.
//! Thin adapters: extract parameters, delegate to `VirtualFilesystem`, and
//! shape the JSON the browser consumes. Bodies are fully buffered; there is
//! no streaming on either direction.

use crate::{
    errors::AppError,
    models::{entry::Entry, metadata::{FileMetadata, FolderUsage}, preview::Preview},
    services::{filesystem::VirtualFilesystem, preview},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Search responses are capped for display; the full match count is still
/// reported.
const SEARCH_DISPLAY_LIMIT: usize = 10;

const DEFAULT_SHARE_TTL_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareQuery {
    pub key: String,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub key: String,
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderReq {
    pub name: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameReq {
    pub key: String,
    pub new_name: String,
}

#[derive(Serialize)]
pub struct KeyResponse {
    pub key: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub keys: Vec<String>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub results: Vec<Entry>,
    pub total_matches: usize,
}

#[derive(Serialize)]
pub struct ShareResponse {
    pub url: Option<String>,
}

/// GET `/api/entries?path=` — list one folder level.
pub async fn list_entries(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<PathQuery>,
) -> Result<Json<crate::models::entry::Listing>, AppError> {
    Ok(Json(fs.list(&q.path).await?))
}

/// POST `/api/folders` — create an empty folder marker.
pub async fn create_folder(
    State(fs): State<VirtualFilesystem>,
    Json(req): Json<CreateFolderReq>,
) -> Result<(StatusCode, Json<KeyResponse>), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "folder name must not be empty",
        ));
    }
    let key = fs.create_folder(req.name.trim(), &req.path).await?;
    Ok((StatusCode::CREATED, Json(KeyResponse { key })))
}

/// POST `/api/files?path=` — multipart upload, multiple files per request.
/// Fields without a filename are skipped.
pub async fn upload_files(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<PathQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut keys = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

        let key = fs.upload(&q.path, &file_name, data, content_type).await?;
        keys.push(key);
    }

    if keys.is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "no files in multipart body",
        ));
    }
    Ok((StatusCode::CREATED, Json(UploadResponse { keys })))
}

/// GET `/api/files/download?key=` — full object body with an attachment
/// disposition. The whole body is buffered before the response starts.
pub async fn download_file(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<KeyQuery>,
) -> Result<Response, AppError> {
    let body = fs.download(&q.key).await?;

    let file_name = q.key.rsplit('/').next().unwrap_or(&q.key).to_string();
    let content_type = mime_guess::from_path(&q.key)
        .first_raw()
        .unwrap_or("application/octet-stream");
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));

    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    Ok(response)
}

/// DELETE `/api/objects?key=` — one file, or a whole folder when the key is
/// slash-terminated.
pub async fn delete_object(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = fs.delete(&q.key).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// POST `/api/objects/rename` — rename a file or folder in place.
pub async fn rename_object(
    State(fs): State<VirtualFilesystem>,
    Json(req): Json<RenameReq>,
) -> Result<Json<KeyResponse>, AppError> {
    if req.new_name.trim().is_empty() || req.new_name.contains('/') {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "new name must be a non-empty single path segment",
        ));
    }
    let key = fs.rename(&req.key, req.new_name.trim()).await?;
    Ok(Json(KeyResponse { key }))
}

/// GET `/api/search?term=&path=` — recursive filename search.
pub async fn search(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let mut results = fs.search(&q.term, &q.path).await?;
    let total_matches = results.len();
    results.truncate(SEARCH_DISPLAY_LIMIT);
    Ok(Json(SearchResponse {
        results,
        total_matches,
    }))
}

/// GET `/api/usage?path=` — recursive size and object count of a folder.
pub async fn folder_usage(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<PathQuery>,
) -> Result<Json<FolderUsage>, AppError> {
    Ok(Json(fs.folder_size(&q.path).await?))
}

/// GET `/api/metadata?key=` — head request for a single object.
pub async fn object_metadata(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<KeyQuery>,
) -> Result<Json<FileMetadata>, AppError> {
    Ok(Json(fs.metadata(&q.key).await?))
}

/// GET `/api/share?key=&ttl_secs=` — presigned link. `url` is null when the
/// backend cannot sign; the request itself still succeeds.
pub async fn share_link(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<ShareQuery>,
) -> Json<ShareResponse> {
    let ttl = Duration::from_secs(q.ttl_secs.unwrap_or(DEFAULT_SHARE_TTL_SECS));
    let url = fs.presign(&q.key, ttl).await;
    Json(ShareResponse { url })
}

/// GET `/api/preview?key=&max_bytes=` — always 200; failures are the
/// `error` preview variant.
pub async fn preview_object(
    State(fs): State<VirtualFilesystem>,
    Query(q): Query<PreviewQuery>,
) -> Json<Preview> {
    let max_bytes = q.max_bytes.unwrap_or(preview::DEFAULT_MAX_PREVIEW_BYTES);
    Json(fs.preview(&q.key, max_bytes).await)
}
