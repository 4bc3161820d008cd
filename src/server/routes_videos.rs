use crate::server::{json_error, AppContext};
use crate::storage::sanitize_filename;
use crate::store::Video;
use crate::streaming;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/videos", post(upload_video).get(list_videos))
        .route("/api/videos/latest", get(get_latest_video))
        .route(
            "/api/videos/:id",
            get(get_video).delete(delete_video),
        )
        .route("/download/:id", get(direct_download))
        // The configured maximum is enforced in the upload handler so an
        // oversized file yields a 400, not a framework 413.
        .layer(DefaultBodyLimit::disable())
}

async fn upload_video(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let mut upload: Option<(String, String, axum::body::Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to parse multipart form: {}", e);
        json_error(StatusCode::BAD_REQUEST, "invalid form data")
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read uploaded file: {}", e);
            json_error(StatusCode::BAD_REQUEST, "invalid form data")
        })?;

        upload = Some((filename, content_type, data));
        break;
    }

    let Some((filename, content_type, data)) = upload else {
        return Err(json_error(StatusCode::BAD_REQUEST, "no file provided"));
    };

    let max_size = ctx.config.storage.max_upload_bytes;
    if data.len() as u64 > max_size {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            format!("file too large, max size is {} bytes", max_size),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let name = sanitize_filename(&filename);

    ctx.storage.store(&id, &name, &data).await.map_err(|e| {
        tracing::error!("Failed to save uploaded file: {:#}", e);
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to save file")
    })?;

    let video = Video::new(id, name, data.len() as u64, content_type);
    ctx.store.insert(video.clone());

    tracing::info!(
        video_id = %video.id,
        filename = %video.name,
        size = video.size,
        "video uploaded"
    );

    ctx.webhooks.notify(
        "video.uploaded",
        &serde_json::json!({
            "video": video,
            "event": "video.uploaded",
            "timestamp": chrono::Utc::now().timestamp(),
        }),
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "video": video })),
    ))
}

/// Serve a video with range support: 200 for full requests, 206 for
/// partial, 416 with the true length for unsatisfiable ranges.
async fn get_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let video = ctx
        .store
        .get_by_id(&id)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "video not found"))?;

    let path = ctx.storage.file_path(&id, &video.name);

    // The bytes on disk are authoritative for range math.
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| json_error(StatusCode::NOT_FOUND, "video file not found"))?;
    let total = metadata.len();

    let range_header = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok());

    streaming::stream(&path, range_header, total, &video.content_type)
        .await
        .map_err(|status| json_error(status, "failed to read file"))
}

async fn direct_download(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    let video = ctx
        .store
        .get_by_id(&id)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "video not found"))?;

    let path = ctx.storage.file_path(&id, &video.name);
    let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            json_error(StatusCode::NOT_FOUND, "video file not found")
        } else {
            tracing::error!("Failed to stat {}: {}", path.display(), e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to get file info")
        }
    })?;

    // Always full content, always advertised as mp4.
    let mut response = streaming::serve_full(&path, metadata.len(), "video/mp4")
        .await
        .map_err(|status| json_error(status, "failed to read file"))?;

    let disposition = format!("attachment; filename=\"{}.mp4\"", id);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

async fn get_latest_video(
    State(ctx): State<AppContext>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let video = ctx
        .store
        .get_latest()
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "no videos found"))?;

    Ok(Json(serde_json::json!({ "success": true, "video": video })))
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
}

async fn list_videos(
    State(ctx): State<AppContext>,
    Query(params): Query<ListQuery>,
) -> impl IntoResponse {
    let page = params
        .page
        .and_then(|p| p.parse::<usize>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let limit = params
        .limit
        .and_then(|l| l.parse::<usize>().ok())
        .filter(|l| (1..=100).contains(l))
        .unwrap_or(20);

    // Pagination over an unordered per-request snapshot; stability across
    // concurrent mutations is best-effort.
    let all = ctx.store.list_all();
    let total = all.len();
    let start = ((page - 1) * limit).min(total);
    let end = (start + limit).min(total);

    Json(serde_json::json!({
        "success": true,
        "videos": &all[start..end],
        "total": total,
        "page": page,
        "limit": limit,
    }))
}

async fn delete_video(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let video = ctx
        .store
        .get_by_id(&id)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "video not found"))?;

    if !ctx.store.delete(&id) {
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to delete video from database",
        ));
    }

    // Metadata deletion already succeeded; a failed file removal is
    // logged, not surfaced.
    if let Err(e) = ctx.storage.remove(&id, &video.name).await {
        tracing::error!("Failed to delete video file: {:#}", e);
    }

    tracing::info!(video_id = %id, filename = %video.name, "video deleted");

    ctx.webhooks.notify(
        "video.deleted",
        &serde_json::json!({
            "video": video,
            "event": "video.deleted",
            "timestamp": chrono::Utc::now().timestamp(),
        }),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "video deleted successfully",
    })))
}
