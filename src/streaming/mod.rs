//! Partial-content streaming from disk.
//!
//! Serves stored files with HTTP range support: full-interval requests get
//! a 200 with the whole file, anything else a 206 covering exactly the
//! requested span. A short copy caused by a peer disconnect is visible to
//! the client through HTTP framing, so truncation is never retried.

pub mod range;

pub use range::{resolve_range, RangeError};

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// Serve a stored file, honoring an optional Range header value.
pub async fn stream(
    path: &Path,
    range_header: Option<&str>,
    total: u64,
    content_type: &str,
) -> Result<Response, StatusCode> {
    match range_header {
        None => serve_full(path, total, content_type).await,
        Some(value) => match resolve_range(value, total) {
            Ok((start, end)) if start == 0 && end + 1 == total => {
                serve_full(path, total, content_type).await
            }
            Ok((start, end)) => serve_partial(path, start, end, total, content_type).await,
            Err(e) => {
                tracing::debug!("Rejected range request {:?}: {}", value, e);
                Ok(unsatisfiable(total))
            }
        },
    }
}

/// Stream the whole file with a 200 and range-support advertisement.
pub async fn serve_full(path: &Path, total: u64, content_type: &str) -> Result<Response, StatusCode> {
    let file = File::open(path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, total.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Seek to `start` and stream exactly `end - start + 1` bytes as a 206.
async fn serve_partial(
    path: &Path,
    start: u64,
    end: u64,
    total: u64,
    content_type: &str,
) -> Result<Response, StatusCode> {
    let length = end - start + 1;

    let mut file = File::open(path)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    file.seek(SeekFrom::Start(start))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let stream = ReaderStream::new(file.take(length));
    let body = Body::from_stream(stream);

    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, length.to_string())
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, total),
        )
        .header(header::ACCEPT_RANGES, "bytes")
        .body(body)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// 416 response advertising the true total length.
pub fn unsatisfiable(total: u64) -> Response {
    let body = Json(serde_json::json!({ "error": "invalid range" }));
    let mut response = (StatusCode::RANGE_NOT_SATISFIABLE, body).into_response();
    if let Ok(value) = format!("bytes */{}", total).parse() {
        response
            .headers_mut()
            .insert(header::CONTENT_RANGE, value);
    }
    response
}
