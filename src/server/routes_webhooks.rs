use crate::server::{json_error, AppContext};
use crate::store::Video;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/webhooks",
            post(add_webhook).get(get_webhooks).delete(remove_webhook),
        )
        .route("/api/webhooks/test", post(test_webhook))
}

#[derive(Deserialize)]
struct SubscriptionRequest {
    event: String,
    url: String,
}

fn validate_subscription(
    req: &SubscriptionRequest,
) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    if req.event.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "event is required"));
    }
    if reqwest::Url::parse(&req.url).is_err() {
        return Err(json_error(StatusCode::BAD_REQUEST, "invalid url"));
    }
    Ok(())
}

async fn add_webhook(
    State(ctx): State<AppContext>,
    Json(req): Json<SubscriptionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    validate_subscription(&req)?;

    ctx.webhooks.subscribe(&req.event, &req.url);

    tracing::info!(event = %req.event, url = %req.url, "webhook added");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "webhook added successfully",
            "event": req.event,
            "url": req.url,
        })),
    ))
}

#[derive(Deserialize)]
struct ListQuery {
    event: Option<String>,
}

async fn get_webhooks(
    State(ctx): State<AppContext>,
    Query(params): Query<ListQuery>,
) -> impl IntoResponse {
    match params.event {
        Some(event) if !event.is_empty() => {
            let urls = ctx.webhooks.list(&event);
            Json(serde_json::json!({
                "success": true,
                "event": event,
                "urls": urls,
            }))
        }
        _ => Json(serde_json::json!({
            "success": true,
            "webhooks": ctx.webhooks.list_all(),
        })),
    }
}

async fn remove_webhook(
    State(ctx): State<AppContext>,
    Json(req): Json<SubscriptionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    validate_subscription(&req)?;

    ctx.webhooks.unsubscribe(&req.event, &req.url);

    tracing::info!(event = %req.event, url = %req.url, "webhook removed");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "webhook removed successfully",
        "event": req.event,
        "url": req.url,
    })))
}

#[derive(Deserialize)]
struct TestRequest {
    url: String,
    event: Option<String>,
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// Send one direct delivery with a synthesized record. Always answers 200;
/// the delivery outcome is only visible in the logs.
async fn test_webhook(
    State(ctx): State<AppContext>,
    Json(req): Json<TestRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if reqwest::Url::parse(&req.url).is_err() {
        return Err(json_error(StatusCode::BAD_REQUEST, "invalid url"));
    }

    let event = req
        .event
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "video.uploaded".to_string());
    let video_id = req
        .video_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let video = Video::new(
        video_id.clone(),
        "test_video.mp4".to_string(),
        12_345_678,
        "video/mp4".to_string(),
    );

    let timestamp = chrono::Utc::now().timestamp();
    let payload = serde_json::json!({
        "video": video,
        "event": event,
        "timestamp": timestamp,
        "is_test": true,
        "test_mode": true,
    });

    tracing::info!(url = %req.url, event = %event, "sending test webhook");

    ctx.webhooks.deliver_direct(&req.url, &payload);

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "test webhook sent successfully",
        "url": req.url,
        "event": event,
        "video_id": video_id,
        "timestamp": timestamp,
    })))
}
