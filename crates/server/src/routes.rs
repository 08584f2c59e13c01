//! HTTP routes: `/unfurl`, the image proxy, and `/health`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use unfurl_core::PreviewResult;

#[derive(Debug, Deserialize)]
pub struct UnfurlQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    src: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    cache: &'static str,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let proxy_path = state.proxy_path.clone();
    Router::new()
        .route("/unfurl", get(unfurl))
        .route(&proxy_path, get(img_proxy))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn unfurl(
    State(state): State<AppState>, Query(query): Query<UnfurlQuery>,
) -> Result<Json<PreviewResult>, ApiError> {
    let url = query.url.ok_or(ApiError::MissingParameter("url"))?;
    let preview = state.unfurler.unfurl(&url).await?;
    Ok(Json(preview))
}

async fn img_proxy(State(state): State<AppState>, Query(query): Query<ProxyQuery>) -> Result<Response, ApiError> {
    let src = query.src.ok_or(ApiError::MissingParameter("src"))?;
    let image = state.proxy.open(&src).await?;

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&image.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(len) = image.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(cache_control) = HeaderValue::from_str(&format!("public, max-age={}", state.image_max_age_secs)) {
        headers.insert(header::CACHE_CONTROL, cache_control);
    }

    Ok((headers, Body::from_stream(image.body)).into_response())
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", cache: state.cache.backend() })
}
