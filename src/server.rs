//! HTTP and serverless entry points.
//!
//! `POST /` takes the batch request body and answers with a single envelope
//! or an ordered array of them. The serverless entry wraps the same flow in
//! a `{statusCode, body}` response envelope and additionally verifies that
//! the cloud credential pair is configured.

use std::sync::Arc;

use axum::extract::{Extension, Json};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::request::SearchRequest;
use crate::runner;

/// Error body for a missing or empty query list.
const QUERIES_ERROR: &str = "Error: queries parameter is missing or not a list.";

/// Builds the application router.
pub fn router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(search_endpoint))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(config))
}

/// Binds and serves the router until the process exits.
pub async fn serve(config: Arc<AppConfig>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config)).await?;
    Ok(())
}

async fn search_endpoint(
    Extension(config): Extension<Arc<AppConfig>>,
    Json(request): Json<SearchRequest>,
) -> axum::response::Response {
    if request.queries.is_empty() {
        return (StatusCode::BAD_REQUEST, QUERIES_ERROR).into_response();
    }

    debug!(
        "Batch {:?}: {} queries, cc {}",
        request.batch_id,
        request.queries.len(),
        request.cc
    );

    match runner::execute(&config, &request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            error!("Search failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serverless invocation entry. The event carries the JSON request under a
/// `body` string; the response is `{statusCode, body}` with a JSON-encoded
/// result string, matching the hosting platform's contract.
pub async fn handle_event(config: &AppConfig, event: &Value) -> Value {
    if config.cloud_credentials.is_none() {
        return event_response(500, json!("Error: AWS credentials are not set."));
    }

    let request = match event
        .get("body")
        .and_then(Value::as_str)
        .map(serde_json::from_str::<SearchRequest>)
    {
        Some(Ok(request)) => request,
        _ => return event_response(400, json!(QUERIES_ERROR)),
    };

    if request.queries.is_empty() {
        return event_response(400, json!(QUERIES_ERROR));
    }

    debug!(
        "Event batch {:?}: {} queries, region {}",
        request.batch_id,
        request.queries.len(),
        config.default_region
    );

    match runner::execute(config, &request).await {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(body) => event_response(200, body),
            Err(e) => event_response(500, json!(format!("Error: {}", e))),
        },
        Err(e) => event_response(500, json!(format!("Error: {}", e))),
    }
}

fn event_response(status_code: u16, body: Value) -> Value {
    json!({
        "statusCode": status_code,
        "body": body.to_string(),
    })
}
