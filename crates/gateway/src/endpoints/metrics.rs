//! # GET /metrics
//!
//! Prometheusテキスト形式でメトリクスを公開する。

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};

use crate::config::GatewayState;
use crate::error::GatewayError;

/// GET /metrics
pub async fn handle_metrics(
    State(state): State<Arc<GatewayState>>,
) -> Result<Response, GatewayError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| GatewayError::Internal(format!("メトリクスの出力に失敗: {e}")))?;

    Ok((
        [(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        body,
    )
        .into_response())
}
