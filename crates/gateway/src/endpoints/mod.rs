//! # Gatewayエンドポイント
//!
//! ストレージパス配下の全メソッドを受け付け、メソッドごとのハンドラに振り分ける。
//! ストレージは常に読み取り専用のため、全レスポンスに
//! `Access-Control-Allow-Origin: *` を付与する。

pub mod get;
pub mod head;
pub mod metrics;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use get::handle_get;
pub use head::handle_head;
pub use metrics::handle_metrics;

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use sensor_storage_types::IdentityError;
use serde::Serialize;

use crate::config::GatewayState;
use crate::error::GatewayError;

/// `{prefix}/{*path}`: ストレージパス配下の全メソッド。
///
/// パスを文字列として取り出せない場合（UTF-8として不正なパーセントエンコード等）も
/// ディスパッチに渡し、不正なパスとして応答する。
pub async fn handle_storage(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
) -> Response {
    let path = path
        .map(|Path(path)| path)
        .inspect_err(|rejection| {
            tracing::debug!(error = %rejection, "リクエストパスを取り出せません");
        })
        .ok();
    dispatch(&state, method, path.as_deref(), &headers).await
}

/// `{prefix}` と `{prefix}/`: パスの無いリクエスト。パース失敗として扱われる。
pub async fn handle_storage_root(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    dispatch(&state, method, Some(""), &headers).await
}

async fn dispatch(
    state: &GatewayState,
    method: Method,
    path: Option<&str>,
    headers: &HeaderMap,
) -> Response {
    tracing::info!(%method, path = path.unwrap_or_default(), "storage handler");

    let mut response = match (&method, path) {
        // TODO: CORSプリフライト応答（Access-Control-Allow-Methods等）を返す
        (&Method::OPTIONS, _) => StatusCode::OK.into_response(),
        (&Method::HEAD | &Method::GET, None) => {
            GatewayError::InvalidPath(IdentityError::MalformedPath).into_response()
        }
        (&Method::HEAD, Some(path)) => handle_head(state, path).await.into_response(),
        (&Method::GET, Some(path)) => handle_get(state, path, headers).await.into_response(),
        _ => GatewayError::MethodNotAllowed.into_response(),
    };

    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    state
        .metrics
        .observe_request(method.as_str(), response.status());

    response
}

/// 値を整形済みJSONとしてレスポンスにする。
pub(crate) fn respond_json<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_string_pretty(value) {
        Ok(body) => (
            status,
            [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "JSONのシリアライズに失敗");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `attachment; filename=<filename>` 形式のContent-Dispositionを返す。
/// ヘッダー値に使えない文字を含む場合はファイル名を省略する。
pub(crate) fn content_disposition(filename: &str) -> HeaderValue {
    HeaderValue::from_bytes(format!("attachment; filename={filename}").as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Content-Dispositionヘッダーを設定する。
pub(crate) fn set_content_disposition(response: &mut Response, filename: &str) {
    response
        .headers_mut()
        .insert(CONTENT_DISPOSITION, content_disposition(filename));
}
