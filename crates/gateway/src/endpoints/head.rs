//! # HEAD {prefix}/{job}/{task}/{node}/{timestamp}-{filename}
//!
//! オブジェクトのメタデータ取得。
//!
//! HEADは認可判定を行わない。メタデータ（サイズを含む）は制限付きファイルでも
//! 認証なしで参照できる。

use axum::http::header::CONTENT_LENGTH;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use sensor_storage_types::FileIdentity;

use super::{respond_json, set_content_disposition};
use crate::config::GatewayState;
use crate::error::GatewayError;

/// HEAD: バックエンドのメタデータをJSONで返す。
///
/// Content-Lengthにはオブジェクトのサイズを設定する。
pub async fn handle_head(state: &GatewayState, path: &str) -> Result<Response, GatewayError> {
    let identity = FileIdentity::parse(path)?;
    let key = identity.storage_key(&state.root_folder);

    let metadata = state
        .store
        .head_object(&key)
        .await
        .map_err(|e| GatewayError::from_storage("HeadObject", e))?;

    let mut response = respond_json(StatusCode::OK, &metadata);
    if let Some(length) = metadata.content_length {
        response
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    set_content_disposition(&mut response, &identity.filename);

    Ok(response)
}
