//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。
//! レスポンス本文は常に `{"error": "<message>"}` 形式の整形済みJSON。

use axum::http::header::{ALLOW, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use sensor_storage_types::IdentityError;

use crate::endpoints::respond_json;
use crate::storage::StorageError;

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// リクエストパスからファイル識別子を導出できない
    #[error(transparent)]
    InvalidPath(#[from] IdentityError),
    /// 制限付きファイルへの認証情報が無い、または一致しない
    #[error("not authorized")]
    Unauthorized {
        /// Basic認証チャレンジのrealm
        realm: String,
    },
    /// バケットが存在しない
    #[error("Bucket not found: {0}")]
    BucketNotFound(StorageError),
    /// オブジェクトが存在しない
    #[error("File not found: {0}")]
    FileNotFound(StorageError),
    /// その他のバックエンド障害
    #[error("Error getting data, {operation} returned: {source}")]
    Backend {
        /// 失敗したバックエンド操作名
        operation: &'static str,
        /// バックエンドのエラー
        source: StorageError,
    },
    /// GET/HEAD/OPTIONS以外のメソッド
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    /// 内部エラー
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// バックエンドのエラーをGatewayのエラー種別に変換する。
    pub fn from_storage(operation: &'static str, err: StorageError) -> Self {
        match err {
            StorageError::NoSuchBucket(_) => GatewayError::BucketNotFound(err),
            StorageError::NoSuchKey(_) => GatewayError::FileNotFound(err),
            StorageError::Backend(_) => GatewayError::Backend {
                operation,
                source: err,
            },
        }
    }

    /// HTTPステータスコード
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidPath(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::BucketNotFound(_) | GatewayError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::Backend { .. } | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "リクエスト処理に失敗");
        }

        let mut response = respond_json(
            status,
            &serde_json::json!({ "error": self.to_string() }),
        );

        match &self {
            GatewayError::Unauthorized { realm } => {
                let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\""))
                    .unwrap_or_else(|_| HeaderValue::from_static("Basic"));
                response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
            }
            GatewayError::MethodNotAllowed => {
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static("GET, HEAD, OPTIONS"));
            }
            _ => {}
        }

        response
    }
}
