//! # GET {prefix}/{job}/{task}/{node}/{timestamp}-{filename}
//!
//! 認可判定の後、オブジェクト本体を返す。
//!
//! ## 配信方式（`SERVE_MODE`）
//! - `stream`: バックエンドから本体を読み出し、そのままレスポンスに流す
//! - `redirect`: 短期間有効な署名付きURLを発行し、307でリダイレクトする
//!
//! どちらの方式もプロセス起動時の設定で1つに固定される。

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use sensor_storage_types::FileIdentity;

use super::{content_disposition, set_content_disposition};
use crate::auth::basic_credentials;
use crate::config::{GatewayState, ServeMode};
use crate::error::GatewayError;

/// GET: 認可されたリクエストにオブジェクト本体を返す。
///
/// 制限付きファイルにはBasic認証の共有認証情報が必要。
/// 認可されない場合は401とBasic認証チャレンジを返す。
pub async fn handle_get(
    state: &GatewayState,
    path: &str,
    headers: &HeaderMap,
) -> Result<Response, GatewayError> {
    let identity = FileIdentity::parse(path)?;

    let credentials = basic_credentials(headers);
    if !state
        .authenticator
        .authorized(&identity, credentials.as_ref())
    {
        tracing::debug!(file = %identity, has_credentials = credentials.is_some(), "認可されませんでした");
        return Err(GatewayError::Unauthorized {
            realm: state.auth_realm.clone(),
        });
    }

    let key = identity.storage_key(&state.root_folder);
    match state.serve_mode {
        ServeMode::Stream => stream_object(state, &key, &identity).await,
        ServeMode::Redirect => redirect_to_presigned(state, &key, &identity).await,
    }
}

/// バックエンドの本体をレスポンスに流す。
///
/// 転送したバイト数はチャンクごとに `file_download_byte_size` に加算する。
/// クライアントが切断するとレスポンス本体がドロップされ、バックエンドの読み取りも止まる。
async fn stream_object(
    state: &GatewayState,
    key: &str,
    identity: &FileIdentity,
) -> Result<Response, GatewayError> {
    let object = state
        .store
        .get_object(key)
        .await
        .map_err(|e| GatewayError::from_storage("GetObject", e))?;

    let counter = state.metrics.file_download_byte_size.clone();
    let key_for_log = key.to_string();
    let body = object.body.inspect(move |chunk| match chunk {
        Ok(bytes) => counter.inc_by(bytes.len() as u64),
        Err(e) => tracing::warn!(key = %key_for_log, error = %e, "オブジェクトの転送中に失敗"),
    });

    let mut response = Response::new(Body::from_stream(body));
    set_content_disposition(&mut response, &identity.filename);

    let headers = response.headers_mut();
    if let Some(length) = object.content_length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    let content_type = object
        .content_type
        .as_deref()
        .and_then(|t| HeaderValue::from_str(t).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    headers.insert(CONTENT_TYPE, content_type);

    Ok(response)
}

/// 署名付きURLを発行して307でリダイレクトする。
///
/// 存在しないファイルに対して404を返すため、発行前にHEADで存在を確認する。
async fn redirect_to_presigned(
    state: &GatewayState,
    key: &str,
    identity: &FileIdentity,
) -> Result<Response, GatewayError> {
    state
        .store
        .head_object(key)
        .await
        .map_err(|e| GatewayError::from_storage("HeadObject", e))?;

    let disposition = content_disposition(&identity.filename);
    let url = state
        .store
        .presign_get(
            key,
            state.presign_expiry_secs,
            disposition.to_str().unwrap_or("attachment"),
        )
        .await
        .map_err(|e| GatewayError::from_storage("PresignGet", e))?;

    let location = HeaderValue::from_str(&url)
        .map_err(|e| GatewayError::Internal(format!("invalid presigned URL: {e}")))?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    response.headers_mut().insert(LOCATION, location);
    set_content_disposition(&mut response, &identity.filename);

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::test_helpers::{
        basic_auth_headers, file_path, policy_config, test_state, MockObjectStore,
    };
    use crate::storage::StorageError;
    use axum::http::header::{CONTENT_DISPOSITION, WWW_AUTHENTICATE};
    use axum::response::IntoResponse;
    use chrono::{Duration, Utc};

    const CONTENT: &[u8] = b"I am fake file content";

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    /// 認証情報付きで制限付きファイルを取得できることを確認
    #[tokio::test]
    async fn test_get_restricted_with_credentials() {
        let path = file_path("safe-task", "restrictedNode1", Utc::now());
        let state = test_state(
            MockObjectStore::new().with_object(&path, CONTENT),
            policy_config(),
        );

        let response = handle_get(&state, &path, &basic_auth_headers("user", "secret"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_LENGTH],
            CONTENT.len().to_string().as_str()
        );
        let filename = path.rsplit('/').next().unwrap();
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            format!("attachment; filename={filename}").as_str()
        );
        assert_eq!(body_bytes(response).await, CONTENT);
        assert_eq!(
            state.metrics.file_download_byte_size.get(),
            CONTENT.len() as u64
        );
    }

    /// 認証情報の無い・誤ったリクエストが401になることを確認
    #[tokio::test]
    async fn test_get_restricted_without_valid_credentials() {
        let path = file_path("safe-task", "restrictedNode1", Utc::now());
        let store = MockObjectStore::new().with_object(&path, CONTENT);
        let calls = store.calls();
        let state = test_state(store, policy_config());

        for headers in [
            HeaderMap::new(),
            basic_auth_headers("userX", "secret"),
            basic_auth_headers("user", "secretY"),
        ] {
            let err = handle_get(&state, &path, &headers).await.unwrap_err();
            assert!(matches!(err, GatewayError::Unauthorized { .. }));

            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic realm=\"storage\"");
        }
        // 認可されないリクエストはバックエンドに到達しない
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    /// 存在しない公開ファイルが401ではなく404になることを確認
    #[tokio::test]
    async fn test_get_missing_public_file() {
        let path = file_path("safe-task", "commissioned1Y", Utc::now());
        let state = test_state(MockObjectStore::new(), policy_config());

        let err = handle_get(&state, &path, &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::FileNotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    /// 不正なパスが認可判定より先に400になることを確認
    #[tokio::test]
    async fn test_get_malformed_path() {
        let state = test_state(MockObjectStore::new(), policy_config());
        let err = handle_get(&state, "sage/safe-task/n1/sample.jpg", &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    /// バケットが存在しない場合にキー不在ではなくバケット不在として404になることを確認
    #[tokio::test]
    async fn test_get_missing_bucket() {
        let path = file_path("safe-task", "commissioned1Y", Utc::now());
        let state = test_state(
            MockObjectStore::new().failing(StorageError::NoSuchBucket(
                "The specified bucket does not exist".into(),
            )),
            policy_config(),
        );

        let err = handle_get(&state, &path, &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BucketNotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().starts_with("Bucket not found"));
    }

    /// バックエンド障害が500になり、診断メッセージを含むことを確認
    #[tokio::test]
    async fn test_get_backend_error() {
        let path = file_path("safe-task", "commissioned1Y", Utc::now());
        let state = test_state(
            MockObjectStore::new().failing(StorageError::Backend("connection reset".into())),
            policy_config(),
        );

        let err = handle_get(&state, &path, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("connection reset"));
    }

    /// redirectモードで署名付きURLへの307を返すことを確認
    #[tokio::test]
    async fn test_get_redirect_mode() {
        let path = file_path("safe-task", "commissioned1Y", Utc::now() - Duration::days(30));
        let mut state = test_state(
            MockObjectStore::new().with_object(&path, CONTENT),
            policy_config(),
        );
        {
            let s = std::sync::Arc::get_mut(&mut state).unwrap();
            s.serve_mode = ServeMode::Redirect;
            s.presign_expiry_secs = 60;
        }

        let response = handle_get(&state, &path, &HeaderMap::new()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[LOCATION],
            format!("http://mock-storage/{path}?X-Amz-Expires=60").as_str()
        );
        assert!(response.headers().contains_key(CONTENT_DISPOSITION));
        assert_eq!(state.metrics.file_download_byte_size.get(), 0);
    }

    /// redirectモードでも存在しないファイルは404になることを確認
    #[tokio::test]
    async fn test_get_redirect_mode_missing_file() {
        let path = file_path("safe-task", "commissioned1Y", Utc::now());
        let mut state = test_state(MockObjectStore::new(), policy_config());
        std::sync::Arc::get_mut(&mut state).unwrap().serve_mode = ServeMode::Redirect;

        let err = handle_get(&state, &path, &HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
