//! # エンドポイントテスト用共通ヘルパー
//!
//! head, get, ルーターのテストで共有するモックストレージと状態の構築。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use sensor_storage_policy::{NodeRecord, PolicyConfig, TableAuthenticator};

use crate::auth::b64;
use crate::config::{GatewayState, ServeMode};
use crate::metrics::GatewayMetrics;
use crate::storage::{ObjectBody, ObjectMetadata, ObjectStore, StorageError};

/// テスト用のモックObjectStore。
/// S3への接続なしで登録済みのオブジェクトを返す。
#[derive(Default)]
pub struct MockObjectStore {
    objects: HashMap<String, Vec<u8>>,
    failure: Option<StorageError>,
    calls: Arc<AtomicUsize>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// キーに対応するオブジェクトを登録する。
    pub fn with_object(mut self, key: &str, content: &[u8]) -> Self {
        self.objects.insert(key.to_string(), content.to_vec());
        self
    }

    /// 全ての呼び出しを指定したエラーで失敗させる。
    pub fn failing(mut self, err: StorageError) -> Self {
        self.failure = Some(err);
        self
    }

    /// バックエンド呼び出し回数のカウンタ。
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn lookup(&self, key: &str) -> Result<&Vec<u8>, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.objects
            .get(key)
            .ok_or_else(|| StorageError::NoSuchKey(format!("{key}: The specified key does not exist.")))
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let content = self.lookup(key)?;
        Ok(ObjectMetadata {
            content_length: Some(content.len() as u64),
            content_language: Some("klingon".to_string()),
            ..Default::default()
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectBody, StorageError> {
        let content = self.lookup(key)?.clone();
        let length = content.len() as u64;

        // 2チャンクに分けて返す
        let split = content.len() / 2;
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&content[..split])),
            Ok(Bytes::copy_from_slice(&content[split..])),
        ];

        Ok(ObjectBody {
            content_length: Some(length),
            content_type: Some("image/jpeg".to_string()),
            body: futures_util::stream::iter(chunks).boxed(),
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        expiry_secs: u32,
        _content_disposition: &str,
    ) -> Result<String, StorageError> {
        self.lookup(key)?;
        Ok(format!("http://mock-storage/{key}?X-Amz-Expires={expiry_secs}"))
    }
}

/// 基準時刻から `years` 年前（概算）の時刻
pub fn years_ago(years: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(365 * years)
}

/// 各種ノードを含むテスト用ポリシー設定。
pub fn policy_config() -> PolicyConfig {
    let node = |restricted: bool, commission_date: Option<DateTime<Utc>>| NodeRecord {
        restricted,
        commission_date,
    };

    PolicyConfig {
        username: "user".to_string(),
        password: "secret".to_string(),
        nodes: HashMap::from([
            ("uncommissioned".to_string(), node(false, None)),
            ("commissioned1Y".to_string(), node(false, Some(years_ago(1)))),
            ("commissioned3Y".to_string(), node(false, Some(years_ago(3)))),
            ("restrictedNode1".to_string(), node(true, Some(years_ago(1)))),
            ("restrictedNode2".to_string(), node(true, Some(years_ago(1)))),
        ]),
        restricted_task_substrings: vec![
            "imagesampler-bottom".to_string(),
            "imagesampler-left".to_string(),
            "imagesampler-right".to_string(),
            "imagesampler-top".to_string(),
            "audiosampler".to_string(),
        ],
    }
}

/// テスト用GatewayStateを構築するヘルパー
pub fn test_state(store: MockObjectStore, config: PolicyConfig) -> Arc<GatewayState> {
    Arc::new(GatewayState {
        store: Box::new(store),
        authenticator: Arc::new(TableAuthenticator::new(config).unwrap()),
        root_folder: String::new(),
        serve_mode: ServeMode::Stream,
        presign_expiry_secs: 60,
        auth_realm: "storage".to_string(),
        metrics: GatewayMetrics::new().unwrap(),
    })
}

/// `sage/{task}/{node}/{timestamp}-sample.jpg` 形式のパス
pub fn file_path(task: &str, node: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "sage/{task}/{node}/{}-sample.jpg",
        timestamp.timestamp_nanos_opt().unwrap()
    )
}

/// Basic認証ヘッダー
pub fn basic_auth_headers(username: &str, password: &str) -> HeaderMap {
    let encoded = b64().encode(format!("{username}:{password}"));
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
    );
    headers
}
