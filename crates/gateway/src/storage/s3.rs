//! # S3互換 オブジェクトストレージ実装
//!
//! AWS S3, MinIO, Cloudflare R2 等のS3互換APIを使用する
//! 読み取り専用ストレージ実装。

use std::collections::HashMap;

use futures_util::StreamExt;
use serde::Deserialize;

use super::{ObjectBody, ObjectMetadata, ObjectStore, StorageError};

/// エラー応答の本文を読み取る上限（バイト）
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// S3互換ストレージによるオブジェクトストレージ実装。
pub struct S3ObjectStore {
    bucket: ::s3::Bucket,
}

impl S3ObjectStore {
    /// S3互換バケットからObjectStoreを構築する。
    pub fn new(bucket: ::s3::Bucket) -> Self {
        Self { bucket }
    }

    /// S3互換バケットを初期化する。
    fn init_bucket(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket_name: &str,
    ) -> anyhow::Result<::s3::Bucket> {
        // AWS S3エンドポイント（s3.REGION.amazonaws.com）からリージョンを自動検出。
        // 非AWSエンドポイントではus-east-1をフォールバックとして使用。
        let detected_region = std::env::var("S3_REGION").ok().unwrap_or_else(|| {
            endpoint
                .find("s3.")
                .and_then(|start| {
                    let rest = &endpoint[start + 3..];
                    rest.find(".amazonaws.com").map(|end| rest[..end].to_string())
                })
                .unwrap_or_else(|| "us-east-1".to_string())
        });
        let region = ::s3::Region::Custom {
            region: detected_region,
            endpoint: endpoint.to_string(),
        };

        let credentials = ::s3::creds::Credentials::new(
            Some(access_key),
            Some(secret_key),
            None,
            None,
            None,
        )?;

        let bucket = ::s3::Bucket::new(bucket_name, region, credentials)?.with_path_style();

        Ok(*bucket)
    }

    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = std::env::var("S3_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let access_key =
            std::env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key =
            std::env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket_name =
            std::env::var("S3_BUCKET").unwrap_or_else(|_| "node-data".to_string());

        tracing::info!(
            s3_endpoint = %endpoint,
            s3_bucket = %bucket_name,
            "S3互換ストレージを設定"
        );

        let bucket = Self::init_bucket(&endpoint, &access_key, &secret_key, &bucket_name)?;
        Ok(Self::new(bucket))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let (head, status) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if !is_success(status) {
            // HEADの応答には本文が無いため、ステータスコードのみで分類する
            return Err(classify_error(key, status, &[]));
        }

        Ok(ObjectMetadata {
            content_length: head.content_length.and_then(|n| u64::try_from(n).ok()),
            content_type: head.content_type,
            content_language: head.content_language,
            content_encoding: head.content_encoding,
            cache_control: head.cache_control,
            e_tag: head.e_tag,
            last_modified: head.last_modified,
            metadata: head.metadata.unwrap_or_default(),
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectBody, StorageError> {
        // 失敗はGETの応答本文で分類する（HEADの404からはバケットとキーの区別がつかない）
        let mut response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if !is_success(response.status_code) {
            let mut body = Vec::new();
            while let Some(Ok(chunk)) = response.bytes.next().await {
                body.extend_from_slice(&chunk);
                if body.len() >= ERROR_BODY_LIMIT {
                    break;
                }
            }
            return Err(classify_error(key, response.status_code, &body));
        }

        // ストリーム応答にはヘッダーが含まれないため、長さと型はHEADで補う。
        // 取得できなければ長さ不明のまま本体を流す
        let metadata = self.head_object(key).await.unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "オブジェクトのメタデータ取得に失敗");
            ObjectMetadata::default()
        });

        let body = response
            .bytes
            .map(|chunk| chunk.map_err(|e| StorageError::Backend(e.to_string())))
            .boxed();

        Ok(ObjectBody {
            content_length: metadata.content_length,
            content_type: metadata.content_type,
            body,
        })
    }

    async fn presign_get(
        &self,
        key: &str,
        expiry_secs: u32,
        content_disposition: &str,
    ) -> Result<String, StorageError> {
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-disposition".to_string(),
            content_disposition.to_string(),
        );

        self.bucket
            .presign_get(key, expiry_secs, Some(queries))
            .await
            .map_err(|e| StorageError::Backend(format!("署名付きダウンロードURL生成失敗: {e}")))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// S3のXMLエラー本文（`<Error><Code>..</Code><Message>..</Message></Error>`）。
#[derive(Debug, Default, Deserialize)]
struct S3ErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

impl S3ErrorBody {
    /// 本文をパースする。空、またはXMLとして読めない本文は空の結果になる。
    fn parse(body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body);
        if body.trim().is_empty() {
            return Self::default();
        }
        quick_xml::de::from_str(&body).unwrap_or_default()
    }
}

/// S3の失敗応答（ステータスコードとXMLエラー本文）をエラー種別に分類する。
fn classify_error(key: &str, status: u16, body: &[u8]) -> StorageError {
    let S3ErrorBody { code, message } = S3ErrorBody::parse(body);
    let message = message.as_deref().map(str::trim);

    match code.as_deref().map(str::trim) {
        Some("NoSuchBucket") => StorageError::NoSuchBucket(
            message
                .unwrap_or("The specified bucket does not exist")
                .to_string(),
        ),
        Some("NoSuchKey") | Some("NotFound") => StorageError::NoSuchKey(
            message.unwrap_or("The specified key does not exist.").to_string(),
        ),
        // HEADの応答には本文が無い
        None if status == 404 => StorageError::NoSuchKey(format!("{key}: status code 404")),
        Some(code) => StorageError::Backend(format!(
            "{code}: {} (status code {status})",
            message.unwrap_or_default()
        )),
        None => StorageError::Backend(format!("status code {status}")),
    }
}
