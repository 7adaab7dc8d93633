//! # オブジェクトストレージ
//!
//! Gatewayが読み取るバックエンドストレージの抽象インターフェース。
//! S3互換ストレージ実装は `s3` サブモジュールを参照。

#[cfg(feature = "vendor-aws")]
pub mod s3;

#[cfg(feature = "vendor-aws")]
pub use s3::S3ObjectStore;

use std::collections::HashMap;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::Serialize;

/// バックエンド操作のエラー。
///
/// バックエンド実装は応答をこの閉じた集合に分類して返す。
/// 呼び出し側はエラーメッセージの文字列を検査しない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// バケットが存在しない
    #[error("NoSuchBucket: {0}")]
    NoSuchBucket(String),
    /// オブジェクトが存在しない
    #[error("NoSuchKey: {0}")]
    NoSuchKey(String),
    /// その他のバックエンド障害（診断メッセージを含む）
    #[error("{0}")]
    Backend(String),
}

/// HeadObjectで得られるオブジェクトのメタデータ。
/// レスポンスのJSONはS3のHeadObject出力のフィールド名に揃える。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectMetadata {
    /// オブジェクトのバイト数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    /// MIMEタイプ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// コンテンツ言語
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_language: Option<String>,
    /// コンテンツエンコーディング
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// キャッシュ制御
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// ETag
    #[serde(rename = "ETag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    /// 最終更新日時（バックエンドが返した文字列のまま）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// ユーザー定義メタデータ
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// GetObjectで得られるオブジェクト本体。
pub struct ObjectBody {
    /// オブジェクトのバイト数（不明な場合はNone）
    pub content_length: Option<u64>,
    /// MIMEタイプ
    pub content_type: Option<String>,
    /// 本体のバイトストリーム。ドロップするとバックエンドからの読み取りも中断される
    pub body: BoxStream<'static, Result<Bytes, StorageError>>,
}

/// 読み取り専用オブジェクトストレージの抽象インターフェース。
///
/// 対象バケットは実装側で固定される。
/// 各メソッドの返すFutureがドロップされた時点でバックエンド呼び出しは中断される。
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// オブジェクトのメタデータを取得する。
    async fn head_object(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// オブジェクト本体をストリームとして取得する。
    async fn get_object(&self, key: &str) -> Result<ObjectBody, StorageError>;

    /// 署名付きダウンロードURL（GET）を生成する。
    ///
    /// `content_disposition` はURL経由のダウンロード時に返させるContent-Disposition。
    async fn presign_get(
        &self,
        key: &str,
        expiry_secs: u32,
        content_disposition: &str,
    ) -> Result<String, StorageError>;
}
