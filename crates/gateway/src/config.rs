//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sensor_storage_policy::Authenticator;

use crate::metrics::GatewayMetrics;
use crate::storage::ObjectStore;

/// GETでのオブジェクト本体の配信方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ServeMode {
    /// バックエンドの本体をそのままレスポンスに流す
    #[default]
    Stream,
    /// 署名付きURLへ307でリダイレクトする
    Redirect,
}

impl FromStr for ServeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(ServeMode::Stream),
            "redirect" => Ok(ServeMode::Redirect),
            other => anyhow::bail!("SERVE_MODEは stream または redirect である必要があります: {other}"),
        }
    }
}

/// プロセス起動時に環境変数から読み込む設定。
///
/// S3接続情報（`S3_ENDPOINT` 等）は [`crate::storage::S3ObjectStore::from_env`] が読む。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// 待ち受けアドレス
    pub listen_addr: String,
    /// Gatewayをマウントするパスのプレフィックス（末尾の `/` なし）
    pub route_prefix: String,
    /// ストレージキーのルートフォルダ
    pub root_folder: String,
    /// 配信方式
    pub serve_mode: ServeMode,
    /// 署名付きURLの有効期限（秒）
    pub presign_expiry_secs: u32,
    /// Basic認証チャレンジのrealm
    pub auth_realm: String,
    /// ポリシー設定ファイルのパス
    pub policy_config_path: PathBuf,
    /// ポリシー再読み込みの間隔。`None` なら再読み込みしない
    pub policy_reload_interval: Option<Duration>,
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の変数参照関数から構築する。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let route_prefix = normalize_prefix(&var("ROUTE_PREFIX", "/api/v1/data"));
        let serve_mode: ServeMode = var("SERVE_MODE", "stream").parse()?;
        let presign_expiry_secs: u32 = var("PRESIGN_EXPIRY_SECS", "60")
            .parse()
            .context("PRESIGN_EXPIRY_SECSは正の整数である必要があります")?;
        if presign_expiry_secs == 0 {
            anyhow::bail!("PRESIGN_EXPIRY_SECSは1以上である必要があります");
        }
        let reload_secs: u64 = var("POLICY_RELOAD_INTERVAL_SECS", "0")
            .parse()
            .context("POLICY_RELOAD_INTERVAL_SECSは0以上の整数である必要があります")?;
        let policy_config_path = lookup("POLICY_CONFIG_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .context("POLICY_CONFIG_PATHが設定されていません")?;

        Ok(Self {
            listen_addr: var("LISTEN_ADDR", "0.0.0.0:8080"),
            route_prefix,
            root_folder: var("S3_ROOT_FOLDER", ""),
            serve_mode,
            presign_expiry_secs,
            auth_realm: var("AUTH_REALM", "storage"),
            policy_config_path,
            policy_reload_interval: (reload_secs > 0).then(|| Duration::from_secs(reload_secs)),
        })
    }
}

/// 先頭に `/` を付け、末尾の `/` を取り除く。
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    format!("/{trimmed}")
}

/// Gatewayの共有状態。
pub struct GatewayState {
    /// バックエンドストレージ（S3互換等、トレイトで抽象化）
    pub store: Box<dyn ObjectStore>,
    /// 認可判定
    pub authenticator: Arc<dyn Authenticator>,
    /// ストレージキーのルートフォルダ
    pub root_folder: String,
    /// 配信方式
    pub serve_mode: ServeMode,
    /// 署名付きURLの有効期限（秒）
    pub presign_expiry_secs: u32,
    /// Basic認証チャレンジのrealm
    pub auth_realm: String,
    /// メトリクス
    pub metrics: GatewayMetrics,
}
