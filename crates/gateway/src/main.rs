//! # Sensor Storage Gateway
//!
//! センサーノードが収集したファイルを、S3互換バケットから読み取り専用で配信するGateway。
//!
//! ## 役割
//! - リクエストパスからファイル識別子を導出し、ストレージキーに変換する
//! - ノード表・制限タスク一覧に基づく認可判定（制限付きファイルにはBasic認証）
//! - オブジェクトのメタデータ取得と本体の配信（ストリーム or 署名付きURLへのリダイレクト）
//! - ポリシー設定ファイルの定期再読み込み
//!
//! ## API エンドポイント
//! - `HEAD {prefix}/{job}/{task}/{node}/{timestamp}-{filename}`: メタデータ取得
//! - `GET {prefix}/{job}/{task}/{node}/{timestamp}-{filename}`: ファイル取得
//! - `OPTIONS {prefix}/...`: 200
//! - その他のメソッド: 405
//! - `GET /metrics`: Prometheusメトリクス

mod auth;
mod config;
mod endpoints;
mod error;
mod metrics;
mod reload;
mod storage;

use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use sensor_storage_policy::{PolicyConfig, TableAuthenticator};
use tracing_subscriber::EnvFilter;

use config::{GatewayConfig, GatewayState};
use endpoints::{handle_metrics, handle_storage, handle_storage_root};
use metrics::GatewayMetrics;
use storage::ObjectStore;

/// Gatewayのルーターを構築する。
///
/// `prefix` 配下の全メソッドをストレージハンドラに、`/metrics` をメトリクス出力に割り当てる。
pub fn build_router(state: Arc<GatewayState>, prefix: &str) -> Router {
    let base = prefix.trim_end_matches('/');

    let mut router = Router::new()
        .route(&format!("{base}/{{*path}}"), any(handle_storage))
        .route(&format!("{base}/"), any(handle_storage_root));
    // ワイルドカードは空の残りに一致しないため、`{prefix}` と `{prefix}/` を個別に割り当てる
    if !base.is_empty() {
        router = router.route(base, any(handle_storage_root));
    }

    router
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

/// バックエンドストレージを構築する。
#[cfg(feature = "vendor-aws")]
fn object_store() -> anyhow::Result<Box<dyn ObjectStore>> {
    Ok(Box::new(storage::S3ObjectStore::from_env()?))
}

#[cfg(not(feature = "vendor-aws"))]
fn object_store() -> anyhow::Result<Box<dyn ObjectStore>> {
    anyhow::bail!("ストレージバックエンドが有効化されていません（feature: vendor-aws）")
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env()?;

    // ポリシー設定（起動時に読めなければ起動しない）
    let policy = PolicyConfig::from_file(&config.policy_config_path)?;
    let authenticator = Arc::new(TableAuthenticator::new(policy)?);
    tracing::info!(
        path = %config.policy_config_path.display(),
        "ポリシー設定を読み込みました"
    );

    if let Some(interval) = config.policy_reload_interval {
        reload::spawn_policy_reload(
            Arc::clone(&authenticator),
            config.policy_config_path.clone(),
            interval,
        );
        tracing::info!(interval_secs = interval.as_secs(), "ポリシー設定の再読み込みを有効化");
    }

    let state = Arc::new(GatewayState {
        store: object_store()?,
        authenticator,
        root_folder: config.root_folder.clone(),
        serve_mode: config.serve_mode,
        presign_expiry_secs: config.presign_expiry_secs,
        auth_realm: config.auth_realm.clone(),
        metrics: GatewayMetrics::new()?,
    });

    let app = build_router(state, &config.route_prefix);

    tracing::info!(
        addr = %config.listen_addr,
        prefix = %config.route_prefix,
        serve_mode = ?config.serve_mode,
        "Gatewayを起動します"
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
