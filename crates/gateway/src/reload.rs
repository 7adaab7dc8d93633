//! # ポリシー設定の定期再読み込み
//!
//! 設定ファイルを一定間隔で読み直し、内容が変わっていれば新しいスナップショットとして公開する。
//! 読み込み・パース・検証に失敗した場合は現在のスナップショットを残す。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sensor_storage_policy::{PolicyConfig, PolicyError, TableAuthenticator};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 設定ファイルを1回読み直す。
///
/// 公開した場合は新しい版番号を、内容が現在のスナップショットと同じ場合は `None` を返す。
pub async fn reload_policy(
    authenticator: &TableAuthenticator,
    path: &Path,
) -> Result<Option<u64>, PolicyError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let config = PolicyConfig::from_json(&contents)?;

    if authenticator.snapshot().config == config {
        return Ok(None);
    }
    authenticator.update_config(config).map(Some)
}

/// 再読み込みタスクを起動する。
///
/// 初回の読み込みは起動時に済んでいるため、最初の周期から読み直す。
pub fn spawn_policy_reload(
    authenticator: Arc<TableAuthenticator>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match reload_policy(&authenticator, &path).await {
                Ok(Some(version)) => {
                    tracing::info!(path = %path.display(), version, "ポリシー設定を再読み込みしました");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ポリシー設定の再読み込みに失敗。現在の設定を維持します");
                }
            }
        }
    })
}
