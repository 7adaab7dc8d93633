//! # テーブル認可器
//!
//! ノード表と制限タスク一覧に基づく [`Authenticator`] 実装。
//!
//! 読み取り側はロックを取らずに現在のスナップショットを1回だけ読み込み、
//! 判定の間はその参照だけを使う。
//! 更新側は新しいスナップショットを構築してから1回の参照差し替えで公開する。
//! 更新同士はミューテックスで直列化するが、読み取り側とは競合しない。

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use sensor_storage_types::FileIdentity;

use crate::config::PolicyConfig;
use crate::error::PolicyError;
use crate::snapshot::PolicySnapshot;
use crate::{Authenticator, Credentials};

/// スナップショットをアトミックに差し替えられる認可器。
#[derive(Debug)]
pub struct TableAuthenticator {
    snapshot: ArcSwap<PolicySnapshot>,
    update_lock: Mutex<()>,
}

impl TableAuthenticator {
    /// 初期設定を検証し、版番号1のスナップショットとして公開した認可器を構築する。
    pub fn new(config: PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(PolicySnapshot::new(1, config)),
            update_lock: Mutex::new(()),
        })
    }

    /// 現在公開されているスナップショットを返す。
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.snapshot.load_full()
    }

    /// 設定を検証し、新しいスナップショットとして公開する。
    ///
    /// 検証に失敗した場合は現在のスナップショットをそのまま残す。
    /// 成功時は公開したスナップショットの版番号を返す。
    pub fn update_config(&self, config: PolicyConfig) -> Result<u64, PolicyError> {
        config.validate()?;

        // 判定中の読み取りはロックの影響を受けない
        let _guard = self
            .update_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let version = self.snapshot.load().version + 1;
        self.snapshot
            .store(Arc::new(PolicySnapshot::new(version, config)));

        tracing::info!(version, "ポリシー設定を更新しました");
        Ok(version)
    }
}

impl Authenticator for TableAuthenticator {
    fn authorized(&self, identity: &FileIdentity, credentials: Option<&Credentials>) -> bool {
        let snapshot = self.snapshot.load();
        let granted = snapshot.authorized(identity, credentials);
        if !granted {
            tracing::debug!(
                file = %identity,
                version = snapshot.version,
                reason = ?snapshot.restriction(identity),
                has_credentials = credentials.is_some(),
                "制限付きファイルへのアクセスを拒否"
            );
        }
        granted
    }
}
