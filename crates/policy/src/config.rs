//! # ポリシー設定
//!
//! 共有認証情報、ノード表、制限タスク一覧からなる認可設定と、そのJSON形式。
//!
//! ```json
//! {
//!   "username": "user",
//!   "password": "secret",
//!   "nodes": {
//!     "n1": { "restricted": false, "commission_date": "2023-01-01T00:00:00Z" }
//!   },
//!   "restricted_task_substrings": ["imagesampler"]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// ノードごとの認可情報。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// trueの場合、このノードのファイルは常に制限付き
    #[serde(default)]
    pub restricted: bool,
    /// データが公開に切り替わる時刻。Noneの場合は未コミッションで常に制限付き
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_date: Option<DateTime<Utc>>,
}

/// 認可設定。[`TableAuthenticator`](crate::TableAuthenticator) に丸ごと差し替えで渡される。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// 制限付きファイルの取得に使う共有ユーザー名
    pub username: String,
    /// 制限付きファイルの取得に使う共有パスワード
    pub password: String,
    /// ノードID → ノード情報
    #[serde(default)]
    pub nodes: HashMap<String, NodeRecord>,
    /// タスク名にいずれかを含む場合、ノードの状態に関わらず制限付きとなる部分文字列
    #[serde(default)]
    pub restricted_task_substrings: Vec<String>,
}

impl PolicyConfig {
    /// JSON文字列から設定をパースする。検証は行わない。
    pub fn from_json(s: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(s)?)
    }

    /// JSONファイルから設定を読み込む。検証は行わない。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// 公開可能な設定かを検証する。
    ///
    /// - ユーザー名・パスワードが空でない
    /// - ノードIDが空でない
    /// - 制限タスク部分文字列が空でない（空文字列は全タスクに一致してしまう）
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.username.is_empty() {
            return Err(PolicyError::InvalidConfig(
                "usernameが空です".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(PolicyError::InvalidConfig(
                "passwordが空です".to_string(),
            ));
        }
        if self.nodes.keys().any(|id| id.is_empty()) {
            return Err(PolicyError::InvalidConfig(
                "空のノードIDが含まれています".to_string(),
            ));
        }
        if let Some(index) = self
            .restricted_task_substrings
            .iter()
            .position(|s| s.is_empty())
        {
            return Err(PolicyError::InvalidConfig(format!(
                "restricted_task_substrings[{index}]が空文字列です"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for PolicyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("nodes", &self.nodes)
            .field("restricted_task_substrings", &self.restricted_task_substrings)
            .finish()
    }
}
