//! # Sensor Storage 認可ポリシーエンジン
//!
//! ファイル識別子と認証情報から、GETによるデータ取得を許可するかを判定する。
//!
//! ## 判定順序
//! 以下のいずれかに該当するファイルは制限付き（共有認証情報が必要）となる。
//! 1. タスク名が制限タスク部分文字列のいずれかを含む
//! 2. ノードが未登録、またはノードが制限フラグ付き
//! 3. ノードにコミッション日が無い
//! 4. ファイルのタイムスタンプがコミッション日より前
//!
//! いずれにも該当しないファイルは公開であり、認証情報なしで取得できる。
//! 判定は現在時刻を参照しない。ファイル自身のタイムスタンプとポリシー状態のみの純関数である。
//!
//! ## スナップショット
//! ポリシー設定は不変の [`PolicySnapshot`] として公開され、
//! 更新時はスナップショット全体がアトミックに差し替えられる。

pub mod config;
pub mod error;
pub mod snapshot;
pub mod table;

pub use config::{NodeRecord, PolicyConfig};
pub use error::PolicyError;
pub use snapshot::{PolicySnapshot, Restriction};
pub use table::TableAuthenticator;

use sensor_storage_types::FileIdentity;

/// リクエストに付与されたBasic認証情報。
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// ユーザー名
    pub username: String,
    /// パスワード
    pub password: String,
}

impl Credentials {
    /// 認証情報を構築する。
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 認可判定の抽象インターフェース。
///
/// Gatewayはこのトレイト経由で判定を行い、判定ロジックやポリシーの供給元を差し替えられる。
pub trait Authenticator: Send + Sync {
    /// `identity` の取得を `credentials` で許可するかを返す。
    ///
    /// `credentials` が `None` の場合は認証情報なしのリクエストとして扱う。
    fn authorized(&self, identity: &FileIdentity, credentials: Option<&Credentials>) -> bool;
}
