//! # ポリシーエラー型

use std::path::PathBuf;

/// ポリシー設定の読み込み・更新エラー。
/// エンドユーザーには返さず、設定更新の呼び出し元（運用者）にのみ通知する。
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// 設定の内容が不正
    #[error("ポリシー設定が不正です: {0}")]
    InvalidConfig(String),
    /// 設定ファイルの読み込みに失敗
    #[error("ポリシー設定ファイルの読み込みに失敗 ({path}): {source}")]
    Read {
        /// 設定ファイルのパス
        path: PathBuf,
        /// I/Oエラー
        source: std::io::Error,
    },
    /// 設定のJSONパースに失敗
    #[error("ポリシー設定のパースに失敗: {0}")]
    Parse(#[from] serde_json::Error),
}
