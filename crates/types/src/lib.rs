//! # Sensor Storage 共有型定義
//!
//! リクエストパスから導出されるファイル識別子と、
//! バックエンドのオブジェクトキーへの写像を提供する。
//!
//! ## アドレス体系
//! `{job}/{task}/{node}/{nanosecondTimestamp}-{filename}`
//!
//! - ちょうど4つの `/` 区切りセグメントで構成される
//! - 4番目のセグメントは最初の `-` までがナノ秒単位のUNIXタイムスタンプ
//! - 各セグメントは不透明な文字列として扱い、エスケープや正規化は行わない

use std::fmt;

use chrono::{DateTime, Utc};

/// ファイル名中のタイムスタンプと元のファイル名の区切り文字
pub const TIMESTAMP_SEPARATOR: char = '-';

// ---------------------------------------------------------------------------
// エラー型
// ---------------------------------------------------------------------------

/// ファイル識別子のパースエラー。
/// いずれもクライアント入力の誤りであり、再試行しても結果は変わらない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// セグメント数が4でない、または空のセグメントを含む
    #[error("invalid path format")]
    MalformedPath,
    /// ファイル名にタイムスタンプ区切りの `-` が無い
    #[error("failed to extract timestamp from filename string {0:?}")]
    MalformedFilename(String),
    /// タイムスタンプ部が10進整数として解釈できない
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// 解釈に失敗した文字列
        value: String,
        /// 整数パーサのエラーメッセージ
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// ファイル識別子
// ---------------------------------------------------------------------------

/// 1リクエストから導出されるファイル識別子。
///
/// タイムスタンプはパース時に一度だけ解釈され、以降は文字列から再パースしない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    /// ジョブID
    pub job: String,
    /// タスク名
    pub task: String,
    /// ノードID
    pub node: String,
    /// タイムスタンプ付きのファイル名（`{timestamp}-{name}` 全体）
    pub filename: String,
    /// ファイル名先頭から取り出したタイムスタンプ（ナノ秒精度）
    pub timestamp: DateTime<Utc>,
}

impl FileIdentity {
    /// リクエストパスからファイル識別子を構築する。
    pub fn parse(path: &str) -> Result<Self, IdentityError> {
        parse_file_path(path)
    }

    /// このファイルのバックエンドオブジェクトキーを返す。
    pub fn storage_key(&self, root_folder: &str) -> String {
        storage_key(self, root_folder)
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.job, self.task, self.node, self.filename)
    }
}

/// `{job}/{task}/{node}/{timestamp}-{filename}` 形式のパスをパースする。
///
/// 4番目のセグメントに `/` を含むパスはセグメント数の誤りとして扱う。
pub fn parse_file_path(path: &str) -> Result<FileIdentity, IdentityError> {
    let segments: Vec<&str> = path.split('/').collect();
    let [job, task, node, filename] = segments.as_slice() else {
        return Err(IdentityError::MalformedPath);
    };

    if [job, task, node, filename].iter().any(|s| s.is_empty()) {
        return Err(IdentityError::MalformedPath);
    }

    let timestamp = extract_timestamp_from_filename(filename)?;

    Ok(FileIdentity {
        job: (*job).to_string(),
        task: (*task).to_string(),
        node: (*node).to_string(),
        filename: (*filename).to_string(),
        timestamp,
    })
}

/// ファイル名の最初の `-` より前をナノ秒タイムスタンプとして取り出す。
pub fn extract_timestamp_from_filename(filename: &str) -> Result<DateTime<Utc>, IdentityError> {
    let (prefix, _) = filename
        .split_once(TIMESTAMP_SEPARATOR)
        .ok_or_else(|| IdentityError::MalformedFilename(filename.to_string()))?;
    parse_nanosecond_timestamp(prefix)
}

/// 10進の符号付き整数をUNIXエポックからのナノ秒として解釈する。
///
/// 負の値や未来の時刻も有効な時刻として受け付ける。
pub fn parse_nanosecond_timestamp(s: &str) -> Result<DateTime<Utc>, IdentityError> {
    let nanos: i64 = s.parse().map_err(|e: std::num::ParseIntError| {
        IdentityError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(DateTime::from_timestamp_nanos(nanos))
}

// ---------------------------------------------------------------------------
// オブジェクトキー
// ---------------------------------------------------------------------------

/// `root_folder/job/task/node/filename` を結合したオブジェクトキーを返す。
///
/// ルートフォルダ中の空セグメントは捨てるため二重スラッシュは生じない。
/// 識別子の各セグメントはそのまま連結する。
pub fn storage_key(identity: &FileIdentity, root_folder: &str) -> String {
    root_folder
        .split('/')
        .filter(|s| !s.is_empty())
        .chain([
            identity.job.as_str(),
            identity.task.as_str(),
            identity.node.as_str(),
            identity.filename.as_str(),
        ])
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// テスト
// ---------------------------------------------------------------------------
