//! # ポリシースナップショット
//!
//! 公開済みの不変な認可設定と、それに対する判定ロジック。

use std::fmt;

use chrono::{DateTime, Utc};
use sensor_storage_types::FileIdentity;
use subtle::ConstantTimeEq;

use crate::config::PolicyConfig;
use crate::Credentials;

/// ファイルが制限付きとなった理由。判定順序の最初に該当したものを表す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// タスク名が制限タスク部分文字列を含む
    RestrictedTask(String),
    /// ノードがノード表に存在しない
    UnknownNode,
    /// ノードが制限フラグ付き
    RestrictedNode,
    /// ノードにコミッション日が無い
    Uncommissioned,
    /// ファイルのタイムスタンプがコミッション日より前
    BeforeCommission(DateTime<Utc>),
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::RestrictedTask(s) => write!(f, "restricted task substring {s:?}"),
            Restriction::UnknownNode => write!(f, "unknown node"),
            Restriction::RestrictedNode => write!(f, "restricted node"),
            Restriction::Uncommissioned => write!(f, "node not commissioned"),
            Restriction::BeforeCommission(date) => {
                write!(f, "file predates commission date {}", date.to_rfc3339())
            }
        }
    }
}

/// 公開済みの認可設定。公開後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    /// 公開ごとに1ずつ増える版番号
    pub version: u64,
    /// 認可設定
    pub config: PolicyConfig,
}

impl PolicySnapshot {
    /// 版番号付きのスナップショットを構築する。
    pub fn new(version: u64, config: PolicyConfig) -> Self {
        Self { version, config }
    }

    /// ファイルが制限付きかを判定し、制限付きであればその理由を返す。
    pub fn restriction(&self, identity: &FileIdentity) -> Option<Restriction> {
        if let Some(substring) = self
            .config
            .restricted_task_substrings
            .iter()
            .find(|s| identity.task.contains(s.as_str()))
        {
            return Some(Restriction::RestrictedTask(substring.clone()));
        }

        let Some(node) = self.config.nodes.get(&identity.node) else {
            return Some(Restriction::UnknownNode);
        };
        if node.restricted {
            return Some(Restriction::RestrictedNode);
        }

        match node.commission_date {
            None => Some(Restriction::Uncommissioned),
            Some(date) if identity.timestamp < date => Some(Restriction::BeforeCommission(date)),
            Some(_) => None,
        }
    }

    /// 認証情報が共有認証情報と一致するかを返す。比較は定数時間で行う。
    pub fn credentials_match(&self, credentials: &Credentials) -> bool {
        let username = credentials
            .username
            .as_bytes()
            .ct_eq(self.config.username.as_bytes());
        let password = credentials
            .password
            .as_bytes()
            .ct_eq(self.config.password.as_bytes());
        (username & password).into()
    }

    /// このスナップショットに対して取得可否を判定する。
    pub fn authorized(&self, identity: &FileIdentity, credentials: Option<&Credentials>) -> bool {
        match self.restriction(identity) {
            None => true,
            Some(_) => credentials.is_some_and(|c| self.credentials_match(c)),
        }
    }
}
