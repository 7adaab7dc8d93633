//! # Basic認証
//!
//! `Authorization` ヘッダーから共有認証情報を取り出す。
//! 取り出せない場合は認証情報なしとして扱い、判定はポリシーエンジンに委ねる。

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::Engine;
use sensor_storage_policy::Credentials;

/// Base64エンジン（Standard）
pub(crate) fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// `Authorization: Basic <base64(user:pass)>` をパースする。
///
/// スキーム名は大文字小文字を区別しない。ヘッダーが無い、スキームが異なる、
/// Base64やUTF-8として不正、`:` を含まない場合は `None`。
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = b64().decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    // パスワードは `:` を含みうるため最初の区切りで分割する
    let (username, password) = decoded.split_once(':')?;

    Some(Credentials::new(username, password))
}
