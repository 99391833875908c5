use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::{
    base64::Base64,
    nonce::{NonceError, NonceT},
    signature::JWS_ALGORITHM,
};

/// 定義保護機制中可能產生的錯誤類型。
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// JSON 序列化錯誤
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Nonce 相關錯誤
    #[error("Nonce error: {0}")]
    Nonce(#[from] NonceError),
}

type Result<T> = std::result::Result<T, ProtectionError>;

/// 保護頭中用來識別帳戶金鑰的方式。
///
/// 註冊帳戶與撤銷證書時直接附上公開金鑰（`jwk`），其餘請求使用帳戶 URL（`kid`）。
#[derive(Debug, Clone, PartialEq)]
pub enum KeyIdentifier {
    Jwk(JsonValue),
    Kid(String),
}

/// 用於生成保護頭（Protected Header）的結構體。
pub struct Protection<'a> {
    nonce: &'a dyn NonceT,
    key: KeyIdentifier,
}

/// 數字簽章的保護頭，`jwk` 與 `kid` 恰好出現其中一個。
#[derive(Debug, Serialize)]
pub struct ProtectedHeader {
    /// 簽章演算法
    alg: &'static str,
    /// 用於防止重放攻擊的隨機數
    nonce: String,
    /// 請求目標 URL
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    jwk: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
}

impl ProtectedHeader {
    /// 將保護頭序列化後包裝成 [`Base64`]。
    pub fn to_base64(&self) -> Result<Base64> {
        Ok(Base64::new(serde_json::to_vec(self)?))
    }

    /// 本保護頭使用的 Nonce。
    pub fn nonce(&self) -> &str {
        &self.nonce
    }
}

impl<'a> Protection<'a> {
    /// 建立一個新的 [`Protection`] 實例。
    ///
    /// # 參數
    ///
    /// - `nonce`: 實現了 [`NonceT`] trait 的 nonce 取得器。
    /// - `key`: 保護頭中識別帳戶金鑰的方式。
    pub fn new(nonce: &'a dyn NonceT, key: KeyIdentifier) -> Self {
        Self { nonce, key }
    }

    /// 根據目前設定生成一個 [`ProtectedHeader`]。
    ///
    /// 每次呼叫都會向 `nonce` 提供器取得新的 nonce。
    ///
    /// # Errors
    ///
    /// 若取得 nonce 失敗，則返回 [`ProtectionError::Nonce`]。
    pub fn create_header(&self, url: impl Into<String>) -> Result<ProtectedHeader> {
        let nonce = self.nonce.get()?;

        let (jwk, kid) = match &self.key {
            KeyIdentifier::Jwk(value) => (Some(value.clone()), None),
            KeyIdentifier::Kid(kid) => (None, Some(kid.clone())),
        };

        Ok(ProtectedHeader {
            alg: JWS_ALGORITHM,
            nonce,
            url: url.into(),
            jwk,
            kid,
        })
    }
}

impl std::fmt::Display for ProtectedHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        serde_json::to_string(self)
            .map_err(|_| std::fmt::Error)
            .and_then(|s| write!(f, "{}", s))
    }
}
