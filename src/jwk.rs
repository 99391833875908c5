use openssl::sha::sha256;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    base64::base64_url,
    key_pair::{KeyError, KeyPair},
};

/// JWK相關操作的錯誤類型。
#[derive(Debug, Error)]
pub enum JwkError {
    /// 金鑰轉換失敗。
    #[error("Failed to convert key: {0}")]
    KeyConversionError(#[from] KeyError),
    /// 序列化錯誤。
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// JSON Web Key (JWK) 的封裝，目前僅支援 RSA 格式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    /// RSA 格式的 JWK。
    #[serde(rename = "RSA")]
    Rsa(RsaJwk),
}

/// RSA 格式的 JWK 結構，`e` 與 `n` 為大端序整數的 URL 安全 Base64。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaJwk {
    e: String,
    n: String,
}

impl RsaJwk {
    fn from_key_pair(key_pair: &KeyPair) -> Result<Self, JwkError> {
        Ok(RsaJwk {
            e: base64_url(key_pair.public_exponent()?),
            n: base64_url(key_pair.modulus()?),
        })
    }

    /// RFC 7638 的正規 JSON：成員依字典序排列且不含空白。
    pub fn to_acme_json(&self) -> Result<String, JwkError> {
        let mut map = Map::new();
        map.insert("e".to_string(), Value::String(self.e.clone()));
        map.insert("kty".to_string(), Value::String("RSA".to_string()));
        map.insert("n".to_string(), Value::String(self.n.clone()));

        serde_json::to_string(&Value::Object(map)).map_err(JwkError::from)
    }
}

impl Jwk {
    /// 根據給定的金鑰對建立對應的公開 JWK。
    pub fn new(key_pair: &KeyPair) -> Result<Self, JwkError> {
        Ok(Jwk::Rsa(RsaJwk::from_key_pair(key_pair)?))
    }

    /// 將 JWK 轉換為 JSON 值，用於放入保護頭的 `jwk` 欄位。
    pub fn to_value(&self) -> Result<Value, JwkError> {
        Ok(serde_json::from_str(&self.to_acme_json()?)?)
    }

    /// 將 JWK 轉換為符合 ACME 協議要求的 JSON 表示。
    pub fn to_acme_json(&self) -> Result<String, JwkError> {
        match self {
            Jwk::Rsa(jwk) => jwk.to_acme_json(),
        }
    }

    /// JWK 縮影：`base64url(SHA-256(正規 JSON))`。
    ///
    /// 對同一把金鑰永遠產生相同結果。
    pub fn thumbprint(&self) -> Result<String, JwkError> {
        let hash = sha256(self.to_acme_json()?.as_bytes());
        Ok(base64_url(hash))
    }
}
