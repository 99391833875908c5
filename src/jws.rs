//! JSON Web Signature (JWS) 信封的建立與序列化。
//!
//! ACME 的每個已簽署請求都以 flattened JSON 形式傳送：
//! `{"protected": ..., "payload": ..., "signature": ...}`。

use std::result;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    base64::Base64,
    key_pair::KeyPair,
    protection::{ProtectedHeader, ProtectionError},
    signature::{create_signature, SignatureError},
};

/// 表示一個 JSON Web Signature (JWS) 物件，三個欄位皆為 URL 安全、無填充的 Base64。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Jws {
    /// 對應 JWS 中的 "protected" 欄位。
    #[serde(rename = "protected")]
    header: String,
    payload: String,
    signature: String,
}

/// 表示與 JWS 相關的錯誤。
#[derive(Error, Debug)]
pub enum JwsError {
    #[error("Protected header error: {0}")]
    Protection(#[from] ProtectionError),
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    /// 當 JSON 序列化過程中發生錯誤時回傳此錯誤。
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

type Result<T> = result::Result<T, JwsError>;

impl Jws {
    /// 以已編碼的三個部分建立 `Jws`。
    pub fn new(header_b64: &Base64, payload_b64: &Base64, signature_b64: &Base64) -> Self {
        Jws {
            header: header_b64.base64_url(),
            payload: payload_b64.base64_url(),
            signature: signature_b64.base64_url(),
        }
    }

    /// 將保護頭與 payload 序列化、編碼並以帳戶金鑰簽署。
    ///
    /// 簽名輸入為 `base64url(header) + "." + base64url(payload)`。
    pub fn sign<T: Serialize>(
        header: &ProtectedHeader,
        payload: &T,
        key_pair: &KeyPair,
    ) -> Result<Self> {
        let header_b64 = header.to_base64()?;
        let payload_b64 = Base64::new(serde_json::to_vec(payload)?);
        let signature_b64 = create_signature(&header_b64, &payload_b64, key_pair)?;

        Ok(Self::new(&header_b64, &payload_b64, &signature_b64))
    }

    /// 將 `Jws` 實例序列化為 JSON 格式的字串。
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
