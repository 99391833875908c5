use openssl::{hash::MessageDigest, sign::Signer};
use thiserror::Error;

use crate::{base64::Base64, key_pair::KeyPair};

/// 定義簽名操作可能遇到的錯誤類型。
#[derive(Debug, Error)]
pub enum SignatureError {
    /// 簽名過程中發生錯誤。
    #[error("Signing error: {0}")]
    SigningError(#[from] openssl::error::ErrorStack),
}

/// JWS 所使用的簽章演算法名稱，RSASSA-PKCS1-v1_5 搭配 SHA-256。
pub const JWS_ALGORITHM: &str = "RS256";

/// 根據已編碼的 header 與 payload 生成 RS256 簽名。
///
/// 簽名輸入為 `<header>.<payload>`，兩者皆為 URL 安全、無填充的 Base64。
pub fn create_signature(
    header_b64: &Base64,
    payload_b64: &Base64,
    key_pair: &KeyPair,
) -> Result<Base64, SignatureError> {
    let signing_input = format!("{}.{}", header_b64.base64_url(), payload_b64.base64_url());

    let mut signer = Signer::new(MessageDigest::sha256(), &key_pair.pri_key)?;
    signer.update(signing_input.as_bytes())?;
    let signature = signer.sign_to_vec()?;

    Ok(Base64::new(&signature))
}
