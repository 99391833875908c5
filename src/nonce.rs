use std::sync::Arc;

use thiserror::Error;

use crate::http::{HttpClient, HttpError};

/// 表示在取得 Nonce 時可能發生的錯誤狀況。
#[derive(Error, Debug)]
pub enum NonceError {
    /// 當請求過程中發生錯誤時回傳此錯誤。
    #[error("Failed to make request: {0}")]
    RequestFailed(#[from] HttpError),
    /// 當回應中缺少 `Replay-Nonce` 標頭時回傳此錯誤。
    #[error("No Replay-Nonce header found in response (status {0})")]
    NoNonceHeader(u16),
}

/// 定義取得 Nonce 的行為。
///
/// 每次呼叫都必須回傳一個尚未使用過的 Nonce，實作端不得快取。
pub trait NonceT {
    /// 嘗試取得 Nonce，回傳包含 Nonce 字串或錯誤的 `Result`。
    fn get(&self) -> Result<String, NonceError>;
}

/// 透過對 `newNonce` 端點發出 GET 請求取得 `Replay-Nonce` 的實作。
pub struct Nonce {
    http: Arc<dyn HttpClient>,
    url: String,
}

impl Nonce {
    /// 建立一個新的 `Nonce` 實例。
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Nonce {
            http,
            url: url.into(),
        }
    }
}

impl NonceT for Nonce {
    fn get(&self) -> Result<String, NonceError> {
        log::debug!("get_nonce: {}", self.url);
        let response = self.http.get(&self.url)?;
        log::debug!("newNonce response: status={}", response.status);

        match response.header("Replay-Nonce") {
            Some(nonce) => Ok(nonce.to_string()),
            None => Err(NonceError::NoNonceHeader(response.status)),
        }
    }
}

/// 模擬 Nonce 實作，提供固定的 Nonce 值。
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MockNonce {
    value: String,
}

#[cfg(test)]
impl MockNonce {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[cfg(test)]
impl NonceT for MockNonce {
    fn get(&self) -> Result<String, NonceError> {
        Ok(self.value.clone())
    }
}
