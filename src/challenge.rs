use std::{fmt, str::FromStr};

use openssl::sha::sha256;
use serde::Deserialize;

use crate::{
    base64::base64_url,
    error::{AcmeError, Result},
    jwk::Jwk,
};

/// 本客戶端唯一處理的挑戰類型。
pub const DNS_01: &str = "dns-01";

/// 授權狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

impl AuthorizationStatus {
    /// 判斷該狀態是否為終結狀態，即無法再進行狀態轉換。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::Invalid | Self::Expired)
    }

    /// 返回狀態對應的字串表示。
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Deactivated => "deactivated",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = AcmeError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map_err(|_| AcmeError::Protocol(format!("Unknown authorization status: {}", s)))
    }
}

/// 授權中提供的一種驗證方式。
#[derive(Debug, Clone, Deserialize)]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: String,
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// 單一識別項的授權資料。
#[derive(Debug, Clone, Deserialize)]
pub struct Authorization {
    pub status: AuthorizationStatus,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

impl Authorization {
    /// 解析授權回應，內容格式不符時回傳 [`AcmeError::Protocol`]。
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// 挑選 dns-01 挑戰，CA 未提供時回傳 [`AcmeError::UnsupportedChallenge`]。
    pub fn dns_challenge(&self, authorization_url: &str) -> Result<&Challenge> {
        self.challenges
            .iter()
            .find(|c| c.challenge_type == DNS_01)
            .ok_or_else(|| AcmeError::UnsupportedChallenge(authorization_url.to_string()))
    }
}

/// 綁定挑戰 token 與帳戶金鑰的證明值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAuthorization {
    /// `<token>.<thumbprint>`
    pub key_authorization: String,
    /// `base64url(SHA-256(key_authorization))`，即 TXT 記錄的值
    pub dns_value: String,
}

impl KeyAuthorization {
    /// 對同一把帳戶金鑰與 token 永遠產生相同結果。
    pub fn new(token: &str, account_jwk: &Jwk) -> Result<Self> {
        let key_authorization = format!("{}.{}", token, account_jwk.thumbprint()?);
        let dns_value = base64_url(sha256(key_authorization.as_bytes()));

        Ok(KeyAuthorization {
            key_authorization,
            dns_value,
        })
    }
}
