use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AcmeError, Result},
    payload::Identifier,
};

/// 訂單狀態，目前支援的狀態有 pending、ready、processing、valid 與 invalid。
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AcmeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "processing" => Ok(Self::Processing),
            "valid" => Ok(Self::Valid),
            "invalid" => Ok(Self::Invalid),
            other => Err(AcmeError::Protocol(format!("Unknown order status: {}", other))),
        }
    }
}

/// 一筆證書簽發交易。
///
/// `certificate` 只有在訂單進入 valid 後才可信；建立訂單時若 CA 已回傳，會先記下作為備援。
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub status: OrderStatus,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub identifiers: Vec<Identifier>,
    pub authorizations: Vec<String>,
    pub finalize: String,
    #[serde(default)]
    pub certificate: Option<String>,
    /// 伺服器以 `Location` 標頭回傳的訂單 URL
    #[serde(skip)]
    pub order_url: Option<String>,
}

impl Order {
    /// 解析訂單回應內容，缺少必要欄位時回傳 [`AcmeError::Protocol`]。
    pub fn parse(body: &[u8], order_url: Option<&str>) -> Result<Self> {
        let mut order: Order = serde_json::from_slice(body)?;
        order.order_url = order_url.map(ToString::to_string);
        Ok(order)
    }

    /// 第一個授權 URL，只處理主域名的授權。
    pub fn primary_authorization(&self) -> Result<&str> {
        self.authorizations
            .first()
            .map(String::as_str)
            .ok_or_else(|| AcmeError::Protocol("Order has no authorizations".to_string()))
    }

    /// 以較新的訂單狀態更新本地資料，保留原有的訂單 URL 與已知的證書 URL。
    pub fn merge(&mut self, newer: Order) {
        self.status = newer.status;
        self.finalize = newer.finalize;
        if newer.certificate.is_some() {
            self.certificate = newer.certificate;
        }
        if !newer.authorizations.is_empty() {
            self.authorizations = newer.authorizations;
        }
        if newer.order_url.is_some() {
            self.order_url = newer.order_url;
        }
    }
}
