use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::base64::base64_url;

/// 載荷內容不符合規範時回傳的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Invalid payload: {0}")]
    Invalid(&'static str),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// 定義所有 API 載荷（Payload）必須實作的功能。
pub trait PayloadT: Serialize {
    /// 驗證載荷資料是否符合預期的規範。
    fn validate(&self) -> Result<(), PayloadError>;

    /// 驗證後轉換成 JSON 值，供簽署使用。
    fn to_value(&self) -> Result<Value, PayloadError> {
        self.validate()?;
        serde_json::to_value(self).map_err(|e| PayloadError::Serialization(e.to_string()))
    }
}

/// 註冊帳戶的載荷。
///
/// 沿用既有帳戶金鑰時只送出 `onlyReturnExisting`，否則同意服務條款並可附上聯絡信箱。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NewAccountPayload {
    Existing {
        #[serde(rename = "onlyReturnExisting")]
        only_return_existing: bool,
    },
    Create {
        #[serde(rename = "termsOfServiceAgreed")]
        terms_of_service_agreed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        contact: Option<Vec<String>>,
    },
}

impl NewAccountPayload {
    /// 建立新帳戶的載荷，`email` 會自動補足 `mailto:` 前綴。
    pub fn create(email: Option<&str>) -> Self {
        let contact = email.map(|email| {
            if email.starts_with("mailto:") {
                vec![email.to_string()]
            } else {
                vec![format!("mailto:{}", email)]
            }
        });

        NewAccountPayload::Create {
            terms_of_service_agreed: true,
            contact,
        }
    }

    /// 查詢既有帳戶的載荷。
    pub fn existing() -> Self {
        NewAccountPayload::Existing {
            only_return_existing: true,
        }
    }
}

impl PayloadT for NewAccountPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        match self {
            NewAccountPayload::Create {
                terms_of_service_agreed: false,
                ..
            } => Err(PayloadError::Invalid("Terms of service must be agreed")),
            NewAccountPayload::Create {
                contact: Some(contact),
                ..
            } if contact.iter().any(|c| c.trim_start_matches("mailto:").is_empty()) => {
                Err(PayloadError::Invalid("Contact email cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// 表示一個識別項，用來描述證書所涵蓋的主機名稱。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: &str) -> Self {
        Identifier {
            type_: "dns".to_string(),
            value: value.to_string(),
        }
    }
}

/// 表示建立新訂單時所需的載荷資料。
#[derive(Debug, Serialize, Deserialize)]
pub struct NewOrderPayload {
    pub identifiers: Vec<Identifier>,
}

impl NewOrderPayload {
    /// 為每個域名建立一個類型為 `"dns"` 的識別項。
    pub fn new(domains: &[&str]) -> Self {
        NewOrderPayload {
            identifiers: domains.iter().map(|domain| Identifier::dns(domain)).collect(),
        }
    }
}

impl PayloadT for NewOrderPayload {
    /// - 必須至少包含一個識別項。
    /// - 所有識別項的類型必須為 `"dns"` 且值不得為空。
    fn validate(&self) -> Result<(), PayloadError> {
        if self.identifiers.is_empty() {
            return Err(PayloadError::Invalid("At least one identifier is required"));
        }
        for identifier in &self.identifiers {
            if identifier.type_ != "dns" {
                return Err(PayloadError::Invalid("Identifier type must be 'dns'"));
            }
            if identifier.value.is_empty() {
                return Err(PayloadError::Invalid("Identifier value cannot be empty"));
            }
        }
        Ok(())
    }
}

/// 回應挑戰時送出的 key authorization。
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponsePayload {
    #[serde(rename = "keyAuthorization")]
    key_authorization: String,
}

impl ChallengeResponsePayload {
    pub fn new(key_authorization: &str) -> Self {
        ChallengeResponsePayload {
            key_authorization: key_authorization.to_string(),
        }
    }
}

impl PayloadT for ChallengeResponsePayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if !self.key_authorization.contains('.') {
            return Err(PayloadError::Invalid(
                "Key authorization must be <token>.<thumbprint>",
            ));
        }
        Ok(())
    }
}

/// 最終化訂單時所需的載荷，CSR 為 DER 的 URL 安全 Base64。
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeOrderPayload {
    #[serde(rename = "csr")]
    csr_b64_str: String,
}

impl FinalizeOrderPayload {
    pub fn new(csr_der: &[u8]) -> Self {
        FinalizeOrderPayload {
            csr_b64_str: base64_url(csr_der),
        }
    }
}

impl PayloadT for FinalizeOrderPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.csr_b64_str.is_empty() {
            return Err(PayloadError::Invalid("CSR cannot be empty"));
        }
        Ok(())
    }
}

/// 撤銷證書的載荷，`reason` 為 RFC 5280 的撤銷原因代碼。
#[derive(Debug, Serialize, Deserialize)]
pub struct RevokeCertPayload {
    certificate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<u8>,
}

impl RevokeCertPayload {
    pub fn new(certificate_der: &[u8], reason: Option<u8>) -> Self {
        RevokeCertPayload {
            certificate: base64_url(certificate_der),
            reason,
        }
    }
}

impl PayloadT for RevokeCertPayload {
    fn validate(&self) -> Result<(), PayloadError> {
        match self.reason {
            // 7 未使用
            Some(7) => Err(PayloadError::Invalid("Revocation reason 7 is not defined")),
            Some(reason) if reason > 10 => {
                Err(PayloadError::Invalid("Revocation reason must be between 0 and 10"))
            }
            _ => Ok(()),
        }
    }
}
