use chrono::{DateTime, Duration, Utc};
use openssl::{asn1::Asn1Time, x509::X509};
use thiserror::Error;

use crate::base64::Base64;

/// 證書相關操作可能出現的錯誤類型
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to parse certificate: {0}")]
    ParseError(#[from] openssl::error::ErrorStack),
    #[error("Invalid expiration timestamp")]
    InvalidTimestamp,
}

type Result<T> = std::result::Result<T, CertificateError>;

const PEM_LABEL: &str = "CERTIFICATE";

/// 將 CA 回傳的證書內容組成 PEM，並在其後直接附上中繼證書鏈。
///
/// 內容若為 DER，會以 64 字元一行包進 `BEGIN/END CERTIFICATE`；若已是 PEM 則原樣保留。
pub fn assemble_pem(body: &[u8], chain_pem: &str) -> String {
    let leaf = match std::str::from_utf8(body) {
        Ok(text) if text.trim_start().starts_with("-----BEGIN") => {
            let mut pem = text.to_string();
            if !pem.ends_with('\n') {
                pem.push('\n');
            }
            pem
        }
        _ => Base64::new(body).to_pem(PEM_LABEL),
    };
    leaf + chain_pem
}

/// X.509 證書封裝結構，提供基本的證書解析與續約檢查功能
pub struct Certificate {
    /// 內部使用的 X509 證書對象
    pub cert: X509,
}

impl Certificate {
    /// 解析 PEM 內容中的第一張證書（通常是葉證書）。
    pub fn from_pem(pem: &str) -> Result<Self> {
        let cert = X509::from_pem(pem.as_bytes())?;
        Ok(Certificate { cert })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.cert.to_der()?)
    }

    /// 證書的到期時間。
    pub fn not_after(&self) -> Result<DateTime<Utc>> {
        let epoch = Asn1Time::from_unix(0)?;
        let diff = epoch.diff(self.cert.not_after())?;
        let seconds = i64::from(diff.days) * 86400 + i64::from(diff.secs);
        DateTime::from_timestamp(seconds, 0).ok_or(CertificateError::InvalidTimestamp)
    }

    /// 判斷證書是否應該進行續約
    ///
    /// 已過期，或剩餘有效時間不超過 `threshold_days` 天時回傳 `true`。
    pub fn should_renew(&self, threshold_days: u32) -> Result<bool> {
        self.should_renew_at(threshold_days, Utc::now())
    }

    fn should_renew_at(&self, threshold_days: u32, now: DateTime<Utc>) -> Result<bool> {
        let not_after = self.not_after()?;
        let remaining = not_after - now;
        log::debug!(
            "certificate expires at {} ({} days remaining)",
            not_after,
            remaining.num_days()
        );

        Ok(remaining <= Duration::days(i64::from(threshold_days)))
    }
}
