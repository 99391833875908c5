use std::result;

use openssl::{
    hash::MessageDigest,
    nid::Nid,
    stack::Stack,
    x509::{extension::SubjectAlternativeName, X509NameBuilder, X509Req},
};
use thiserror::Error;

use crate::key_pair::KeyPair;

/// 用於描述建立 CSR（證書簽名請求）過程中可能發生的錯誤。
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("Openssl error: {0}")]
    OpensslError(#[from] openssl::error::ErrorStack),
    #[error("Common name is empty")]
    EmptyCommonName,
}

/// 為簡化錯誤處理定義 Result 類型
type Result<T> = result::Result<T, CsrError>;

/// CSR 簽章所使用的摘要演算法。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Digest {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl Digest {
    fn message_digest(self) -> MessageDigest {
        match self {
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}

/// CSR 建構器，產生 `CN=<主域名>` 並帶有主體替代名稱 (SAN) 擴展的證書簽名請求。
///
/// SAN 永遠以主域名開頭，其後依序列出其他域名，重複項目會被忽略。
///
/// # 範例
///
/// ```
/// use racme_dns::{csr::CSR, key_pair::KeyPair};
///
/// let key_pair = KeyPair::generate(2048).unwrap();
/// let csr = CSR::new("example.com")
///     .set_san("www.example.com")
///     .build(&key_pair)
///     .unwrap();
/// assert!(!csr.to_der().unwrap().is_empty());
/// ```
pub struct CSR {
    common_name: String,
    san_entries: Vec<String>,
    digest: Digest,
}

impl CSR {
    /// 以主域名建立一個新的 CSR 實例，預設使用 SHA-256 簽署。
    pub fn new(common_name: &str) -> Self {
        CSR {
            common_name: common_name.to_string(),
            san_entries: vec![common_name.to_string()],
            digest: Digest::default(),
        }
    }

    /// 新增一個 DNS 主體替代名稱 (SAN) 到 CSR 中。
    pub fn set_san(mut self, dns_name: &str) -> Self {
        if !self.san_entries.iter().any(|entry| entry == dns_name) {
            self.san_entries.push(dns_name.to_string());
        }
        self
    }

    /// 設定簽署 CSR 時使用的摘要演算法。
    pub fn digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    /// 使用指定的金鑰對簽署並產生 X509 證書簽名請求。
    ///
    /// 版本欄位固定為 0，PKCS#10 只定義了 v1（編碼值 0）。
    ///
    /// # 錯誤
    ///
    /// 主域名為空時回傳 [`CsrError::EmptyCommonName`]，OpenSSL 失敗時回傳
    /// [`CsrError::OpensslError`]。
    pub fn build(self, key_pair: &KeyPair) -> Result<X509Req> {
        if self.common_name.is_empty() {
            return Err(CsrError::EmptyCommonName);
        }

        let mut req_builder = X509Req::builder()?;
        req_builder.set_version(0)?;

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_nid(Nid::COMMONNAME, &self.common_name)?;
        req_builder.set_subject_name(&name.build())?;

        let mut san_builder = SubjectAlternativeName::new();
        for entry in &self.san_entries {
            san_builder.dns(entry);
        }
        let san_extension = san_builder.build(&req_builder.x509v3_context(None))?;

        let mut stack = Stack::new()?;
        stack.push(san_extension)?;
        req_builder.add_extensions(&stack)?;

        req_builder.set_pubkey(&key_pair.pri_key)?;
        req_builder.sign(&key_pair.pri_key, self.digest.message_digest())?;

        Ok(req_builder.build())
    }
}

/// 產生 DER 編碼的 CSR，供 finalize 請求使用。
pub fn build_csr(
    key_pair: &KeyPair,
    common_name: &str,
    alt_names: &[String],
    digest: Digest,
) -> Result<Vec<u8>> {
    let csr = alt_names
        .iter()
        .fold(CSR::new(common_name).digest(digest), |csr, name| {
            csr.set_san(name)
        })
        .build(key_pair)?;
    Ok(csr.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_and_san() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let key = KeyPair::generate(2048)?;
        let der = build_csr(
            &key,
            "example.com",
            &["www.example.com".to_string()],
            Digest::Sha256,
        )?;
        let csr = X509Req::from_der(&der)?;

        let cn = csr
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .ok_or("missing CN")?
            .data()
            .as_slice()
            .to_vec();
        let cn = String::from_utf8(cn)?;
        assert_eq!(cn, "example.com");

        let text = String::from_utf8(csr.to_text()?)?;
        assert!(text.contains("DNS:example.com, DNS:www.example.com"));
        assert!(csr.verify(&key.pub_key)?);
        Ok(())
    }

    #[test]
    fn test_primary_name_only_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let key = KeyPair::generate(2048)?;
        let der = build_csr(
            &key,
            "example.com",
            &["example.com".to_string()],
            Digest::Sha384,
        )?;
        let text = String::from_utf8(X509Req::from_der(&der)?.to_text()?)?;
        assert_eq!(text.matches("DNS:example.com").count(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_common_name() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let key = KeyPair::generate(2048)?;
        assert!(matches!(
            CSR::new("").build(&key),
            Err(CsrError::EmptyCommonName)
        ));
        Ok(())
    }
}
