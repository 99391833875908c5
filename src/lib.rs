//! # ACME DNS-01 Certificate Client
//!
//! 本庫以 DNS-01 挑戰向 ACME CA（例如 Let's Encrypt）申請與續期 X.509 證書。
//!
//! - **client**: 簽發流程，依序完成帳戶註冊、建立訂單、回應挑戰、輪詢授權、提交 CSR 與下載證書。
//! - **dns**: DNS 服務商介面與 Cloudflare 實作，負責建立與刪除 `_acme-challenge` TXT 記錄。
//! - **transport**: 每個請求取得新的 nonce，以 JWS（RS256）簽署後送出。
//!
//! ## 特性
//!
//! - 每次簽發都使用新的證書金鑰，帳戶金鑰可跨續期沿用
//! - 授權確認為 valid 後才提交 CSR
//! - DNS 記錄在任何結束路徑上都只會刪除一次
//! - HTTP、DNS 與等待都是可替換的 trait，方便在測試中模擬 CA
//!
//! ## 示例
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use racme_dns::{AcmeClient, ClientConfig, DnsProviderKind};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("example.com")
//!         .alt_name("www.example.com")
//!         .contact_email("admin@example.com")
//!         .build()?;
//!
//!     let dns = DnsProviderKind::Cloudflare.build("your-cloudflare-api-token", Duration::from_secs(30))?;
//!     let client = AcmeClient::new(config, Arc::from(dns))?;
//!
//!     let issued = client.issue_or_renew()?;
//!     std::fs::write("cert.pem", &issued.certificate_pem)?;
//!     std::fs::write("cert.key", &issued.certificate_key_pem)?;
//!     std::fs::write("account.key", &issued.account_key_pem)?;
//!
//!     Ok(())
//! }
//! ```

pub mod base64;
pub mod certificate;
pub mod chain;
pub mod challenge;
pub mod client;
pub mod config;
pub mod csr;
pub mod directory;
pub mod dns;
pub mod error;
pub mod http;
pub mod jwk;
pub mod jws;
pub mod key_pair;
pub mod nonce;
pub mod order;
pub mod payload;
pub mod polling;
pub mod protection;
pub mod signature;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{AcmeClient, IssuanceContext, IssuedCertificate};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use dns::{CloudflareDns, DnsProvider, DnsProviderKind};
pub use error::{AcmeError, Result};
