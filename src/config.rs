use std::time::Duration;

use crate::{
    csr::Digest,
    error::{AcmeError, Result},
    key_pair::KeyPair,
    polling::PollPolicy,
};

/// 簽發流程的設定，由 [`ClientConfigBuilder`] 建立後不再變動。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub domain: String,
    pub alt_names: Vec<String>,
    /// 既有帳戶的私鑰 PEM；未提供時會建立新帳戶。
    pub account_key_pem: Option<Vec<u8>>,
    pub contact_email: Option<String>,
    pub bits: u32,
    pub digest: Digest,
    pub request_timeout: Duration,
    pub challenge_wait_period: Duration,
    pub maximum_number_of_checks: u32,
    pub directory_url: String,
    pub chain_url: String,
}

impl ClientConfig {
    /// 預設使用 Let's Encrypt 的測試環境，正式環境需要明確指定。
    pub const DEFAULT_DIRECTORY_URL: &'static str =
        "https://acme-staging-v02.api.letsencrypt.org/directory";
    pub const DEFAULT_CHAIN_URL: &'static str = "https://letsencrypt.org/certs/fakelerootx1.pem";
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(65);
    pub const DEFAULT_CHALLENGE_WAIT_PERIOD: Duration = Duration::from_secs(8);
    pub const DEFAULT_MAXIMUM_NUMBER_OF_CHECKS: u32 = 5;

    pub fn builder(domain: &str) -> ClientConfigBuilder {
        ClientConfigBuilder::new(domain)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            wait_period: self.challenge_wait_period,
            max_checks: self.maximum_number_of_checks,
        }
    }
}

/// 用於構建 [`ClientConfig`] 的構造器，採用 builder 模式。
///
/// 預設值：
/// - 密鑰位數：`2048`
/// - CSR 摘要：SHA-256
/// - 請求逾時：65 秒
/// - 每次檢查授權前等待：8 秒，最多檢查 5 次
/// - ACME 目錄 URL：Let's Encrypt 測試環境
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new(domain: &str) -> Self {
        ClientConfigBuilder {
            config: ClientConfig {
                domain: domain.to_string(),
                alt_names: Vec::new(),
                account_key_pem: None,
                contact_email: None,
                bits: KeyPair::DEFAULT_BITS,
                digest: Digest::default(),
                request_timeout: ClientConfig::DEFAULT_REQUEST_TIMEOUT,
                challenge_wait_period: ClientConfig::DEFAULT_CHALLENGE_WAIT_PERIOD,
                maximum_number_of_checks: ClientConfig::DEFAULT_MAXIMUM_NUMBER_OF_CHECKS,
                directory_url: ClientConfig::DEFAULT_DIRECTORY_URL.to_string(),
                chain_url: ClientConfig::DEFAULT_CHAIN_URL.to_string(),
            },
        }
    }

    /// 新增主體替代名稱。
    pub fn alt_name(mut self, name: &str) -> Self {
        self.config.alt_names.push(name.to_string());
        self
    }

    pub fn alt_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config
            .alt_names
            .extend(names.into_iter().map(|n| n.as_ref().to_string()));
        self
    }

    /// 使用既有帳戶的私鑰（PEM），續期時沿用同一個帳戶。
    pub fn account_key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.config.account_key_pem = Some(pem.into());
        self
    }

    pub fn contact_email(mut self, email: &str) -> Self {
        self.config.contact_email = Some(email.to_string());
        self
    }

    pub fn bits(mut self, bits: u32) -> Self {
        self.config.bits = bits;
        self
    }

    pub fn digest(mut self, digest: Digest) -> Self {
        self.config.digest = digest;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn challenge_wait_period(mut self, wait: Duration) -> Self {
        self.config.challenge_wait_period = wait;
        self
    }

    pub fn maximum_number_of_checks(mut self, checks: u32) -> Self {
        self.config.maximum_number_of_checks = checks;
        self
    }

    pub fn directory_url(mut self, url: &str) -> Self {
        self.config.directory_url = url.to_string();
        self
    }

    pub fn chain_url(mut self, url: &str) -> Self {
        self.config.chain_url = url.to_string();
        self
    }

    /// 驗證並產生 [`ClientConfig`]。
    ///
    /// # Errors
    ///
    /// 域名為空、密鑰位數小於 2048 或檢查次數為 0 時回傳 [`AcmeError::Config`]。
    pub fn build(self) -> Result<ClientConfig> {
        let config = self.config;
        if config.domain.trim().is_empty() {
            return Err(AcmeError::Config("domain name is required".to_string()));
        }
        if config.bits < KeyPair::MIN_BITS {
            return Err(AcmeError::Config(format!(
                "RSA key size must be at least {} bits, got {}",
                KeyPair::MIN_BITS,
                config.bits
            )));
        }
        if config.maximum_number_of_checks == 0 {
            return Err(AcmeError::Config(
                "maximum number of checks must be at least 1".to_string(),
            ));
        }
        if config.request_timeout.is_zero() {
            return Err(AcmeError::Config("request timeout must be positive".to_string()));
        }
        if let Some(email) = &config.contact_email {
            if !email.contains('@') {
                return Err(AcmeError::Config(format!("invalid contact email: {}", email)));
            }
        }
        Ok(config)
    }
}
