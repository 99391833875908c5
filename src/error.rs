use thiserror::Error;

use crate::{
    certificate::CertificateError, csr::CsrError, dns::DnsError, http::HttpError,
    jwk::JwkError, jws::JwsError, key_pair::KeyError, nonce::NonceError,
    payload::PayloadError, protection::ProtectionError,
};

/// 簽發流程中任一步驟可能回傳的錯誤。
///
/// 狀態碼不符的錯誤會保留 CA 的原始回應內容，方便不必重跑流程即可診斷。
#[derive(Debug, Error)]
pub enum AcmeError {
    #[error("Transport error: {0}")]
    Transport(#[from] HttpError),
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Account registration failed with status {status}: {body}")]
    Registration { status: u16, body: String },
    #[error("Order creation failed with status {status}: {body}")]
    Order { status: u16, body: String },
    #[error("Authorization fetch failed with status {status}: {body}")]
    Authorization { status: u16, body: String },
    #[error("Order finalization failed with status {status}: {body}")]
    Finalize { status: u16, body: String },
    #[error("Certificate download failed with status {status}: {body}")]
    CertificateDownload { status: u16, body: String },
    #[error("Certificate chain fetch failed with status {status}: {body}")]
    ChainFetch { status: u16, body: String },
    #[error("Certificate revocation failed with status {status}: {body}")]
    Revocation { status: u16, body: String },

    #[error("The CA did not offer a dns-01 challenge for {0}")]
    UnsupportedChallenge(String),
    #[error("Authorization not valid after {attempts} checks (last status: {last_status})")]
    PollingExhausted { attempts: u32, last_status: String },

    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("CSR error: {0}")]
    Csr(#[from] CsrError),
    #[error("JWK error: {0}")]
    Jwk(#[from] JwkError),
    #[error("JWS error: {0}")]
    Jws(#[from] JwsError),
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<NonceError> for AcmeError {
    fn from(err: NonceError) -> Self {
        match err {
            NonceError::RequestFailed(e) => AcmeError::Transport(e),
            NonceError::NoNonceHeader(status) => AcmeError::Protocol(format!(
                "newNonce response (status {}) has no Replay-Nonce header",
                status
            )),
        }
    }
}

impl From<ProtectionError> for AcmeError {
    fn from(err: ProtectionError) -> Self {
        match err {
            ProtectionError::Nonce(e) => e.into(),
            ProtectionError::Serialization(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for AcmeError {
    fn from(err: serde_json::Error) -> Self {
        AcmeError::Protocol(format!("Malformed JSON response: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AcmeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_nonce_is_protocol_error() {
        let err = AcmeError::from(NonceError::NoNonceHeader(204));
        assert!(matches!(err, AcmeError::Protocol(ref msg) if msg.contains("204")));
    }

    #[test]
    fn test_status_errors_carry_body() {
        let err = AcmeError::Finalize {
            status: 403,
            body: r#"{"type":"urn:ietf:params:acme:error:unauthorized"}"#.to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("unauthorized"));
    }
}
