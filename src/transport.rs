use std::sync::Arc;

use serde_json::Value;

use crate::{
    directory::Directory,
    error::{AcmeError, Result},
    http::{HttpClient, HttpResponse},
    jwk::Jwk,
    jws::Jws,
    key_pair::KeyPair,
    nonce::Nonce,
    protection::{KeyIdentifier, Protection},
};

/// 已簽署請求使用的 `Content-Type`。
pub const JOSE_JSON: &str = "application/jose+json";

/// 送往 CA 的請求內容。
///
/// 挑戰與證書端點在此協議版本可直接 GET，因此以兩個哨兵值改走未簽署的 GET。
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Signed(Value),
    GetChallenge,
    GetCertificate,
}

/// 簽署請求所需的帳戶資訊。
#[derive(Clone, Copy)]
pub struct Signer<'a> {
    pub account_key: &'a KeyPair,
    /// 註冊成功後由 CA 指派的帳戶 URL
    pub kid: Option<&'a str>,
}

/// 對外發送 ACME 請求並回傳正規化的回應，每個回應都會記錄狀態碼與內容。
pub struct AcmeTransport {
    http: Arc<dyn HttpClient>,
    directory: Directory,
    nonce: Nonce,
}

impl AcmeTransport {
    pub fn new(http: Arc<dyn HttpClient>, directory: Directory) -> Self {
        let nonce = Nonce::new(http.clone(), directory.new_nonce.clone());
        AcmeTransport {
            http,
            directory,
            nonce,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// 未簽署的 GET。
    pub fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.http.get(url)?;
        log_response("GET", url, &response);
        Ok(response)
    }

    /// 依序取得 nonce、建立保護頭、簽署並以 `application/jose+json` POST。
    ///
    /// 哨兵 payload 直接改走 [`get`](Self::get)。
    pub fn post_signed(
        &self,
        signer: Signer<'_>,
        url: &str,
        payload: RequestPayload,
    ) -> Result<HttpResponse> {
        let payload = match payload {
            RequestPayload::Signed(payload) => payload,
            RequestPayload::GetChallenge | RequestPayload::GetCertificate => {
                return self.get(url);
            }
        };

        let key = self.key_identifier(signer, url)?;
        let header = Protection::new(&self.nonce, key).create_header(url)?;
        log::debug!("signing request to {} with nonce {}", url, header.nonce());
        let body = Jws::sign(&header, &payload, signer.account_key)?.to_json()?;

        let response = self.http.post(url, JOSE_JSON, body.into_bytes())?;
        log_response("POST", url, &response);
        Ok(response)
    }

    /// 註冊帳戶與撤銷證書附上公開金鑰，其餘請求使用 `kid`。
    fn key_identifier(&self, signer: Signer<'_>, url: &str) -> Result<KeyIdentifier> {
        if url == self.directory.new_account || url == self.directory.revoke_cert {
            return Ok(KeyIdentifier::Jwk(Jwk::new(signer.account_key)?.to_value()?));
        }

        signer
            .kid
            .map(|kid| KeyIdentifier::Kid(kid.to_string()))
            .ok_or_else(|| {
                AcmeError::Protocol(format!(
                    "Cannot sign request to {} before the account is registered",
                    url
                ))
            })
    }
}

fn log_response(method: &str, url: &str, response: &HttpResponse) {
    log::info!(
        "{} {} -> status={} body={}",
        method,
        url,
        response.status,
        response.log_body()
    );
}
