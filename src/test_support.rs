//! 測試用的記憶體內實作：HTTP、DNS 服務商與 Sleeper。

use std::{
    collections::{HashMap, VecDeque},
    error::Error,
    sync::Mutex,
    time::Duration,
};

use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    error::ErrorStack,
    hash::MessageDigest,
    nid::Nid,
    x509::{X509NameBuilder, X509},
};
use serde_json::Value;

use crate::{
    base64::Base64,
    dns::{DnsError, DnsProvider},
    http::{HttpClient, HttpError, HttpResponse, Method},
    key_pair::KeyPair,
    polling::Sleeper,
};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Result<Value, Box<dyn Error>> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    fn envelope_part(&self, name: &str) -> Result<Value, Box<dyn Error>> {
        let envelope: Value = serde_json::from_slice(&self.body)?;
        let part = envelope[name].as_str().ok_or("missing JWS part")?;
        Ok(serde_json::from_slice(&Base64::from_url(part)?.decode()?)?)
    }

    pub fn protected_header(&self) -> Result<Value, Box<dyn Error>> {
        self.envelope_part("protected")
    }

    pub fn payload(&self) -> Result<Value, Box<dyn Error>> {
        self.envelope_part("payload")
    }
}

/// 依 URL 回放預先設定回應的 [`HttpClient`]。
///
/// 同一 URL 可排入多個回應，依序取出，最後一個會重複使用。每個回應都會附上遞增的
/// `Replay-Nonce`，除非呼叫了 [`disable_nonces`](Self::disable_nonces)。
#[derive(Default)]
pub struct MockHttp {
    scripts: Mutex<HashMap<(&'static str, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    nonce_counter: Mutex<u32>,
    nonces_disabled: Mutex<bool>,
    timeouts: Mutex<Vec<String>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// 預先設定 `<base>/directory` 與 `<base>/new-nonce`。
    pub fn with_directory(base: &str) -> Self {
        let http = Self::new();
        http.on_get(
            &format!("{}/directory", base),
            HttpResponse::new(200).with_body(Self::directory_body(base)),
        );
        http.on_get(&format!("{}/new-nonce", base), HttpResponse::new(200));
        http
    }

    pub fn directory_body(base: &str) -> String {
        serde_json::json!({
            "newNonce": format!("{}/new-nonce", base),
            "newAccount": format!("{}/new-acct", base),
            "newOrder": format!("{}/new-order", base),
            "revokeCert": format!("{}/revoke-cert", base),
            "keyChange": format!("{}/key-change", base),
            "meta": {"termsOfService": format!("{}/terms", base)}
        })
        .to_string()
    }

    pub fn on_get(&self, url: &str, response: HttpResponse) {
        self.script("GET", url, response);
    }

    pub fn on_post(&self, url: &str, response: HttpResponse) {
        self.script("POST", url, response);
    }

    pub fn on_delete(&self, url: &str, response: HttpResponse) {
        self.script("DELETE", url, response);
    }

    /// 之後對 `url` 的 GET 都回傳逾時錯誤。
    pub fn fail_get(&self, url: &str) {
        self.timeouts.lock().unwrap().push(url.to_string());
    }

    pub fn disable_nonces(&self) {
        *self.nonces_disabled.lock().unwrap() = true;
    }

    fn script(&self, method: &'static str, url: &str, response: HttpResponse) {
        self.scripts
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(response);
    }

    fn respond(&self, request: RecordedRequest) -> HttpResponse {
        let key = (request.method, request.url.clone());
        self.requests.lock().unwrap().push(request);

        let mut scripts = self.scripts.lock().unwrap();
        let response = match scripts.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
        .unwrap_or_else(|| HttpResponse::new(404).with_body(format!("not scripted: {}", key.1)));

        if *self.nonces_disabled.lock().unwrap() {
            return response;
        }
        let mut counter = self.nonce_counter.lock().unwrap();
        *counter += 1;
        response.with_header("Replay-Nonce", &format!("nonce-{}", counter))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    pub fn last_post(&self, url: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "POST" && r.url == url)
            .last()
    }

    /// 所有已簽署請求保護頭中的 nonce，依送出順序排列。
    pub fn sent_nonces(&self) -> Result<Vec<String>, Box<dyn Error>> {
        self.requests()
            .iter()
            .filter(|r| r.method == "POST")
            .map(|r| -> Result<String, Box<dyn Error>> {
                Ok(r.protected_header()?["nonce"]
                    .as_str()
                    .ok_or("missing nonce")?
                    .to_string())
            })
            .collect()
    }
}

impl HttpClient for MockHttp {
    fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError> {
        if method == Method::Get && self.timeouts.lock().unwrap().iter().any(|u| u == url) {
            return Err(HttpError::Timeout {
                url: url.to_string(),
            });
        }
        let headers: Vec<(String, String)> = headers
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect();
        let content_type = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("Content-Type"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        Ok(self.respond(RecordedRequest {
            method: method.as_str(),
            url: url.to_string(),
            content_type,
            headers,
            body: body.unwrap_or_default(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsCall {
    Create(String, String),
    Delete(String, String),
}

/// 記錄所有呼叫的 [`DnsProvider`]。
#[derive(Default)]
pub struct RecordingDns {
    calls: Mutex<Vec<DnsCall>>,
}

impl RecordingDns {
    pub fn calls(&self) -> Vec<DnsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DnsCall::Delete(..)))
            .count()
    }
}

impl DnsProvider for RecordingDns {
    fn create_dns_record(&self, domain: &str, value: &str) -> Result<(), DnsError> {
        self.calls
            .lock()
            .unwrap()
            .push(DnsCall::Create(domain.to_string(), value.to_string()));
        Ok(())
    }

    fn delete_dns_record(&self, domain: &str, value: &str) -> Result<(), DnsError> {
        self.calls
            .lock()
            .unwrap()
            .push(DnsCall::Delete(domain.to_string(), value.to_string()));
        Ok(())
    }
}

/// 只記錄等待時間、不實際暫停的 [`Sleeper`]。
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// 產生自簽證書（PEM），有效期限為 `days` 天。
pub fn self_signed_pem(key: &KeyPair, common_name: &str, days: u32) -> Result<String, ErrorStack> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(64, MsbOption::MAYBE_ZERO, false)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key.pri_key)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(days)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.sign(&key.pri_key, MessageDigest::sha256())?;

    let pem = builder.build().to_pem()?;
    Ok(String::from_utf8_lossy(&pem).into_owned())
}
