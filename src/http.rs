//! 對外 HTTP 呼叫的抽象層。
//!
//! ACME 流程只依賴 [`HttpClient`] 這個能力介面，預設實作 [`ReqwestClient`] 使用
//! `reqwest` 的 blocking client；測試時則可替換為記憶體中的實作。

use std::{collections::HashMap, env::consts, fmt, time::Duration};

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// HTTP 層的錯誤，皆屬於傳輸層失敗（連線、逾時、TLS 等）。
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP request to {url} timed out")]
    Timeout { url: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl HttpError {
    fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else {
            HttpError::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// 正規化後的 HTTP 回應：狀態碼、標頭（名稱一律小寫）與原始內容。
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// 建立一個沒有標頭與內容的回應。
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// 新增標頭，名稱不分大小寫。
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// 設定回應內容。
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// 取得指定標頭的值，名稱不分大小寫。
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// 判斷狀態碼是否為給定的其中之一。
    pub fn status_in(&self, expected: &[u16]) -> bool {
        expected.contains(&self.status)
    }

    /// 將內容解析為 JSON。
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// 以 UTF-8（有損）解讀內容。
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// 供日誌使用的內容表示：可解析時輸出精簡 JSON，否則輸出原始文字。
    pub fn log_body(&self) -> String {
        match serde_json::from_slice::<serde_json::Value>(&self.body) {
            Ok(value) => value.to_string(),
            Err(_) => self.text(),
        }
    }
}

/// 請求方法，只列出本庫用到的三種。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 發送 HTTP 請求的能力介面。
///
/// 實作端只需提供 [`send`](Self::send)，`get` 與 `post` 為其簡寫。
pub trait HttpClient: Send + Sync {
    /// 以指定的方法、額外標頭與內容發送請求。
    fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError>;

    /// 發送 GET 請求。
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.send(Method::Get, url, &[], None)
    }

    /// 以指定的 `Content-Type` 發送 POST 請求。
    fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse, HttpError> {
        self.send(Method::Post, url, &[("Content-Type", content_type)], Some(body))
    }
}

/// 所有請求使用的 `User-Agent`：`<crate>/<version> (<os>: <arch>)`。
pub fn user_agent() -> String {
    format!(
        "{}/{} ({}: {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        consts::OS,
        consts::ARCH
    )
}

/// 以 `reqwest` blocking client 實作的 [`HttpClient`]。
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// 建立帶有逐次請求逾時與 `User-Agent` 的 client。
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(HttpError::Client)?;
        Ok(Self { client })
    }

    fn normalize(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<HttpResponse, HttpError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| HttpError::from_reqwest(url, e))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError> {
        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        Self::normalize(url, response)
    }
}
