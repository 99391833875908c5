//! DNS-01 驗證所需的 TXT 記錄管理。
//!
//! 流程只透過 [`DnsProvider`] 建立與刪除 `_acme-challenge.<domain>` 記錄；
//! 每個 DNS 服務商各自實作此介面，目前提供 Cloudflare。

use std::{str::FromStr, sync::Arc, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::http::{HttpClient, HttpError, Method, ReqwestClient};

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS provider request failed: {0}")]
    Request(#[from] HttpError),
    #[error("Malformed DNS provider response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Cloudflare API error: {0}")]
    Cloudflare(String),
    #[error("No Cloudflare zone found for {0}")]
    ZoneNotFound(String),
    #[error("Unknown DNS provider: {0}")]
    UnknownProvider(String),
    #[error("DNS provider error: {0}")]
    Provider(String),
}

type Result<T> = std::result::Result<T, DnsError>;

/// DNS 服務商的能力介面。
///
/// 傳播延遲由實作端自行處理，流程只會在檢查授權前等待固定的時間。
pub trait DnsProvider: Send + Sync {
    /// 建立 `_acme-challenge.<domain>` TXT 記錄。
    fn create_dns_record(&self, domain: &str, value: &str) -> Result<()>;

    /// 刪除先前建立的 TXT 記錄。
    fn delete_dns_record(&self, domain: &str, value: &str) -> Result<()>;
}

/// 回傳 DNS-01 使用的記錄名稱。
pub fn challenge_record_name(domain: &str) -> String {
    format!("_acme-challenge.{}", domain.trim_start_matches("*."))
}

/// 已建立的 TXT 記錄。
///
/// 擁有刪除記錄的責任：[`cleanup`](Self::cleanup) 只會真正刪除一次，
/// 若在呼叫前被丟棄，`Drop` 會盡力刪除並記錄失敗。
pub struct ProvisionedRecord<'a> {
    provider: &'a dyn DnsProvider,
    domain: String,
    value: String,
    removed: bool,
}

impl<'a> ProvisionedRecord<'a> {
    pub fn provision(provider: &'a dyn DnsProvider, domain: &str, value: &str) -> Result<Self> {
        log::info!("creating DNS record for {}", challenge_record_name(domain));
        provider.create_dns_record(domain, value)?;
        Ok(ProvisionedRecord {
            provider,
            domain: domain.to_string(),
            value: value.to_string(),
            removed: false,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 刪除記錄；重複呼叫不會再次刪除。
    pub fn cleanup(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        self.removed = true;
        log::info!(
            "deleting DNS record for {}",
            challenge_record_name(&self.domain)
        );
        self.provider.delete_dns_record(&self.domain, &self.value)
    }
}

impl Drop for ProvisionedRecord<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("failed to delete DNS record for {}: {}", self.domain, e);
        }
    }
}

/// 可選用的 DNS 服務商。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsProviderKind {
    Cloudflare,
}

impl DnsProviderKind {
    /// 以服務商的 API 憑證建立對應的實作。
    pub fn build(self, credential: &str, timeout: Duration) -> Result<Box<dyn DnsProvider>> {
        match self {
            DnsProviderKind::Cloudflare => Ok(Box::new(CloudflareDns::new(credential, timeout)?)),
        }
    }
}

impl FromStr for DnsProviderKind {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cloudflare" => Ok(Self::Cloudflare),
            unknown => Err(DnsError::UnknownProvider(unknown.to_string())),
        }
    }
}

const CLOUDFLARE_API: &str = "https://api.cloudflare.com/client/v4";
const CLOUDFLARE_TTL: u32 = 60;

/// Cloudflare v4 API 的 [`DnsProvider`] 實作，使用 API Token 驗證。
pub struct CloudflareDns {
    http: Arc<dyn HttpClient>,
    token: String,
    api_base: String,
}

impl CloudflareDns {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let http = Arc::new(ReqwestClient::new(timeout)?);
        Self::with_http(token, http, CLOUDFLARE_API)
    }

    /// 以指定的 HTTP 實作與 API 位址建立。
    pub(crate) fn with_http(token: &str, http: Arc<dyn HttpClient>, api_base: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(DnsError::Provider("Cloudflare API token is empty".into()));
        }

        Ok(CloudflareDns {
            http,
            token: token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<T> {
        let authorization = format!("Bearer {}", self.token);
        let mut headers = vec![("Authorization", authorization.as_str())];
        if body.is_some() {
            headers.push(("Content-Type", "application/json"));
        }

        let response = self.http.send(method, url, &headers, body)?;
        log::debug!("cloudflare {} {} -> status={}", method, url, response.status);
        response.json::<CloudflareResponse<T>>()?.into_result()
    }

    /// 由完整域名往上逐層查找 Cloudflare 上的 zone。
    fn zone_id(&self, domain: &str) -> Result<String> {
        for candidate in zone_candidates(domain) {
            let url = format!("{}/zones?name={}", self.api_base, candidate);
            let zones: Vec<CloudflareZone> = self.call(Method::Get, &url, None)?;
            if let Some(zone) = zones.into_iter().next() {
                log::debug!("cloudflare zone for {}: {}", domain, candidate);
                return Ok(zone.id);
            }
        }
        Err(DnsError::ZoneNotFound(domain.to_string()))
    }

    fn txt_records(&self, zone_id: &str, name: &str) -> Result<Vec<CloudflareDnsRecordItem>> {
        let url = format!(
            "{}/zones/{}/dns_records?type=TXT&name={}",
            self.api_base, zone_id, name
        );
        self.call(Method::Get, &url, None)
    }

    fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/{}", self.api_base, zone_id, record_id);
        self.call::<serde_json::Value>(Method::Delete, &url, None)
            .map(|_| ())
    }
}

impl DnsProvider for CloudflareDns {
    fn create_dns_record(&self, domain: &str, value: &str) -> Result<()> {
        let zone_id = self.zone_id(domain)?;
        let name = challenge_record_name(domain);

        for stale in self.txt_records(&zone_id, &name)? {
            log::debug!("removing stale TXT record {}", stale.id);
            self.delete_record(&zone_id, &stale.id)?;
        }

        let record = CloudflareDnsRecord {
            record_type: "TXT",
            name: &name,
            content: format!("\"{}\"", value),
            ttl: CLOUDFLARE_TTL,
        };
        let url = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
        self.call::<serde_json::Value>(Method::Post, &url, Some(serde_json::to_vec(&record)?))
            .map(|_| ())
    }

    fn delete_dns_record(&self, domain: &str, value: &str) -> Result<()> {
        let zone_id = self.zone_id(domain)?;
        let name = challenge_record_name(domain);

        for record in self.txt_records(&zone_id, &name)? {
            if record.content.trim_matches('"') == value {
                self.delete_record(&zone_id, &record.id)?;
            }
        }
        Ok(())
    }
}

/// 依序列出可能的 zone 名稱：`a.b.example.com`、`b.example.com`、`example.com`。
fn zone_candidates(domain: &str) -> Vec<&str> {
    let domain = domain.trim_start_matches("*.").trim_end_matches('.');
    let labels = domain.split('.').count();
    if labels < 2 {
        return vec![domain];
    }

    let mut candidates = vec![domain];
    let mut rest = domain;
    while let Some((_, parent)) = rest.split_once('.') {
        if !parent.contains('.') {
            break;
        }
        candidates.push(parent);
        rest = parent;
    }
    candidates
}

fn format_cloudflare_errors(errors: &[CloudflareError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Serialize)]
struct CloudflareDnsRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
}

/// Cloudflare API 的共同回應外層。
#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
}

impl<T> CloudflareResponse<T> {
    fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(DnsError::Cloudflare(format_cloudflare_errors(&self.errors)));
        }
        self.result
            .ok_or_else(|| DnsError::Cloudflare("response has no result".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareDnsRecordItem {
    id: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareZone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    code: u32,
    message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        http::HttpResponse,
        test_support::{DnsCall, MockHttp, RecordingDns},
    };

    const API: &str = "https://cf.test/client/v4";

    fn cloudflare_ok(result: serde_json::Value) -> HttpResponse {
        HttpResponse::new(200).with_body(
            json!({"success": true, "errors": [], "result": result}).to_string(),
        )
    }

    /// `www.example.com` 本身不是 zone，`example.com` 才是。
    fn cloudflare_with_zone(records: serde_json::Value) -> Result<(Arc<MockHttp>, CloudflareDns)> {
        let http = Arc::new(MockHttp::new());
        http.on_get(&format!("{}/zones?name=www.example.com", API), cloudflare_ok(json!([])));
        http.on_get(
            &format!("{}/zones?name=example.com", API),
            cloudflare_ok(json!([{"id": "z1"}])),
        );
        http.on_get(
            &format!(
                "{}/zones/z1/dns_records?type=TXT&name=_acme-challenge.www.example.com",
                API
            ),
            cloudflare_ok(records),
        );
        let dns = CloudflareDns::with_http("cf-token", http.clone(), API)?;
        Ok((http, dns))
    }

    #[test]
    fn test_zone_candidates() {
        assert_eq!(
            zone_candidates("www.sub.example.com"),
            vec!["www.sub.example.com", "sub.example.com", "example.com"]
        );
        assert_eq!(zone_candidates("example.com"), vec!["example.com"]);
        assert_eq!(zone_candidates("*.example.com"), vec!["example.com"]);
    }

    #[test]
    fn test_record_name() {
        assert_eq!(challenge_record_name("example.com"), "_acme-challenge.example.com");
        assert_eq!(
            challenge_record_name("*.example.com"),
            "_acme-challenge.example.com"
        );
    }

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!(
            "Cloudflare".parse::<DnsProviderKind>().ok(),
            Some(DnsProviderKind::Cloudflare)
        );
        assert!(matches!(
            "route53".parse::<DnsProviderKind>(),
            Err(DnsError::UnknownProvider(name)) if name == "route53"
        ));
    }

    #[test]
    fn test_cloudflare_requires_token() {
        assert!(CloudflareDns::new(" ", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_cloudflare_response_errors() -> std::result::Result<(), serde_json::Error> {
        let failed: CloudflareResponse<Vec<CloudflareZone>> = serde_json::from_str(
            r#"{"success":false,"errors":[{"code":9109,"message":"Invalid access token"}],"result":null}"#,
        )?;
        assert!(matches!(
            failed.into_result(),
            Err(DnsError::Cloudflare(msg)) if msg == "9109: Invalid access token"
        ));

        let ok: CloudflareResponse<Vec<CloudflareZone>> =
            serde_json::from_str(r#"{"success":true,"errors":[],"result":[{"id":"z1"}]}"#)?;
        assert_eq!(ok.into_result().ok().map(|z| z.len()), Some(1));
        Ok(())
    }

    #[test]
    fn test_record_cleanup_runs_once() -> Result<()> {
        let dns = RecordingDns::default();
        {
            let mut record = ProvisionedRecord::provision(&dns, "example.com", "value-1")?;
            assert_eq!(record.value(), "value-1");
            record.cleanup()?;
            record.cleanup()?;
        }
        assert_eq!(
            dns.calls(),
            vec![
                DnsCall::Create("example.com".into(), "value-1".into()),
                DnsCall::Delete("example.com".into(), "value-1".into()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_record_deleted_on_drop() -> Result<()> {
        let dns = RecordingDns::default();
        drop(ProvisionedRecord::provision(&dns, "example.com", "value-2")?);
        assert_eq!(dns.deletes(), 1);
        Ok(())
    }

    #[test]
    fn test_cloudflare_create_replaces_stale_record() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let (http, dns) = cloudflare_with_zone(json!([{"id": "old", "content": "\"stale\""}]))?;
        http.on_delete(
            &format!("{}/zones/z1/dns_records/old", API),
            cloudflare_ok(json!({"id": "old"})),
        );
        http.on_post(
            &format!("{}/zones/z1/dns_records", API),
            cloudflare_ok(json!({"id": "new"})),
        );

        dns.create_dns_record("www.example.com", "txt-value")?;

        let calls: Vec<(&str, String)> = http
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url))
            .collect();
        assert_eq!(
            calls,
            vec![
                ("GET", format!("{}/zones?name=www.example.com", API)),
                ("GET", format!("{}/zones?name=example.com", API)),
                (
                    "GET",
                    format!(
                        "{}/zones/z1/dns_records?type=TXT&name=_acme-challenge.www.example.com",
                        API
                    )
                ),
                ("DELETE", format!("{}/zones/z1/dns_records/old", API)),
                ("POST", format!("{}/zones/z1/dns_records", API)),
            ]
        );

        let create = http
            .last_post(&format!("{}/zones/z1/dns_records", API))
            .ok_or("no create request")?;
        assert_eq!(
            create.json_body()?,
            json!({
                "type": "TXT",
                "name": "_acme-challenge.www.example.com",
                "content": "\"txt-value\"",
                "ttl": 60
            })
        );
        assert_eq!(create.content_type, "application/json");
        assert!(http
            .requests()
            .iter()
            .all(|r| r.header("Authorization") == Some("Bearer cf-token")));
        Ok(())
    }

    #[test]
    fn test_cloudflare_delete_matches_content() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let (http, dns) = cloudflare_with_zone(json!([
            {"id": "r1", "content": "\"other-value\""},
            {"id": "r2", "content": "\"txt-value\""}
        ]))?;
        http.on_delete(
            &format!("{}/zones/z1/dns_records/r2", API),
            cloudflare_ok(json!({"id": "r2"})),
        );

        dns.delete_dns_record("www.example.com", "txt-value")?;

        let deleted: Vec<String> = http
            .requests()
            .into_iter()
            .filter(|r| r.method == "DELETE")
            .map(|r| r.url)
            .collect();
        assert_eq!(deleted, vec![format!("{}/zones/z1/dns_records/r2", API)]);
        Ok(())
    }

    #[test]
    fn test_cloudflare_zone_not_found() -> Result<()> {
        let http = Arc::new(MockHttp::new());
        http.on_get(&format!("{}/zones?name=www.example.com", API), cloudflare_ok(json!([])));
        http.on_get(&format!("{}/zones?name=example.com", API), cloudflare_ok(json!([])));
        let dns = CloudflareDns::with_http("cf-token", http.clone(), API)?;

        assert!(matches!(
            dns.create_dns_record("www.example.com", "v"),
            Err(DnsError::ZoneNotFound(domain)) if domain == "www.example.com"
        ));
        assert!(http.last_post(&format!("{}/zones/z1/dns_records", API)).is_none());
        Ok(())
    }

    #[test]
    fn test_cloudflare_api_failure() -> Result<()> {
        let http = Arc::new(MockHttp::new());
        http.on_get(
            &format!("{}/zones?name=example.com", API),
            HttpResponse::new(403).with_body(
                r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}],"result":null}"#,
            ),
        );
        let dns = CloudflareDns::with_http("cf-token", http, API)?;

        assert!(matches!(
            dns.delete_dns_record("example.com", "v"),
            Err(DnsError::Cloudflare(msg)) if msg == "10000: Authentication error"
        ));
        Ok(())
    }
}
