use crate::{
    error::{AcmeError, Result},
    http::HttpClient,
};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// CA 的中繼證書鏈，於建立客戶端時取得一次並附加到每張簽發的證書之後。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    pem: String,
}

impl CertificateChain {
    /// 以單次 GET 取得證書鏈，狀態碼須為 200 或 201 且內容須為 PEM。
    pub fn fetch(http: &dyn HttpClient, url: &str) -> Result<Self> {
        log::info!("fetching certificate chain: {}", url);
        let response = http.get(url)?;
        log::info!(
            "certificate chain response: status={} body={}",
            response.status,
            response.log_body()
        );

        let pem = response.text();
        if !response.status_in(&[200, 201]) || !pem.contains(PEM_BEGIN) || !pem.contains(PEM_END)
        {
            return Err(AcmeError::ChainFetch {
                status: response.status,
                body: pem,
            });
        }

        Ok(CertificateChain { pem })
    }

    pub fn as_pem(&self) -> &str {
        &self.pem
    }
}
