use serde::{Deserialize, Serialize};

use crate::{
    error::{AcmeError, Result},
    http::HttpClient,
};

/// CA 公開的端點目錄，於建立客戶端時取得一次，之後不再變動。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Directory {
    /// 用於取得新的 nonce 值的 API 路徑。
    #[serde(rename = "newNonce")]
    pub new_nonce: String,
    /// 用於新帳號註冊的 API 路徑。
    #[serde(rename = "newAccount")]
    pub new_account: String,
    /// 用於建立訂單的 API 路徑。
    #[serde(rename = "newOrder")]
    pub new_order: String,
    /// 用於撤銷憑證的 API 路徑。
    #[serde(rename = "revokeCert")]
    pub revoke_cert: String,
    /// 用於更換帳戶金鑰的 API 路徑。
    #[serde(rename = "keyChange")]
    pub key_change: String,
    pub meta: DirectoryMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DirectoryMeta {
    #[serde(rename = "termsOfService")]
    pub terms_of_service: String,
}

impl Directory {
    /// 以單次 GET 取得目錄。
    ///
    /// 狀態碼必須為 200 或 201，且內容必須包含所有必要欄位，否則回傳
    /// [`AcmeError::Protocol`]。
    pub fn fetch(http: &dyn HttpClient, url: &str) -> Result<Self> {
        log::info!("fetching ACME directory: {}", url);
        let response = http.get(url)?;
        log::info!(
            "directory response: status={} body={}",
            response.status,
            response.log_body()
        );

        if !response.status_in(&[200, 201]) {
            return Err(AcmeError::Protocol(format!(
                "Unable to fetch directory {} (status {}): {}",
                url,
                response.status,
                response.text()
            )));
        }

        response.json::<Directory>().map_err(|e| {
            AcmeError::Protocol(format!("Directory {} is missing required keys: {}", url, e))
        })
    }
}
