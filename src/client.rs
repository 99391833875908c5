//! 簽發流程的狀態機。
//!
//! [`AcmeClient`] 只持有建立後不再變動的資料（設定、目錄、證書鏈與各項能力）；
//! 每次簽發的可變狀態（帳戶金鑰、`kid`、證書金鑰與 CSR）都放在 [`IssuanceContext`]，
//! 並明確傳入每個步驟。

use std::sync::Arc;

use crate::{
    certificate::{assemble_pem, Certificate},
    chain::CertificateChain,
    challenge::{Authorization, AuthorizationStatus, KeyAuthorization},
    config::ClientConfig,
    csr::build_csr,
    directory::Directory,
    dns::{DnsProvider, ProvisionedRecord},
    error::{AcmeError, Result},
    http::{HttpClient, HttpResponse, ReqwestClient},
    jwk::Jwk,
    key_pair::KeyPair,
    order::{Order, OrderStatus},
    payload::{
        ChallengeResponsePayload, FinalizeOrderPayload, NewAccountPayload, NewOrderPayload,
        PayloadT, RevokeCertPayload,
    },
    polling::{Check, PollOutcome, Poller, Sleeper, ThreadSleeper},
    transport::{AcmeTransport, RequestPayload, Signer},
};

/// 單次簽發流程的狀態。
pub struct IssuanceContext {
    account_key: KeyPair,
    kid: Option<String>,
    prior_registered: bool,
    certificate_key: KeyPair,
    csr_der: Vec<u8>,
}

impl IssuanceContext {
    fn signer(&self) -> Signer<'_> {
        Signer {
            account_key: &self.account_key,
            kid: self.kid.as_deref(),
        }
    }

    /// 註冊成功後的帳戶 URL。
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn account_key(&self) -> &KeyPair {
        &self.account_key
    }

    pub fn certificate_key(&self) -> &KeyPair {
        &self.certificate_key
    }
}

/// 簽發結果，三者皆為 PEM。
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// 葉證書後接中繼證書鏈
    pub certificate_pem: String,
    pub certificate_key_pem: String,
    /// 續期時可傳回 [`ClientConfigBuilder::account_key_pem`](crate::config::ClientConfigBuilder::account_key_pem)
    pub account_key_pem: String,
}

/// DNS-01 ACME 客戶端。
pub struct AcmeClient {
    config: ClientConfig,
    transport: AcmeTransport,
    chain: CertificateChain,
    account_key: KeyPair,
    dns: Arc<dyn DnsProvider>,
    sleeper: Arc<dyn Sleeper>,
}

impl AcmeClient {
    /// 以 `reqwest` 與真實的等待建立客戶端。
    ///
    /// 建立時會取得目錄與證書鏈各一次，並載入或產生帳戶金鑰。
    pub fn new(config: ClientConfig, dns: Arc<dyn DnsProvider>) -> Result<Self> {
        let http = Arc::new(ReqwestClient::new(config.request_timeout)?);
        Self::with_capabilities(config, dns, http, Arc::new(ThreadSleeper))
    }

    /// 以指定的 HTTP 與等待實作建立客戶端。
    pub fn with_capabilities(
        config: ClientConfig,
        dns: Arc<dyn DnsProvider>,
        http: Arc<dyn HttpClient>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self> {
        let directory = Directory::fetch(&*http, &config.directory_url)?;
        let chain = CertificateChain::fetch(&*http, &config.chain_url)?;
        let account_key = match &config.account_key_pem {
            Some(pem) => KeyPair::from_pem(pem)?,
            None => {
                log::info!("generating a new {}-bit account key", config.bits);
                KeyPair::generate(config.bits)?
            }
        };

        Ok(AcmeClient {
            config,
            transport: AcmeTransport::new(http, directory),
            chain,
            account_key,
            dns,
            sleeper,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn directory(&self) -> &Directory {
        self.transport.directory()
    }

    /// 建立新的簽發狀態：產生新的證書金鑰並建立 CSR，證書金鑰不會在續期間重複使用。
    pub fn new_context(&self) -> Result<IssuanceContext> {
        let certificate_key = KeyPair::generate(self.config.bits)?;
        if certificate_key.same_public_key(&self.account_key) {
            return Err(AcmeError::Config(
                "certificate key must differ from the account key".to_string(),
            ));
        }
        let csr_der = build_csr(
            &certificate_key,
            &self.config.domain,
            &self.config.alt_names,
            self.config.digest,
        )?;

        Ok(IssuanceContext {
            account_key: self.account_key.clone(),
            kid: None,
            prior_registered: self.config.account_key_pem.is_some(),
            certificate_key,
            csr_der,
        })
    }

    /// 註冊帳戶（或查詢既有帳戶），並將 `Location` 標頭記為 `kid`。
    pub fn acme_register(&self, ctx: &mut IssuanceContext) -> Result<String> {
        log::info!("acme_register (existing account: {})", ctx.prior_registered);
        let (payload, accepted): (_, &[u16]) = if ctx.prior_registered {
            (NewAccountPayload::existing(), &[200, 201, 409])
        } else {
            (
                NewAccountPayload::create(self.config.contact_email.as_deref()),
                &[201, 409],
            )
        };

        let url = self.directory().new_account.clone();
        let response = self.transport.post_signed(
            ctx.signer(),
            &url,
            RequestPayload::Signed(payload.to_value()?),
        )?;
        if !response.status_in(accepted) {
            return Err(AcmeError::Registration {
                status: response.status,
                body: response.text(),
            });
        }

        let kid = location(&response, "newAccount")?;
        log::info!("account registered: {}", kid);
        ctx.kid = Some(kid.clone());
        Ok(kid)
    }

    /// 為主域名建立訂單。
    pub fn apply_for_cert_issuance(&self, ctx: &IssuanceContext) -> Result<Order> {
        log::info!("apply_for_cert_issuance: {}", self.config.domain);
        let url = self.directory().new_order.clone();
        let payload = NewOrderPayload::new(&[self.config.domain.as_str()]).to_value()?;
        let response = self
            .transport
            .post_signed(ctx.signer(), &url, RequestPayload::Signed(payload))?;
        if response.status != 201 {
            return Err(AcmeError::Order {
                status: response.status,
                body: response.text(),
            });
        }

        Order::parse(&response.body, response.header("Location"))
    }

    /// 取得授權並挑出 dns-01 挑戰，回傳 `(token, challenge_url)`。
    pub fn get_challenge(
        &self,
        ctx: &IssuanceContext,
        authorization_url: &str,
    ) -> Result<(String, String)> {
        log::info!("get_challenge: {}", authorization_url);
        let response = self.transport.post_signed(
            ctx.signer(),
            authorization_url,
            RequestPayload::GetChallenge,
        )?;
        if response.status != 200 {
            return Err(AcmeError::Authorization {
                status: response.status,
                body: response.text(),
            });
        }

        let authorization = Authorization::parse(&response.body)?;
        let challenge = authorization.dns_challenge(authorization_url)?;
        log::info!(
            "authorization is {}, dns-01 challenge {} is {}",
            authorization.status,
            challenge.url,
            challenge.status.as_deref().unwrap_or("unknown")
        );
        Ok((challenge.token.clone(), challenge.url.clone()))
    }

    pub fn get_keyauthorization(
        &self,
        ctx: &IssuanceContext,
        token: &str,
    ) -> Result<KeyAuthorization> {
        KeyAuthorization::new(token, &Jwk::new(&ctx.account_key)?)
    }

    /// 透過 DNS 服務商建立 TXT 記錄，回傳的記錄負責之後的刪除。
    pub fn provision_dns(&self, dns_value: &str) -> Result<ProvisionedRecord<'_>> {
        Ok(ProvisionedRecord::provision(
            &*self.dns,
            &self.config.domain,
            dns_value,
        )?)
    }

    /// 提交 CSR 完成訂單，回傳 CA 回應的訂單內容。
    pub fn send_csr(&self, ctx: &IssuanceContext, finalize_url: &str) -> Result<Order> {
        log::info!("send_csr: {}", finalize_url);
        let payload = FinalizeOrderPayload::new(&ctx.csr_der).to_value()?;
        let response = self.transport.post_signed(
            ctx.signer(),
            finalize_url,
            RequestPayload::Signed(payload),
        )?;
        if response.status != 200 {
            return Err(AcmeError::Finalize {
                status: response.status,
                body: response.text(),
            });
        }

        Order::parse(&response.body, response.header("Location"))
    }

    /// 通知 CA 驗證挑戰；CA 的判定要透過輪詢授權得知，因此不檢查狀態碼。
    pub fn respond_to_challenge(
        &self,
        ctx: &IssuanceContext,
        key_authorization: &str,
        challenge_url: &str,
    ) -> Result<HttpResponse> {
        log::info!("respond_to_challenge: {}", challenge_url);
        let payload = ChallengeResponsePayload::new(key_authorization).to_value()?;
        self.transport
            .post_signed(ctx.signer(), challenge_url, RequestPayload::Signed(payload))
    }

    /// 輪詢授權直到 valid。
    ///
    /// 無論成功、用盡次數或查詢失敗，離開前都會刪除 `record`。
    pub fn check_authorization_status(
        &self,
        ctx: &IssuanceContext,
        authorization_url: &str,
        record: &mut ProvisionedRecord<'_>,
    ) -> Result<()> {
        log::info!("check_authorization_status: {}", authorization_url);
        let outcome = Poller::new(self.config.poll_policy(), &*self.sleeper).run(|attempt| {
            let response = self.transport.post_signed(
                ctx.signer(),
                authorization_url,
                RequestPayload::GetChallenge,
            )?;
            let status = status_field(&response)?;
            log::info!("authorization status: {} (check {})", status, attempt);

            Ok::<_, AcmeError>(match status.parse::<AuthorizationStatus>() {
                Ok(AuthorizationStatus::Valid) => Check::Done,
                Ok(terminal) if terminal.is_terminal() => {
                    log::warn!(
                        "authorization reached terminal status {}, checking again",
                        terminal
                    );
                    Check::NotYet(status)
                }
                _ => Check::NotYet(status),
            })
        });

        match outcome {
            Ok(PollOutcome::Done { .. }) => {
                record.cleanup()?;
                Ok(())
            }
            Ok(PollOutcome::Exhausted {
                attempts,
                last_status,
            }) => {
                cleanup_after_failure(record);
                Err(AcmeError::PollingExhausted {
                    attempts,
                    last_status,
                })
            }
            Err(e) => {
                cleanup_after_failure(record);
                Err(e)
            }
        }
    }

    /// 下載證書並附上證書鏈。
    pub fn get_certificate(&self, ctx: &IssuanceContext, certificate_url: &str) -> Result<String> {
        log::info!("get_certificate: {}", certificate_url);
        let response = self.transport.post_signed(
            ctx.signer(),
            certificate_url,
            RequestPayload::GetCertificate,
        )?;
        if response.status != 200 {
            return Err(AcmeError::CertificateDownload {
                status: response.status,
                body: response.text(),
            });
        }

        Ok(assemble_pem(&response.body, self.chain.as_pem()))
    }

    /// 撤銷證書，`certificate` 可為 PEM 或 DER。
    pub fn revoke_certificate(
        &self,
        ctx: &IssuanceContext,
        certificate: &[u8],
        reason: Option<u8>,
    ) -> Result<()> {
        log::info!("revoke_certificate");
        let der = match std::str::from_utf8(certificate) {
            Ok(pem) if pem.contains("-----BEGIN CERTIFICATE-----") => {
                Certificate::from_pem(pem)?.to_der()?
            }
            _ => certificate.to_vec(),
        };

        let url = self.directory().revoke_cert.clone();
        let payload = RevokeCertPayload::new(&der, reason).to_value()?;
        let response = self
            .transport
            .post_signed(ctx.signer(), &url, RequestPayload::Signed(payload))?;
        if response.status != 200 {
            return Err(AcmeError::Revocation {
                status: response.status,
                body: response.text(),
            });
        }
        Ok(())
    }

    /// 依序執行整個簽發流程，回傳證書、證書私鑰與帳戶私鑰。
    ///
    /// 授權必須先變為 valid 才會提交 CSR；DNS 記錄在任何路徑上都只會刪除一次。
    pub fn issue_or_renew(&self) -> Result<IssuedCertificate> {
        let mut ctx = self.new_context()?;
        self.acme_register(&mut ctx)?;

        let order = self.apply_for_cert_issuance(&ctx)?;
        let authorization_url = order.primary_authorization()?.to_string();
        let (token, challenge_url) = self.get_challenge(&ctx, &authorization_url)?;
        let key_authorization = self.get_keyauthorization(&ctx, &token)?;

        let mut record = self.provision_dns(&key_authorization.dns_value)?;
        self.respond_to_challenge(&ctx, &key_authorization.key_authorization, &challenge_url)?;
        self.check_authorization_status(&ctx, &authorization_url, &mut record)?;
        drop(record);

        let finalized = self.send_csr(&ctx, &order.finalize)?;
        let order = self.settle_order(order, finalized)?;
        let certificate_url = order.certificate.clone().ok_or_else(|| {
            AcmeError::Protocol("Order has no certificate URL after finalization".to_string())
        })?;
        let certificate_pem = self.get_certificate(&ctx, &certificate_url)?;

        Ok(IssuedCertificate {
            certificate_pem,
            certificate_key_pem: pem_string(ctx.certificate_key.private_key_to_pem()?),
            account_key_pem: pem_string(ctx.account_key.private_key_to_pem()?),
        })
    }

    /// 續期就是以新的證書金鑰對相同域名重新簽發。
    pub fn renew(&self) -> Result<IssuedCertificate> {
        self.issue_or_renew()
    }

    /// 合併 finalize 回應；若仍在 processing 且知道訂單 URL，則輪詢直到 valid。
    fn settle_order(&self, mut order: Order, finalized: Order) -> Result<Order> {
        order.merge(finalized);
        if order.status != OrderStatus::Processing {
            return Ok(order);
        }
        let Some(order_url) = order.order_url.clone() else {
            return Ok(order);
        };

        let outcome = Poller::new(self.config.poll_policy(), &*self.sleeper).run(|_| {
            let response = self.transport.get(&order_url)?;
            if response.status != 200 {
                return Err(AcmeError::Finalize {
                    status: response.status,
                    body: response.text(),
                });
            }
            let latest = Order::parse(&response.body, None)?;
            let status = latest.status;
            order.merge(latest);
            match status {
                OrderStatus::Valid => Ok(Check::Done),
                OrderStatus::Invalid => Err(AcmeError::Finalize {
                    status: response.status,
                    body: response.text(),
                }),
                other => Ok(Check::NotYet(other.to_string())),
            }
        })?;

        match outcome {
            PollOutcome::Done { .. } => Ok(order),
            PollOutcome::Exhausted {
                attempts,
                last_status,
            } => Err(AcmeError::PollingExhausted {
                attempts,
                last_status,
            }),
        }
    }
}

fn location(response: &HttpResponse, step: &str) -> Result<String> {
    response
        .header("Location")
        .map(ToString::to_string)
        .ok_or_else(|| AcmeError::Protocol(format!("{} response has no Location header", step)))
}

fn status_field(response: &HttpResponse) -> Result<String> {
    let body: serde_json::Value = response.json()?;
    body["status"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| {
            AcmeError::Protocol(format!(
                "Authorization response (status {}) has no status field",
                response.status
            ))
        })
}

fn cleanup_after_failure(record: &mut ProvisionedRecord<'_>) {
    if let Err(e) = record.cleanup() {
        log::warn!("failed to delete DNS record for {}: {}", record.domain(), e);
    }
}

fn pem_string(pem: Vec<u8>) -> String {
    String::from_utf8_lossy(&pem).into_owned()
}
