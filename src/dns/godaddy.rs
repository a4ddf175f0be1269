use std::fmt::{Debug, Formatter};
use std::time::Duration;
use reqwest::{header::AUTHORIZATION, Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use crate::rate_limit::RateLimit;

pub const DEFAULT_API_URL: &str = "https://api.godaddy.com/";
// GoDaddy allows 60 requests per minute per endpoint.
pub const DEFAULT_REQUESTS_PER_MINUTE: u64 = 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GoDaddyProvider {
    base_url: Url,
    client: Client,
    auth: String,

    limit: RateLimit,
}

impl GoDaddyProvider {
    pub fn new(base_url: &str, key: &str, secret: &str) -> Result<Self, GoDaddyError> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() || !base_url.has_host() {
            return Err(GoDaddyError::BadBaseUrl);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            client,
            auth: format!("sso-key {key}:{secret}"),
            limit: RateLimit::new(DEFAULT_REQUESTS_PER_MINUTE, Duration::from_secs(60)),
        })
    }

    pub fn with_rate_limit(mut self, per_minute: u64) -> Self {
        self.limit = RateLimit::new(per_minute, Duration::from_secs(60));
        self
    }

    pub fn base_url(&self) -> &Url { &self.base_url }

    fn record_url(&self, domain: &str) -> Result<Url, GoDaddyError> {
        Ok(self.base_url.join(&format!("v1/domains/{domain}/records/A/@"))?)
    }
}

impl Debug for GoDaddyProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoDaddyProvider")
            .field("base_url", &self.base_url.as_str())
            .field("rate_limit", &self.limit.capacity())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl super::Provider for GoDaddyProvider {
    type Error = GoDaddyError;

    #[tracing::instrument(skip(self))]
    async fn get_a_record(&self, domain: &str) -> Result<String, Self::Error> {
        let url = self.record_url(domain)?;

        self.limit.ready().await;
        let res = self.client.get(url)
            .header(AUTHORIZATION, &self.auth)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(status_error(res, domain).await);
        }

        let body = res.text().await?;
        let records: Vec<DnsRecord> = serde_json::from_str(&body)?;
        debug!(?records, "got {} A records", records.len());

        records.into_iter()
            .next()
            .map(|r| r.data)
            .ok_or_else(|| GoDaddyError::NotFound { domain: domain.to_owned() })
    }

    #[tracing::instrument(skip(self))]
    async fn set_a_record(&self, domain: &str, ip: &str, ttl: u32) -> Result<(), Self::Error> {
        let url = self.record_url(domain)?;

        self.limit.ready().await;
        let res = self.client.put(url)
            .header(AUTHORIZATION, &self.auth)
            .json(&[RecordUpdate { data: ip, ttl }])
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            return Err(status_error(res, domain).await);
        }

        info!("A record set to {ip}");
        Ok(())
    }
}

/// Maps a rejected response onto the error taxonomy, keeping the body for diagnosis.
async fn status_error(res: Response, domain: &str) -> GoDaddyError {
    let status = res.status();
    let body = res.text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));

    match status {
        StatusCode::NOT_FOUND => GoDaddyError::NotFound { domain: domain.to_owned() },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GoDaddyError::Auth { status, body },
        _ => GoDaddyError::Provider { status, body },
    }
}

#[derive(Debug, Error)]
pub enum GoDaddyError {
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("credentials rejected with status {status}, check the api key and secret: {body}")]
    Auth { status: StatusCode, body: String },
    #[error("no A record named @ for {domain}")]
    NotFound { domain: String },
    #[error("godaddy responded with status {status}: {body}")]
    Provider { status: StatusCode, body: String },
    #[error("malformed record response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("bad base url")]
    BadBaseUrl,
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    data: String,
}

#[derive(Debug, Serialize)]
struct RecordUpdate<'a> {
    data: &'a str,
    ttl: u32,
}
