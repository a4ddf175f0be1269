use std::net::Ipv4Addr;
use std::time::Duration;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_IP_URL: &str = "https://api.ipify.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Asks a plain-text "what is my IP" endpoint for the caller's address.
#[derive(Debug)]
pub struct HttpIpResolver {
    url: Url,
    client: Client,
}

impl HttpIpResolver {
    pub fn new(url: &str) -> Result<Self, ResolveError> {
        let url = Url::parse(url)?;
        if url.cannot_be_a_base() || !url.has_host() {
            return Err(ResolveError::BadUrl);
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &Url { &self.url }
}

#[async_trait::async_trait]
impl super::IpResolver for HttpIpResolver {
    type Error = ResolveError;

    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn resolve(&self) -> Result<String, Self::Error> {
        let res = self.client.get(self.url.clone())
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status));
        }

        let body = res.text().await?;
        let ip = parse_address(&body)?;
        debug!(%ip, "resolved public address");

        Ok(ip)
    }
}

/// Trims the echo service's body and checks it holds a single IPv4 address.
fn parse_address(body: &str) -> Result<String, ResolveError> {
    let token = body.trim();
    token.parse::<Ipv4Addr>()
        .map(|ip| ip.to_string())
        .map_err(|_| ResolveError::Parse(token.to_owned()))
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ip service request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("ip service responded with status {0}")]
    Status(StatusCode),
    #[error("ip service returned {0:?}, which is not an IPv4 address")]
    Parse(String),
    #[error("bad ip service url")]
    BadUrl,
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use super::*;
    use crate::ip::IpResolver;

    #[test]
    fn parse_strips_trailing_newline() {
        assert_eq!(parse_address("203.0.113.7\n").unwrap(), "203.0.113.7");
        assert_eq!(parse_address("  198.51.100.1 \r\n").unwrap(), "198.51.100.1");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(parse_address(""), Err(ResolveError::Parse(_))));
        assert!(matches!(parse_address("<html>busy</html>"), Err(ResolveError::Parse(_))));
        assert!(matches!(parse_address("2001:db8::1"), Err(ResolveError::Parse(_))));
    }

    #[tokio::test]
    async fn resolve_returns_trimmed_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/"))
                .respond_with(status_code(200).body("5.6.7.8\n")),
        );

        let resolver = HttpIpResolver::new(&server.url_str("/")).unwrap();
        assert_eq!(resolver.resolve().await.unwrap(), "5.6.7.8");
    }

    #[tokio::test]
    async fn resolve_fails_on_error_status() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/"))
                .respond_with(status_code(503).body("try later")),
        );

        let resolver = HttpIpResolver::new(&server.url_str("/")).unwrap();
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn resolve_fails_on_unusable_body() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/"))
                .respond_with(status_code(200).body("not an address")),
        );

        let resolver = HttpIpResolver::new(&server.url_str("/")).unwrap();
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Parse(body) if body == "not an address"));
    }

    #[tokio::test]
    async fn resolve_fails_when_unreachable() {
        // Port 9 (discard) on localhost is not served by anything in the test environment.
        let resolver = HttpIpResolver::new("http://127.0.0.1:9/").unwrap();
        let err = resolver.resolve().await.unwrap_err();
        assert!(matches!(err, ResolveError::Network(_)));
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(matches!(HttpIpResolver::new("data:text/plain,1.2.3.4"), Err(ResolveError::BadUrl)));
        assert!(matches!(HttpIpResolver::new("api.ipify.org"), Err(ResolveError::UrlParseError(_))));
    }
}
