pub mod http;

/// Source of the host's current public IPv4 address.
#[cfg_attr(test, mockall::automock(type Error = http::ResolveError;))]
#[async_trait::async_trait]
pub trait IpResolver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn resolve(&self) -> Result<String, Self::Error>;
}
