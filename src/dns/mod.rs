pub mod godaddy;

/// Reads and writes the apex ("@") A record of a domain.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get_a_record(&self, domain: &str) -> Result<String, Self::Error>;
    async fn set_a_record(&self, domain: &str, ip: &str, ttl: u32) -> Result<(), Self::Error>;
}
