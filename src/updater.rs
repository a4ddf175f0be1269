use std::{
    collections::HashMap,
    fmt::{Debug, Display, Formatter},
    future::Future,
    time::{Duration, SystemTime},
};
use tokio::{sync::Mutex, time};
use tracing::{debug, error, info, warn};
use crate::{
    dns::Provider,
    ip::IpResolver,
    settings::DEFAULT_TTL,
};

/// Whether the published record has to be rewritten to reach `current`.
pub fn needs_update(last_known: &str, current: &str) -> bool {
    last_known != current
}

/// Keeps the A records of a fixed set of domains pointed at this host.
#[derive(Debug)]
pub struct Updater<D: Provider, R: IpResolver> {
    provider: D,
    resolver: R,

    domains: Vec<String>,
    update_interval: Duration,
    ttl: u32,

    // Last value seen at or written to the provider, per domain. Only advanced
    // after a successful read or a confirmed write.
    records: Mutex<HashMap<String, String>>,
}

/// Outcome counts of one update cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl<D: Provider, R: IpResolver> Updater<D, R> {
    pub fn new(provider: D, resolver: R, domains: Vec<String>, update_interval: Duration) -> Self {
        Self {
            provider,
            resolver,
            domains,
            update_interval,
            ttl: DEFAULT_TTL,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_mut(&mut self) -> &mut u32 { &mut self.ttl }

    pub fn domains(&self) -> &[String] { &self.domains }

    /// Runs a cycle immediately and then once per interval until `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles, so an in-flight cycle always
    /// finishes its reads and writes before this returns.
    pub async fn run<S: Future<Output = ()>>(&self, shutdown: S) {
        tokio::pin!(shutdown);

        loop {
            self.tick().await;

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("stopping update loop");
                    return;
                }
                _ = time::sleep(self.update_interval) => {}
            }
        }
    }

    async fn tick(&self) {
        match self.update_records().await {
            Ok(summary) => match next_update_at(self.update_interval) {
                Some(next) => info!(
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    failed = summary.failed,
                    "update cycle finished, next update at {next}"
                ),
                None => info!(
                    updated = summary.updated,
                    unchanged = summary.unchanged,
                    failed = summary.failed,
                    "update cycle finished"
                ),
            },
            Err(e) => {
                error!("failed to update DNS records: {}", e);
            }
        }
    }

    /// One full cycle: resolve the public address once, then reconcile every domain.
    #[tracing::instrument(skip(self), level = "info")]
    pub async fn update_records(&self) -> Result<CycleSummary, UpdateError<D, R>> {
        let current = self.resolver.resolve()
            .await
            .map_err(UpdateError::<D, R>::ResolverError)?;

        debug!(ip = %current, "checking {} domains", self.domains.len());

        let mut summary = CycleSummary::default();
        for domain in &self.domains {
            match self.update_record(domain, &current).await {
                Ok(true) => summary.updated += 1,
                Ok(false) => summary.unchanged += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("{}", e);
                }
            }
        }

        Ok(summary)
    }

    /// Reads the published record and rewrites it when it differs from `current`.
    /// Returns whether a write happened.
    async fn update_record(&self, domain: &str, current: &str) -> Result<bool, UpdateError<D, R>> {
        let published = self.provider.get_a_record(domain)
            .await
            .map_err(|source| UpdateError::<D, R>::ProviderError { domain: domain.to_owned(), source })?;

        let previous = self.records.lock().await.insert(domain.to_owned(), published.clone());
        if let Some(previous) = previous.filter(|p| *p != published) {
            warn!(domain, expected = %previous, found = %published, "A record was changed outside of this updater");
        }

        if !needs_update(&published, current) {
            debug!(domain, ip = current, "address still the same, no update necessary");
            return Ok(false);
        }

        info!(domain, old = %published, new = current, "updating A record");
        self.provider.set_a_record(domain, current, self.ttl)
            .await
            .map_err(|source| UpdateError::<D, R>::ProviderError { domain: domain.to_owned(), source })?;

        self.records.lock().await.insert(domain.to_owned(), current.to_owned());

        Ok(true)
    }
}

/// Wall clock time of the next cycle, if it is representable.
fn next_update_at(interval: Duration) -> Option<humantime::Rfc3339Timestamp> {
    SystemTime::now()
        .checked_add(interval)
        .map(humantime::format_rfc3339_seconds)
}

#[derive(Debug)]
pub enum UpdateError<D: Provider, R: IpResolver> {
    ResolverError(R::Error),
    ProviderError { domain: String, source: D::Error },
}

impl<D: Provider, R: IpResolver> Display for UpdateError<D, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateError::ResolverError(e) => write!(f, "failed to resolve public address: {}", e),
            UpdateError::ProviderError { domain, source } => write!(f, "{}: {}", domain, source),
        }
    }
}

impl<D: Provider + Debug, R: IpResolver + Debug> std::error::Error for UpdateError<D, R> {}
