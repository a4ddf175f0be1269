use std::process::ExitCode;
use tokio::sync::oneshot;
use tracing::{error, info, Level};
use crate::{
    dns::godaddy::GoDaddyProvider,
    ip::http::HttpIpResolver,
    settings::Settings,
    updater::Updater,
};

mod dns;
mod ip;
mod rate_limit;
mod settings;
mod updater;

build_info::build_info!(fn build_info);

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Settings::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging is not configured yet, fall back to the defaults to report the failure.
            let _ = init_tracing(false, false);
            error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(cfg.verbose, cfg.json_logs) {
        eprintln!("failed to install log subscriber: {e}");
        return ExitCode::FAILURE;
    }

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, json: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = if verbose { Level::TRACE } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

async fn run(cfg: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let update_interval = cfg.update_interval();
    let domains = cfg.domain_list();

    let provider = GoDaddyProvider::new(cfg.api_url.as_str(), &cfg.api_key, &cfg.api_secret)?
        .with_rate_limit(cfg.rate_limit);
    let resolver = HttpIpResolver::new(cfg.ip_url.as_str())?;

    info!(
        version = %build_info().crate_info.version,
        api = %provider.base_url(),
        ip_service = %resolver.url(),
        interval = %humantime::format_duration(update_interval),
        "starting godaddy-ddns updater"
    );

    let mut updater = Updater::new(provider, resolver, domains, update_interval);
    *updater.ttl_mut() = cfg.ttl;
    info!(domains = ?updater.domains(), ttl = cfg.ttl, "managing {} domains", updater.domains().len());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        updater.run(async move { stop_rx.await.ok(); }).await
    });

    shutdown_signal().await?;
    info!("received shutdown signal, waiting for the current update to finish");

    // The loop stops on its own if the sender is gone, so a failed send is fine.
    let _ = stop_tx.send(());
    handle.await?;

    info!("goodbye");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
