// src/main.rs
use clap::Parser;
use discovery_events::cache::{build_cache_store, build_durable_store};
use discovery_events::cli::Args;
use discovery_events::config::{Config, StaticTenantDirectory};
use discovery_events::discovery::{
    DiscoveryService, DiscoverySettings, WarmingScheduler, spawn_warming_loop,
};
use discovery_events::error::AppError;
use discovery_events::logging::setup_logging;
use discovery_events::server::{self, AppState};
use discovery_events::upstream::HttpUpstreamClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    let config_path = args
        .config_file
        .clone()
        .unwrap_or_else(Config::get_config_path);

    if args.version {
        println!("{} {}", discovery_events::NAME, discovery_events::VERSION);
        return Ok(());
    }

    if args.list_config {
        return Config::display(&config_path).await;
    }

    if let Some(new_domain) = &args.new_api_domain {
        let mut config = if std::path::Path::new(&config_path).exists() {
            Config::load_from_path(&config_path).await?
        } else {
            Config::default()
        };
        config.api_domain = new_domain.clone();
        config.save_to_path(&config_path).await?;
        println!("Config updated: {config_path}");
        return Ok(());
    }

    let config = Config::load_at(&config_path).await?;
    let _guard = setup_logging(&args, Some(&config)).await?;

    let (state, scheduler) = build_state(&config)?;

    if args.warm_once {
        let summary = scheduler.run().await?;
        let rendered = serde_json::to_string_pretty(&summary)?;
        println!("{rendered}");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let warming_task = config.warming.enabled.then(|| {
        spawn_warming_loop(
            Arc::clone(&scheduler),
            Duration::from_secs(config.warming.interval_seconds),
            shutdown_rx.clone(),
        )
    });

    let listen_addr = args.listen.clone().unwrap_or_else(|| config.listen_addr.clone());
    let listener = TcpListener::bind(&listen_addr).await?;
    info!(
        "Serving {} tenants with {} warming",
        config.tenants.len(),
        if config.warming.enabled { "in-process" } else { "external" }
    );

    server::serve(listener, state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    })
    .await?;

    if let Some(task) = warming_task
        && let Err(e) = task.await
    {
        error!("Warming loop ended abnormally: {}", e);
    }
    Ok(())
}

fn build_state(config: &Config) -> Result<(AppState, Arc<WarmingScheduler>), AppError> {
    let cache = build_cache_store(&config.cache, config.http_timeout_seconds)?;
    let durable = build_durable_store(&config.cache, config.http_timeout_seconds)?;
    let upstream = HttpUpstreamClient::with_timeout(&config.api_domain, config.http_timeout_seconds)?;
    let tenants = StaticTenantDirectory::new(config.tenants.clone());

    let service = Arc::new(
        DiscoveryService::new(
            Arc::new(tenants),
            Arc::new(upstream),
            cache,
            DiscoverySettings::from_config(config),
        )
        .with_durable_store(durable),
    );
    let scheduler = Arc::new(WarmingScheduler::new(Arc::clone(&service), &config.warming));

    let state = AppState {
        service,
        warming: Arc::clone(&scheduler),
        cron_secret: config.cron_secret.clone(),
    };
    Ok((state, scheduler))
}
