use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use pricewarden::config::AppConfig;
use pricewarden::extractor::PriceExtractor;
use pricewarden::fetch::{HttpClient, UrlExpander};
use pricewarden::monitor::ScanMonitor;
use pricewarden::notifier::{EmailNotifier, Notifier};
use pricewarden::product_manager::ProductManager;
use pricewarden::registry::SiteRegistry;
use pricewarden::resolver::UrlResolver;
use pricewarden::scheduler::ScanScheduler;
use pricewarden::store::ProductStore;
use pricewarden::web::{self, AppState};

#[derive(Debug, Parser)]
#[command(name = "pricewarden", about = "Price-drop tracking service")]
struct Args {
    /// Override the configured bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewarden=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("Starting Price Warden...");

    let registry = Arc::new(SiteRegistry::from_entries(&config.sites)?);
    info!(
        "Supported sites: {}",
        registry.supported_hosts().join(", ")
    );

    let http = Arc::new(HttpClient::new(&config.scraper)?);
    let expander: Arc<dyn UrlExpander> = http.clone();
    let resolver = UrlResolver::new(Arc::clone(&registry), expander);
    let extractor = Arc::new(PriceExtractor::new(Arc::clone(&registry), http));

    let store = ProductStore::connect(&config.database).await?;
    let notifier: Arc<dyn Notifier> =
        Arc::new(EmailNotifier::new(config.notifications.smtp.clone())?);

    let monitor = Arc::new(ScanMonitor::new(
        store.clone(),
        extractor,
        notifier,
        &config.scraper,
    ));
    let manager = Arc::new(ProductManager::new(
        store,
        resolver,
        registry,
        Arc::clone(&monitor),
    ));

    let mut scheduler = ScanScheduler::new(monitor, config.scheduler.clone()).await?;
    scheduler.start().await?;

    let state = AppState {
        manager,
        scheduler: Arc::new(tokio::sync::Mutex::new(scheduler)),
        config: config.clone(),
    };

    let server_state = state.clone();
    tokio::select! {
        result = web::serve(config, server_state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    state.scheduler.lock().await.shutdown().await?;

    Ok(())
}
