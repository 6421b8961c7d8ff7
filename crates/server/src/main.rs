//! Airlift server binary.

use airlift_core::config::AppConfig;
use airlift_server::{AppState, create_router};
use airlift_signer::ManifestSigner;
use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Airlift - a self-hosted OTA update server for Expo apps
#[derive(Parser, Debug)]
#[command(name = "airliftd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "AIRLIFT_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Airlift v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration; the file is optional, env vars can provide or
    // override everything.
    let mut figment = Figment::new();
    let config_path = std::path::Path::new(&args.config);
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("AIRLIFT_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Metadata store (optional; outages at startup are non-fatal)
    let store = match &config.metadata {
        Some(metadata_config) => match airlift_metadata::from_config(metadata_config).await {
            Ok(store) => {
                tracing::info!("Metadata store initialized");
                Some(store)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Metadata store connection failed");
                tracing::warn!("Running without database - admin features limited");
                None
            }
        },
        None => {
            tracing::warn!("No metadata store configured - admin features limited");
            None
        }
    };

    // CDN store (optional)
    let cdn = match &config.cdn {
        Some(cdn_config) => match airlift_storage::from_config(cdn_config) {
            Ok(cdn) => {
                tracing::info!(backend = cdn.backend_name(), "CDN configured");
                Some(cdn)
            }
            Err(e) => {
                tracing::warn!(error = %e, "CDN setup failed, assets will be served locally");
                None
            }
        },
        None => {
            tracing::info!("CDN not configured, assets will be served locally");
            None
        }
    };

    // Manifest signer (optional; an unparseable key downgrades to unsigned)
    let signer = match &config.signing {
        Some(signing_config) => {
            match ManifestSigner::from_pem_file(&signing_config.private_key_path) {
                Ok(signer) => {
                    tracing::info!("Code signing enabled");
                    Some(signer)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load private key");
                    tracing::warn!("Code signing will be disabled");
                    None
                }
            }
        }
        None => None,
    };

    // The updates directory must exist for local serving and ingestion.
    tokio::fs::create_dir_all(&config.server.updates_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create updates directory {}",
                config.server.updates_dir.display()
            )
        })?;

    // Keep cold-start platforms warm when publicly deployed.
    if config.server.has_public_hostname() {
        spawn_self_ping(config.server.hostname.clone());
    }

    let bind = config.server.bind.clone();
    let state = AppState::new(config, store, cdn, signer);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Ping our own health endpoint every 10 minutes so free-tier hosts don't
/// spin the process down.
fn spawn_self_ping(hostname: String) {
    let health_url = format!("{hostname}/api/health");
    tracing::info!(url = %health_url, "Self-ping enabled: every 10 minutes");

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(10 * 60));
        ticker.tick().await; // the first tick fires immediately

        loop {
            ticker.tick().await;
            match client.get(&health_url).send().await {
                Ok(_) => tracing::debug!("Self-ping successful"),
                Err(e) => tracing::warn!(error = %e, "Self-ping failed"),
            }
        }
    });
}
