//! Stow server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use stow_core::config::{AppConfig, SecretKeyConfig, SigningConfig};
use stow_server::{AppState, create_router};
use stow_signer::{SecretKey, UploadSigner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stow - a chunked upload server
#[derive(Parser, Debug)]
#[command(name = "stowd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "STOW_CONFIG", default_value = "config/server.toml")]
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

    tracing::info!("Stow v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("STOW_") && key != "STOW_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: stowd --config /path/to/config.toml\n  \
             2. Environment variables: STOW_SERVER__BIND=0.0.0.0:8080 \
             STOW_STORAGE__TYPE=filesystem STOW_STORAGE__PATH=./data stowd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set STOW_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("STOW_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Initialize storage backend
    let storage = stow_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!("Storage backend initialized");

    // Verify storage before accepting requests, so the server never reports
    // healthy while its backing store is unusable.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    // Initialize signer if configured
    let signer = if let Some(signing_config) = &config.signing {
        Some(load_signer(signing_config).await?)
    } else {
        tracing::warn!("No signing key configured, the signature endpoint will be disabled");
        None
    };

    let state = AppState::new(config.clone(), storage, signer);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Load the upload signer from configuration.
async fn load_signer(config: &SigningConfig) -> Result<UploadSigner> {
    let secret = match &config.secret_key {
        SecretKeyConfig::File { path } => {
            let key_data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read key file: {}", path.display()))?;
            SecretKey::from_str_trimmed(&key_data).context("failed to parse signing key")?
        }
        SecretKeyConfig::Env { var } => {
            let key_data = std::env::var(var)
                .with_context(|| format!("signing key env var not set: {var}"))?;
            SecretKey::from_str_trimmed(&key_data).context("failed to parse signing key")?
        }
        SecretKeyConfig::Value { key } => {
            tracing::warn!("Using inline signing key (not recommended for production)");
            SecretKey::from_str_trimmed(key).context("failed to parse signing key")?
        }
    };

    tracing::info!(bucket = %config.expected_bucket, "Loaded signing key");
    Ok(UploadSigner::new(secret, config))
}
