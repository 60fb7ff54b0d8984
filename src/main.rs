use std::sync::Arc;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use modrelay::adapters::{FileCredentialsProvider, ReqwestHttpClient, TungsteniteConnector};
use modrelay::review::LoggingReviewSink;
use modrelay::startup::{self, RelayConfig};
use modrelay::traits::CredentialsProvider;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("modrelay {}", VERSION);
        std::process::exit(0);
    }

    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env()?.with_open_browser(true);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: RelayConfig) -> Result<()> {
    let provider: Arc<dyn CredentialsProvider> = match &config.tokens_path {
        Some(path) => Arc::new(FileCredentialsProvider::with_path(path)),
        None => Arc::new(FileCredentialsProvider::new()?),
    };

    let relay = startup::start(
        &config,
        Arc::new(ReqwestHttpClient::new()),
        provider,
        Arc::new(TungsteniteConnector::new()),
        LoggingReviewSink::new(config.posting_channel_id.clone()),
    )
    .await?;

    let shutdown = relay.manager.shutdown_handle();
    let mut session = tokio::spawn(relay.manager.run());
    let mut validator = relay.validator;
    info!(version = VERSION, "modrelay running");

    tokio::select! {
        result = &mut session => {
            validator.abort();
            result??;
            Ok(())
        }
        result = &mut validator => {
            // Validation only ends when the credential is gone for good.
            shutdown.shutdown();
            let _ = session.await;
            let err = result?;
            error!(error = %err, code = err.error_code(), "Credential lost");
            Err(eyre!(err))
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted, shutting down");
            shutdown.shutdown();
            validator.abort();
            session.await??;
            Ok(())
        }
    }
}
