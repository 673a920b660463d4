use crate::config::Config;
use crate::data::PgStore;
use crate::ingest::{IngestService, IngestSettings};
use crate::nlp::NlpClient;
use crate::utils::fmt_duration;
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::ConnectOptions;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long shutdown waits for the ingestion service to drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(35);

/// Main application struct containing all necessary components.
pub struct App {
    service: IngestService,
}

impl App {
    /// Create a new App instance with all necessary components initialized.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            min_connections = 0,
            max_connections = 4,
            acquire_timeout = "4s",
            idle_timeout = "2m",
            max_lifetime = "30m",
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let store = Arc::new(PgStore::new(db_pool));
        let nlp = Arc::new(NlpClient::new(
            config.summarize_url.clone(),
            config.sentiment_url.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        ));
        let service = IngestService::new(store, nlp, IngestSettings::from_config(&config));

        Ok(App { service })
    }

    /// Run the application: a single cycle with `--once`, otherwise the
    /// periodic service loop until a shutdown signal arrives.
    pub async fn run(self, once: bool) -> ExitCode {
        if once {
            let cancel = CancellationToken::new();
            return match self.service.run_cycle(&cancel).await {
                Ok(report) if report.failed == 0 => ExitCode::SUCCESS,
                Ok(_) => ExitCode::FAILURE,
                Err(_) => ExitCode::FAILURE,
            };
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn({
            let service = self.service.clone();
            async move { service.run(shutdown_rx).await }
        });

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = ?e, "Failed to listen for shutdown signal"),
        }

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
            warn!(
                timeout = fmt_duration(SHUTDOWN_TIMEOUT),
                "Ingestion service did not shut down in time"
            );
            return ExitCode::FAILURE;
        }

        ExitCode::SUCCESS
    }
}
