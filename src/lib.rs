#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use crate::adapters::database::DbPool;
use crate::adapters::database::chat_repo::ChatRepository;
use crate::config::Config;
use crate::services::chat_service::ChatService;
use crate::services::health_service::HealthService;
use crate::services::registry::Registry;
use crate::services::update_publisher::{UpdateBroker, UpdatePublisher};
use std::sync::Arc;
use tokio::sync::watch;

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod proto;
pub mod services;
pub mod telemetry;

/// Applies the embedded schema migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips `shutdown_tx` to `true` on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// The wired application services.
#[derive(Debug)]
pub struct App {
    pub chat_service: ChatService,
    pub health_service: HealthService,
}

/// Wires the services from already-initialized infrastructure.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    broker: Option<Arc<dyn UpdateBroker>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, broker: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_broker(mut self, broker: Arc<dyn UpdateBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// # Errors
    /// Returns an error if the database or the broker was not provided.
    pub fn build(self) -> anyhow::Result<App> {
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("database pool is required"))?;
        let broker = self.broker.ok_or_else(|| anyhow::anyhow!("update broker is required"))?;

        let updates = UpdatePublisher::new(Arc::clone(&broker), &self.config.broker);
        let registry = Registry::new(pool.clone(), ChatRepository::new(), updates, &self.config.messaging);

        Ok(App {
            chat_service: ChatService::new(registry, self.config.messaging.clone()),
            health_service: HealthService::new(pool, broker, self.config.health),
        })
    }
}
