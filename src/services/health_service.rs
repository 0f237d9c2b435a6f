use crate::adapters::database::DbPool;
use crate::config::HealthConfig;
use crate::services::update_publisher::UpdateBroker;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("chat-service");
        Self {
            status: meter
                .i64_gauge("chat_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    pool: DbPool,
    broker: Arc<dyn UpdateBroker>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(pool: DbPool, broker: Arc<dyn UpdateBroker>, config: HealthConfig) -> Self {
        Self { pool, broker, config, metrics: Metrics::new() }
    }

    /// Checks database connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the database is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        let outcome = match timeout(db_timeout, sqlx::query("SELECT 1").execute(&self.pool)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(format!("Database connection failed: {e:?}")),
            Err(_) => Err("Database connection timed out".to_string()),
        };
        self.record("database", outcome.is_ok());
        outcome
    }

    /// Checks that the update broker answers.
    ///
    /// # Errors
    /// Returns a string describing the failure if the broker is unreachable.
    pub async fn check_broker(&self) -> Result<(), String> {
        let broker_timeout = Duration::from_millis(self.config.broker_timeout_ms);

        let outcome = match timeout(broker_timeout, self.broker.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Broker connection failed: {e:?}")),
            Err(_) => Err("Broker connection timed out".to_string()),
        };
        self.record("broker", outcome.is_ok());
        outcome
    }

    fn record(&self, component: &'static str, healthy: bool) {
        self.metrics.status.record(i64::from(healthy), &[KeyValue::new("component", component)]);
    }
}
