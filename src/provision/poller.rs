//! Readiness polling
//!
//! After a create call returns, the cluster's containers are still starting.
//! The poller queries container status until the first container reports
//! running or the retry budget runs out. Waiting between queries goes through
//! a [`Sleeper`] so tests can skip real time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{ContainerState, ServiceClient};
use crate::config::{ProvisionerConfig, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_MS};

/// Suspension point between readiness queries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Yields to the tokio runtime for the requested duration
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Retries after the first query; total queries are `max_retries + 1`
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl From<&ProvisionerConfig> for PollConfig {
    fn from(config: &ProvisionerConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_retries: config.max_retries,
        }
    }
}

/// The retry budget ran out before the cluster reported running
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("cluster {cluster_name} not running after {attempts} attempts (last state: {last_state})")]
pub struct TimeoutError {
    pub cluster_name: String,
    pub attempts: u32,
    pub last_state: ContainerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    /// Number of status queries issued, including the successful one
    pub attempts: u32,
}

pub struct ReadinessPoller {
    client: Arc<dyn ServiceClient>,
    sleeper: Arc<dyn Sleeper>,
    config: PollConfig,
}

impl ReadinessPoller {
    pub fn new(client: Arc<dyn ServiceClient>, config: PollConfig) -> Self {
        Self {
            client,
            sleeper: Arc::new(TokioSleeper),
            config,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Wait until `cluster_name`'s first container is running.
    ///
    /// A failed status fetch counts as a non-running attempt. No sleep follows
    /// the final query.
    pub async fn await_running(&self, cluster_name: &str) -> Result<PollOutcome, TimeoutError> {
        let mut retries = 0u32;

        loop {
            let state = match self.client.fetch_container_status(cluster_name).await {
                Ok(status) => status.state,
                Err(e) => {
                    warn!("Container status for {} unavailable: {}", cluster_name, e);
                    ContainerState::Unknown
                }
            };

            if state == ContainerState::Running {
                debug!("Cluster {} running after {} attempt(s)", cluster_name, retries + 1);
                return Ok(PollOutcome {
                    attempts: retries + 1,
                });
            }

            if retries >= self.config.max_retries {
                return Err(TimeoutError {
                    cluster_name: cluster_name.to_string(),
                    attempts: retries + 1,
                    last_state: state,
                });
            }

            retries += 1;
            debug!(
                "Cluster {} is {}, retry {}/{} in {:?}",
                cluster_name, state, retries, self.config.max_retries, self.config.interval
            );
            self.sleeper.sleep(self.config.interval).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::RecordingSleeper;
    use super::*;
    use crate::client::service::mock::MockServiceClient;

    fn poller(client: Arc<MockServiceClient>, sleeper: Arc<RecordingSleeper>) -> ReadinessPoller {
        ReadinessPoller::new(client, PollConfig::default()).with_sleeper(sleeper)
    }

    #[tokio::test]
    async fn test_running_on_first_query() {
        let client = Arc::new(MockServiceClient::new());
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = poller(client.clone(), sleeper.clone())
            .await_running("zk")
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(client.status_count(), 1);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_running_after_pending() {
        let client = Arc::new(MockServiceClient::new().with_states(vec![
            ContainerState::Pending,
            ContainerState::Unknown,
        ]));
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = poller(client.clone(), sleeper.clone())
            .await_running("bk")
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 3);
        assert_eq!(sleeper.slept(), vec![Duration::from_millis(2000); 2]);
    }

    #[tokio::test]
    async fn test_budget_stops_after_sixth_query() {
        let client = Arc::new(MockServiceClient::new().with_default_state(ContainerState::Pending));
        let sleeper = Arc::new(RecordingSleeper::default());

        let err = poller(client.clone(), sleeper.clone())
            .await_running("wk")
            .await
            .unwrap_err();

        assert_eq!(client.status_count(), 6);
        assert_eq!(err.attempts, 6);
        assert_eq!(err.cluster_name, "wk");
        assert_eq!(err.last_state, ContainerState::Pending);
        // no sleep after the final query
        assert_eq!(sleeper.slept().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_state_keeps_polling() {
        let client = Arc::new(
            MockServiceClient::new()
                .with_states(vec![ContainerState::Failed])
                .with_default_state(ContainerState::Running),
        );
        let sleeper = Arc::new(RecordingSleeper::default());

        let outcome = poller(client, sleeper).await_running("zk").await.unwrap();
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_zero_budget_queries_once() {
        let client = Arc::new(MockServiceClient::new().with_default_state(ContainerState::Pending));
        let sleeper = Arc::new(RecordingSleeper::default());
        let config = PollConfig {
            interval: Duration::from_millis(10),
            max_retries: 0,
        };

        let err = ReadinessPoller::new(client.clone(), config)
            .with_sleeper(sleeper.clone())
            .await_running("zk")
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(client.status_count(), 1);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_yields() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(2)).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
