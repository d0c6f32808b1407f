//! Provisioning orchestrator
//!
//! Drives the three-stage workspace creation:
//!
//! ```text
//! Idle → CreatingCoordinationService → AwaitingCoordinationService
//!      → CreatingBroker → AwaitingBroker
//!      → CreatingWorker → AwaitingWorker → Complete
//! ```
//!
//! Any `Creating*` or `Awaiting*` state can move to `Failed(stage)`. Already
//! created clusters are handed to the [`CompensationHook`] and otherwise left
//! running.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::names::{sanitize_service_name, RunAllocator};
use super::poller::{PollConfig, ReadinessPoller, Sleeper, TimeoutError};
use super::request::ProvisioningRequest;
use super::validation::{checked_port, validate, ValidationError};
use crate::client::{
    BrokerParams, ClusterDescriptor, ClusterKind, RequestError, ServiceClient, WorkerParams,
    ZookeeperParams,
};
use crate::config::{ProvisionerConfig, ReadinessPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "kebab-case")]
pub enum ProvisioningState {
    Idle,
    CreatingCoordinationService,
    AwaitingCoordinationService,
    CreatingBroker,
    AwaitingBroker,
    CreatingWorker,
    AwaitingWorker,
    Complete,
    Failed(ClusterKind),
}

impl ProvisioningState {
    fn creating(kind: ClusterKind) -> Self {
        match kind {
            ClusterKind::CoordinationService => ProvisioningState::CreatingCoordinationService,
            ClusterKind::Broker => ProvisioningState::CreatingBroker,
            ClusterKind::Worker => ProvisioningState::CreatingWorker,
        }
    }

    fn awaiting(kind: ClusterKind) -> Self {
        match kind {
            ClusterKind::CoordinationService => ProvisioningState::AwaitingCoordinationService,
            ClusterKind::Broker => ProvisioningState::AwaitingBroker,
            ClusterKind::Worker => ProvisioningState::AwaitingWorker,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Complete | ProvisioningState::Failed(_))
    }
}

/// Why a stage failed
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error("create request failed: {0}")]
    Request(#[from] RequestError),

    #[error("readiness check failed: {0}")]
    Readiness(#[from] TimeoutError),
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("A provisioning run is already in progress")]
    Busy,

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: ClusterKind,
        #[source]
        source: StageFailure,
        /// Clusters created before the failure; they are left running
        created: Vec<ClusterDescriptor>,
    },
}

impl ProvisioningError {
    /// The stage that failed, if the run got past validation
    pub fn stage(&self) -> Option<ClusterKind> {
        match self {
            ProvisioningError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Outcome of the readiness wait for one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Readiness {
    Running { attempts: u32 },
    TimedOut(TimeoutError),
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub cluster: ClusterDescriptor,
    pub readiness: Readiness,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningResult {
    pub run_id: Uuid,
    pub coordination_service_name: String,
    pub broker_name: String,
    pub worker_name: String,
    pub stages: Vec<StageReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisioningResult {
    /// Stages that were passed without their cluster reporting running
    pub fn timed_out_stages(&self) -> Vec<ClusterKind> {
        self.stages
            .iter()
            .filter(|s| matches!(s.readiness, Readiness::TimedOut(_)))
            .map(|s| s.cluster.kind)
            .collect()
    }
}

/// Called when a run aborts, with every cluster created so far
#[async_trait]
pub trait CompensationHook: Send + Sync {
    async fn compensate(&self, failed_stage: ClusterKind, created: &[ClusterDescriptor]);
}

/// Leaves partially provisioned clusters in place
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompensation;

#[async_trait]
impl CompensationHook for NoopCompensation {
    async fn compensate(&self, failed_stage: ClusterKind, created: &[ClusterDescriptor]) {
        if !created.is_empty() {
            warn!(
                "{} stage failed; leaving {} created cluster(s) running: {}",
                failed_stage,
                created.len(),
                created
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
}

/// Runs provisioning requests one at a time against a [`ServiceClient`]
pub struct Provisioner {
    client: Arc<dyn ServiceClient>,
    poller: ReadinessPoller,
    policy: ReadinessPolicy,
    compensation: Arc<dyn CompensationHook>,
    in_flight: Mutex<()>,
    state_tx: watch::Sender<ProvisioningState>,
}

/// Accumulated progress of a single run
#[derive(Default)]
struct RunProgress {
    created: Vec<ClusterDescriptor>,
    stages: Vec<StageReport>,
}

impl Provisioner {
    pub fn new(client: Arc<dyn ServiceClient>, config: &ProvisionerConfig) -> Self {
        let (state_tx, _) = watch::channel(ProvisioningState::Idle);
        Self {
            poller: ReadinessPoller::new(client.clone(), PollConfig::from(config)),
            client,
            policy: config.readiness_policy,
            compensation: Arc::new(NoopCompensation),
            in_flight: Mutex::new(()),
            state_tx,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.poller = self.poller.with_sleeper(sleeper);
        self
    }

    pub fn with_compensation(mut self, hook: Arc<dyn CompensationHook>) -> Self {
        self.compensation = hook;
        self
    }

    pub fn with_readiness_policy(mut self, policy: ReadinessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Observe state transitions of the current run
    pub fn subscribe(&self) -> watch::Receiver<ProvisioningState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ProvisioningState {
        *self.state_tx.borrow()
    }

    /// Validate `request` and run all three stages.
    ///
    /// Validation happens before any backend call. A second call while a run
    /// is in flight returns [`ProvisioningError::Busy`] instead of waiting.
    pub async fn provision(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<ProvisioningResult, ProvisioningError> {
        validate(request)?;
        let client_port = checked_port(request.client_port)?;

        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| ProvisioningError::Busy)?;

        let run_id = Uuid::new_v4();
        let span = info_span!("provision", run_id = %run_id);
        self.run(request, client_port, run_id).instrument(span).await
    }

    async fn run(
        &self,
        request: &ProvisioningRequest,
        client_port: u16,
        run_id: Uuid,
    ) -> Result<ProvisioningResult, ProvisioningError> {
        let started_at = Utc::now();
        let mut alloc = RunAllocator::new(client_port);
        let mut progress = RunProgress::default();

        info!(
            "Provisioning workspace on {} node(s), client port {}",
            request.node_names.len(),
            client_port
        );

        // The worker keeps the user's service name, so reserve it first
        let worker_name = alloc.claim_name(sanitize_service_name(&request.service_name_prefix));

        let kind = ClusterKind::CoordinationService;
        let params = ZookeeperParams {
            name: alloc.service_name(),
            client_port,
            peer_port: alloc.port(),
            election_port: alloc.port(),
            node_names: request.node_names.clone(),
        };
        self.transition(ProvisioningState::creating(kind));
        let zookeeper = match self.client.create_coordination_service(&params).await {
            Ok(cluster) => cluster,
            Err(e) => return Err(self.fail(kind, e.into(), progress).await),
        };
        let zookeeper_cluster_name = zookeeper.name.clone();
        self.await_stage(zookeeper, &mut progress).await?;

        let kind = ClusterKind::Broker;
        let params = BrokerParams {
            name: alloc.service_name(),
            zookeeper_cluster_name: zookeeper_cluster_name.clone(),
            client_port,
            exporter_port: alloc.port(),
            jmx_port: alloc.port(),
            node_names: request.node_names.clone(),
        };
        self.transition(ProvisioningState::creating(kind));
        let broker = match self.client.create_broker(&params).await {
            Ok(cluster) => cluster,
            Err(e) => return Err(self.fail(kind, e.into(), progress).await),
        };
        let broker_cluster_name = broker.name.clone();
        self.await_stage(broker, &mut progress).await?;

        let kind = ClusterKind::Worker;
        let params = WorkerParams {
            name: worker_name,
            broker_cluster_name: broker_cluster_name.clone(),
            client_port,
            jmx_port: alloc.port(),
            plugins: request.plugins.clone(),
            node_names: request.node_names.clone(),
        };
        self.transition(ProvisioningState::creating(kind));
        let worker = match self.client.create_worker(&params).await {
            Ok(cluster) => cluster,
            Err(e) => return Err(self.fail(kind, e.into(), progress).await),
        };
        let worker_cluster_name = worker.name.clone();
        self.await_stage(worker, &mut progress).await?;

        self.transition(ProvisioningState::Complete);
        info!(
            "Workspace ready: zookeeper={}, broker={}, worker={}",
            zookeeper_cluster_name, broker_cluster_name, worker_cluster_name
        );

        Ok(ProvisioningResult {
            run_id,
            coordination_service_name: zookeeper_cluster_name,
            broker_name: broker_cluster_name,
            worker_name: worker_cluster_name,
            stages: progress.stages,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Poll the freshly created cluster and apply the readiness policy
    async fn await_stage(
        &self,
        cluster: ClusterDescriptor,
        progress: &mut RunProgress,
    ) -> Result<(), ProvisioningError> {
        let kind = cluster.kind;
        progress.created.push(cluster.clone());
        self.transition(ProvisioningState::awaiting(kind));

        let readiness = match self.poller.await_running(&cluster.name).await {
            Ok(outcome) => Readiness::Running {
                attempts: outcome.attempts,
            },
            Err(timeout) => match self.policy {
                ReadinessPolicy::Fail => {
                    return Err(self.fail(kind, timeout.into(), std::mem::take(progress)).await);
                }
                ReadinessPolicy::Proceed => {
                    warn!("{} cluster not confirmed running, continuing: {}", kind, timeout);
                    Readiness::TimedOut(timeout)
                }
            },
        };

        progress.stages.push(StageReport { cluster, readiness });
        Ok(())
    }

    async fn fail(
        &self,
        stage: ClusterKind,
        source: StageFailure,
        progress: RunProgress,
    ) -> ProvisioningError {
        error!("Provisioning aborted at {} stage: {}", stage, source);
        self.transition(ProvisioningState::Failed(stage));
        self.compensation.compensate(stage, &progress.created).await;
        ProvisioningError::StageFailed {
            stage,
            source,
            created: progress.created,
        }
    }

    fn transition(&self, state: ProvisioningState) {
        info!(?state, "Provisioning state changed");
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::service::mock::{MockCall, MockServiceClient};
    use crate::client::ContainerState;
    use crate::provision::poller::fake::RecordingSleeper;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    fn request() -> ProvisioningRequest {
        ProvisioningRequest::new(
            "Cluster00",
            Some(5500),
            vec!["node-1".to_string(), "node-2".to_string()],
        )
        .with_plugins(vec!["plugin-a".to_string()])
    }

    fn provisioner(client: Arc<MockServiceClient>) -> Provisioner {
        Provisioner::new(client, &ProvisionerConfig::default())
            .with_sleeper(Arc::new(RecordingSleeper::default()))
    }

    #[derive(Default)]
    struct RecordingCompensation {
        calls: StdMutex<Vec<(ClusterKind, Vec<String>)>>,
    }

    #[async_trait]
    impl CompensationHook for RecordingCompensation {
        async fn compensate(&self, failed_stage: ClusterKind, created: &[ClusterDescriptor]) {
            self.calls.lock().unwrap().push((
                failed_stage,
                created.iter().map(|c| c.name.clone()).collect(),
            ));
        }
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let client = Arc::new(MockServiceClient::new());
        let provisioner = provisioner(client.clone());

        let result = assert_ok!(provisioner.provision(&request()).await);

        assert_eq!(provisioner.state(), ProvisioningState::Complete);
        assert_eq!(client.create_count(ClusterKind::CoordinationService), 1);
        assert_eq!(client.create_count(ClusterKind::Broker), 1);
        assert_eq!(client.create_count(ClusterKind::Worker), 1);
        assert_eq!(result.stages.len(), 3);
        assert!(result.timed_out_stages().is_empty());
        assert_eq!(result.worker_name, "luster00");

        let mut names = vec![
            result.coordination_service_name.clone(),
            result.broker_name.clone(),
            result.worker_name.clone(),
        ];
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 3);
    }

    #[tokio::test]
    async fn test_names_threaded_between_stages() {
        let client = Arc::new(MockServiceClient::new());
        let result = provisioner(client.clone())
            .provision(&request())
            .await
            .unwrap();

        let broker = client.create_body(ClusterKind::Broker).unwrap();
        assert_eq!(
            broker["zookeeperClusterName"],
            result.coordination_service_name.as_str()
        );
        let worker = client.create_body(ClusterKind::Worker).unwrap();
        assert_eq!(worker["brokerClusterName"], result.broker_name.as_str());
        assert_eq!(worker["plugins"][0], "plugin-a");
        assert_eq!(worker["clientPort"], 5500);

        let zk = client.create_body(ClusterKind::CoordinationService).unwrap();
        assert_ne!(zk["peerPort"], zk["electionPort"]);
        assert_eq!(zk["nodeNames"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_calls_are_strictly_ordered() {
        let client = Arc::new(MockServiceClient::new());
        let result = provisioner(client.clone())
            .provision(&request())
            .await
            .unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), 6);
        assert!(matches!(calls[0], MockCall::Create(ClusterKind::CoordinationService, _)));
        assert_eq!(calls[1], MockCall::Status(result.coordination_service_name.clone()));
        assert!(matches!(calls[2], MockCall::Create(ClusterKind::Broker, _)));
        assert_eq!(calls[3], MockCall::Status(result.broker_name.clone()));
        assert!(matches!(calls[4], MockCall::Create(ClusterKind::Worker, _)));
        assert_eq!(calls[5], MockCall::Status(result.worker_name.clone()));
    }

    #[tokio::test]
    async fn test_broker_rejection_aborts_before_worker() {
        let client = Arc::new(MockServiceClient::new().rejecting(ClusterKind::Broker));
        let compensation = Arc::new(RecordingCompensation::default());
        let provisioner = provisioner(client.clone()).with_compensation(compensation.clone());

        let err = provisioner.provision(&request()).await.unwrap_err();

        assert_eq!(err.stage(), Some(ClusterKind::Broker));
        assert!(matches!(
            err,
            ProvisioningError::StageFailed {
                source: StageFailure::Request(RequestError::Rejected { .. }),
                ..
            }
        ));
        assert_eq!(provisioner.state(), ProvisioningState::Failed(ClusterKind::Broker));
        assert_eq!(client.create_count(ClusterKind::Worker), 0);

        let calls = compensation.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, ClusterKind::Broker);
        assert_eq!(calls[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_calls() {
        let client = Arc::new(MockServiceClient::new());
        let provisioner = provisioner(client.clone());

        let bad_port = ProvisioningRequest::new("svc", Some(80), vec!["n".to_string()]);
        let err = assert_err!(provisioner.provision(&bad_port).await);
        assert!(matches!(
            err,
            ProvisioningError::Validation(ValidationError::InvalidPort(Some(80)))
        ));

        let no_nodes = ProvisioningRequest::new("svc", Some(6000), vec![]);
        let err = provisioner.provision(&no_nodes).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::Validation(ValidationError::MissingNodes)
        ));

        assert!(client.calls().is_empty());
        assert_eq!(provisioner.state(), ProvisioningState::Idle);
    }

    #[tokio::test]
    async fn test_timeout_proceeds_by_default() {
        // coordination service never reports running; later stages do
        let mut states = vec![ContainerState::Pending; 6];
        states.push(ContainerState::Running);
        states.push(ContainerState::Running);
        let client = Arc::new(MockServiceClient::new().with_states(states));

        let result = provisioner(client.clone())
            .provision(&request())
            .await
            .unwrap();

        assert_eq!(
            result.timed_out_stages(),
            vec![ClusterKind::CoordinationService]
        );
        assert_eq!(client.status_count(), 8);
        assert_eq!(client.create_count(ClusterKind::Worker), 1);
    }

    #[tokio::test]
    async fn test_timeout_fails_under_fail_policy() {
        let client =
            Arc::new(MockServiceClient::new().with_default_state(ContainerState::Pending));
        let provisioner =
            provisioner(client.clone()).with_readiness_policy(ReadinessPolicy::Fail);

        let err = provisioner.provision(&request()).await.unwrap_err();

        match err {
            ProvisioningError::StageFailed {
                stage,
                source: StageFailure::Readiness(timeout),
                created,
            } => {
                assert_eq!(stage, ClusterKind::CoordinationService);
                assert_eq!(timeout.attempts, 6);
                assert_eq!(created.len(), 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(client.create_count(ClusterKind::Broker), 0);
        assert_eq!(client.status_count(), 6);
    }

    #[tokio::test]
    async fn test_state_transitions_observed() {
        let client = Arc::new(MockServiceClient::new());
        let provisioner = provisioner(client);
        let mut rx = provisioner.subscribe();
        assert_eq!(*rx.borrow_and_update(), ProvisioningState::Idle);

        provisioner.provision(&request()).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), ProvisioningState::Complete);
        assert!(provisioner.state().is_terminal());
    }

    struct GateSleeper {
        gate: Notify,
    }

    #[async_trait]
    impl Sleeper for GateSleeper {
        async fn sleep(&self, _duration: std::time::Duration) {
            self.gate.notified().await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let client = Arc::new(MockServiceClient::new().with_states(vec![ContainerState::Pending]));
        let sleeper = Arc::new(GateSleeper {
            gate: Notify::new(),
        });
        let provisioner = Arc::new(
            Provisioner::new(client, &ProvisionerConfig::default()).with_sleeper(sleeper.clone()),
        );
        let mut rx = provisioner.subscribe();

        let first = {
            let provisioner = provisioner.clone();
            tokio::spawn(async move { provisioner.provision(&request()).await })
        };

        rx.wait_for(|s| *s == ProvisioningState::AwaitingCoordinationService)
            .await
            .unwrap();

        let second = provisioner.provision(&request()).await;
        assert!(matches!(second, Err(ProvisioningError::Busy)));

        sleeper.gate.notify_one();
        let result = first.await.unwrap();
        assert!(result.is_ok());
    }
}
