//! The workspace provisioning workflow
//!
//! - [`validation`]: rejects bad requests before any backend call
//! - [`names`]: per-run cluster names and auxiliary ports
//! - [`poller`]: waits for a cluster's first container to run
//! - [`orchestrator`]: sequences coordination service → broker → worker

pub mod names;
pub mod orchestrator;
pub mod poller;
pub mod request;
pub mod validation;

pub use crate::client::{ClusterDescriptor, ClusterKind, ContainerState, ContainerStatus};
pub use names::{sanitize_service_name, RunAllocator};
pub use orchestrator::{
    CompensationHook, NoopCompensation, ProvisioningError, ProvisioningResult, ProvisioningState,
    Provisioner, Readiness, StageFailure, StageReport,
};
pub use poller::{PollConfig, PollOutcome, ReadinessPoller, Sleeper, TimeoutError, TokioSleeper};
pub use request::ProvisioningRequest;
pub use validation::{checked_port, validate, ValidationError, MAX_CLIENT_PORT, MIN_CLIENT_PORT};
