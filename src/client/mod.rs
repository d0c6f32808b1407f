pub mod service;
pub mod types;

pub use service::{
    HttpServiceClient, RequestError, ServiceClient, COORDINATION_CREATE_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{
    BrokerParams, ClusterDescriptor, ClusterKind, ContainerState, ContainerStatus, WorkerParams,
    ZookeeperParams,
};
