//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, I/O is handled by caller

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::{Cli, ProvisionArgs, RequestArgs, StatusArgs};
use crate::client::{ContainerStatus, HttpServiceClient, RequestError, ServiceClient};
use crate::config::{self, ConfigError, ProvisionerConfig, ReadinessPolicy};
use crate::provision::{
    validate, ProvisioningError, ProvisioningRequest, ProvisioningResult, Provisioner,
    ValidationError,
};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Request failed: {0}")]
    Request(#[from] RequestError),

    #[error("Failed to load env file {path}: {message}")]
    EnvFile { path: String, message: String },
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

/// Find `--env-file` in raw arguments.
///
/// The file has to be loaded before `Cli::parse` so env-backed flags and
/// `RUST_LOG` see its values.
pub fn env_file_arg<I, S>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into);
    while let Some(arg) = args.next() {
        if arg == "--" {
            return None;
        }
        if arg == "--env-file" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.to_str().and_then(|a| a.strip_prefix("--env-file=")) {
            return Some(PathBuf::from(path));
        }
    }
    None
}

/// Load a `.env` file into the process environment
pub fn load_env_file(path: &Path) -> CommandResult<()> {
    dotenvy::from_path(path).map_err(|e| CommandError::EnvFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load the config file and apply CLI overrides
pub fn resolve_config(cli: &Cli) -> CommandResult<ProvisionerConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Build and validate a request without touching the backend
pub fn plan_request(args: &RequestArgs) -> CommandResult<ProvisioningRequest> {
    let request = args.to_request();
    validate(&request)?;
    Ok(request)
}

/// Run the full provisioning workflow
pub async fn run_provision(
    config: &ProvisionerConfig,
    args: &ProvisionArgs,
) -> CommandResult<ProvisioningResult> {
    let client: Arc<dyn ServiceClient> = Arc::new(HttpServiceClient::from_config(config));
    run_provision_with(client, config, args).await
}

/// Run the workflow against any backend client
pub async fn run_provision_with(
    client: Arc<dyn ServiceClient>,
    config: &ProvisionerConfig,
    args: &ProvisionArgs,
) -> CommandResult<ProvisioningResult> {
    let request = plan_request(&args.request)?;

    let mut provisioner = Provisioner::new(client, config);
    if args.fail_on_timeout {
        provisioner = provisioner.with_readiness_policy(ReadinessPolicy::Fail);
    }

    Ok(provisioner.provision(&request).await?)
}

/// Fetch a cluster's container status once
pub async fn run_status(
    config: &ProvisionerConfig,
    args: &StatusArgs,
) -> CommandResult<ContainerStatus> {
    let client = HttpServiceClient::from_config(config);
    Ok(client.fetch_container_status(&args.cluster).await?)
}
