//! CLI module for workspace-provisioner
//!
//! Subcommands:
//! - `workspace-provisioner provision` - Create zookeeper, broker and worker clusters
//! - `workspace-provisioner validate` - Check a request without calling the backend
//! - `workspace-provisioner status` - Show a cluster's container state

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::provision::ProvisioningRequest;

#[derive(Parser, Debug)]
#[command(name = "workspace-provisioner")]
#[command(about = "Provision the clusters backing a stream-processing workspace")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.workspace-provisioner/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a .env file loaded before the config
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    /// Configurator API base URL (overrides the config file)
    #[arg(long, env = "PROVISIONER_API_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a workspace: zookeeper, then broker, then worker
    Provision(ProvisionArgs),

    /// Validate a workspace request without contacting the backend
    Validate(RequestArgs),

    /// Show the container state of a cluster
    Status(StatusArgs),
}

/// Workspace request fields, shared by `provision` and `validate`
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Service name; sanitized to [0-9a-z], at most 30 characters
    #[arg(long, default_value = "")]
    pub name: String,

    /// Client port shared by all three clusters (5000-65535)
    #[arg(short, long, allow_negative_numbers = true)]
    pub port: Option<i64>,

    /// Node to deploy on (repeatable)
    #[arg(short, long = "node", value_name = "NODE")]
    pub nodes: Vec<String>,

    /// Worker plugin id (repeatable)
    #[arg(long = "plugin", value_name = "PLUGIN")]
    pub plugins: Vec<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> ProvisioningRequest {
        ProvisioningRequest::new(self.name.clone(), self.port, self.nodes.clone())
            .with_plugins(self.plugins.clone())
    }
}

/// Arguments for the provision command
#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Abort if a cluster never reports running instead of continuing
    #[arg(long)]
    pub fail_on_timeout: bool,

    /// Validate and show the plan without creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Cluster name
    pub cluster: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap_provision() {
        let cli = Cli::parse_from([
            "workspace-provisioner",
            "provision",
            "--name",
            "cluster00",
            "--port",
            "5000",
            "--node",
            "node-1",
            "-n",
            "node-2",
            "--plugin",
            "p1",
        ]);
        match cli.command {
            Commands::Provision(args) => {
                let request = args.request.to_request();
                assert_eq!(request.service_name_prefix, "cluster00");
                assert_eq!(request.client_port, Some(5000));
                assert_eq!(request.node_names, vec!["node-1", "node-2"]);
                assert_eq!(request.plugins, vec!["p1"]);
                assert!(!args.dry_run);
                assert!(!args.fail_on_timeout);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_clap_negative_port_reaches_validator() {
        let cli = Cli::parse_from(["workspace-provisioner", "validate", "--port", "-1"]);
        match cli.command {
            Commands::Validate(args) => assert_eq!(args.port, Some(-1)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_clap_global_flags() {
        let cli = Cli::parse_from([
            "workspace-provisioner",
            "-vv",
            "--api-url",
            "http://configurator:12345",
            "status",
            "zk00",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.api_url.as_deref(), Some("http://configurator:12345"));
        assert!(matches!(cli.command, Commands::Status(ref s) if s.cluster == "zk00"));
    }
}
