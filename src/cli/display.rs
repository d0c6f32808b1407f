//! Display formatting for CLI output
//!
//! SBIO pattern: Pure functions that format data for display

use crate::client::ContainerStatus;
use crate::config::ProvisionerConfig;
use crate::provision::{
    sanitize_service_name, ProvisioningError, ProvisioningRequest, ProvisioningResult, Readiness,
};

// ============================================================================
// Table formatting helpers
// ============================================================================

/// Align `rows` under `headers`; every row has one cell per header
pub fn format_table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.\n".to_string();
    }

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| rows.iter().map(|r| r[i].len()).fold(h.len(), usize::max))
        .collect();

    let header_row: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    std::iter::once(header_row)
        .chain(rows)
        .map(|row| {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("   ");
            format!("{}\n", line.trim_end())
        })
        .collect()
}

// ============================================================================
// Provisioning display
// ============================================================================

/// Describe what a run would do (dry-run and `validate`)
pub fn format_plan(request: &ProvisioningRequest, config: &ProvisionerConfig) -> String {
    let mut output = String::new();
    let worker_name = sanitize_service_name(&request.service_name_prefix);

    output.push_str(&format!("Backend: {}\n", config.api_url));
    output.push_str(&format!(
        "Client port: {}\n",
        request
            .client_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    output.push_str(&format!("Nodes: {}\n", request.node_names.join(", ")));
    if !request.plugins.is_empty() {
        output.push_str(&format!("Plugins: {}\n", request.plugins.join(", ")));
    }
    output.push_str("\nStages:\n");
    output.push_str("  1. zookeeper  (generated name)\n");
    output.push_str("  2. broker     (generated name, bound to zookeeper)\n");
    if worker_name.is_empty() {
        output.push_str("  3. worker     (generated name, bound to broker)\n");
    } else {
        output.push_str(&format!("  3. worker     {} (bound to broker)\n", worker_name));
    }
    output.push_str(&format!(
        "\nReadiness: up to {} checks every {}ms, on timeout: {:?}\n",
        config.max_retries + 1,
        config.poll_interval_ms,
        config.readiness_policy
    ));
    output.push_str("\nValidation: PASSED\n");

    output
}

/// Format a completed run
pub fn format_result(result: &ProvisioningResult) -> String {
    let headers = &["STAGE", "NAME", "BOUND TO", "READINESS"];
    let rows: Vec<Vec<String>> = result
        .stages
        .iter()
        .map(|s| {
            vec![
                s.cluster.kind.to_string(),
                s.cluster.name.clone(),
                s.cluster
                    .bound_cluster_name
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                match &s.readiness {
                    Readiness::Running { attempts } => format!("running ({} checks)", attempts),
                    Readiness::TimedOut(t) => format!("NOT READY (last: {})", t.last_state),
                },
            ]
        })
        .collect();

    let mut output = format!("Workspace provisioned (run {})\n\n", result.run_id);
    output.push_str(&format_table(headers, rows));

    let timed_out = result.timed_out_stages();
    if !timed_out.is_empty() {
        output.push_str(&format!(
            "\nWarning: {} cluster(s) never reported running\n",
            timed_out.len()
        ));
    }
    output
}

/// Format a failed run, listing clusters left behind
pub fn format_failure(error: &ProvisioningError) -> String {
    let mut output = format!("Error: {}\n", error);
    if let ProvisioningError::StageFailed { created, .. } = error {
        if !created.is_empty() {
            output.push_str("\nClusters left running:\n");
            for cluster in created {
                output.push_str(&format!("  - {} ({})\n", cluster.name, cluster.kind));
            }
        }
    }
    output
}

/// Format a single container status
pub fn format_status(status: &ContainerStatus) -> String {
    format_table(
        &["CLUSTER", "STATE"],
        vec![vec![status.cluster_name.clone(), status.state.to_string()]],
    )
}
