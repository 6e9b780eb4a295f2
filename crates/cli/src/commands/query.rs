//! One-shot commands that go through the runtime: `status`, `fetch`, `resolve`.

use tracing::debug;
use waypoint_core::{
    types::ServiceRequest,
    upstream::{HealthSnapshot, ProbeReport},
};

use super::utils::{build_runtime, load_config, print_info, render_body, CliResult};

/// Runs one probe round over every service and prints the health snapshot.
pub async fn status(file: &str, json: bool) -> CliResult<()> {
    let runtime = build_runtime(load_config(file)?)?;

    let reports = runtime.prober().probe_all().await;
    debug!(services = reports.len(), "probe round complete");
    let snapshot = runtime.health_snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for report in &reports {
            print_info(&probe_line(report));
        }
        print!("{}", render_snapshot(&snapshot));
    }

    runtime.shutdown().await;
    Ok(())
}

/// Executes one GET against `service` and prints the body.
pub async fn fetch(file: &str, service: &str, path: &str) -> CliResult<()> {
    let runtime = build_runtime(load_config(file)?)?;

    let response = runtime.executor().execute(service, &ServiceRequest::get(path)).await?;
    print_info(&format!(
        "{} {} in {}ms from {}",
        service, response.status, response.latency_ms, response.endpoint
    ));
    println!("{}", render_body(&response.body));

    runtime.shutdown().await;
    Ok(())
}

/// Resolves `path` against a dual-source pair and prints the winner and body.
pub async fn resolve(file: &str, pair: &str, path: &str) -> CliResult<()> {
    let runtime = build_runtime(load_config(file)?)?;

    let lookup = runtime.resolve_pair(pair, path).await?;
    let value = lookup.value();
    print_info(&format!("{pair}: answered by {}", value.origin));
    println!("{}", render_body(&value.body));

    runtime.shutdown().await;
    Ok(())
}

fn probe_line(report: &ProbeReport) -> String {
    format!("probed {}: {} healthy, {} failed", report.service, report.healthy, report.failed)
}

fn render_snapshot(snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\nHealth at {}\n",
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for service in &snapshot.services {
        out.push_str(&format!(
            "\n{} ({} available, {} quarantined)\n",
            service.name, service.available_endpoints, service.quarantined_endpoints
        ));
        out.push_str(&format!(
            "  {:<40} {:<12} {:>8} {:>12}\n",
            "ENDPOINT", "STATE", "FAILURES", "LATENCY"
        ));
        for endpoint in &service.endpoints {
            let state = if endpoint.quarantined { "quarantined" } else { "available" };
            let latency = endpoint
                .smoothed_latency_ms
                .map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}ms"));
            out.push_str(&format!(
                "  {:<40} {:<12} {:>8} {:>12}\n",
                endpoint.url, state, endpoint.consecutive_failures, latency
            ));
            if let Some(error) = &endpoint.last_error {
                out.push_str(&format!("    last error: {error}\n"));
            }
        }
    }

    out
}
