//! Running port-forwards from the command line

use anyhow::{bail, Context, Result};
use colored::Colorize;
use forward_lib::{ForwardService, ServiceRequest, StartOutcome};
use tabled::Tabled;

use crate::output::{
    color_environment, print_error, print_info, print_json, print_success, print_table,
    OutputFormat,
};

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Service")]
    label: String,
    #[tabled(rename = "Local")]
    local_url: String,
    #[tabled(rename = "Pod")]
    pod: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Env")]
    environment: String,
    #[tabled(rename = "Remote Port")]
    remote_port: u16,
}

/// Parse `NAME:LOCAL[:REMOTE]` into a request
pub fn parse_target(target: &str) -> Result<ServiceRequest> {
    let parts: Vec<&str> = target.split(':').collect();
    let (name, local, remote) = match parts.as_slice() {
        [name, local] => (*name, *local, None),
        [name, local, remote] => (*name, *local, Some(*remote)),
        _ => bail!("invalid target '{}', expected NAME:LOCAL_PORT[:REMOTE_PORT]", target),
    };

    let local: u16 = local
        .parse()
        .with_context(|| format!("invalid local port in '{}'", target))?;
    let mut request = ServiceRequest::new(name, local);
    if let Some(remote) = remote {
        let remote: u16 = remote
            .parse()
            .with_context(|| format!("invalid remote port in '{}'", target))?;
        request = request.with_remote_port(remote);
    }
    Ok(request)
}

/// Build requests for every target with the shared options applied
pub fn build_requests(
    targets: &[String],
    namespace: Option<String>,
    environment: Option<String>,
    include_logs: bool,
) -> Result<Vec<ServiceRequest>> {
    targets
        .iter()
        .map(|target| {
            let mut request = parse_target(target)?.with_logs(include_logs);
            if let Some(ns) = &namespace {
                request = request.with_namespace(ns.clone());
            }
            if let Some(env) = &environment {
                request = request.with_environment(env.clone());
            }
            Ok(request)
        })
        .collect()
}

/// Start the forwards, then wait for Ctrl-C and stop them
pub async fn run(
    service: &ForwardService,
    requests: &[ServiceRequest],
    format: OutputFormat,
) -> Result<()> {
    let report = match service.start(requests).await? {
        StartOutcome::Rejected(errors) => {
            for error in &errors {
                print_error(&error.to_string());
            }
            bail!("nothing was started");
        }
        StartOutcome::Started(report) => report,
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<SessionRow> = report
                .sessions
                .iter()
                .map(|s| SessionRow {
                    label: s.label.clone(),
                    local_url: s.local_url.clone(),
                    pod: s.pod_name.clone(),
                    namespace: s.namespace.clone(),
                    environment: color_environment(s.environment.as_str()),
                    remote_port: s.remote_port,
                })
                .collect();
            print_table(&rows, "No port-forwards started");
            for failure in &report.failures {
                print_error(&failure.to_string());
            }
            println!();
            println!("{}", "Equivalent commands:".bold());
            for s in &report.sessions {
                println!("  {}", s.command.dimmed());
            }
        }
    }

    if report.sessions.is_empty() {
        bail!("no port-forward could be launched");
    }

    print_info("Press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let stopped = service.stop().await;
    print_success(&format!("Stopped {} port-forward(s)", stopped));
    Ok(())
}
