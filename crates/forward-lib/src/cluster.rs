//! Cluster access through the `kubectl` command-line tool
//!
//! All cluster queries shell out to kubectl and return its raw output;
//! parsing happens in [`crate::discovery`] and [`crate::port`].

use crate::error::ForwardError;
use crate::models::ForwardSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Queries against the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Names of all namespaces
    async fn list_namespaces(&self) -> Result<Vec<String>, ForwardError>;

    /// Raw pod listing, across all namespaces when `namespace` is `None`
    async fn list_pods(&self, namespace: Option<&str>) -> Result<String, ForwardError>;

    /// Raw, whitespace separated list of the ports a service exposes
    async fn service_ports(&self, namespace: &str, service: &str) -> Result<String, ForwardError>;
}

/// A process to launch: program plus arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `kubectl port-forward -n <ns> <pod> <local>:<remote>`
    pub fn port_forward(kubectl: &str, session: &ForwardSession) -> Self {
        Self::new(
            kubectl,
            vec![
                "port-forward".to_string(),
                "-n".to_string(),
                session.namespace.clone(),
                session.pod_name.clone(),
                format!("{}:{}", session.local_port, session.remote_port),
            ],
        )
    }

    /// `kubectl logs -f -n <ns> <pod>`
    pub fn logs(kubectl: &str, session: &ForwardSession) -> Self {
        Self::new(
            kubectl,
            vec![
                "logs".to_string(),
                "-f".to_string(),
                "-n".to_string(),
                session.namespace.clone(),
                session.pod_name.clone(),
            ],
        )
    }

    /// Shell-quoted command line suitable for copy/paste
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// [`ClusterClient`] backed by the kubectl binary
#[derive(Debug, Clone)]
pub struct Kubectl {
    program: String,
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl Kubectl {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run kubectl and return stdout, failing on spawn errors or non-zero exit
    async fn run(&self, args: &[&str]) -> Result<String, ForwardError> {
        debug!(program = %self.program, args = ?args, "Running cluster query");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ForwardError::Query(format!(
                    "failed to run {}: {}. Is kubectl installed and in PATH?",
                    self.program, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ForwardError::Query(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.to_string()
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ClusterClient for Kubectl {
    async fn list_namespaces(&self) -> Result<Vec<String>, ForwardError> {
        let stdout = self
            .run(&[
                "get",
                "namespaces",
                "-o",
                "custom-columns=NAME:.metadata.name",
                "--no-headers",
            ])
            .await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<String, ForwardError> {
        match namespace {
            Some(ns) => self.run(&["get", "pods", "-n", ns]).await,
            None => self.run(&["get", "pods", "-A"]).await,
        }
    }

    async fn service_ports(&self, namespace: &str, service: &str) -> Result<String, ForwardError> {
        self.run(&[
            "get",
            "service",
            service,
            "-n",
            namespace,
            "-o",
            "jsonpath={.spec.ports[*].port}",
        ])
        .await
    }
}
