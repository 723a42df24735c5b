//! Core data models for service discovery and forwarding

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Deployment stage a pod belongs to, derived from its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Qa,
    Stg,
    Prod,
    /// Pod name carries no recognized prefix
    Default,
}

impl Environment {
    /// Recognized name prefixes, in matching order
    pub const PREFIXED: [Environment; 4] = [
        Environment::Dev,
        Environment::Qa,
        Environment::Stg,
        Environment::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Qa => "qa",
            Environment::Stg => "stg",
            Environment::Prod => "prod",
            Environment::Default => "default",
        }
    }

    /// Detect the environment of a full service name.
    ///
    /// Returns the environment together with the prefix (including the
    /// trailing `-`) that matched, if any.
    pub fn detect(full_service_name: &str) -> (Environment, Option<String>) {
        for env in Self::PREFIXED {
            let prefix = format!("{}-", env.as_str());
            if full_service_name.starts_with(&prefix) {
                return (env, Some(prefix));
            }
        }
        (Environment::Default, None)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a requested environment is not one of dev/qa/stg/prod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnvironment(pub String);

impl fmt::Display for UnknownEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown environment '{}' (expected one of dev, qa, stg, prod)",
            self.0
        )
    }
}

impl std::error::Error for UnknownEnvironment {}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    /// Parses a *requested* environment. `default` is a derived tag only
    /// and is not accepted here.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PREFIXED
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}

/// One row of a pod listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub namespace: Option<String>,
    pub name: String,
    pub status: Option<String>,
    pub age: Option<Duration>,
}

impl PodRecord {
    /// Rows without a status column are treated as running
    pub fn is_running(&self) -> bool {
        self.status.as_deref().map_or(true, |s| s == "Running")
    }
}

/// One (environment, pod) binding for a short service name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentity {
    /// Pod suffix (last two name segments)
    pub id: String,
    pub namespace: String,
    pub full_service_name: String,
}

impl ServiceIdentity {
    /// Reconstruct the pod name from its service name and suffix
    pub fn pod_name(&self) -> String {
        format!("{}-{}", self.full_service_name, self.id)
    }
}

/// Environments known for a single short name, in discovery order
pub type EnvironmentMap = IndexMap<Environment, ServiceIdentity>;

/// Short name -> environment -> pod identity, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMap {
    pub(crate) services: IndexMap<String, EnvironmentMap>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, short_name: &str) -> Option<&EnvironmentMap> {
        self.services.get(short_name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Iterate short names in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &EnvironmentMap)> {
        self.services.iter()
    }

    pub(crate) fn entry(&mut self, short_name: String) -> &mut EnvironmentMap {
        self.services.entry(short_name).or_default()
    }
}

/// Result of resolving a short name against a service map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedService {
    pub short_name: String,
    pub namespace: String,
    pub pod_name: String,
    pub full_service_name: String,
    pub environment: Environment,
}

/// One local-port to remote-port binding against a resolved pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardSession {
    pub namespace: String,
    pub pod_name: String,
    pub local_port: u16,
    pub remote_port: u16,
    pub label: String,
    pub include_logs: bool,
    pub environment: Environment,
}

impl ForwardSession {
    pub fn local_url(&self) -> String {
        format!("http://localhost:{}", self.local_port)
    }
}

/// Identifier of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pf-{}", self.0)
    }
}
