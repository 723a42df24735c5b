//! Forward requests as received from callers, and their validation
//!
//! Requests arrive as loosely typed JSON. Every entry of a batch is checked
//! and all problems are reported together.

use crate::error::{EntryError, ForwardError};
use crate::models::Environment;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One requested forward, before validation.
///
/// Every field is kept as raw JSON so a wrongly typed value is reported
/// against its entry instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    #[serde(default)]
    pub service_name: Option<Value>,
    #[serde(default)]
    pub local_port: Option<Value>,
    #[serde(default)]
    pub namespace: Option<Value>,
    #[serde(default)]
    pub remote_port: Option<Value>,
    #[serde(default)]
    pub environment: Option<Value>,
    #[serde(default)]
    pub include_logs: Option<Value>,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRequest {
    pub index: usize,
    pub service_name: String,
    pub local_port: u16,
    pub namespace: Option<String>,
    pub remote_port: Option<u16>,
    pub environment: Option<Environment>,
    pub include_logs: bool,
}

impl ServiceRequest {
    pub fn new(service_name: impl Into<String>, local_port: u16) -> Self {
        Self {
            service_name: Some(Value::String(service_name.into())),
            local_port: Some(Value::from(local_port)),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(Value::String(namespace.into()));
        self
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = Some(Value::from(port));
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(Value::String(environment.into()));
        self
    }

    pub fn with_logs(mut self, include_logs: bool) -> Self {
        self.include_logs = Some(Value::Bool(include_logs));
        self
    }

    /// Service name as given, when it is a string
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_ref().and_then(Value::as_str)
    }

    /// Validate this entry, collecting every problem found
    pub fn validate(&self, index: usize) -> Result<ValidRequest, Vec<EntryError>> {
        let service_name = self.service_name().map(str::trim).filter(|name| !name.is_empty());

        let mut errors = Vec::new();
        let mut fail = |error: ForwardError| {
            errors.push(EntryError {
                index,
                service: service_name.map(str::to_string),
                error,
            })
        };

        match &self.service_name {
            Some(Value::String(_)) if service_name.is_some() => {}
            Some(Value::String(_)) | Some(Value::Null) | None => {
                fail(ForwardError::validation("serviceName", "is required"))
            }
            Some(other) => fail(ForwardError::validation(
                "serviceName",
                format!("must be a string, got {}", other),
            )),
        }

        let local_port = match &self.local_port {
            Some(Value::Null) | None => {
                fail(ForwardError::validation("localPort", "is required"));
                None
            }
            Some(value) => parse_port(value)
                .map_err(|message| fail(ForwardError::validation("localPort", message)))
                .ok(),
        };

        let namespace = optional_string(&self.namespace)
            .map_err(|message| fail(ForwardError::validation("namespace", message)))
            .ok()
            .flatten();

        let remote_port = match &self.remote_port {
            Some(Value::Null) | None => None,
            Some(value) => parse_port(value)
                .map_err(|message| fail(ForwardError::validation("remotePort", message)))
                .ok(),
        };

        let environment = match optional_string(&self.environment) {
            Ok(Some(env)) => env
                .parse::<Environment>()
                .map_err(|e| fail(ForwardError::validation("environment", e.to_string())))
                .ok(),
            Ok(None) => None,
            Err(message) => {
                fail(ForwardError::validation("environment", message));
                None
            }
        };

        let include_logs = match &self.include_logs {
            Some(Value::Null) | None => true,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                fail(ForwardError::validation(
                    "includeLogs",
                    format!("must be a boolean, got {}", other),
                ));
                true
            }
        };

        match (service_name, local_port) {
            (Some(name), Some(local_port)) if errors.is_empty() => Ok(ValidRequest {
                index,
                service_name: name.to_string(),
                local_port,
                namespace: namespace.map(str::to_string),
                remote_port,
                environment,
                include_logs,
            }),
            _ => Err(errors),
        }
    }
}

/// A trimmed, non-empty string; absent, null and blank values are `None`
fn optional_string(value: &Option<Value>) -> Result<Option<&str>, String> {
    match value {
        Some(Value::Null) | None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim()).filter(|v| !v.is_empty())),
        Some(other) => Err(format!("must be a string, got {}", other)),
    }
}

/// Accept integers (or integer strings) in 1..=65535
fn parse_port(value: &Value) -> Result<u16, String> {
    let number = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i,
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e12 => f as i64,
            _ => return Err(format!("must be an integer, got {}", n)),
        },
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("must be an integer, got {:?}", s))?,
        other => return Err(format!("must be an integer, got {}", other)),
    };

    u16::try_from(number)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| format!("must be between 1 and 65535, got {}", number))
}
