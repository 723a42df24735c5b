//! Tool inputs and their published schemas

use forward_lib::ServiceRequest;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIST_NAMESPACES: &str = "list_k8s_namespaces";
pub const LIST_SERVICES: &str = "list_k8s_services";
pub const START_PORT_FORWARD: &str = "start_k8s_port_forward";
pub const STOP_PORT_FORWARD: &str = "stop_k8s_port_forward";

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListNamespacesInput {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListServicesInput {
    /// Only list services in this namespace
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Deployment stage to prefer when a service exists in several
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentTag {
    Dev,
    Qa,
    Stg,
    Prod,
}

/// One service to forward
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortForwardEntry {
    /// Short service name as shown by list_k8s_services
    pub service_name: String,
    /// Local port to listen on
    #[schemars(range(min = 1, max = 65535))]
    pub local_port: u16,
    /// Namespace to take the service from; wins over environment
    #[serde(default)]
    pub namespace: Option<String>,
    /// Port on the pod; detected from the service when omitted
    #[serde(default)]
    #[schemars(range(min = 1, max = 65535))]
    pub remote_port: Option<u16>,
    #[serde(default)]
    pub environment: Option<EnvironmentTag>,
    /// Open a log window for the pod (default true)
    #[serde(default)]
    pub include_logs: Option<bool>,
}

/// Arguments of start_k8s_port_forward.
///
/// Entries are accepted loosely and validated per entry so every problem
/// can be reported at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StartPortForwardInput {
    #[serde(default)]
    #[schemars(with = "Vec<PortForwardEntry>")]
    pub services: Vec<ServiceRequest>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StopPortForwardInput {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolDefinitions {
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

fn tool<T: JsonSchema>(name: &str, description: &str) -> ToolInfo {
    ToolInfo {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default(),
    }
}

impl ToolDefinitions {
    pub fn all() -> Self {
        Self {
            tools: vec![
                tool::<ListNamespacesInput>(
                    LIST_NAMESPACES,
                    "List all namespaces in the current Kubernetes context",
                ),
                tool::<ListServicesInput>(
                    LIST_SERVICES,
                    "List services discovered from running pods, with the environments and namespaces each one is available in",
                ),
                tool::<StartPortForwardInput>(
                    START_PORT_FORWARD,
                    "Start port-forwards for one or more services. Nothing is started if any entry is invalid",
                ),
                tool::<StopPortForwardInput>(
                    STOP_PORT_FORWARD,
                    "Stop all running port-forwards",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools_defined() {
        let names: Vec<String> = ToolDefinitions::all()
            .tools
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec![LIST_NAMESPACES, LIST_SERVICES, START_PORT_FORWARD, STOP_PORT_FORWARD]
        );
    }

    #[test]
    fn test_start_schema_describes_entries() {
        let schema = serde_json::to_string(&schemars::schema_for!(StartPortForwardInput)).unwrap();
        assert!(schema.contains("serviceName"));
        assert!(schema.contains("localPort"));
        assert!(schema.contains("includeLogs"));
        assert!(schema.contains("65535"));
    }

    #[test]
    fn test_start_input_accepts_loose_entries() {
        let input: StartPortForwardInput = serde_json::from_value(serde_json::json!({
            "services": [{"serviceName": "cart", "localPort": "8080"}, {"localPort": 99999}]
        }))
        .unwrap();
        assert_eq!(input.services.len(), 2);
        assert!(input.services[1].service_name.is_none());
    }
}
