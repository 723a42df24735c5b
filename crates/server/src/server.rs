//! JSON-RPC tool server over line-delimited stdio

use crate::rpc::*;
use crate::tools::*;
use anyhow::Result;
use forward_lib::{ForwardError, ForwardService};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "kpf-mcp";

/// Text returned by a tool, and whether it describes a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }

    fn from_error(error: ForwardError) -> Self {
        Self::failed(format!("Error: {}", error))
    }

    fn into_result(self) -> Value {
        json!({
            "content": [{ "type": "text", "text": self.text }],
            "isError": self.is_error,
        })
    }
}

/// Dispatches tool calls to a [`ForwardService`]
#[derive(Clone)]
pub struct ForwardMcpServer {
    service: Arc<ForwardService>,
}

impl ForwardMcpServer {
    pub fn new(service: Arc<ForwardService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<ForwardService> {
        &self.service
    }

    /// Serve requests line by line until `reader` reaches end of input.
    ///
    /// Requests are handled one at a time, in arrival order.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        info!("Input closed");
        Ok(())
    }

    /// Handle one raw message; `None` when no reply is due
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Unparseable message");
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                ));
            }
        };

        self.handle_request(request).await
    }

    /// Handle a request; notifications never produce a response
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "Handling request");

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => {
                    debug!("Client finished initialization")
                }
                other => debug!(method = %other, "Ignoring notification"),
            }
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => Self::handle_initialize(id),
            "notifications/initialized" | "initialized" | "ping" => {
                JsonRpcResponse::success(id, json!({}))
            }
            "tools/list" => Self::handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            _ => {
                warn!(method = %request.method, "Unknown method");
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                )
            }
        };
        Some(response)
    }

    fn handle_initialize(id: Option<Value>) -> JsonRpcResponse {
        info!("Client initialized session");
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(id: Option<Value>) -> JsonRpcResponse {
        match serde_json::to_value(ToolDefinitions::all()) {
            Ok(tools) => JsonRpcResponse::success(id, tools),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct ToolCallParams {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let params: ToolCallParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {}", e))
            }
        };

        debug!(tool = %params.name, "Calling tool");

        let output = match params.name.as_str() {
            LIST_NAMESPACES => self.list_namespaces().await,
            LIST_SERVICES => match parse_arguments::<ListServicesInput>(params.arguments) {
                Ok(input) => self.list_services(input).await,
                Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, e),
            },
            START_PORT_FORWARD => match parse_arguments::<StartPortForwardInput>(params.arguments) {
                Ok(input) => self.start(input).await,
                Err(e) => return JsonRpcResponse::error(id, INVALID_PARAMS, e),
            },
            STOP_PORT_FORWARD => self.stop().await,
            _ => {
                return JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Unknown tool: {}", params.name),
                )
            }
        };

        JsonRpcResponse::success(id, output.into_result())
    }

    async fn list_namespaces(&self) -> ToolOutput {
        match self.service.list_namespaces().await {
            Ok(listing) => ToolOutput::ok(listing.to_string()),
            Err(e) => ToolOutput::from_error(e),
        }
    }

    async fn list_services(&self, input: ListServicesInput) -> ToolOutput {
        match self.service.list_services(input.namespace.as_deref()).await {
            Ok(listing) => ToolOutput::ok(listing.to_string()),
            Err(e) => ToolOutput::from_error(e),
        }
    }

    async fn start(&self, input: StartPortForwardInput) -> ToolOutput {
        match self.service.start(&input.services).await {
            Ok(outcome) if outcome.is_rejected() => ToolOutput::failed(outcome.to_string()),
            Ok(outcome) => ToolOutput::ok(outcome.to_string()),
            Err(e) => ToolOutput::from_error(e),
        }
    }

    async fn stop(&self) -> ToolOutput {
        let stopped = self.service.stop().await;
        ToolOutput::ok(format!("Stopped {} port-forward process(es)", stopped))
    }
}

/// Missing or null arguments mean "no arguments"
fn parse_arguments<T>(arguments: Value) -> std::result::Result<T, String>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments: {}", e))
}
