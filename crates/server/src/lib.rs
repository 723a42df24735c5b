//! Tool server for Kubernetes port-forwarding
//!
//! Exposes the operations of [`forward_lib::ForwardService`] as tools over
//! JSON-RPC 2.0, one message per line on stdio. An optional HTTP endpoint
//! serves health probes and Prometheus metrics.

pub mod api;
pub mod config;
pub mod rpc;
pub mod server;
pub mod tools;

pub use config::ServerConfig;
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use rpc::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
pub use server::ForwardMcpServer;
