//! Port-forward library for Kubernetes services
//!
//! This crate provides the core functionality for:
//! - Discovering services from pod listings
//! - Resolving short service names to concrete pods
//! - Supervising concurrent `kubectl port-forward` processes
//! - Opening log-tailing terminal windows
//! - Health checks and observability

pub mod cluster;
pub mod discovery;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod port;
pub mod request;
pub mod service;
pub mod supervisor;
pub mod terminal;

pub use cluster::{ClusterClient, CommandSpec, Kubectl};
pub use error::{EntryError, ForwardError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ForwarderMetrics, StructuredLogger};
pub use request::ServiceRequest;
pub use service::{
    ForwardService, ForwardServiceBuilder, NamespaceListing, ServiceListing, StartOutcome,
    StartReport, StartedSession,
};
pub use supervisor::{ProcessSupervisor, SupervisorConfig};
pub use terminal::{LaunchOutcome, TerminalLauncher};
