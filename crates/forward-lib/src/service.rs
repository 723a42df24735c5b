//! Port-forward operations exposed to callers
//!
//! [`ForwardService`] ties discovery, resolution, port detection, process
//! supervision and log windows together. Each operation returns a report
//! whose `Display` output is the text handed back to tool callers.

use crate::cluster::{ClusterClient, CommandSpec, Kubectl};
use crate::discovery::{parse_pod_listing, resolve};
use crate::error::{EntryError, ForwardError};
use crate::health::{components, HealthRegistry};
use crate::models::{Environment, ForwardSession, ServiceMap, SessionId};
use crate::observability::{ForwarderMetrics, StructuredLogger};
use crate::port::{resolve_port, DEFAULT_REMOTE_PORT};
use crate::request::ServiceRequest;
use crate::supervisor::{ProcessSpawner, ProcessSupervisor, SupervisorConfig, TokioSpawner};
use crate::terminal::{LaunchOutcome, TerminalLauncher};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Namespaces in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceListing {
    pub namespaces: Vec<String>,
}

impl fmt::Display for NamespaceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespaces.is_empty() {
            return write!(f, "No namespaces found");
        }
        write!(f, "{}", self.namespaces.join("\n"))
    }
}

/// Where a short name resolves in one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBinding {
    pub environment: Environment,
    pub namespace: String,
}

/// Discovered services, sorted by short name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceListing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub services: BTreeMap<String, Vec<ServiceBinding>>,
}

impl ServiceListing {
    fn from_map(namespace: Option<&str>, map: &ServiceMap) -> Self {
        let services = map
            .listing()
            .into_iter()
            .map(|(name, bindings)| {
                let bindings = bindings
                    .into_iter()
                    .map(|(environment, namespace)| ServiceBinding {
                        environment,
                        namespace,
                    })
                    .collect();
                (name, bindings)
            })
            .collect();

        Self {
            namespace: namespace.map(str::to_string),
            services,
        }
    }
}

impl fmt::Display for ServiceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.services.is_empty() {
            return match &self.namespace {
                Some(ns) => write!(f, "No services found in namespace {}", ns),
                None => write!(f, "No services found"),
            };
        }

        let mut first = true;
        for (name, bindings) in &self.services {
            if !first {
                writeln!(f)?;
            }
            first = false;
            let envs: Vec<String> = bindings
                .iter()
                .map(|b| format!("{} ({})", b.environment, b.namespace))
                .collect();
            write!(f, "{}: {}", name, envs.join(", "))?;
        }
        Ok(())
    }
}

/// One forward that was launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    pub id: SessionId,
    pub label: String,
    pub local_url: String,
    pub pod_name: String,
    pub namespace: String,
    pub environment: Environment,
    pub local_port: u16,
    pub remote_port: u16,
    /// Equivalent port-forward command line
    pub command: String,
    /// Equivalent log command line, when logs were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs_command: Option<String>,
}

/// Result of a start that passed validation and resolution
#[derive(Debug, Serialize)]
pub struct StartReport {
    pub sessions: Vec<StartedSession>,
    /// Entries whose process could not be launched
    #[serde(skip_serializing_if = "Vec::is_empty", serialize_with = "serialize_errors")]
    pub failures: Vec<EntryError>,
}

fn serialize_errors<S: serde::Serializer>(
    errors: &[EntryError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

impl fmt::Display for StartReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Started {} port-forward(s):", self.sessions.len())?;
        for s in &self.sessions {
            writeln!(
                f,
                "  {} -> {} (pod {} in {})",
                s.label, s.local_url, s.pod_name, s.namespace
            )?;
        }

        if !self.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failed to launch:")?;
            for e in &self.failures {
                writeln!(f, "  {}", e)?;
            }
        }

        writeln!(f)?;
        write!(f, "Equivalent commands:")?;
        for s in &self.sessions {
            write!(f, "\n  {}", s.command)?;
            if let Some(logs) = &s.logs_command {
                write!(f, "\n  {}", logs)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a start request
#[derive(Debug)]
pub enum StartOutcome {
    /// Some entries were invalid or unresolvable; nothing was launched
    Rejected(Vec<EntryError>),
    Started(StartReport),
}

impl StartOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, StartOutcome::Rejected(_))
    }
}

impl fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartOutcome::Rejected(errors) => {
                write!(f, "Nothing was started. Fix the following and retry:")?;
                for e in errors {
                    write!(f, "\n  {}", e)?;
                }
                Ok(())
            }
            StartOutcome::Started(report) => report.fmt(f),
        }
    }
}

/// Port-forward operations over a cluster
pub struct ForwardService {
    client: Arc<dyn ClusterClient>,
    supervisor: ProcessSupervisor,
    launcher: TerminalLauncher,
    health: HealthRegistry,
    metrics: ForwarderMetrics,
    logger: StructuredLogger,
    kubectl: String,
    default_remote_port: u16,
}

impl ForwardService {
    pub fn builder() -> ForwardServiceBuilder {
        ForwardServiceBuilder::new()
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn kubectl(&self) -> &str {
        &self.kubectl
    }

    /// Register health components and mark the service ready
    pub async fn mark_ready(&self) {
        self.health.register(components::CLUSTER_CLIENT).await;
        self.health.register(components::SUPERVISOR).await;
        self.health.set_ready(true).await;
    }

    pub async fn list_namespaces(&self) -> Result<NamespaceListing, ForwardError> {
        let namespaces = self.track(None, self.client.list_namespaces().await).await?;
        Ok(NamespaceListing { namespaces })
    }

    pub async fn list_services(
        &self,
        namespace: Option<&str>,
    ) -> Result<ServiceListing, ForwardError> {
        let map = self.discover(namespace).await?;
        Ok(ServiceListing::from_map(namespace, &map))
    }

    /// Validate, resolve and launch a batch of forwards.
    ///
    /// Every entry is checked before anything is launched; a single bad
    /// entry rejects the whole batch. A cluster query failure is returned
    /// as an error, unless some entries already failed validation, in which
    /// case it is reported against each remaining entry.
    pub async fn start(&self, requests: &[ServiceRequest]) -> Result<StartOutcome, ForwardError> {
        if requests.is_empty() {
            return Ok(StartOutcome::Rejected(vec![EntryError {
                index: 0,
                service: None,
                error: ForwardError::validation("services", "at least one service is required"),
            }]));
        }

        let mut errors = Vec::new();
        let mut valid = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            match request.validate(index) {
                Ok(v) => valid.push(v),
                Err(mut e) => errors.append(&mut e),
            }
        }

        let mut resolved = Vec::with_capacity(valid.len());
        if !valid.is_empty() {
            let map = match self.discover(None).await {
                Ok(map) => map,
                Err(error) if errors.is_empty() => return Err(error),
                Err(error) => {
                    // Keep the validation errors already found alongside the
                    // query failure for every entry that could not be resolved.
                    let message = match error {
                        ForwardError::Query(message) => message,
                        other => other.to_string(),
                    };
                    errors.extend(valid.into_iter().map(|request| EntryError {
                        index: request.index,
                        service: Some(request.service_name),
                        error: ForwardError::Query(message.clone()),
                    }));
                    errors.sort_by_key(|e| e.index);
                    info!(errors = errors.len(), "Rejected start request");
                    return Ok(StartOutcome::Rejected(errors));
                }
            };
            for request in valid {
                match resolve(
                    &map,
                    &request.service_name,
                    request.namespace.as_deref(),
                    request.environment,
                ) {
                    Ok(service) => resolved.push((request, service)),
                    Err(error) => errors.push(EntryError {
                        index: request.index,
                        service: Some(request.service_name.clone()),
                        error,
                    }),
                }
            }
        }

        if !errors.is_empty() {
            errors.sort_by_key(|e| e.index);
            info!(errors = errors.len(), "Rejected start request");
            return Ok(StartOutcome::Rejected(errors));
        }

        let mut sessions = Vec::with_capacity(resolved.len());
        for (request, service) in resolved {
            let remote_port = match request.remote_port {
                Some(port) => port,
                None => {
                    resolve_port(
                        self.client.as_ref(),
                        &service.namespace,
                        &service.full_service_name,
                        self.default_remote_port,
                    )
                    .await
                }
            };
            let session = ForwardSession {
                label: format!("{} ({})", service.short_name, service.environment),
                namespace: service.namespace,
                pod_name: service.pod_name,
                local_port: request.local_port,
                remote_port,
                include_logs: request.include_logs,
                environment: service.environment,
            };
            sessions.push((request.index, request.service_name, session));
        }

        let mut report = StartReport {
            sessions: Vec::with_capacity(sessions.len()),
            failures: Vec::new(),
        };
        for (index, name, session) in sessions {
            let command = CommandSpec::port_forward(&self.kubectl, &session);
            let id = match self.supervisor.spawn(&session, &command) {
                Ok(id) => id,
                Err(error) => {
                    warn!(label = %session.label, error = %error, "Failed to launch port-forward");
                    report.failures.push(EntryError {
                        index,
                        service: Some(name),
                        error,
                    });
                    continue;
                }
            };

            let logs_command = if session.include_logs {
                let logs = CommandSpec::logs(&self.kubectl, &session);
                let title = format!("Logs: {}", session.label);
                match self.launcher.open(&title, &logs) {
                    LaunchOutcome::Window(strategy) => {
                        debug!(label = %session.label, strategy = %strategy, "Log window opened");
                    }
                    LaunchOutcome::Headless => {
                        debug!(label = %session.label, "Logs running headless");
                    }
                    LaunchOutcome::Failed(reason) => {
                        warn!(label = %session.label, reason = %reason, "Logs not started");
                    }
                }
                Some(logs.display())
            } else {
                None
            };

            report.sessions.push(StartedSession {
                id,
                local_url: session.local_url(),
                label: session.label,
                pod_name: session.pod_name,
                namespace: session.namespace,
                environment: session.environment,
                local_port: session.local_port,
                remote_port: session.remote_port,
                command: command.display(),
                logs_command,
            });
        }

        Ok(StartOutcome::Started(report))
    }

    /// Stop every running forward; returns how many were registered
    pub async fn stop(&self) -> usize {
        self.supervisor.stop().await
    }

    /// Stop everything and mark the service as no longer ready
    pub async fn shutdown(&self, reason: &str) -> usize {
        self.health.set_ready(false).await;
        let stopped = self.supervisor.stop().await;
        self.health
            .set_unhealthy(components::SUPERVISOR, "shut down")
            .await;
        self.logger.log_shutdown(reason, stopped);
        stopped
    }

    async fn discover(&self, namespace: Option<&str>) -> Result<ServiceMap, ForwardError> {
        let started = Instant::now();
        let listing = self.track(namespace, self.client.list_pods(namespace).await).await?;
        let map = parse_pod_listing(&listing, namespace);
        self.metrics
            .observe_discovery_latency(started.elapsed().as_secs_f64());
        debug!(namespace = ?namespace, services = map.len(), "Discovered services");
        Ok(map)
    }

    /// Record the health of a cluster query
    async fn track<T>(
        &self,
        namespace: Option<&str>,
        result: Result<T, ForwardError>,
    ) -> Result<T, ForwardError> {
        match &result {
            Ok(_) => self.health.set_healthy(components::CLUSTER_CLIENT).await,
            Err(e) => {
                self.metrics.inc_discovery_errors();
                self.logger.log_discovery_failed(namespace, &e.to_string());
                self.health
                    .set_degraded(components::CLUSTER_CLIENT, e.to_string())
                    .await;
            }
        }
        result
    }
}

/// Builder for [`ForwardService`]
pub struct ForwardServiceBuilder {
    kubectl: String,
    client: Option<Arc<dyn ClusterClient>>,
    spawner: Option<Arc<dyn ProcessSpawner>>,
    launcher: Option<TerminalLauncher>,
    health: Option<HealthRegistry>,
    config: SupervisorConfig,
    default_remote_port: u16,
    log_windows: bool,
}

impl ForwardServiceBuilder {
    pub fn new() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            client: None,
            spawner: None,
            launcher: None,
            health: None,
            config: SupervisorConfig::default(),
            default_remote_port: DEFAULT_REMOTE_PORT,
            log_windows: true,
        }
    }

    /// kubectl binary used for queries and launched commands
    pub fn kubectl(mut self, program: impl Into<String>) -> Self {
        self.kubectl = program.into();
        self
    }

    /// Cluster client (defaults to [`Kubectl`] with the configured binary)
    pub fn cluster_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Process spawner (defaults to [`TokioSpawner`])
    pub fn spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn launcher(mut self, launcher: TerminalLauncher) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.config.grace_period = grace_period;
        self
    }

    pub fn default_remote_port(mut self, port: u16) -> Self {
        self.default_remote_port = port;
        self
    }

    /// Open log windows (false runs log commands headless)
    pub fn log_windows(mut self, enabled: bool) -> Self {
        self.log_windows = enabled;
        self
    }

    pub fn build(self) -> Result<ForwardService> {
        if self.kubectl.trim().is_empty() {
            anyhow::bail!("kubectl program must not be empty");
        }
        if self.default_remote_port == 0 {
            anyhow::bail!("default remote port must be between 1 and 65535");
        }

        let client = self
            .client
            .unwrap_or_else(|| Arc::new(Kubectl::new(self.kubectl.clone())));
        let spawner = self.spawner.unwrap_or_else(|| Arc::new(TokioSpawner));
        let launcher = self
            .launcher
            .unwrap_or_else(|| TerminalLauncher::platform_default(self.log_windows));

        Ok(ForwardService {
            client,
            supervisor: ProcessSupervisor::new(spawner, self.config),
            launcher,
            health: self.health.unwrap_or_default(),
            metrics: ForwarderMetrics::new(),
            logger: StructuredLogger::new(),
            kubectl: self.kubectl,
            default_remote_port: self.default_remote_port,
        })
    }
}

impl Default for ForwardServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ComponentStatus;
    use crate::supervisor::tests::fakes::{FailingSpawner, FakeSpawner};
    use crate::terminal::{HeadlessStrategy, WindowStrategy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const LISTING: &str = "\
NAMESPACE   NAME                          READY   STATUS    RESTARTS   AGE
shop        dev-shop-cart-1a2b-3c4d       1/1     Running   0          2d
shop        dev-shop-orders-5e6f-7a8b     1/1     Running   0          3h
shop-qa     qa-shop-qa-cart-9c9c-8d8d     1/1     Running   0          5d
";

    struct FakeCluster {
        listing: Option<String>,
        ports: Option<String>,
        pod_queries: AtomicUsize,
    }

    impl FakeCluster {
        fn new(listing: &str) -> Self {
            Self {
                listing: Some(listing.to_string()),
                ports: Some("80 443".to_string()),
                pod_queries: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                listing: None,
                ports: None,
                pod_queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ClusterClient for FakeCluster {
        async fn list_namespaces(&self) -> Result<Vec<String>, ForwardError> {
            match &self.listing {
                Some(_) => Ok(vec!["shop".to_string(), "shop-qa".to_string()]),
                None => Err(ForwardError::Query("connection refused".to_string())),
            }
        }

        async fn list_pods(&self, _namespace: Option<&str>) -> Result<String, ForwardError> {
            self.pod_queries.fetch_add(1, Ordering::SeqCst);
            self.listing
                .clone()
                .ok_or_else(|| ForwardError::Query("connection refused".to_string()))
        }

        async fn service_ports(&self, _ns: &str, _service: &str) -> Result<String, ForwardError> {
            self.ports
                .clone()
                .ok_or_else(|| ForwardError::Query("not found".to_string()))
        }
    }

    /// Window strategy that only records titles
    struct RecordingWindow(Arc<Mutex<Vec<String>>>);

    impl WindowStrategy for RecordingWindow {
        fn name(&self) -> &str {
            "recording"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn open(&self, title: &str, _command: &CommandSpec) -> Result<(), ForwardError> {
            self.0.lock().unwrap().push(title.to_string());
            Ok(())
        }
    }

    struct Harness {
        service: ForwardService,
        spawner: FakeSpawner,
        cluster: Arc<FakeCluster>,
        windows: Arc<Mutex<Vec<String>>>,
    }

    fn harness(cluster: FakeCluster) -> Harness {
        let spawner = FakeSpawner::new();
        let cluster = Arc::new(cluster);
        let windows = Arc::new(Mutex::new(Vec::new()));
        let launcher = TerminalLauncher::with_strategies(
            vec![Box::new(RecordingWindow(Arc::clone(&windows)))],
            Box::new(HeadlessStrategy),
        );
        let service = ForwardService::builder()
            .cluster_client(cluster.clone())
            .spawner(Arc::new(spawner.clone()))
            .launcher(launcher)
            .grace_period(Duration::from_millis(10))
            .build()
            .unwrap();
        Harness {
            service,
            spawner,
            cluster,
            windows,
        }
    }

    #[tokio::test]
    async fn test_list_namespaces() {
        let h = harness(FakeCluster::new(LISTING));
        let listing = h.service.list_namespaces().await.unwrap();
        assert_eq!(listing.to_string(), "shop\nshop-qa");
    }

    #[test]
    fn test_empty_namespace_listing_message() {
        let listing = NamespaceListing { namespaces: vec![] };
        assert_eq!(listing.to_string(), "No namespaces found");
    }

    #[tokio::test]
    async fn test_list_services_sorted() {
        let h = harness(FakeCluster::new(LISTING));
        let listing = h.service.list_services(None).await.unwrap();

        assert_eq!(
            listing.to_string(),
            "cart: dev (shop), qa (shop-qa)\norders: dev (shop)"
        );
    }

    #[tokio::test]
    async fn test_start_launches_and_reports() {
        let h = harness(FakeCluster::new(LISTING));
        let requests = vec![
            ServiceRequest::new("cart", 8080).with_environment("qa"),
            ServiceRequest::new("orders", 8081)
                .with_remote_port(9000)
                .with_logs(false),
        ];

        let outcome = h.service.start(&requests).await.unwrap();
        let report = match outcome {
            StartOutcome::Started(report) => report,
            other => panic!("expected start, got {}", other),
        };

        assert_eq!(report.sessions.len(), 2);
        assert_eq!(report.sessions[0].label, "cart (qa)");
        assert_eq!(report.sessions[0].local_url, "http://localhost:8080");
        assert_eq!(report.sessions[0].pod_name, "qa-shop-qa-cart-9c9c-8d8d");
        assert_eq!(report.sessions[0].remote_port, 80);
        assert_eq!(report.sessions[1].remote_port, 9000);
        assert_eq!(
            report.sessions[1].command,
            "kubectl port-forward -n shop dev-shop-orders-5e6f-7a8b 8081:9000"
        );
        assert!(report.sessions[1].logs_command.is_none());

        assert_eq!(h.spawner.spawned().len(), 2);
        assert_eq!(h.service.supervisor().len(), 2);
        assert_eq!(*h.windows.lock().unwrap(), vec!["Logs: cart (qa)"]);
        assert_eq!(h.cluster.pod_queries.load(Ordering::SeqCst), 1);

        let text = report.to_string();
        assert!(text.contains("cart (qa) -> http://localhost:8080"));
        assert!(text.contains("kubectl logs -f -n shop-qa qa-shop-qa-cart-9c9c-8d8d"));
    }

    #[tokio::test]
    async fn test_invalid_entry_blocks_whole_batch() {
        let h = harness(FakeCluster::new(LISTING));
        let mut bad = ServiceRequest::new("orders", 8082);
        bad.local_port = Some(serde_json::json!(99999));
        let requests = vec![
            ServiceRequest::new("cart", 8080),
            ServiceRequest::new("orders", 8081),
            bad,
        ];

        let outcome = h.service.start(&requests).await.unwrap();

        match &outcome {
            StartOutcome::Rejected(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].index, 2);
            }
            other => panic!("expected rejection, got {}", other),
        }
        assert!(outcome.to_string().contains("services[2]"));
        assert!(h.spawner.spawned().is_empty());
        assert!(h.service.supervisor().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_spawns_nothing() {
        let h = harness(FakeCluster::new(LISTING));
        let requests = vec![
            ServiceRequest::new("cart", 8080),
            ServiceRequest::new("payments", 8081),
        ];

        let outcome = h.service.start(&requests).await.unwrap();

        match outcome {
            StartOutcome::Rejected(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].index, 1);
                assert!(errors[0].error.is_lookup());
            }
            other => panic!("expected rejection, got {}", other),
        }
        assert!(h.spawner.spawned().is_empty());
        assert!(h.service.supervisor().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let h = harness(FakeCluster::new(LISTING));
        let outcome = h.service.start(&[]).await.unwrap();
        assert!(outcome.is_rejected());
        assert_eq!(h.cluster.pod_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_port_detection_falls_back() {
        let mut cluster = FakeCluster::new(LISTING);
        cluster.ports = None;
        let h = harness(cluster);

        let outcome = h
            .service
            .start(&[ServiceRequest::new("orders", 8081).with_logs(false)])
            .await
            .unwrap();

        match outcome {
            StartOutcome::Started(report) => assert_eq!(report.sessions[0].remote_port, 3000),
            other => panic!("expected start, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_reports_count_and_clears() {
        let h = harness(FakeCluster::new(LISTING));
        let requests = vec![
            ServiceRequest::new("cart", 8080).with_logs(false),
            ServiceRequest::new("orders", 8081).with_logs(false),
            ServiceRequest::new("cart", 8082)
                .with_namespace("shop-qa")
                .with_logs(false),
        ];
        h.service.start(&requests).await.unwrap();

        assert_eq!(h.service.stop().await, 3);
        assert!(h.service.supervisor().is_empty());
        assert_eq!(h.service.stop().await, 0);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_query_error() {
        let h = harness(FakeCluster::unreachable());
        h.service.mark_ready().await;

        let err = h
            .service
            .start(&[ServiceRequest::new("cart", 8080)])
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardError::Query(_)));
        assert!(h.spawner.spawned().is_empty());

        let health = h.service.health().health().await;
        assert_eq!(
            health.components[components::CLUSTER_CLIENT].status,
            ComponentStatus::Degraded
        );
        assert!(h.service.list_namespaces().await.is_err());
    }

    #[tokio::test]
    async fn test_discovery_failure_keeps_validation_errors() {
        let h = harness(FakeCluster::unreachable());
        let mut bad = ServiceRequest::new("orders", 8081);
        bad.local_port = Some(serde_json::json!("http"));
        let requests = vec![ServiceRequest::new("cart", 8080), bad];

        let outcome = h.service.start(&requests).await.unwrap();

        match outcome {
            StartOutcome::Rejected(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors[0].index, 0);
                assert!(matches!(errors[0].error, ForwardError::Query(_)));
                assert_eq!(errors[1].index, 1);
                assert!(matches!(errors[1].error, ForwardError::Validation { field: "localPort", .. }));
            }
            other => panic!("expected rejection, got {}", other),
        }
        assert!(h.spawner.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_not_fatal() {
        let cluster = Arc::new(FakeCluster::new(LISTING));
        let service = ForwardService::builder()
            .cluster_client(cluster)
            .spawner(Arc::new(FailingSpawner))
            .log_windows(false)
            .build()
            .unwrap();

        let outcome = service
            .start(&[ServiceRequest::new("cart", 8080).with_logs(false)])
            .await
            .unwrap();

        match outcome {
            StartOutcome::Started(report) => {
                assert!(report.sessions.is_empty());
                assert_eq!(report.failures.len(), 1);
            }
            other => panic!("expected report, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_shutdown_marks_not_ready() {
        let h = harness(FakeCluster::new(LISTING));
        h.service.mark_ready().await;
        h.service
            .start(&[ServiceRequest::new("cart", 8080).with_logs(false)])
            .await
            .unwrap();

        assert_eq!(h.service.shutdown("test").await, 1);
        assert!(!h.service.health().readiness().await.ready);
    }

    #[test]
    fn test_builder_rejects_zero_default_port() {
        assert!(ForwardService::builder().default_remote_port(0).build().is_err());
    }
}
