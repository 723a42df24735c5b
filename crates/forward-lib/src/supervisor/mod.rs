//! Supervision of long-running port-forward processes
//!
//! The supervisor owns the registry of live forward processes. Each spawned
//! process gets an exit watcher that removes it from the registry as soon
//! as it exits, so the registry only ever holds live processes. `stop`
//! terminates everything gracefully, waits a grace period, then forces
//! whatever is left.

mod process;

#[cfg(test)]
pub(crate) mod tests;

pub use process::{ChildHandle, TokioSpawner};

use crate::cluster::CommandSpec;
use crate::error::ForwardError;
use crate::models::{ForwardSession, SessionId};
use crate::observability::{ForwarderMetrics, StructuredLogger};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How hard to ask a process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM on Unix
    Graceful,
    /// SIGKILL on Unix, TerminateProcess elsewhere
    Forced,
}

/// Handle to a running child process
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> Option<u32>;

    fn signal(&self, termination: Termination) -> Result<(), ForwardError>;
}

/// A freshly spawned process and the channel its exit code arrives on
pub struct SpawnedProcess {
    pub handle: Box<dyn ProcessHandle>,
    pub exited: oneshot::Receiver<Option<i32>>,
}

/// Launches processes for the supervisor
pub trait ProcessSpawner: Send + Sync {
    /// Spawn `command`, relaying its output tagged with `label`
    fn spawn(&self, command: &CommandSpec, label: &str) -> Result<SpawnedProcess, ForwardError>;
}

/// Configuration for the process supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Wait between graceful and forced termination (default: 500ms)
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(500),
        }
    }
}

struct Entry {
    label: String,
    handle: Box<dyn ProcessHandle>,
    /// Set once `stop` has signalled this process
    stopping: AtomicBool,
}

/// Registry and lifecycle control of forward processes
pub struct ProcessSupervisor {
    registry: Arc<DashMap<SessionId, Entry>>,
    spawner: Arc<dyn ProcessSpawner>,
    config: SupervisorConfig,
    next_id: AtomicU64,
    metrics: ForwarderMetrics,
    logger: StructuredLogger,
}

impl ProcessSupervisor {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, config: SupervisorConfig) -> Self {
        Self {
            registry: Arc::new(DashMap::new()),
            spawner,
            config,
            next_id: AtomicU64::new(1),
            metrics: ForwarderMetrics::new(),
            logger: StructuredLogger::new(),
        }
    }

    /// Supervisor launching real processes with tokio
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(TokioSpawner), SupervisorConfig::default())
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Spawn one forward process and register it.
    ///
    /// Returns as soon as the process is launched; whether the forward
    /// actually connects is only visible in its relayed output.
    pub fn spawn(
        &self,
        session: &ForwardSession,
        command: &CommandSpec,
    ) -> Result<SessionId, ForwardError> {
        let spawned = self.spawner.spawn(command, &session.label)?;
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pid = spawned.handle.pid();

        self.registry.insert(
            id,
            Entry {
                label: session.label.clone(),
                handle: spawned.handle,
                stopping: AtomicBool::new(false),
            },
        );
        self.metrics.inc_forwards_started();
        self.metrics.set_forwards_active(self.registry.len() as i64);
        self.logger.log_forward_started(id, session, pid);

        // Registered before the watcher starts, so an immediate exit is
        // still removed.
        let registry = Arc::clone(&self.registry);
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();
        let label = session.label.clone();
        let exited = spawned.exited;
        tokio::spawn(async move {
            let code = exited.await.unwrap_or(None);
            let unexpected = registry
                .remove(&id)
                .map(|(_, entry)| !entry.stopping.load(Ordering::Acquire))
                .unwrap_or(false);
            metrics.inc_forward_exits();
            metrics.set_forwards_active(registry.len() as i64);
            logger.log_forward_exited(id, &label, code, unexpected);
        });

        Ok(id)
    }

    /// Terminate every registered process and clear the registry.
    ///
    /// Returns the number of processes registered when the call began.
    pub async fn stop(&self) -> usize {
        let ids: Vec<SessionId> = self.registry.iter().map(|e| *e.key()).collect();
        let count = ids.len();
        if count == 0 {
            return 0;
        }

        debug!(count, "Sending graceful termination to forward processes");
        self.signal_all(&ids, Termination::Graceful);

        tokio::time::sleep(self.config.grace_period).await;

        let remaining: Vec<SessionId> = ids
            .into_iter()
            .filter(|id| self.registry.contains_key(id))
            .collect();
        if !remaining.is_empty() {
            debug!(count = remaining.len(), "Forcing termination of remaining processes");
            self.signal_all(&remaining, Termination::Forced);
        }

        self.registry.clear();
        self.metrics.set_forwards_active(0);
        self.logger.log_forwards_stopped(count, remaining.len());

        count
    }

    fn signal_all(&self, ids: &[SessionId], termination: Termination) {
        for id in ids {
            if let Some(entry) = self.registry.get(id) {
                entry.stopping.store(true, Ordering::Release);
                if let Err(e) = entry.handle.signal(termination) {
                    warn!(
                        session = %id,
                        label = %entry.label,
                        error = %e,
                        ?termination,
                        "Failed to signal forward process"
                    );
                }
            }
        }
    }

    /// Number of live registered processes
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Registered sessions and their labels, ordered by id
    pub fn sessions(&self) -> Vec<(SessionId, String)> {
        let mut sessions: Vec<(SessionId, String)> = self
            .registry
            .iter()
            .map(|e| (*e.key(), e.value().label.clone()))
            .collect();
        sessions.sort_by_key(|(id, _)| *id);
        sessions
    }
}
