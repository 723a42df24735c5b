//! Supervisor tests using a fake process double
//!
//! The fake records every signal it receives with a timestamp so that the
//! graceful-then-forced sequence of `stop` can be checked.

pub(crate) mod fakes {
    use crate::cluster::CommandSpec;
    use crate::error::ForwardError;
    use crate::supervisor::{ProcessHandle, ProcessSpawner, SpawnedProcess, Termination};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    /// Signal received by a fake process
    #[derive(Debug, Clone)]
    pub struct SignalRecord {
        pub pid: u32,
        pub termination: Termination,
        pub at: Instant,
    }

    #[derive(Default)]
    struct State {
        next_pid: u32,
        spawned: Vec<CommandSpec>,
        signals: Vec<SignalRecord>,
        exits: Vec<(u32, oneshot::Sender<Option<i32>>)>,
        /// Pids that exit as soon as they receive a graceful signal
        obedient: bool,
    }

    /// Spawner whose processes never run anything
    #[derive(Clone, Default)]
    pub struct FakeSpawner {
        state: Arc<Mutex<State>>,
    }

    impl FakeSpawner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Processes exit when they receive a graceful signal
        pub fn obedient() -> Self {
            let spawner = Self::default();
            spawner.state.lock().unwrap().obedient = true;
            spawner
        }

        pub fn spawned(&self) -> Vec<CommandSpec> {
            self.state.lock().unwrap().spawned.clone()
        }

        pub fn signals(&self) -> Vec<SignalRecord> {
            self.state.lock().unwrap().signals.clone()
        }

        /// Make a process exit on its own with `code`
        pub fn exit(&self, pid: u32, code: i32) {
            let mut state = self.state.lock().unwrap();
            if let Some(pos) = state.exits.iter().position(|(p, _)| *p == pid) {
                let (_, tx) = state.exits.remove(pos);
                let _ = tx.send(Some(code));
            }
        }
    }

    impl ProcessSpawner for FakeSpawner {
        fn spawn(&self, command: &CommandSpec, _label: &str) -> Result<SpawnedProcess, ForwardError> {
            let mut state = self.state.lock().unwrap();
            state.next_pid += 1;
            let pid = 1000 + state.next_pid;
            state.spawned.push(command.clone());

            let (tx, rx) = oneshot::channel();
            state.exits.push((pid, tx));

            Ok(SpawnedProcess {
                handle: Box::new(FakeHandle {
                    pid,
                    state: Arc::clone(&self.state),
                }),
                exited: rx,
            })
        }
    }

    struct FakeHandle {
        pid: u32,
        state: Arc<Mutex<State>>,
    }

    impl ProcessHandle for FakeHandle {
        fn pid(&self) -> Option<u32> {
            Some(self.pid)
        }

        fn signal(&self, termination: Termination) -> Result<(), ForwardError> {
            let mut state = self.state.lock().unwrap();
            state.signals.push(SignalRecord {
                pid: self.pid,
                termination,
                at: Instant::now(),
            });
            if state.obedient && termination == Termination::Graceful {
                if let Some(pos) = state.exits.iter().position(|(p, _)| *p == self.pid) {
                    let (_, tx) = state.exits.remove(pos);
                    let _ = tx.send(None);
                }
            }
            Ok(())
        }
    }

    /// Spawner that always fails
    pub struct FailingSpawner;

    impl ProcessSpawner for FailingSpawner {
        fn spawn(&self, command: &CommandSpec, _label: &str) -> Result<SpawnedProcess, ForwardError> {
            Err(ForwardError::Spawn {
                program: command.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            })
        }
    }
}

mod supervisor_tests {
    use super::fakes::{FailingSpawner, FakeSpawner};
    use crate::cluster::CommandSpec;
    use crate::models::{Environment, ForwardSession};
    use crate::supervisor::{ProcessSupervisor, SupervisorConfig, Termination};
    use std::sync::Arc;
    use std::time::Duration;

    fn session(label: &str, local_port: u16) -> ForwardSession {
        ForwardSession {
            namespace: "shop".to_string(),
            pod_name: format!("shop-{}-aa-bb", label),
            local_port,
            remote_port: 80,
            label: label.to_string(),
            include_logs: false,
            environment: Environment::Default,
        }
    }

    fn supervisor(spawner: &FakeSpawner, grace: Duration) -> ProcessSupervisor {
        ProcessSupervisor::new(
            Arc::new(spawner.clone()),
            SupervisorConfig {
                grace_period: grace,
            },
        )
    }

    fn start(supervisor: &ProcessSupervisor, label: &str, port: u16) {
        let session = session(label, port);
        let command = CommandSpec::port_forward("kubectl", &session);
        supervisor.spawn(&session, &command).unwrap();
    }

    /// Let exit watcher tasks run
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_spawn_registers_process() {
        let spawner = FakeSpawner::new();
        let supervisor = supervisor(&spawner, Duration::from_millis(10));

        start(&supervisor, "cart", 8080);
        start(&supervisor, "orders", 8081);

        assert_eq!(supervisor.len(), 2);
        assert_eq!(spawner.spawned().len(), 2);
        assert_eq!(spawner.spawned()[0].args[4], "8080:80");

        let labels: Vec<String> = supervisor.sessions().into_iter().map(|(_, l)| l).collect();
        assert_eq!(labels, vec!["cart", "orders"]);
    }

    #[tokio::test]
    async fn test_stop_clears_registry_and_reports_count() {
        let spawner = FakeSpawner::new();
        let supervisor = supervisor(&spawner, Duration::from_millis(10));

        for (i, label) in ["a", "b", "c"].iter().enumerate() {
            start(&supervisor, label, 9000 + i as u16);
        }

        assert_eq!(supervisor.stop().await, 3);
        assert!(supervisor.is_empty());
        assert_eq!(supervisor.stop().await, 0);
    }

    #[tokio::test]
    async fn test_stop_is_graceful_then_forced() {
        let spawner = FakeSpawner::new();
        let grace = Duration::from_millis(50);
        let supervisor = supervisor(&spawner, grace);

        start(&supervisor, "a", 9000);
        start(&supervisor, "b", 9001);

        supervisor.stop().await;

        let signals = spawner.signals();
        assert_eq!(signals.len(), 4);
        assert!(signals[..2]
            .iter()
            .all(|s| s.termination == Termination::Graceful));
        assert!(signals[2..].iter().all(|s| s.termination == Termination::Forced));

        let last_graceful = signals[1].at;
        let first_forced = signals[2].at;
        assert!(first_forced.duration_since(last_graceful) >= grace);
    }

    #[tokio::test]
    async fn test_processes_that_exit_during_grace_are_not_forced() {
        let spawner = FakeSpawner::obedient();
        let supervisor = supervisor(&spawner, Duration::from_millis(50));

        start(&supervisor, "a", 9000);
        start(&supervisor, "b", 9001);

        assert_eq!(supervisor.stop().await, 2);
        assert!(spawner
            .signals()
            .iter()
            .all(|s| s.termination == Termination::Graceful));
    }

    #[tokio::test]
    async fn test_self_exited_process_is_removed() {
        let spawner = FakeSpawner::new();
        let supervisor = supervisor(&spawner, Duration::from_millis(10));

        start(&supervisor, "a", 9000);
        start(&supervisor, "b", 9001);
        assert_eq!(supervisor.len(), 2);

        spawner.exit(1001, 1);
        settle().await;

        assert_eq!(supervisor.len(), 1);
        assert_eq!(supervisor.sessions()[0].1, "b");
        assert_eq!(supervisor.stop().await, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_registry_untouched() {
        let supervisor = ProcessSupervisor::new(Arc::new(FailingSpawner), SupervisorConfig::default());
        let session = session("a", 9000);
        let command = CommandSpec::port_forward("kubectl", &session);

        assert!(supervisor.spawn(&session, &command).is_err());
        assert!(supervisor.is_empty());
    }

    #[test]
    fn test_default_grace_period() {
        assert_eq!(
            SupervisorConfig::default().grace_period,
            Duration::from_millis(500)
        );
    }
}
