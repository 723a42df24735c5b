//! Log windows for forward sessions
//!
//! A [`TerminalLauncher`] tries each platform terminal in priority order
//! and falls back to running the command as a headless background process
//! when no window can be opened. Launch failures are logged, never
//! returned to the caller.

use crate::cluster::CommandSpec;
use crate::error::ForwardError;
use crate::observability::ForwarderMetrics;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// One way of opening a window that runs a command
pub trait WindowStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this strategy can be used on the current host
    fn is_available(&self) -> bool;

    fn open(&self, title: &str, command: &CommandSpec) -> Result<(), ForwardError>;
}

/// Result of a launch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Opened in a window by the named strategy
    Window(String),
    /// No window; running as a background process
    Headless,
    /// Nothing could be launched
    Failed(String),
}

/// Terminal emulators we know how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalProgram {
    /// macOS Terminal.app through AppleScript
    Osascript,
    GnomeTerminal,
    Konsole,
    XTerminalEmulator,
    Xterm,
    /// `cmd /c start` on Windows
    WindowsStart,
}

impl TerminalProgram {
    pub fn program(&self) -> &'static str {
        match self {
            TerminalProgram::Osascript => "osascript",
            TerminalProgram::GnomeTerminal => "gnome-terminal",
            TerminalProgram::Konsole => "konsole",
            TerminalProgram::XTerminalEmulator => "x-terminal-emulator",
            TerminalProgram::Xterm => "xterm",
            TerminalProgram::WindowsStart => "cmd",
        }
    }

    /// Candidates for the current platform, highest priority first
    pub fn platform_candidates() -> Vec<TerminalProgram> {
        if cfg!(target_os = "macos") {
            vec![TerminalProgram::Osascript]
        } else if cfg!(windows) {
            vec![TerminalProgram::WindowsStart]
        } else {
            vec![
                TerminalProgram::GnomeTerminal,
                TerminalProgram::Konsole,
                TerminalProgram::XTerminalEmulator,
                TerminalProgram::Xterm,
            ]
        }
    }

    /// Arguments that make this terminal run `command` in a window titled `title`
    pub fn args(&self, title: &str, command: &CommandSpec) -> Vec<String> {
        let mut argv = Vec::with_capacity(command.args.len() + 1);
        argv.push(command.program.clone());
        argv.extend(command.args.iter().cloned());

        match self {
            TerminalProgram::Osascript => {
                let script = format!(
                    "tell application \"Terminal\" to do script \"printf '\\\\e]0;{}\\\\a'; {}\"",
                    applescript_escape(title),
                    applescript_escape(&command.display())
                );
                vec!["-e".to_string(), script]
            }
            TerminalProgram::GnomeTerminal => {
                let mut args = vec![format!("--title={}", title), "--".to_string()];
                args.extend(argv);
                args
            }
            TerminalProgram::Konsole => {
                let mut args = vec![
                    "-p".to_string(),
                    format!("tabtitle={}", title),
                    "-e".to_string(),
                ];
                args.extend(argv);
                args
            }
            TerminalProgram::XTerminalEmulator | TerminalProgram::Xterm => {
                let mut args = vec!["-T".to_string(), title.to_string(), "-e".to_string()];
                args.extend(argv);
                args
            }
            TerminalProgram::WindowsStart => {
                let mut args = vec!["/c".to_string(), "start".to_string(), title.to_string()];
                args.extend(argv);
                args
            }
        }
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Spawn a detached process with all stdio discarded
fn spawn_detached(program: &str, args: &[String]) -> Result<(), ForwardError> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|source| ForwardError::Spawn {
            program: program.to_string(),
            source,
        })
}

impl WindowStrategy for TerminalProgram {
    fn name(&self) -> &str {
        self.program()
    }

    fn is_available(&self) -> bool {
        which::which(self.program()).is_ok()
    }

    fn open(&self, title: &str, command: &CommandSpec) -> Result<(), ForwardError> {
        spawn_detached(self.program(), &self.args(title, command))
    }
}

/// Runs the command itself in the background, output discarded
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessStrategy;

impl WindowStrategy for HeadlessStrategy {
    fn name(&self) -> &str {
        "headless"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, _title: &str, command: &CommandSpec) -> Result<(), ForwardError> {
        spawn_detached(&command.program, &command.args)
    }
}

/// Prioritized chain of window strategies with a headless fallback
pub struct TerminalLauncher {
    strategies: Vec<Box<dyn WindowStrategy>>,
    fallback: Box<dyn WindowStrategy>,
    metrics: ForwarderMetrics,
}

impl TerminalLauncher {
    pub fn with_strategies(
        strategies: Vec<Box<dyn WindowStrategy>>,
        fallback: Box<dyn WindowStrategy>,
    ) -> Self {
        Self {
            strategies,
            fallback,
            metrics: ForwarderMetrics::new(),
        }
    }

    /// Platform terminals, or headless only when `enable_windows` is false
    pub fn platform_default(enable_windows: bool) -> Self {
        let strategies: Vec<Box<dyn WindowStrategy>> = if enable_windows {
            TerminalProgram::platform_candidates()
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn WindowStrategy>)
                .collect()
        } else {
            Vec::new()
        };
        Self::with_strategies(strategies, Box::new(HeadlessStrategy))
    }

    /// Names of the window strategies, in the order they are tried
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn open(&self, title: &str, command: &CommandSpec) -> LaunchOutcome {
        for strategy in &self.strategies {
            if !strategy.is_available() {
                debug!(strategy = strategy.name(), "Terminal not available");
                continue;
            }
            match strategy.open(title, command) {
                Ok(()) => {
                    debug!(strategy = strategy.name(), title, "Opened log window");
                    return LaunchOutcome::Window(strategy.name().to_string());
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Failed to open log window");
                }
            }
        }

        self.metrics.inc_log_window_fallbacks();
        match self.fallback.open(title, command) {
            Ok(()) => {
                debug!(title, command = %command.display(), "Running logs headless");
                LaunchOutcome::Headless
            }
            Err(e) => {
                warn!(title, error = %e, "Failed to start log process");
                LaunchOutcome::Failed(e.to_string())
            }
        }
    }
}
