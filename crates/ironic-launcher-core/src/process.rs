use crate::env::Environment;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Status of a process as observed by the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process exited with the given exit code
    Exited(i32),
    /// Process was terminated by the given signal
    Signaled(i32),
    /// Process status is unknown
    Unknown,
}

impl ProcessStatus {
    pub fn success(&self) -> bool {
        matches!(self, ProcessStatus::Exited(0))
    }

    /// Exit status a shell would report for this process
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessStatus::Exited(code) => *code,
            ProcessStatus::Signaled(signal) => crate::error::signal_exit_code(*signal),
            ProcessStatus::Unknown => 1,
        }
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Permission denied (insufficient privileges)
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// A program invocation with an explicit environment
///
/// The child gets exactly `env`, nothing is inherited implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Environment,
    /// Capture stdout instead of inheriting the launcher's
    pub capture_stdout: bool,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Environment::default(),
            capture_stdout: false,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<S: Into<String>, I: IntoIterator<Item = S>>(mut self, args: I) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn capture_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Outcome of a command that was run to completion
#[derive(Debug, Clone)]
pub struct CompletedProcess {
    pub status: ProcessStatus,
    /// Empty unless the command was spawned with `capture_stdout`
    pub stdout: Vec<u8>,
}

/// Trait representing a handle to a running process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if process has exited)
    fn get_pid(&self) -> Option<ProcessId>;

    /// Get the command that started this process
    fn get_command(&self) -> &str;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;
}

/// Core trait for process lifecycle management
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// The type of process handle this lifecycle manager produces
    type Handle: ProcessHandle;

    /// Spawn a new process described by `spec`
    async fn spawn_process(&self, spec: &CommandSpec) -> Result<Self::Handle>;

    /// Spawn a process and wait for it, collecting stdout when requested
    async fn run_to_completion(&self, spec: &CommandSpec) -> Result<CompletedProcess>;
}

/// Trait for process termination including process trees
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Find all descendants of a given process
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Terminate an entire process tree (parent and all descendants)
    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult;

    /// Terminate the process group led by `pid`
    async fn terminate_process_group(&self, pid: ProcessId) -> TerminationResult;

    /// Process group first, then the process tree for whatever escaped it
    async fn terminate_completely(&self, pid: ProcessId) -> TerminationResult {
        match self.terminate_process_group(pid).await {
            TerminationResult::Success => TerminationResult::Success,
            _ => self.terminate_process_tree(pid).await,
        }
    }
}

/// Low-level process manager combining lifecycle and termination
pub trait ProcessManager: ProcessLifecycle + ProcessTermination {
    fn new() -> Self
    where
        Self: Sized;
}
