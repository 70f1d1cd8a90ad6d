use crate::config::LauncherSettings;
use crate::process::{CommandSpec, CompletedProcess, ProcessHandle, ProcessStatus};
use anyhow::Result;
use async_trait::async_trait;

/// High-level process manager driving the launch sequence
///
/// Implemented by platform crates on top of their low-level
/// [`ProcessManager`](crate::ProcessManager). The launcher only ever talks to
/// this trait, which keeps the state machine testable with a recording fake.
#[async_trait]
pub trait LaunchProcessManager: Send + Sync {
    /// The type of process handle returned for a started server
    type Handle: ProcessHandle;

    fn new(settings: &LauncherSettings) -> Self
    where
        Self: Sized;

    /// Run the setup routine to completion
    async fn run_prerequisite(&self, command: &CommandSpec) -> Result<CompletedProcess>;

    /// Spawn the server and track it for cleanup
    async fn start_server(&self, command: &CommandSpec) -> Result<Self::Handle>;

    /// Relay termination signals to the server until it exits
    async fn supervise(&self, handle: Self::Handle) -> Result<ProcessStatus>;

    /// Replace the current process image with `command`.
    ///
    /// Only returns if the replacement failed.
    fn exec(&self, command: &CommandSpec) -> std::io::Error;

    /// Terminate every tracked process and release resources
    async fn cleanup(&self) -> Result<()>;
}

/// Factory for creating platform-specific [`LaunchProcessManager`]s
pub trait LaunchProcessManagerFactory {
    type Manager: LaunchProcessManager;

    fn create_process_manager(settings: &LauncherSettings) -> Self::Manager;

    /// Platform name for logging
    fn platform_name() -> &'static str;
}
