use crate::unix_process_manager::{UnixProcessHandle, UnixProcessManager};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ironic_launcher_core::{
    CommandSpec, CompletedProcess, LaunchProcessManager, LaunchProcessManagerFactory,
    LauncherSettings, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager, ProcessStatus,
    ProcessTermination, TerminationResult,
};
use nix::sys::signal::Signal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::signal::unix::{Signal as SignalStream, SignalKind, signal};

/// Signals relayed to a supervised server
///
/// Creating the streams replaces the default disposition for good, so from
/// then on these signals no longer kill the launcher.
struct ForwardedSignals {
    terminate: SignalStream,
    interrupt: SignalStream,
    hangup: SignalStream,
    quit: SignalStream,
}

impl ForwardedSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
            interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            hangup: signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?,
            quit: signal(SignalKind::quit()).context("Failed to install SIGQUIT handler")?,
        })
    }

    /// Next signal received, signals that arrived before the first call included
    async fn next(&mut self) -> Option<Signal> {
        tokio::select! {
            Some(()) = self.terminate.recv() => Some(Signal::SIGTERM),
            Some(()) = self.interrupt.recv() => Some(Signal::SIGINT),
            Some(()) = self.hangup.recv() => Some(Signal::SIGHUP),
            Some(()) = self.quit.recv() => Some(Signal::SIGQUIT),
            else => None,
        }
    }
}

/// Unix implementation of [`LaunchProcessManager`]
///
/// Composes [`UnixProcessManager`] for the low-level work and keeps track of
/// the server it started so it can be torn down if supervision breaks.
pub struct UnixLaunchProcessManager {
    platform_manager: Arc<UnixProcessManager>,
    /// Server processes started and not yet reaped
    active_processes: Mutex<HashMap<ProcessId, String>>,
    /// Installed by `start_server`, consumed by `supervise`
    pending_signals: Mutex<Option<ForwardedSignals>>,
}

impl UnixLaunchProcessManager {
    fn active(&self) -> MutexGuard<'_, HashMap<ProcessId, String>> {
        self.active_processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, Option<ForwardedSignals>> {
        self.pending_signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether signals are already being held for the next supervised server
    pub fn signals_installed(&self) -> bool {
        self.pending().is_some()
    }

    /// PIDs currently tracked as running servers
    pub fn tracked_processes(&self) -> Vec<ProcessId> {
        self.active().keys().copied().collect()
    }

    fn forward(&self, pid: ProcessId, signal: Signal) {
        tracing::info!("Forwarding {} to server {}", signal, pid);
        match self.platform_manager.send_signal(pid, signal) {
            TerminationResult::Success | TerminationResult::ProcessNotFound => {}
            other => tracing::warn!("Could not forward {} to server {}: {:?}", signal, pid, other),
        }
    }
}

#[async_trait]
impl LaunchProcessManager for UnixLaunchProcessManager {
    type Handle = UnixProcessHandle;

    fn new(_settings: &LauncherSettings) -> Self {
        Self {
            platform_manager: Arc::new(UnixProcessManager::new()),
            active_processes: Mutex::new(HashMap::new()),
            pending_signals: Mutex::new(None),
        }
    }

    async fn run_prerequisite(&self, command: &CommandSpec) -> Result<CompletedProcess> {
        self.platform_manager.run_to_completion(command).await
    }

    async fn start_server(&self, command: &CommandSpec) -> Result<UnixProcessHandle> {
        // Before the spawn, otherwise an early SIGTERM orphans the server
        {
            let mut pending = self.pending();
            if pending.is_none() {
                *pending = Some(ForwardedSignals::install()?);
            }
        }

        let handle = self
            .platform_manager
            .spawn_process(command)
            .await
            .with_context(|| format!("Failed to start server with command: {}", command.program))?;

        if let Some(pid) = handle.get_pid() {
            self.active().insert(pid, format!("server:{}", command.program));
        }

        Ok(handle)
    }

    async fn supervise(&self, mut handle: UnixProcessHandle) -> Result<ProcessStatus> {
        let pid = handle
            .get_pid()
            .context("Server was reaped before supervision started")?;
        tracing::info!("Supervising {} (PID {})", handle.get_command(), pid);

        let pending = self.pending().take();
        let mut signals = match pending {
            Some(signals) => signals,
            None => ForwardedSignals::install()?,
        };

        let status = loop {
            tokio::select! {
                status = handle.wait() => break status?,
                Some(received) = signals.next() => self.forward(pid, received),
            }
        };

        self.active().remove(&pid);
        Ok(status)
    }

    fn exec(&self, command: &CommandSpec) -> std::io::Error {
        self.platform_manager.exec(command)
    }

    async fn cleanup(&self) -> Result<()> {
        let active_processes = self.tracked_processes();

        for pid in active_processes {
            match self.platform_manager.terminate_completely(pid).await {
                TerminationResult::Success => {
                    tracing::info!("Successfully terminated server tree for PID {}", pid);
                }
                TerminationResult::ProcessNotFound => {
                    tracing::info!("Process {} already terminated", pid);
                }
                other => {
                    tracing::warn!("Failed to terminate process {}: {:?}", pid, other);
                }
            }
        }

        self.active().clear();
        Ok(())
    }
}

impl Drop for UnixLaunchProcessManager {
    fn drop(&mut self) {
        let active_processes = self.tracked_processes();
        if active_processes.is_empty() {
            return;
        }

        tracing::warn!(
            "Emergency cleanup: terminating {} processes during drop",
            active_processes.len()
        );

        for pid in active_processes {
            use nix::sys::signal;
            use nix::unistd::Pid as NixPid;

            // Servers lead their own process group
            let pgid = NixPid::from_raw(pid as i32);
            if let Err(e) = signal::killpg(pgid, Signal::SIGTERM) {
                tracing::warn!("Failed to send SIGTERM to process group {} during drop: {}", pid, e);

                if let Err(e) = signal::kill(pgid, Signal::SIGKILL) {
                    tracing::error!("Failed to send SIGKILL to process {} during drop: {}", pid, e);
                }
            }
        }
    }
}

/// Factory for creating Unix [`LaunchProcessManager`] instances
pub struct UnixLaunchProcessManagerFactory;

impl LaunchProcessManagerFactory for UnixLaunchProcessManagerFactory {
    type Manager = UnixLaunchProcessManager;

    fn create_process_manager(settings: &LauncherSettings) -> Self::Manager {
        UnixLaunchProcessManager::new(settings)
    }

    fn platform_name() -> &'static str {
        "unix"
    }
}
