use anyhow::{Context, Result};
use async_trait::async_trait;
use ironic_launcher_core::{
    CommandSpec, CompletedProcess, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager,
    ProcessStatus, ProcessTermination, TerminationResult,
};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Map a raw wait status onto the launcher's view of it
pub fn process_status(status: ExitStatus) -> ProcessStatus {
    if let Some(code) = status.code() {
        ProcessStatus::Exited(code)
    } else if let Some(signal) = status.signal() {
        ProcessStatus::Signaled(signal)
    } else {
        ProcessStatus::Unknown
    }
}

/// Blocking command with the environment replaced by the command's snapshot
pub fn std_command(spec: &CommandSpec) -> std::process::Command {
    let mut cmd = std::process::Command::new(&spec.program);
    cmd.args(&spec.args);
    cmd.env_clear();
    cmd.envs(spec.env.iter());
    cmd
}

/// Unix-specific process handle implementation
pub struct UnixProcessHandle {
    child: Child,
    command: String,
}

impl UnixProcessHandle {
    pub fn new(child: Child, command: String) -> Self {
        Self { child, command }
    }
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id()
    }

    fn get_command(&self) -> &str {
        &self.command
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        Ok(process_status(status))
    }
}

/// Unix-specific process manager with process tree management
pub struct UnixProcessManager {
    system: std::sync::Mutex<System>,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UnixProcessManager {
    /// Replace the current process image with `spec`.
    ///
    /// Only returns if the replacement failed.
    pub fn exec(&self, spec: &CommandSpec) -> std::io::Error {
        info!("Replacing launcher with: {}", spec);
        std_command(spec).exec()
    }

    /// Send `signal` to a single process
    pub fn send_signal(&self, pid: ProcessId, signal: Signal) -> TerminationResult {
        match signal::kill(NixPid::from_raw(pid as i32), signal) {
            Ok(()) => {
                info!("Sent {} to process {}", signal, pid);
                TerminationResult::Success
            }
            Err(nix::errno::Errno::ESRCH) => {
                info!("Process {} not found (already terminated)", pid);
                TerminationResult::ProcessNotFound
            }
            Err(nix::errno::Errno::EPERM) => {
                warn!("Permission denied to signal process {}", pid);
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!("Failed to send {} to process {}: {}", signal, pid, e);
                TerminationResult::Failed(format!("{signal} failed: {e}"))
            }
        }
    }

    /// SIGTERM, a grace period, then SIGKILL
    async fn terminate_single_process(&self, pid: ProcessId) -> TerminationResult {
        match self.send_signal(pid, Signal::SIGTERM) {
            TerminationResult::Success => {
                tokio::time::sleep(Duration::from_millis(500)).await;

                match self.send_signal(pid, Signal::SIGKILL) {
                    TerminationResult::ProcessNotFound => TerminationResult::Success,
                    other => other,
                }
            }
            TerminationResult::ProcessNotFound => TerminationResult::Success,
            other => other,
        }
    }

    /// Recursively find all child processes, deepest first
    fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
        for (pid, process) in system.processes() {
            if process.parent().map(|ppid| ppid.as_u32()) == Some(parent_pid) {
                let child_pid = pid.as_u32();
                Self::find_children_recursive(system, child_pid, result);
                result.push(child_pid);
            }
        }
    }
}

#[async_trait]
impl ProcessLifecycle for UnixProcessManager {
    type Handle = UnixProcessHandle;

    async fn spawn_process(&self, spec: &CommandSpec) -> Result<UnixProcessHandle> {
        let mut cmd = Command::from(std_command(spec));

        // Own process group so the whole server tree can be signalled at once
        cmd.process_group(0);
        if spec.capture_stdout {
            cmd.stdout(Stdio::piped());
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", spec.program))?;

        if let Some(pid) = child.id() {
            info!("Spawned Unix process: {} (PID: {})", spec.program, pid);
            debug!("Arguments: {:?}", spec.args);
        }

        Ok(UnixProcessHandle::new(child, spec.program.clone()))
    }

    async fn run_to_completion(&self, spec: &CommandSpec) -> Result<CompletedProcess> {
        let mut cmd = Command::from(std_command(spec));
        cmd.stdin(Stdio::null());
        cmd.stderr(Stdio::inherit());
        cmd.stdout(if spec.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run {}", spec.program))?;

        Ok(CompletedProcess {
            status: process_status(output.status),
            stdout: output.stdout,
        })
    }
}

#[async_trait]
impl ProcessTermination for UnixProcessManager {
    async fn find_child_processes(&self, parent_pid: ProcessId) -> Result<Vec<ProcessId>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("process table lock poisoned"))?;
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            sysinfo::ProcessRefreshKind::default(),
        );

        let mut children = Vec::new();
        Self::find_children_recursive(&system, parent_pid, &mut children);
        Ok(children)
    }

    async fn terminate_process_tree(&self, root_pid: ProcessId) -> TerminationResult {
        info!("Terminating process tree for root PID {}", root_pid);

        let children = match self.find_child_processes(root_pid).await {
            Ok(children) => children,
            Err(e) => {
                warn!("Failed to find child processes for PID {}: {}", root_pid, e);
                return TerminationResult::Failed(format!("Failed to enumerate children: {e}"));
            }
        };

        if !children.is_empty() {
            info!("Found {} child processes to terminate", children.len());
            for child_pid in &children {
                match self.terminate_single_process(*child_pid).await {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                    result => {
                        warn!("Failed to terminate child process {}: {:?}", child_pid, result);
                    }
                }
            }
        }

        self.terminate_single_process(root_pid).await
    }

    async fn terminate_process_group(&self, pid: ProcessId) -> TerminationResult {
        let pgid = NixPid::from_raw(pid as i32);

        match signal::killpg(pgid, Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to process group {}", pid);
                tokio::time::sleep(Duration::from_millis(2000)).await;

                match signal::killpg(pgid, Signal::SIGKILL) {
                    Ok(()) => {
                        info!("Sent SIGKILL to process group {}", pid);
                        TerminationResult::Success
                    }
                    Err(nix::errno::Errno::ESRCH) => TerminationResult::Success,
                    Err(e) => {
                        warn!("Failed to send SIGKILL to process group {}: {}", pid, e);
                        TerminationResult::Failed(format!("SIGKILL to process group failed: {e}"))
                    }
                }
            }
            Err(nix::errno::Errno::ESRCH) => TerminationResult::ProcessNotFound,
            Err(nix::errno::Errno::EPERM) => {
                warn!("Permission denied to terminate process group {}", pid);
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to process group {}: {}", pid, e);
                TerminationResult::Failed(format!("SIGTERM to process group failed: {e}"))
            }
        }
    }
}

impl ProcessManager for UnixProcessManager {
    fn new() -> Self {
        debug!("Initializing Unix process manager");
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironic_launcher_core::Environment;

    fn shell(script: &str) -> CommandSpec {
        CommandSpec::new("sh")
            .args(["-c", script])
            .env(Environment::from_process())
    }

    async fn wait_briefly(handle: &mut UnixProcessHandle) -> ProcessStatus {
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("process did not exit in time")
            .unwrap()
    }

    #[tokio::test]
    async fn test_exit_code_is_reported() {
        let manager = UnixProcessManager::new();
        let completed = manager.run_to_completion(&shell("exit 7")).await.unwrap();
        assert_eq!(completed.status, ProcessStatus::Exited(7));
        assert!(completed.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_stdout_capture_and_explicit_env() {
        let manager = UnixProcessManager::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$ONLY_VAR\"; test -z \"$HOME\""])
            .env([("ONLY_VAR", "value"), ("PATH", "/usr/bin:/bin")].into_iter().collect())
            .capture_stdout();

        let completed = manager.run_to_completion(&spec).await.unwrap();
        assert_eq!(completed.stdout, b"value");
        // nothing but the snapshot reaches the child
        assert!(completed.status.success());
    }

    #[tokio::test]
    async fn test_non_unicode_environment_reaches_child() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let manager = UnixProcessManager::new();
        let env: Environment = [
            (OsStr::new("RAW_BYTES"), OsStr::from_bytes(b"caf\xe9")),
            (OsStr::new("PATH"), OsStr::new("/usr/bin:/bin")),
        ]
        .into_iter()
        .collect();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$RAW_BYTES\""])
            .env(env)
            .capture_stdout();

        let completed = manager.run_to_completion(&spec).await.unwrap();
        assert!(completed.status.success());
        assert_eq!(completed.stdout, b"caf\xe9");
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let manager = UnixProcessManager::new();
        let spec = CommandSpec::new("/nonexistent/ironic-launcher-test-binary");
        assert!(manager.spawn_process(&spec).await.is_err());
        assert!(manager.run_to_completion(&spec).await.is_err());
    }

    #[tokio::test]
    async fn test_signal_death_is_reported() {
        let manager = UnixProcessManager::new();
        let mut handle = manager.spawn_process(&shell("sleep 30")).await.unwrap();
        let pid = handle.get_pid().unwrap();

        assert_eq!(
            manager.send_signal(pid, Signal::SIGTERM),
            TerminationResult::Success
        );
        let status = wait_briefly(&mut handle).await;
        assert_eq!(status, ProcessStatus::Signaled(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_terminate_completely_stops_process_group() {
        let manager = UnixProcessManager::new();
        let mut handle = manager
            .spawn_process(&shell("sleep 30 & sleep 30 & wait"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let pid = handle.get_pid().unwrap();
        let children = manager.find_child_processes(pid).await.unwrap();
        assert_eq!(children.len(), 2);

        assert_eq!(
            manager.terminate_completely(pid).await,
            TerminationResult::Success
        );
        let status = wait_briefly(&mut handle).await;
        assert!(matches!(status, ProcessStatus::Signaled(_)));
    }
}
