use crate::config::{LaunchConfig, LaunchMode, LauncherSettings, SetupPolicy, resolve_config};
use crate::env::Environment;
use crate::error::LauncherError;
use crate::process::{CommandSpec, ProcessStatus};
use crate::process_manager_trait::LaunchProcessManager;
use crate::server::{prerequisite_command, server_command};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Nothing has run yet
pub struct Start;

/// Setup routine finished, environment is final
pub struct Prepared;

/// Bind parameters resolved, ready to launch
pub struct Resolved {
    config: LaunchConfig,
}

/// Launch sequence `Start -> Prepared -> Resolved -> launched`.
///
/// Every transition consumes the previous state, so steps can neither be
/// skipped nor reordered. Any `Err` is terminal.
pub struct Launcher<State, Manager> {
    settings: LauncherSettings,
    env: Environment,
    process_manager: Arc<Manager>,
    state: State,
}

impl<State, Manager> Launcher<State, Manager> {
    pub fn settings(&self) -> &LauncherSettings {
        &self.settings
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    fn transition<Next>(self, state: Next) -> Launcher<Next, Manager> {
        Launcher {
            settings: self.settings,
            env: self.env,
            process_manager: self.process_manager,
            state,
        }
    }
}

impl<Manager: LaunchProcessManager> Launcher<Start, Manager> {
    pub fn new(
        settings: LauncherSettings,
        env: Environment,
        process_manager: Arc<Manager>,
    ) -> Result<Self, LauncherError> {
        settings.validate()?;
        Ok(Self {
            settings,
            env,
            process_manager,
            state: Start,
        })
    }

    /// Run the configured setup routine to completion.
    ///
    /// A sourced script's final environment replaces the snapshot before
    /// anything is resolved from it, unset variables included.
    pub async fn run_prerequisite_setup(self) -> Result<Launcher<Prepared, Manager>, LauncherError> {
        let Some(prerequisite) = self.settings.prerequisite.clone() else {
            info!("No setup routine configured, skipping");
            return Ok(self.transition(Prepared));
        };

        let command = prerequisite_command(&prerequisite, &self.env);
        info!("Running setup routine: {}", command);

        let completed = self
            .process_manager
            .run_prerequisite(&command)
            .await
            .map_err(|e| LauncherError::PrerequisiteSpawn {
                program: command.program.clone(),
                reason: format!("{e:#}"),
            })?;

        if !completed.status.success() {
            let code = completed.status.exit_code();
            return match self.settings.setup_policy {
                SetupPolicy::Strict => Err(LauncherError::PrerequisiteFailed { code }),
                SetupPolicy::Lenient => {
                    warn!(
                        "Setup routine failed with exit code {}, continuing without its environment",
                        code
                    );
                    Ok(self.transition(Prepared))
                }
            };
        }

        let mut launcher = self;
        if command.capture_stdout {
            let sourced = Environment::from_env_dump(&completed.stdout)?;
            debug!("Setup routine left {} variables", sourced.len());
            launcher.env.apply_sourced(sourced);
        }

        info!("Setup routine completed");
        Ok(launcher.transition(Prepared))
    }
}

impl<Manager: LaunchProcessManager> Launcher<Prepared, Manager> {
    /// Resolve bind parameters from the (post-setup) environment
    pub fn resolve(self) -> Launcher<Resolved, Manager> {
        let config = resolve_config(&self.env);
        info!(
            bind = %config.bind_spec(),
            config_path = %config.config_path.display(),
            "Launch configuration resolved"
        );
        self.transition(Resolved { config })
    }
}

impl<Manager: LaunchProcessManager> Launcher<Resolved, Manager> {
    pub fn config(&self) -> &LaunchConfig {
        &self.state.config
    }

    pub fn server_command(&self) -> CommandSpec {
        server_command(&self.settings.server_program, &self.state.config, &self.env)
    }

    /// Start the server. This is the last thing the launcher does.
    ///
    /// In [`LaunchMode::Exec`] a successful call never returns. In
    /// [`LaunchMode::Supervise`] it returns once the server has exited, `Ok`
    /// only for a zero exit status; no launcher cleanup runs after the
    /// server is up besides relaying that status.
    pub async fn launch(self) -> Result<(), LauncherError> {
        let command = self.server_command();
        info!("Launching server: {}", command);
        debug!(env = ?command.env.keys().collect::<Vec<_>>(), "Server environment");

        match self.settings.launch_mode {
            LaunchMode::Exec => {
                let error = self.process_manager.exec(&command);
                Err(LauncherError::ServerSpawn {
                    program: command.program,
                    reason: error.to_string(),
                })
            }
            LaunchMode::Supervise => self.launch_supervised(command).await,
        }
    }

    async fn launch_supervised(self, command: CommandSpec) -> Result<(), LauncherError> {
        let handle = self
            .process_manager
            .start_server(&command)
            .await
            .map_err(|e| LauncherError::ServerSpawn {
                program: command.program.clone(),
                reason: format!("{e:#}"),
            })?;

        let status = match self.process_manager.supervise(handle).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Lost track of the server, terminating it: {:#}", e);
                if let Err(cleanup) = self.process_manager.cleanup().await {
                    warn!("Server cleanup failed: {:#}", cleanup);
                }
                return Err(e.into());
            }
        };

        info!("Server exited: {:?}", status);
        match status {
            ProcessStatus::Exited(0) => Ok(()),
            ProcessStatus::Exited(code) => Err(LauncherError::ServerExited { code }),
            ProcessStatus::Signaled(signal) => Err(LauncherError::ServerSignaled { signal }),
            other => Err(LauncherError::Other(anyhow::anyhow!(
                "server finished in unexpected state {other:?}"
            ))),
        }
    }
}

/// Run the whole sequence: setup, resolution, launch
pub async fn run<Manager: LaunchProcessManager>(
    settings: LauncherSettings,
    env: Environment,
    process_manager: Arc<Manager>,
) -> Result<(), LauncherError> {
    Launcher::new(settings, env, process_manager)?
        .run_prerequisite_setup()
        .await?
        .resolve()
        .launch()
        .await
}
