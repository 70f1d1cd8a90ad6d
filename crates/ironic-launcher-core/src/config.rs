use crate::env::Environment;
use crate::error::LauncherError;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable carrying the bind address
pub const HOST_VAR: &str = "FLASK_RUN_HOST";
/// Environment variable carrying the bind port
pub const PORT_VAR: &str = "FLASK_RUN_PORT";
/// Environment variable the exporter reads its Ironic config location from
pub const CONFIG_VAR: &str = "IRONIC_CONFIG";

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: &str = "9608";
pub const IRONIC_CONFIG_PATH: &str = "/etc/ironic/ironic.conf";

pub const DEFAULT_SETUP_SCRIPT: &str = "/bin/configure-ironic.sh";
pub const DEFAULT_SETUP_SHELL: &str = "/bin/bash";
pub const DEFAULT_SERVER_PROGRAM: &str = "gunicorn";

/// Network bind parameters and config location handed to the server
///
/// Built once by [`resolve_config`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub bind_host: String,
    /// Kept as a string, it is forwarded to the server verbatim
    pub bind_port: String,
    pub config_path: PathBuf,
}

impl LaunchConfig {
    /// `host:port` pair the server listens on
    pub fn bind_spec(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

/// Resolve the launch configuration from an environment snapshot.
///
/// Unset and empty variables both fall back to the literal defaults. The
/// config path is fixed and always wins over whatever `IRONIC_CONFIG` held.
pub fn resolve_config(env: &Environment) -> LaunchConfig {
    LaunchConfig {
        bind_host: env
            .get_non_empty(HOST_VAR)
            .unwrap_or(DEFAULT_BIND_HOST)
            .to_string(),
        bind_port: env
            .get_non_empty(PORT_VAR)
            .unwrap_or(DEFAULT_BIND_PORT)
            .to_string(),
        config_path: PathBuf::from(IRONIC_CONFIG_PATH),
    }
}

/// What to do when the prerequisite setup exits non-zero
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetupPolicy {
    /// Abort the launch and exit with the setup's code
    #[default]
    Strict,
    /// Log the failure and launch anyway
    Lenient,
}

/// How the server process is started
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    /// Replace the launcher's process image with the server
    #[default]
    Exec,
    /// Spawn the server, forward signals to it and relay its exit status
    Supervise,
}

/// External setup routine run before the server is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Prerequisite {
    /// Source a shell script and import the variables it exports
    Source { script: PathBuf, shell: PathBuf },
    /// Run an opaque command, only its exit status matters
    Command { program: String, args: Vec<String> },
}

impl Default for Prerequisite {
    fn default() -> Self {
        Prerequisite::Source {
            script: PathBuf::from(DEFAULT_SETUP_SCRIPT),
            shell: PathBuf::from(DEFAULT_SETUP_SHELL),
        }
    }
}

/// Launcher behaviour knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
#[serde(rename_all = "camelCase")]
pub struct LauncherSettings {
    #[builder(default = "Some(Prerequisite::default())")]
    #[serde(default = "default_prerequisite")]
    pub prerequisite: Option<Prerequisite>,
    #[builder(default)]
    #[serde(default)]
    pub setup_policy: SetupPolicy,
    #[builder(default = "DEFAULT_SERVER_PROGRAM.to_string()")]
    #[serde(default = "default_server_program")]
    pub server_program: String,
    #[builder(default)]
    #[serde(default)]
    pub launch_mode: LaunchMode,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            prerequisite: default_prerequisite(),
            setup_policy: SetupPolicy::default(),
            server_program: default_server_program(),
            launch_mode: LaunchMode::default(),
        }
    }
}

impl LauncherSettings {
    pub fn builder() -> LauncherSettingsBuilder {
        LauncherSettingsBuilder::default()
    }

    /// Reject settings that could never launch anything
    pub fn validate(&self) -> Result<(), LauncherError> {
        if self.server_program.trim().is_empty() {
            return Err(LauncherError::Configuration(
                "server program cannot be empty".to_string(),
            ));
        }

        match &self.prerequisite {
            Some(Prerequisite::Source { script, shell }) => {
                if script.as_os_str().is_empty() {
                    return Err(LauncherError::Configuration(
                        "setup script path cannot be empty".to_string(),
                    ));
                }
                if shell.as_os_str().is_empty() {
                    return Err(LauncherError::Configuration(
                        "setup shell cannot be empty".to_string(),
                    ));
                }
            }
            Some(Prerequisite::Command { program, .. }) if program.trim().is_empty() => {
                return Err(LauncherError::Configuration(
                    "setup command cannot be empty".to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }
}

impl LauncherSettingsBuilder {
    /// Do not run any setup routine before launching
    pub fn skip_prerequisite(&mut self) -> &mut Self {
        self.prerequisite = Some(None);
        self
    }

    pub fn source_script<P: Into<PathBuf>>(&mut self, script: P, shell: P) -> &mut Self {
        self.prerequisite = Some(Some(Prerequisite::Source {
            script: script.into(),
            shell: shell.into(),
        }));
        self
    }

    pub fn setup_command<P: ToString, S: ToString, I: IntoIterator<Item = S>>(
        &mut self,
        program: P,
        args: I,
    ) -> &mut Self {
        self.prerequisite = Some(Some(Prerequisite::Command {
            program: program.to_string(),
            args: args.into_iter().map(|s| s.to_string()).collect(),
        }));
        self
    }
}

// Default value functions for serde
fn default_prerequisite() -> Option<Prerequisite> {
    Some(Prerequisite::default())
}
fn default_server_program() -> String {
    DEFAULT_SERVER_PROGRAM.to_string()
}
