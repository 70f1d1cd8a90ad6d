use thiserror::Error;

/// Exit status used when a program could not be started at all
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit status for unusable launcher settings
pub const EXIT_USAGE: i32 = 2;

/// Shell convention for a process killed by `signal`
pub fn signal_exit_code(signal: i32) -> i32 {
    128 + signal
}

/// Terminal failures of the launch sequence
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Failed to start setup routine {program}: {reason}")]
    PrerequisiteSpawn { program: String, reason: String },

    #[error("Setup routine failed with exit code {code}")]
    PrerequisiteFailed { code: i32 },

    #[error("Setup routine produced an unreadable environment: {0}")]
    PrerequisiteEnvironment(String),

    #[error("Failed to start server {program}: {reason}")]
    ServerSpawn { program: String, reason: String },

    #[error("Server exited with code {code}")]
    ServerExited { code: i32 },

    #[error("Server terminated by signal {signal}")]
    ServerSignaled { signal: i32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LauncherError {
    /// Process exit status the launcher should terminate with
    pub fn exit_code(&self) -> i32 {
        match self {
            LauncherError::PrerequisiteSpawn { .. } | LauncherError::ServerSpawn { .. } => {
                EXIT_NOT_FOUND
            }
            LauncherError::PrerequisiteFailed { code } | LauncherError::ServerExited { code } => {
                *code
            }
            LauncherError::ServerSignaled { signal } => signal_exit_code(*signal),
            LauncherError::Configuration(_) => EXIT_USAGE,
            LauncherError::PrerequisiteEnvironment(_) | LauncherError::Other(_) => 1,
        }
    }

    /// Whether the failure happened before any server launch was attempted
    pub fn is_prerequisite(&self) -> bool {
        matches!(
            self,
            LauncherError::PrerequisiteSpawn { .. }
                | LauncherError::PrerequisiteFailed { .. }
                | LauncherError::PrerequisiteEnvironment(_)
        )
    }
}

impl From<crate::config::LauncherSettingsBuilderError> for LauncherError {
    fn from(e: crate::config::LauncherSettingsBuilderError) -> Self {
        LauncherError::Configuration(e.to_string())
    }
}
