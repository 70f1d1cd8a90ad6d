//! Launcher for the Ironic Prometheus exporter
//!
//! Runs the Ironic setup script, resolves the bind address from
//! `FLASK_RUN_HOST`/`FLASK_RUN_PORT` and starts the exporter's WSGI
//! application under gunicorn with a fixed worker count, either replacing
//! the launcher process or supervising the server.

pub mod cli;
mod factory;
mod launcher;
pub mod logging;

pub use factory::{PlatformLaunchProcessManagerFactory, PlatformProcessManager};
pub use launcher::IronicLauncher;

// Re-export core functionality
pub use ironic_launcher_core::*;

/// Process exit code for a failed launch
pub fn exit_code(error: &LauncherError) -> std::process::ExitCode {
    std::process::ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}
