use crate::logging::LogFormat;
use clap::Parser;
use ironic_launcher_core::{
    DEFAULT_SERVER_PROGRAM, DEFAULT_SETUP_SCRIPT, DEFAULT_SETUP_SHELL, LaunchMode, LauncherError,
    LauncherSettings, SetupPolicy,
};
use std::path::PathBuf;

/// Prepare the Ironic environment and run the Prometheus exporter under gunicorn.
///
/// The bind address comes from FLASK_RUN_HOST / FLASK_RUN_PORT
/// (default 0.0.0.0:9608); IRONIC_CONFIG is always /etc/ironic/ironic.conf.
#[derive(Debug, Parser)]
#[command(name = "ironic-exporter-launcher", version, about)]
pub struct Cli {
    /// Setup script sourced before launching
    #[arg(long, default_value = DEFAULT_SETUP_SCRIPT)]
    pub setup_script: PathBuf,

    /// Shell used to source the setup script
    #[arg(long, default_value = DEFAULT_SETUP_SHELL)]
    pub setup_shell: PathBuf,

    /// Do not run the setup script
    #[arg(long, conflicts_with = "lenient_setup")]
    pub skip_setup: bool,

    /// Launch even if the setup script fails
    #[arg(long)]
    pub lenient_setup: bool,

    /// WSGI server executable
    #[arg(long, default_value = DEFAULT_SERVER_PROGRAM)]
    pub server_program: String,

    /// Spawn and supervise the server instead of replacing this process
    #[arg(long)]
    pub supervise: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn settings(&self) -> Result<LauncherSettings, LauncherError> {
        let mut builder = LauncherSettings::builder();
        builder
            .server_program(self.server_program.as_str())
            .setup_policy(if self.lenient_setup {
                SetupPolicy::Lenient
            } else {
                SetupPolicy::Strict
            })
            .launch_mode(if self.supervise {
                LaunchMode::Supervise
            } else {
                LaunchMode::Exec
            });

        if self.skip_setup {
            builder.skip_prerequisite();
        } else {
            builder.source_script(self.setup_script.clone(), self.setup_shell.clone());
        }

        let settings = builder.build()?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironic_launcher_core::Prerequisite;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ironic-exporter-launcher"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings, LauncherSettings::default());
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_flags_map_onto_settings() {
        let cli = Cli::parse_from([
            "ironic-exporter-launcher",
            "--setup-script",
            "/tmp/setup.sh",
            "--setup-shell",
            "/bin/sh",
            "--lenient-setup",
            "--server-program",
            "/usr/local/bin/gunicorn",
            "--supervise",
            "--log-format",
            "json",
        ]);
        let settings = cli.settings().unwrap();

        assert_eq!(
            settings.prerequisite,
            Some(Prerequisite::Source {
                script: PathBuf::from("/tmp/setup.sh"),
                shell: PathBuf::from("/bin/sh"),
            })
        );
        assert_eq!(settings.setup_policy, SetupPolicy::Lenient);
        assert_eq!(settings.launch_mode, LaunchMode::Supervise);
        assert_eq!(settings.server_program, "/usr/local/bin/gunicorn");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_skip_setup() {
        let cli = Cli::parse_from(["ironic-exporter-launcher", "--skip-setup"]);
        assert!(cli.settings().unwrap().prerequisite.is_none());

        assert!(
            Cli::try_parse_from(["ironic-exporter-launcher", "--skip-setup", "--lenient-setup"])
                .is_err()
        );
    }

    #[test]
    fn test_empty_server_program_rejected() {
        let cli = Cli::parse_from(["ironic-exporter-launcher", "--server-program", ""]);
        let error = cli.settings().unwrap_err();
        assert_eq!(error.exit_code(), 2);
    }
}
