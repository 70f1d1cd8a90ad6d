use crate::config::{CONFIG_VAR, LaunchConfig, Prerequisite};
use crate::env::Environment;
use crate::process::CommandSpec;

/// Number of gunicorn worker processes
pub const WORKER_COUNT: u32 = 4;
/// WSGI callable served by the exporter
pub const WSGI_ENTRY_POINT: &str = "ironic_prometheus_exporter.app.wsgi:application";

/// Sources the script given as `$1` with its output sent to stderr, then dumps
/// the resulting environment NUL-separated on stdout.
const SOURCE_AND_DUMP: &str = r#". "$1" >&2 && exec env -0"#;
/// `$0` of the sourcing shell, shows up in its error messages
const SOURCE_SHELL_NAME: &str = "ironic-setup";

/// Build the server invocation for `config`.
///
/// The child environment is `env` plus `IRONIC_CONFIG`, which overrides any
/// value already present.
pub fn server_command(program: &str, config: &LaunchConfig, env: &Environment) -> CommandSpec {
    let mut env = env.clone();
    env.set(CONFIG_VAR, config.config_path.as_os_str());

    CommandSpec::new(program)
        .arg("-b")
        .arg(config.bind_spec())
        .arg("-w")
        .arg(WORKER_COUNT.to_string())
        .arg(WSGI_ENTRY_POINT)
        .env(env)
}

/// Build the invocation running `prerequisite` under `env`.
///
/// Sourced scripts capture stdout, it carries the exported environment.
pub fn prerequisite_command(prerequisite: &Prerequisite, env: &Environment) -> CommandSpec {
    match prerequisite {
        Prerequisite::Source { script, shell } => CommandSpec::new(shell.to_string_lossy())
            .args(["-c", SOURCE_AND_DUMP, SOURCE_SHELL_NAME])
            .arg(script.to_string_lossy())
            .env(env.clone())
            .capture_stdout(),
        Prerequisite::Command { program, args } => CommandSpec::new(program.as_str())
            .args(args.iter().cloned())
            .env(env.clone()),
    }
}
