use clap::Parser;
use ironic_launcher::cli::Cli;
use ironic_launcher::logging::init_tracing;
use ironic_launcher::{IronicLauncher, exit_code};
use std::process::ExitCode;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}");
            return exit_code(&e);
        }
    };

    match IronicLauncher::new(settings).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            exit_code(&e)
        }
    }
}
