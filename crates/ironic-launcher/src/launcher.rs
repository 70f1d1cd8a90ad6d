use crate::factory::{PlatformLaunchProcessManagerFactory, PlatformProcessManager};
use ironic_launcher_core::{
    Environment, LaunchProcessManagerFactory, Launcher, LauncherError, LauncherSettings, Start,
};
use std::sync::Arc;
use tracing::info;

/// Launcher bound to the process manager of the current platform
pub struct IronicLauncher {
    settings: LauncherSettings,
    env: Environment,
}

impl IronicLauncher {
    /// Launcher reading the current process environment
    pub fn new(settings: LauncherSettings) -> Self {
        Self::with_environment(settings, Environment::from_process())
    }

    /// Launcher working from an explicit environment snapshot
    pub fn with_environment(settings: LauncherSettings, env: Environment) -> Self {
        Self { settings, env }
    }

    /// First state of the launch sequence, for callers driving it step by step
    pub fn start(self) -> Result<Launcher<Start, PlatformProcessManager>, LauncherError> {
        info!(
            "Using {} process manager",
            PlatformLaunchProcessManagerFactory::platform_name()
        );
        let manager = PlatformLaunchProcessManagerFactory::create_process_manager(&self.settings);
        Launcher::new(self.settings, self.env, Arc::new(manager))
    }

    /// Setup, resolution and launch in one go
    pub async fn run(self) -> Result<(), LauncherError> {
        self.start()?
            .run_prerequisite_setup()
            .await?
            .resolve()
            .launch()
            .await
    }
}
