use ironic_launcher_core::{LaunchProcessManagerFactory, LauncherSettings};

#[cfg(not(unix))]
compile_error!("Unsupported platform: only Unix is currently supported");

/// Platform-independent factory that selects the implementation at compile time
pub struct PlatformLaunchProcessManagerFactory;

impl LaunchProcessManagerFactory for PlatformLaunchProcessManagerFactory {
    #[cfg(unix)]
    type Manager = ironic_launcher_unix::UnixLaunchProcessManager;

    fn create_process_manager(settings: &LauncherSettings) -> Self::Manager {
        #[cfg(unix)]
        return ironic_launcher_unix::UnixLaunchProcessManagerFactory::create_process_manager(
            settings,
        );
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return ironic_launcher_unix::UnixLaunchProcessManagerFactory::platform_name();
    }
}

/// Process manager type for the current platform
pub type PlatformProcessManager =
    <PlatformLaunchProcessManagerFactory as LaunchProcessManagerFactory>::Manager;
