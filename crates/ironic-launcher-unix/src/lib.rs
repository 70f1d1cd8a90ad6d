//! Unix process management for the ironic exporter launcher
#![cfg(unix)]

mod launch_process_manager;
mod unix_process_manager;

pub use launch_process_manager::{UnixLaunchProcessManager, UnixLaunchProcessManagerFactory};
pub use unix_process_manager::{UnixProcessHandle, UnixProcessManager, process_status};
