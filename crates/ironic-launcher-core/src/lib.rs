//! Ironic launcher core - platform-independent launch sequence
//!
//! This crate provides the launch configuration, environment resolution,
//! error taxonomy and process traits shared with the platform-specific
//! process managers, plus the [`Launcher`] state machine driving them.

pub mod config;
pub mod env;
pub mod error;
pub mod launcher;
pub mod process;
pub mod process_manager_trait;
pub mod server;

pub use config::*;
pub use env::Environment;
pub use error::*;
pub use launcher::{Launcher, Prepared, Resolved, Start, run};
pub use process::*;
pub use process_manager_trait::{LaunchProcessManager, LaunchProcessManagerFactory};
pub use server::{WORKER_COUNT, WSGI_ENTRY_POINT, prerequisite_command, server_command};
