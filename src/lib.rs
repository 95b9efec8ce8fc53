pub mod adapters;
pub mod analysis;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::LocalResultStore;
pub use config::launcher_config::LauncherConfig;
pub use crate::core::{launcher::Launcher, process_stage::ProcessStage};
pub use utils::error::{CompanionError, Result};
