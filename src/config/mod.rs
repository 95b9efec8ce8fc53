#[cfg(feature = "cli")]
pub mod cli;
pub mod launcher_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
