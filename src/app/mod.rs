pub mod commands;
pub mod launch;
