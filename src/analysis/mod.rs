pub mod audio;
pub mod fusion;
pub mod text;
pub mod vision;
