pub mod launcher;
pub mod process_stage;

pub use crate::domain::model::{StageResult, StageStatus};
pub use crate::domain::ports::Stage;
pub use crate::utils::error::Result;
