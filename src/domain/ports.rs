use crate::core::launcher::LaunchContext;
use crate::domain::model::StageStatus;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;

/// 啟動序列中的一個階段
#[async_trait]
pub trait Stage: Send + Sync {
    /// 用於標識階段名稱
    fn name(&self) -> &str;

    /// 進度輸出時顯示的指令
    fn command_line(&self) -> String {
        self.name().to_string()
    }

    /// 執行階段並回報狀態；只有無法表達為狀態的錯誤才回傳 Err
    async fn run(&self, context: &LaunchContext) -> Result<StageStatus>;

    /// 根據上下文決定是否執行
    fn should_run(&self, _context: &LaunchContext) -> bool {
        true
    }
}

/// 各階段之間唯一的溝通管道：results 目錄中的檔案
pub trait ResultStore: Send + Sync {
    /// 寫入 `<prefix>_<timestamp>.json`，回傳完整路徑
    fn save_json<T: Serialize>(&self, prefix: &str, value: &T) -> Result<PathBuf>;

    /// 依檔名排序後最新一個以 prefix 開頭、suffix 結尾的檔案
    fn latest_matching(&self, prefix: &str, suffix: &str) -> Result<Option<PathBuf>>;

    fn load_json<T: DeserializeOwned>(&self, path: &std::path::Path) -> Result<T>;
}
