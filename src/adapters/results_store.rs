use crate::domain::ports::ResultStore;
use crate::utils::error::{CompanionError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 檔名時間戳格式，字典序即時間序
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `<prefix>_<timestamp>.json`
pub fn stamped_file_name(prefix: &str, timestamp: &str) -> String {
    format!("{}_{}.json", prefix, timestamp)
}

#[derive(Debug, Clone)]
pub struct LocalResultStore {
    base_path: PathBuf,
}

impl LocalResultStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        Ok(())
    }

    /// 寫入固定檔名的 JSON
    pub fn save_json_as<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.base_path.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        tracing::debug!("💾 Wrote {}", path.display());
        Ok(path)
    }

    /// 以 CSV 寫入一條數列 (index, value)
    pub fn save_series_csv(&self, file_name: &str, headers: [&str; 2], values: &[f64]) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.base_path.join(file_name);
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(headers)?;
        for (index, value) in values.iter().enumerate() {
            writer.write_record([index.to_string(), value.to_string()])?;
        }
        writer.flush()?;
        tracing::debug!("💾 Wrote {} rows to {}", values.len(), path.display());
        Ok(path)
    }
}

impl ResultStore for LocalResultStore {
    fn save_json<T: Serialize>(&self, prefix: &str, value: &T) -> Result<PathBuf> {
        self.save_json_as(&stamped_file_name(prefix, &timestamp_now()), value)
    }

    fn latest_matching(&self, prefix: &str, suffix: &str) -> Result<Option<PathBuf>> {
        if !self.base_path.is_dir() {
            return Ok(None);
        }

        let mut names: Vec<String> = fs::read_dir(&self.base_path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(prefix) && name.ends_with(suffix))
            .collect();
        names.sort();

        Ok(names.pop().map(|name| self.base_path.join(name)))
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CompanionError::MissingInputError {
                path: path.display().to_string(),
            },
            _ => CompanionError::IoError(e),
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_latest_matching_uses_lexicographic_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalResultStore::new(temp_dir.path());

        for name in [
            "audio_analysis_20240101_120000.json",
            "audio_analysis_20240301_080000.json",
            "audio_analysis.json",
            "text_analysis_20250101_000000.json",
            "audio_analysis_20240201_000000.txt",
        ] {
            fs::write(temp_dir.path().join(name), "{}").unwrap();
        }

        let latest = store.latest_matching("audio_analysis", ".json").unwrap().unwrap();
        assert!(latest.ends_with("audio_analysis_20240301_080000.json"));

        let text = store.latest_matching("text_analysis_", ".json").unwrap().unwrap();
        assert!(text.ends_with("text_analysis_20250101_000000.json"));

        assert!(store.latest_matching("fusion_summary_", ".json").unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_has_no_latest() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalResultStore::new(temp_dir.path().join("results"));
        assert!(store.latest_matching("audio_analysis", ".json").unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalResultStore::new(temp_dir.path().join("results"));

        let path = store
            .save_json("text_analysis", &serde_json::json!({"text_risk_score": 0.7}))
            .unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(file_name.starts_with("text_analysis_"));
        assert!(file_name.ends_with(".json"));

        let loaded: serde_json::Value = store.load_json(&path).unwrap();
        assert_eq!(loaded["text_risk_score"], 0.7);
    }

    #[test]
    fn test_save_series_csv() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalResultStore::new(temp_dir.path());

        let path = store.save_series_csv("energy.csv", ["frame", "energy"], &[0.5, 1.25]).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(content, "frame,energy\n0,0.5\n1,1.25\n");
    }
}
