use crate::core::launcher::FailurePolicy;
use crate::utils::error::{CompanionError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

/// 未指定 --config 時在工作目錄中尋找的檔名
pub const DEFAULT_CONFIG_FILE: &str = "companion-dog.toml";

static ENV_VAR_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub launcher: LauncherInfo,
    pub stages: Vec<StageDefinition>,
    pub monitoring: Option<MonitoringConfig>,
    pub error_handling: Option<ErrorHandlingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherInfo {
    pub name: String,
    pub description: Option<String>,
    pub banner: Option<String>,
    pub completion_banner: Option<String>,
    pub working_directory: Option<String>,
    /// 為空時依 stages 的定義順序執行
    #[serde(default)]
    pub execution_order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub program: String,
    pub args: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
    pub working_directory: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub run_if_previous_succeeded: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub export_metrics: Option<bool>,
    pub metrics_file: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    pub on_stage_failure: Option<String>, // "continue" or "stop"
    pub strict_exit: Option<bool>,
}

pub const DEFAULT_BANNER: &str = "🐶 Running CompanionDogAI prototypes...";
pub const DEFAULT_COMPLETION_BANNER: &str = "✅ All CompanionDogAI prototypes finished.";

impl LauncherConfig {
    /// 原型腳本的預設序列：audio → text → vision → fusion
    pub fn default_prototypes() -> Self {
        let stage = |name: &str, script: &str, description: &str| StageDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            enabled: Some(true),
            program: "python3".to_string(),
            args: Some(vec![script.to_string()]),
            env: None,
            working_directory: None,
            timeout_seconds: None,
            run_if_previous_succeeded: None,
        };

        Self {
            launcher: LauncherInfo {
                name: "companion-dog-prototypes".to_string(),
                description: Some("Audio, text, vision and fusion prototypes".to_string()),
                banner: Some(DEFAULT_BANNER.to_string()),
                completion_banner: Some(DEFAULT_COMPLETION_BANNER.to_string()),
                working_directory: None,
                execution_order: vec![
                    "audio".to_string(),
                    "text".to_string(),
                    "vision".to_string(),
                    "fusion".to_string(),
                ],
            },
            stages: vec![
                stage("audio", "audio_test.py", "Cough-like burst detection on dog_cough.wav"),
                stage("text", "text_prototype.py", "Owner note keyword analysis"),
                stage("vision", "vision_test.py", "Dog detection on dog_frame.jpeg"),
                stage("fusion", "fusion_test.py", "Fuse latest audio and text risk scores"),
            ],
            monitoring: None,
            error_handling: None,
        }
    }

    /// 從 TOML 檔案載入
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CompanionError::MissingInputError {
                path: path.as_ref().display().to_string(),
            },
            _ => CompanionError::IoError(e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CompanionError::ConfigValidationError {
            field: "launcher_toml_parsing".to_string(),
            message: format!("Launcher TOML parsing error: {}", e),
        })
    }

    /// 依序嘗試 --config、工作目錄中的 companion-dog.toml，最後使用內建預設
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("📁 Loading launcher configuration from: {}", path);
            return Self::from_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).is_file() {
            tracing::info!("📁 Loading launcher configuration from: {}", DEFAULT_CONFIG_FILE);
            return Self::from_file(DEFAULT_CONFIG_FILE);
        }

        tracing::info!("📁 No launcher configuration found, using the built-in prototype sequence");
        Ok(Self::default_prototypes())
    }

    /// 替換環境變數；未設定的變數保留原文
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("launcher.name", &self.launcher.name)?;

        if let Some(dir) = &self.launcher.working_directory {
            validation::validate_path("launcher.working_directory", dir)?;
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name.as_str()) {
                return Err(CompanionError::ConfigValidationError {
                    field: "stages.name".to_string(),
                    message: format!("Stage '{}' is defined more than once", stage.name),
                });
            }
            self.validate_stage(stage)?;
        }

        for stage_name in &self.launcher.execution_order {
            if !seen.contains(stage_name.as_str()) {
                return Err(CompanionError::ConfigValidationError {
                    field: "launcher.execution_order".to_string(),
                    message: format!(
                        "Stage '{}' in execution order not found in stages definition",
                        stage_name
                    ),
                });
            }
        }

        if let Some(error_handling) = &self.error_handling {
            error_handling.failure_policy()?;
        }

        Ok(())
    }

    fn validate_stage(&self, stage: &StageDefinition) -> Result<()> {
        validation::validate_non_empty_string("stages.name", &stage.name)?;
        validation::validate_non_empty_string(&format!("stages.{}.program", stage.name), &stage.program)?;

        if let Some(timeout) = stage.timeout_seconds {
            validation::validate_positive_number(&format!("stages.{}.timeout_seconds", stage.name), timeout, 1)?;
        }

        if let Some(dir) = &stage.working_directory {
            validation::validate_path(&format!("stages.{}.working_directory", stage.name), dir)?;
        }

        Ok(())
    }

    pub fn get_stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// 獲取啟用的階段（按執行順序）
    pub fn get_enabled_stages(&self) -> Vec<&StageDefinition> {
        let ordered: Vec<&StageDefinition> = if self.launcher.execution_order.is_empty() {
            self.stages.iter().collect()
        } else {
            self.launcher
                .execution_order
                .iter()
                .filter_map(|name| self.get_stage(name))
                .collect()
        };

        ordered
            .into_iter()
            .filter(|stage| stage.enabled.unwrap_or(true))
            .collect()
    }

    /// 套用 --only / --skip（逗號分隔）
    pub fn select_stages(&self, only: Option<&str>, skip: Option<&str>) -> Vec<&StageDefinition> {
        let mut stages = self.get_enabled_stages();

        if let Some(only_list) = only {
            let only_names: HashSet<&str> = only_list.split(',').map(|s| s.trim()).collect();
            stages.retain(|s| only_names.contains(s.name.as_str()));
        }

        if let Some(skip_list) = skip {
            let skip_names: HashSet<&str> = skip_list.split(',').map(|s| s.trim()).collect();
            stages.retain(|s| !skip_names.contains(s.name.as_str()));
        }

        stages
    }

    pub fn banner(&self) -> &str {
        self.launcher.banner.as_deref().unwrap_or(DEFAULT_BANNER)
    }

    pub fn completion_banner(&self) -> &str {
        self.launcher
            .completion_banner
            .as_deref()
            .unwrap_or(DEFAULT_COMPLETION_BANNER)
    }

    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        match &self.error_handling {
            Some(error_handling) => error_handling.failure_policy(),
            None => Ok(FailurePolicy::Continue),
        }
    }

    pub fn strict_exit(&self) -> bool {
        self.error_handling
            .as_ref()
            .and_then(|e| e.strict_exit)
            .unwrap_or(false)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ErrorHandlingConfig {
    pub fn failure_policy(&self) -> Result<FailurePolicy> {
        match self.on_stage_failure.as_deref() {
            None | Some("continue") => Ok(FailurePolicy::Continue),
            Some("stop") => Ok(FailurePolicy::Stop),
            Some(other) => Err(CompanionError::InvalidConfigValueError {
                field: "error_handling.on_stage_failure".to_string(),
                value: other.to_string(),
                reason: "Expected 'continue' or 'stop'".to_string(),
            }),
        }
    }
}

impl Validate for LauncherConfig {
    fn validate(&self) -> Result<()> {
        LauncherConfig::validate(self)
    }
}
