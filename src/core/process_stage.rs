use crate::config::launcher_config::StageDefinition;
use crate::core::launcher::LaunchContext;
use crate::domain::model::StageStatus;
use crate::domain::ports::Stage;
use crate::utils::error::{CompanionError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// 指向目前執行檔的特殊程式名稱
pub const SELF_PROGRAM: &str = "@self";

/// 以外部行程執行的階段；stdio 直接繼承自啟動器
#[derive(Debug, Clone)]
pub struct ProcessStage {
    name: String,
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    working_directory: Option<PathBuf>,
    timeout: Option<Duration>,
    require_previous_success: bool,
    results_dir: Option<PathBuf>,
}

impl ProcessStage {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_directory: None,
            timeout: None,
            require_previous_success: false,
            results_dir: None,
        }
    }

    pub fn from_definition(definition: &StageDefinition) -> Self {
        let mut stage = Self::new(definition.name.clone(), definition.program.clone())
            .with_args(definition.args.clone().unwrap_or_default())
            .with_env(definition.env.clone().unwrap_or_default());

        if let Some(dir) = &definition.working_directory {
            stage = stage.with_working_directory(dir);
        }
        if let Some(seconds) = definition.timeout_seconds {
            stage = stage.with_timeout(Duration::from_secs(seconds));
        }
        if definition.run_if_previous_succeeded.unwrap_or(false) {
            stage = stage.requiring_previous_success();
        }
        stage
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn requiring_previous_success(mut self) -> Self {
        self.require_previous_success = true;
        self
    }

    /// `@self` 階段會收到 `--results-dir`，其他程式不受影響
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    fn effective_args(&self) -> Vec<String> {
        match &self.results_dir {
            Some(dir) if self.program == SELF_PROGRAM => {
                let mut args = vec!["--results-dir".to_string(), dir.display().to_string()];
                args.extend(self.args.iter().cloned());
                args
            }
            _ => self.args.clone(),
        }
    }

    fn resolve_program(&self) -> std::io::Result<PathBuf> {
        if self.program == SELF_PROGRAM {
            std::env::current_exe()
        } else {
            Ok(PathBuf::from(&self.program))
        }
    }

    fn resolve_directory(&self, base: &Path) -> PathBuf {
        match &self.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl Stage for ProcessStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.effective_args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, context: &LaunchContext) -> Result<StageStatus> {
        let program = self.resolve_program().map_err(|e| CompanionError::StageLaunchError {
            stage: self.name.clone(),
            message: format!("cannot resolve {}: {}", self.program, e),
        })?;
        let directory = self.resolve_directory(&context.working_directory);
        let args = self.effective_args();

        tracing::debug!(
            "🚀 {}: {} {:?} (cwd: {})",
            self.name,
            program.display(),
            args,
            directory.display()
        );

        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&self.env)
            .current_dir(&directory)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!("❌ Failed to launch {}: {}", self.name, e);
                return Ok(StageStatus::LaunchFailed {
                    reason: format!("{}: {}", program.display(), e),
                });
            }
        };

        let exit_status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    tracing::warn!("⏱️ {} exceeded {:?}, killing it", self.name, limit);
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill {}: {}", self.name, e);
                    }
                    return Ok(StageStatus::TimedOut { after: limit });
                }
            },
            None => child.wait().await?,
        };

        Ok(match exit_status.code() {
            Some(code) if exit_status.success() => StageStatus::Succeeded { exit_code: code },
            code => StageStatus::Failed { exit_code: code },
        })
    }

    fn should_run(&self, context: &LaunchContext) -> bool {
        !self.require_previous_success || context.previous_succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let stage = ProcessStage::new("audio", "python3").with_args(vec!["audio_test.py".to_string()]);
        assert_eq!(stage.command_line(), "python3 audio_test.py");
    }

    #[test]
    fn test_results_dir_reaches_only_self_stages() {
        let native = ProcessStage::new("fusion", SELF_PROGRAM)
            .with_args(vec!["fusion".to_string()])
            .with_results_dir("/srv/dog/results");
        assert_eq!(native.command_line(), "@self --results-dir /srv/dog/results fusion");

        let script = ProcessStage::new("fusion", "python3")
            .with_args(vec!["fusion.py".to_string()])
            .with_results_dir("/srv/dog/results");
        assert_eq!(script.command_line(), "python3 fusion.py");
    }

    #[test]
    fn test_self_program_resolves_to_current_exe() {
        let stage = ProcessStage::new("audio", SELF_PROGRAM);
        let resolved = stage.resolve_program().unwrap();
        assert_eq!(resolved, std::env::current_exe().unwrap());
    }

    #[test]
    fn test_relative_working_directory_joins_base() {
        let stage = ProcessStage::new("audio", "python3").with_working_directory("prototypes");
        assert_eq!(
            stage.resolve_directory(Path::new("/srv/dog")),
            PathBuf::from("/srv/dog/prototypes")
        );

        let plain = ProcessStage::new("audio", "python3");
        assert_eq!(plain.resolve_directory(Path::new("/srv/dog")), PathBuf::from("/srv/dog"));
    }

    #[tokio::test]
    async fn test_missing_program_is_recorded_not_raised() {
        let stage = ProcessStage::new("ghost", "/definitely/not/a/program");
        let context = LaunchContext::new("test".to_string(), std::env::temp_dir());

        let status = stage.run(&context).await.unwrap();
        assert!(matches!(status, StageStatus::LaunchFailed { .. }));
    }
}
