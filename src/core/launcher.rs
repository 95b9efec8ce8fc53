use crate::domain::model::{StageResult, StageStatus};
use crate::domain::ports::Stage;
use crate::utils::monitor::SystemMonitor;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// 啟動執行上下文，記錄已執行階段的結果
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub execution_id: String,
    pub working_directory: PathBuf,
    pub previous_results: Vec<StageResult>,
}

impl LaunchContext {
    pub fn new(execution_id: String, working_directory: PathBuf) -> Self {
        Self {
            execution_id,
            working_directory,
            previous_results: Vec::new(),
        }
    }

    /// 獲取上一個階段的結果
    pub fn get_previous_result(&self) -> Option<&StageResult> {
        self.previous_results.last()
    }

    /// 獲取指定名稱的階段結果
    pub fn get_result_by_name(&self, name: &str) -> Option<&StageResult> {
        self.previous_results.iter().find(|r| r.stage_name == name)
    }

    /// 沒有前一個階段時視為成功
    pub fn previous_succeeded(&self) -> bool {
        self.get_previous_result()
            .map(|r| r.status.is_success())
            .unwrap_or(true)
    }

    pub fn add_result(&mut self, result: StageResult) {
        self.previous_results.push(result);
    }
}

/// 階段失敗後的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub execution_id: String,
    pub results: Vec<StageResult>,
}

impl LaunchReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.status.is_success())
    }

    pub fn failed_stages(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.status.is_success())
            .map(|r| r.stage_name.as_str())
            .collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }

    /// 獲取執行摘要
    pub fn summary(&self) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let succeeded = self.results.iter().filter(|r| r.status.is_success()).count();

        summary.insert("total_stages".to_string(), self.results.len().into());
        summary.insert("succeeded".to_string(), succeeded.into());
        summary.insert("failed".to_string(), (self.results.len() - succeeded).into());
        summary.insert(
            "total_duration_ms".to_string(),
            (self.total_duration().as_millis() as u64).into(),
        );

        let stage_names: Vec<serde_json::Value> = self
            .results
            .iter()
            .map(|r| serde_json::Value::String(r.stage_name.clone()))
            .collect();
        summary.insert("executed_stages".to_string(), serde_json::Value::Array(stage_names));

        summary
    }

    /// 匯出用的指標 JSON
    pub fn to_metrics_json(&self) -> serde_json::Value {
        let stages: Vec<serde_json::Value> = self
            .results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.stage_name,
                    "success": r.status.is_success(),
                    "status": r.status.describe(),
                    "duration_ms": r.duration.as_millis() as u64,
                })
            })
            .collect();

        serde_json::json!({
            "execution_id": self.execution_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "summary": serde_json::Value::Object(self.summary().into_iter().collect()),
            "stages": stages,
        })
    }
}

/// 階段序列，負責一個接一個地執行所有階段
pub struct StageSequence {
    stages: Vec<Box<dyn Stage>>,
    monitor: Option<SystemMonitor>,
    execution_id: String,
    working_directory: PathBuf,
    failure_policy: FailurePolicy,
}

impl StageSequence {
    pub fn new(execution_id: String, working_directory: PathBuf) -> Self {
        Self {
            stages: Vec::new(),
            monitor: None,
            execution_id,
            working_directory,
            failure_policy: FailurePolicy::Continue,
        }
    }

    /// 啟用或禁用系統監控
    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| SystemMonitor::new(true));
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// 依序執行所有階段。單一階段失敗不會讓序列回傳錯誤。
    pub async fn execute_all(&self) -> LaunchReport {
        self.execute_with_progress(&mut std::io::sink()).await
    }

    /// 同 `execute_all`，並把每個階段的進度寫到 `out`
    pub async fn execute_with_progress<W: Write + Send>(&self, out: &mut W) -> LaunchReport {
        let mut context = LaunchContext::new(self.execution_id.clone(), self.working_directory.clone());
        let mut halted = false;
        let total = self.stages.len();

        if let Some(monitor) = &self.monitor {
            monitor.log_stats("Launch sequence started.");
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let start_time = Instant::now();

            if halted {
                tracing::info!("⏭️ Skipping stage: {} (an earlier stage failed)", stage.name());
                context.add_result(StageResult {
                    stage_name: stage.name().to_string(),
                    status: StageStatus::Skipped {
                        reason: "an earlier stage failed".to_string(),
                    },
                    duration: Duration::ZERO,
                });
                continue;
            }

            if !stage.should_run(&context) {
                tracing::info!("⏭️ Skipping stage: {} (condition not met)", stage.name());
                context.add_result(StageResult {
                    stage_name: stage.name().to_string(),
                    status: StageStatus::Skipped {
                        reason: "previous stage did not succeed".to_string(),
                    },
                    duration: Duration::ZERO,
                });
                continue;
            }

            report_line(
                out,
                &format!("\n▶️  [{}/{}] {}: {}", index + 1, total, stage.name(), stage.command_line()),
            );
            tracing::debug!("Launching stage {}", stage.name());

            let status = match stage.run(&context).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!("❌ Stage {} raised an error: {}", stage.name(), e);
                    StageStatus::LaunchFailed { reason: e.to_string() }
                }
            };

            let result = StageResult {
                stage_name: stage.name().to_string(),
                status,
                duration: start_time.elapsed(),
            };

            if result.status.is_success() {
                tracing::info!(
                    "✅ Stage executed: {} (duration: {:?})",
                    result.stage_name,
                    result.duration
                );
            } else {
                tracing::warn!(
                    "⚠️ Stage {} {} (duration: {:?})",
                    result.stage_name,
                    result.status.describe(),
                    result.duration
                );
                if self.failure_policy == FailurePolicy::Stop {
                    halted = true;
                }
            }

            if let Some(monitor) = &self.monitor {
                monitor.log_stats(&format!("After stage {}", result.stage_name));
            }

            context.add_result(result);
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_final_stats();
        }

        LaunchReport {
            execution_id: self.execution_id.clone(),
            results: context.previous_results,
        }
    }
}

/// 開始與結束橫幅包住的啟動器
pub struct Launcher {
    banner: String,
    completion_banner: String,
    sequence: StageSequence,
}

impl Launcher {
    pub fn new(banner: String, completion_banner: String, sequence: StageSequence) -> Self {
        Self {
            banner,
            completion_banner,
            sequence,
        }
    }

    pub fn sequence(&self) -> &StageSequence {
        &self.sequence
    }

    /// 印出橫幅、執行所有階段，並且無論結果如何都印出完成橫幅與摘要。
    /// 輸出寫不出去時仍會執行每個階段。
    pub async fn run<W: Write + Send>(&self, out: &mut W) -> LaunchReport {
        report_line(out, &self.banner);

        let report = self.sequence.execute_with_progress(out).await;

        report_line(out, &format!("\n{}", self.completion_banner));
        report_line(out, &render_report(&report));

        report
    }
}

/// 每個階段一行的摘要文字
pub fn render_report(report: &LaunchReport) -> String {
    let mut lines = vec![
        String::new(),
        format!("📊 Stage Summary (execution {}):", report.execution_id),
    ];
    for (index, result) in report.results.iter().enumerate() {
        let icon = match &result.status {
            StageStatus::Succeeded { .. } => "✅",
            StageStatus::Skipped { .. } => "⏭️",
            _ => "❌",
        };
        lines.push(format!(
            "  {}. {} {} - {} in {:?}",
            index + 1,
            icon,
            result.stage_name,
            result.status.describe(),
            result.duration
        ));
    }
    lines.join("\n")
}

// 進度輸出失敗不應中斷序列
fn report_line<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
        tracing::debug!("Progress output failed: {}", e);
    }
}
