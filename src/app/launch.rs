use crate::config::launcher_config::{LauncherConfig, MonitoringConfig, StageDefinition};
use crate::core::launcher::{LaunchReport, Launcher, StageSequence};
use crate::core::process_stage::ProcessStage;
use crate::domain::ports::Stage;
use crate::utils::error::{CompanionError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `run` 子命令的執行選項
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub only: Option<String>,
    pub skip: Option<String>,
    pub dry_run: bool,
    pub execution_id: Option<String>,
    /// 覆寫設定檔中的監控開關
    pub monitor: Option<bool>,
    pub strict: bool,
    /// 轉交給 `@self` 階段的結果目錄
    pub results_dir: Option<PathBuf>,
}

/// 依設定執行整個階段序列，回傳程序結束碼
pub async fn launch<W: Write + Send>(
    config: &LauncherConfig,
    options: &LaunchOptions,
    out: &mut W,
) -> Result<i32> {
    config.validate()?;
    let failure_policy = config.failure_policy()?;

    tracing::info!("✅ Launcher configuration loaded and validated successfully");

    // 生成執行 ID
    let execution_id = options
        .execution_id
        .clone()
        .unwrap_or_else(|| format!("run_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")));

    check_stage_names(config, options.only.as_deref())?;
    check_stage_names(config, options.skip.as_deref())?;
    let selected = config.select_stages(options.only.as_deref(), options.skip.as_deref());

    let results_dir = match &options.results_dir {
        Some(dir) => Some(std::path::absolute(dir)?),
        None => None,
    };

    if options.dry_run {
        display_launch_summary(config, options, &execution_id, out)?;
        tracing::info!("🔍 DRY RUN MODE - No stage will be launched");
        perform_dry_run(&selected, results_dir.as_deref(), out)?;
        return Ok(0);
    }

    // 決定監控設定
    let monitor_enabled = options.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let working_directory = PathBuf::from(config.launcher.working_directory.as_deref().unwrap_or("."));
    let mut sequence = StageSequence::new(execution_id, working_directory)
        .with_monitoring(monitor_enabled)
        .with_failure_policy(failure_policy);

    for definition in &selected {
        tracing::debug!("📦 Setting up stage: {}", definition.name);
        sequence.add_stage(Box::new(build_stage(definition, results_dir.as_deref())));
    }
    tracing::info!(
        "🎬 Launching {} of {} configured stages: {}",
        sequence.len(),
        config.stages.len(),
        sequence.stage_names().join(", ")
    );

    let launcher = Launcher::new(
        config.banner().to_string(),
        config.completion_banner().to_string(),
        sequence,
    );
    let report = launcher.run(out).await;

    // 匯出執行摘要
    if let Some(monitoring) = &config.monitoring {
        if monitoring.export_metrics.unwrap_or(false) {
            export_launch_metrics(&report, monitoring, out).await?;
        }
    }

    let strict = options.strict || config.strict_exit();
    if !report.all_succeeded() {
        tracing::warn!(
            "⚠️ Stages without success: {}",
            report.failed_stages().join(", ")
        );
        if strict {
            return Ok(1);
        }
    }

    Ok(0)
}

fn build_stage(definition: &StageDefinition, results_dir: Option<&Path>) -> ProcessStage {
    let stage = ProcessStage::from_definition(definition);
    match results_dir {
        Some(dir) => stage.with_results_dir(dir),
        None => stage,
    }
}

/// --only / --skip 只能指名已定義的階段
pub fn check_stage_names(config: &LauncherConfig, list: Option<&str>) -> Result<()> {
    for name in list.into_iter().flat_map(|l| l.split(',')).map(str::trim) {
        if !name.is_empty() && config.get_stage(name).is_none() {
            return Err(CompanionError::ConfigError {
                message: format!("Unknown stage '{}' in --only/--skip", name),
            });
        }
    }
    Ok(())
}

fn display_launch_summary<W: Write>(
    config: &LauncherConfig,
    options: &LaunchOptions,
    execution_id: &str,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "📋 Launch Sequence Summary:")?;
    writeln!(out, "  Name: {}", config.launcher.name)?;
    if let Some(description) = &config.launcher.description {
        writeln!(out, "  Description: {}", description)?;
    }
    writeln!(out, "  Execution ID: {}", execution_id)?;
    writeln!(out, "  Total Stages: {}", config.stages.len())?;

    if options.dry_run {
        writeln!(out, "  🔍 DRY RUN MODE ENABLED")?;
    }
    if let Some(only) = &options.only {
        writeln!(out, "  🎯 Only executing: {}", only)?;
    }
    if let Some(skip) = &options.skip {
        writeln!(out, "  ⏭️ Skipping: {}", skip)?;
    }

    writeln!(out)?;
    writeln!(out, "📝 Execution Order:")?;
    let names: Vec<&str> = if config.launcher.execution_order.is_empty() {
        config.stages.iter().map(|s| s.name.as_str()).collect()
    } else {
        config.launcher.execution_order.iter().map(String::as_str).collect()
    };
    for (index, name) in names.iter().enumerate() {
        if let Some(stage) = config.get_stage(name) {
            let status = if stage.enabled.unwrap_or(true) { "✅" } else { "⏸️" };
            writeln!(
                out,
                "  {}. {} {} - {}",
                index + 1,
                status,
                name,
                stage.description.as_deref().unwrap_or("No description")
            )?;
        }
    }
    writeln!(out)?;
    Ok(())
}

/// 只列出會執行的指令，不啟動任何行程
pub fn perform_dry_run<W: Write>(
    stages: &[&StageDefinition],
    results_dir: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "🔍 Dry Run Analysis:")?;
    writeln!(out)?;

    for (index, definition) in stages.iter().enumerate() {
        let stage = build_stage(definition, results_dir);
        writeln!(out, "📦 Stage {}: {}", index + 1, definition.name)?;
        writeln!(out, "  ▶️  Command: {}", stage.command_line())?;

        if let Some(dir) = &definition.working_directory {
            writeln!(out, "  📂 Working directory: {}", dir)?;
        }
        if let Some(timeout) = definition.timeout_seconds {
            writeln!(out, "  ⏱️ Timeout: {}s", timeout)?;
        }
        if definition.run_if_previous_succeeded.unwrap_or(false) {
            writeln!(out, "  ⚙️ Requires previous success")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "📊 Summary:")?;
    writeln!(out, "  Total stages to execute: {}", stages.len())?;
    writeln!(out)?;
    writeln!(out, "✅ Dry run analysis complete.")?;
    Ok(())
}

pub async fn export_launch_metrics<W: Write>(
    report: &LaunchReport,
    monitoring: &MonitoringConfig,
    out: &mut W,
) -> Result<()> {
    let metrics_file = monitoring
        .metrics_file
        .as_deref()
        .unwrap_or("launch_metrics.json");

    let metrics_json = serde_json::to_string_pretty(&report.to_metrics_json())?;
    if let Some(parent) = Path::new(metrics_file).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(metrics_file, metrics_json).await?;

    tracing::info!("📊 Launch metrics exported to: {}", metrics_file);
    if let Err(e) = writeln!(out, "📊 Metrics exported to: {}", metrics_file) {
        tracing::debug!("Metrics notice not printed: {}", e);
    }
    Ok(())
}
