#![cfg(unix)]

use anyhow::Result;
use companion_dog::app::launch::{self, LaunchOptions};
use companion_dog::config::launcher_config::LauncherConfig;
use companion_dog::core::launcher::{LaunchReport, StageSequence};
use companion_dog::core::StageStatus;
use companion_dog::{CompanionError, Launcher, ProcessStage};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn stage_toml(name: &str, script: &str, extra: &str) -> String {
    format!(
        r#"
[[stages]]
name = "{name}"
program = "sh"
args = ["-c", "{script}"]
{extra}
"#
    )
}

fn config_toml(order: &[&str], stages: &[String], error_handling: &str) -> String {
    let order = order
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
[launcher]
name = "test-launcher"
banner = "🐶 start"
completion_banner = "✅ done"
execution_order = [{order}]

{stages}

{error_handling}
"#,
        stages = stages.join("\n")
    )
}

/// 以設定建立啟動器並執行，回傳報告與輸出文字
async fn launch(config: &LauncherConfig, dir: &Path) -> Result<(LaunchReport, String)> {
    config.validate()?;
    let mut sequence = StageSequence::new("test_run".to_string(), dir.to_path_buf())
        .with_failure_policy(config.failure_policy()?);
    for definition in config.get_enabled_stages() {
        sequence.add_stage(Box::new(ProcessStage::from_definition(definition)));
    }

    let launcher = Launcher::new(
        config.banner().to_string(),
        config.completion_banner().to_string(),
        sequence,
    );
    let mut out = Vec::new();
    let report = launcher.run(&mut out).await;
    Ok((report, String::from_utf8(out)?))
}

/// 讓設定檔的工作目錄指向測試目錄
fn in_directory(toml: &str, dir: &Path) -> String {
    toml.replacen(
        "[launcher]\n",
        &format!("[launcher]\nworking_directory = \"{}\"\n", dir.display()),
        1,
    )
}

fn read_log(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("log.txt")).unwrap_or_default()
}

#[tokio::test]
async fn test_each_stage_runs_once_in_order_despite_failures() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text", "vision", "fusion"],
        &[
            stage_toml("fusion", "echo fusion >> log.txt", ""),
            stage_toml("audio", "echo audio >> log.txt", ""),
            stage_toml("text", "echo text >> log.txt; exit 3", ""),
            stage_toml("vision", "echo vision >> log.txt", ""),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, output) = launch(&config, temp_dir.path()).await?;

    assert_eq!(read_log(temp_dir.path()), "audio\ntext\nvision\nfusion\n");
    assert_eq!(report.results.len(), 4);
    assert_eq!(report.failed_stages(), vec!["text"]);
    assert_eq!(report.results[1].status, StageStatus::Failed { exit_code: Some(3) });

    assert!(output.starts_with("🐶 start"));
    assert!(output.contains("✅ done"));
    let done_at = output.find("✅ done").unwrap();
    let last_stage_at = output.find("[4/4] fusion").unwrap();
    assert!(last_stage_at < done_at);
    Ok(())
}

#[tokio::test]
async fn test_stop_policy_skips_remaining_stages() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text", "fusion"],
        &[
            stage_toml("audio", "echo audio >> log.txt; exit 1", ""),
            stage_toml("text", "echo text >> log.txt", ""),
            stage_toml("fusion", "echo fusion >> log.txt", ""),
        ],
        "[error_handling]\non_stage_failure = \"stop\"",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, output) = launch(&config, temp_dir.path()).await?;

    assert_eq!(read_log(temp_dir.path()), "audio\n");
    assert!(matches!(report.results[1].status, StageStatus::Skipped { .. }));
    assert!(matches!(report.results[2].status, StageStatus::Skipped { .. }));
    assert!(output.contains("✅ done"));
    Ok(())
}

#[tokio::test]
async fn test_missing_program_does_not_stop_the_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = format!(
        r#"
[launcher]
name = "missing-program"

[[stages]]
name = "ghost"
program = "/definitely/not/a/program"

{}
"#,
        stage_toml("audio", "echo audio >> log.txt", "")
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, output) = launch(&config, temp_dir.path()).await?;

    assert!(matches!(report.results[0].status, StageStatus::LaunchFailed { .. }));
    assert!(report.results[1].status.is_success());
    assert_eq!(read_log(temp_dir.path()), "audio\n");
    assert!(output.contains(config.completion_banner()));
    Ok(())
}

#[tokio::test]
async fn test_timeout_kills_slow_stage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["slow", "after"],
        &[
            stage_toml("slow", "sleep 10", "timeout_seconds = 1"),
            stage_toml("after", "echo after >> log.txt", ""),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let started = Instant::now();
    let (report, _) = launch(&config, temp_dir.path()).await?;

    assert!(started.elapsed() < Duration::from_secs(8));
    assert_eq!(
        report.results[0].status,
        StageStatus::TimedOut {
            after: Duration::from_secs(1)
        }
    );
    assert_eq!(read_log(temp_dir.path()), "after\n");
    Ok(())
}

#[tokio::test]
async fn test_conditional_stage_follows_previous_result() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "fusion"],
        &[
            stage_toml("audio", "exit 1", ""),
            stage_toml("fusion", "echo fusion >> log.txt", "run_if_previous_succeeded = true"),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, _) = launch(&config, temp_dir.path()).await?;

    assert!(matches!(report.results[1].status, StageStatus::Skipped { .. }));
    assert_eq!(read_log(temp_dir.path()), "");
    assert!(!report.all_succeeded());
    Ok(())
}

#[tokio::test]
async fn test_environment_reaches_stage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    std::env::set_var("COMPANION_DOG_TEST_NOTE", "hacking");
    let toml = config_toml(
        &["text"],
        &[stage_toml(
            "text",
            "echo ${COMPANION_DOG_TEST_NOTE} $STAGE_LABEL >> log.txt",
            "env = { STAGE_LABEL = \"from-env-table\" }",
        )],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, _) = launch(&config, temp_dir.path()).await?;

    assert!(report.all_succeeded());
    assert_eq!(read_log(temp_dir.path()), "hacking from-env-table\n");
    Ok(())
}

#[tokio::test]
async fn test_only_and_skip_select_stages() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text", "vision", "fusion"],
        &[
            stage_toml("audio", "echo audio >> log.txt", ""),
            stage_toml("text", "echo text >> log.txt", ""),
            stage_toml("vision", "echo vision >> log.txt", "enabled = false"),
            stage_toml("fusion", "echo fusion >> log.txt", ""),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let names: Vec<&str> = config
        .select_stages(Some("audio, vision, fusion"), Some("fusion"))
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(names, vec!["audio"]);

    let (report, _) = launch(&config, temp_dir.path()).await?;
    assert_eq!(report.results.len(), 3);
    assert_eq!(read_log(temp_dir.path()), "audio\ntext\nfusion\n");
    Ok(())
}

#[tokio::test]
async fn test_metrics_json_describes_every_stage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text"],
        &[stage_toml("audio", "true", ""), stage_toml("text", "false", "")],
        "",
    );
    let config = LauncherConfig::from_toml_str(&toml)?;

    let (report, _) = launch(&config, temp_dir.path()).await?;
    let metrics = report.to_metrics_json();

    assert_eq!(metrics["execution_id"], "test_run");
    assert_eq!(metrics["summary"]["total_stages"], 2);
    assert_eq!(metrics["summary"]["failed"], 1);
    assert_eq!(metrics["stages"][1]["success"], false);
    Ok(())
}

#[tokio::test]
async fn test_failed_stage_exits_zero_unless_strict() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text"],
        &[
            stage_toml("audio", "echo audio >> log.txt; exit 2", ""),
            stage_toml("text", "echo text >> log.txt", ""),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&in_directory(&toml, temp_dir.path()))?;

    let mut out = Vec::new();
    let code = launch::launch(&config, &LaunchOptions::default(), &mut out).await?;
    assert_eq!(code, 0);
    assert_eq!(read_log(temp_dir.path()), "audio\ntext\n");

    let strict = LaunchOptions {
        strict: true,
        ..LaunchOptions::default()
    };
    let code = launch::launch(&config, &strict, &mut out).await?;
    assert_eq!(code, 1);
    assert_eq!(read_log(temp_dir.path()), "audio\ntext\naudio\ntext\n");
    Ok(())
}

#[tokio::test]
async fn test_strict_exit_from_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio"],
        &[stage_toml("audio", "exit 1", "")],
        "[error_handling]\nstrict_exit = true",
    );
    let config = LauncherConfig::from_toml_str(&in_directory(&toml, temp_dir.path()))?;

    let code = launch::launch(&config, &LaunchOptions::default(), &mut std::io::sink()).await?;
    assert_eq!(code, 1);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_launches_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio", "text"],
        &[
            stage_toml("audio", "echo audio >> log.txt", "timeout_seconds = 30"),
            stage_toml("text", "echo text >> log.txt", ""),
        ],
        "",
    );
    let config = LauncherConfig::from_toml_str(&in_directory(&toml, temp_dir.path()))?;
    let options = LaunchOptions {
        dry_run: true,
        execution_id: Some("dry".to_string()),
        ..LaunchOptions::default()
    };

    let mut out = Vec::new();
    let code = launch::launch(&config, &options, &mut out).await?;
    let output = String::from_utf8(out)?;

    assert_eq!(code, 0);
    assert!(!temp_dir.path().join("log.txt").exists());
    assert!(output.contains("Execution ID: dry"));
    assert!(output.contains("Timeout: 30s"));
    assert!(output.contains("Total stages to execute: 2"));
    assert!(!output.contains("✅ done"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_stage_name_is_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let toml = config_toml(
        &["audio"],
        &[stage_toml("audio", "echo audio >> log.txt", "")],
        "",
    );
    let config = LauncherConfig::from_toml_str(&in_directory(&toml, temp_dir.path()))?;

    for options in [
        LaunchOptions {
            only: Some("audio, sniff".to_string()),
            ..LaunchOptions::default()
        },
        LaunchOptions {
            skip: Some("bark".to_string()),
            ..LaunchOptions::default()
        },
    ] {
        let result = launch::launch(&config, &options, &mut std::io::sink()).await;
        assert!(matches!(result, Err(CompanionError::ConfigError { .. })));
    }
    assert_eq!(read_log(temp_dir.path()), "");
    Ok(())
}

#[tokio::test]
async fn test_metrics_export_writes_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let metrics_file = temp_dir.path().join("results").join("launch_metrics.json");
    let toml = config_toml(
        &["audio", "text"],
        &[stage_toml("audio", "true", ""), stage_toml("text", "false", "")],
        &format!(
            "[monitoring]\nenabled = false\nexport_metrics = true\nmetrics_file = \"{}\"",
            metrics_file.display()
        ),
    );
    let config = LauncherConfig::from_toml_str(&in_directory(&toml, temp_dir.path()))?;
    let options = LaunchOptions {
        execution_id: Some("metrics_run".to_string()),
        ..LaunchOptions::default()
    };

    let mut out = Vec::new();
    let code = launch::launch(&config, &options, &mut out).await?;
    assert_eq!(code, 0);

    let metrics: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&metrics_file)?)?;
    assert_eq!(metrics["execution_id"], "metrics_run");
    assert_eq!(metrics["summary"]["failed"], 1);
    assert!(String::from_utf8(out)?.contains("Metrics exported to"));
    Ok(())
}

#[tokio::test]
async fn test_dry_run_shows_forwarded_results_dir() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let results_dir = temp_dir.path().join("results");
    let toml = r#"
[launcher]
name = "native"

[[stages]]
name = "fusion"
program = "@self"
args = ["fusion"]
"#;
    let config = LauncherConfig::from_toml_str(toml)?;
    let options = LaunchOptions {
        dry_run: true,
        results_dir: Some(results_dir.clone()),
        ..LaunchOptions::default()
    };

    let mut out = Vec::new();
    launch::launch(&config, &options, &mut out).await?;

    let expected = format!("Command: @self --results-dir {} fusion", results_dir.display());
    assert!(String::from_utf8(out)?.contains(&expected));
    Ok(())
}
