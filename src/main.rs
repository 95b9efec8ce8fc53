use clap::Parser;
use companion_dog::app::commands::{self, AssessInputs};
use companion_dog::app::launch::{self, LaunchOptions};
use companion_dog::config::cli::{Command, RunArgs};
use companion_dog::config::launcher_config::LauncherConfig;
use companion_dog::utils::{logger, validation::Validate};
use companion_dog::{CliConfig, CompanionError, LocalResultStore};
use std::io::Write;
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::debug!("CLI config: {:?}", config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let store = LocalResultStore::new(&config.results_dir);
    let mut stdout = std::io::stdout();

    let outcome = match config.command_or_default() {
        Command::Run(args) => run_launcher(&args, &config.results_dir, &mut stdout).await,
        Command::Audio(args) => commands::audio_command(&store, Path::new(&args.input), &mut stdout).map(|_| 0),
        Command::Text(args) => run_text(&store, args.note, &mut stdout),
        Command::Vision(args) => commands::vision_command(
            &store,
            Path::new(&args.detections),
            Some(Path::new(&args.image)),
            &mut stdout,
        )
        .map(|_| 0),
        Command::Fusion => commands::fusion_command(&store, &mut stdout).map(|_| 0),
        Command::Assess(args) => {
            let inputs = AssessInputs {
                audio: Path::new(&args.audio),
                detections: args.detections.as_deref().map(Path::new),
                image: args.image.as_deref().map(Path::new),
                note: args.note.as_deref(),
            };
            commands::assess_command(&store, &inputs, &mut stdout).map(|_| 0)
        }
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => exit_with_error(e),
    }
}

fn exit_with_error(e: CompanionError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    std::process::exit(e.exit_code().max(1));
}

fn run_text<W: Write>(store: &LocalResultStore, note: Option<String>, out: &mut W) -> companion_dog::Result<i32> {
    let note = match note {
        Some(note) => note,
        None => commands::prompt_note(&mut std::io::stdin().lock(), out)?,
    };
    commands::text_command(store, &note, out)?;
    Ok(0)
}

async fn run_launcher<W: Write + Send>(
    args: &RunArgs,
    results_dir: &str,
    out: &mut W,
) -> companion_dog::Result<i32> {
    tracing::info!("🚀 Starting CompanionDogAI launcher");

    let config = LauncherConfig::resolve(args.config.as_deref())?;
    let options = LaunchOptions {
        only: args.only.clone(),
        skip: args.skip.clone(),
        dry_run: args.dry_run,
        execution_id: args.execution_id.clone(),
        monitor: args.monitor,
        strict: args.strict,
        results_dir: Some(PathBuf::from(results_dir)),
    };

    launch::launch(&config, &options, out).await
}
