use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "companion-dog")]
#[command(about = "Runs the CompanionDogAI prototype stages and their analyses")]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    /// Directory where every stage writes its result files
    #[arg(long, global = true, default_value = "results")]
    pub results_dir: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the configured stages in order (default)
    Run(RunArgs),
    /// Energy-burst cough detection on a WAV file
    Audio(AudioArgs),
    /// Keyword analysis of an owner note
    Text(TextArgs),
    /// Dog / car decision over detector output
    Vision(VisionArgs),
    /// Average the latest audio and text results
    Fusion,
    /// Full single-session assessment with weighted fusion
    Assess(AssessArgs),
}

impl CliConfig {
    /// 沒有子命令時等同 `run`
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Path to launcher configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Execute only specific stages (comma-separated)
    #[arg(long)]
    pub only: Option<String>,

    /// Skip specific stages (comma-separated)
    #[arg(long)]
    pub skip: Option<String>,

    /// Show execution plan without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Execution ID for this run
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Exit with status 1 when any stage did not succeed
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Args)]
pub struct AudioArgs {
    #[arg(short, long, default_value = "dog_cough.wav")]
    pub input: String,
}

#[derive(Debug, Clone, Args)]
pub struct TextArgs {
    /// Owner note; read from stdin when omitted
    #[arg(short, long)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct VisionArgs {
    #[arg(short, long, default_value = "dog_frame.detections.json")]
    pub detections: String,

    #[arg(long, default_value = "dog_frame.jpeg")]
    pub image: String,
}

#[derive(Debug, Clone, Args)]
pub struct AssessArgs {
    #[arg(short, long)]
    pub audio: String,

    #[arg(short, long)]
    pub detections: Option<String>,

    #[arg(long)]
    pub image: Option<String>,

    #[arg(short, long)]
    pub note: Option<String>,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("results_dir", &self.results_dir)?;

        match &self.command {
            Some(Command::Audio(args)) => {
                validation::validate_file_extension("input", &args.input, &["wav"])?;
            }
            Some(Command::Vision(args)) => {
                validation::validate_file_extension("detections", &args.detections, &["json"])?;
            }
            Some(Command::Assess(args)) => {
                validation::validate_file_extension("audio", &args.audio, &["wav"])?;
                if let Some(detections) = &args.detections {
                    validation::validate_file_extension("detections", detections, &["json"])?;
                }
            }
            Some(Command::Run(args)) => {
                if let Some(id) = &args.execution_id {
                    validation::validate_non_empty_string("execution_id", id)?;
                }
            }
            Some(Command::Text(_)) | Some(Command::Fusion) | None => {}
        }

        Ok(())
    }
}
