// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use tablewai::app_config::{BackendKind, Config, LogLevel};
use tablewai::app_controller::{Controller, TranslateOptions};

/// CLI Wrapper for BackendKind to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    Ollama,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliBackend> for BackendKind {
    fn from(cli_backend: CliBackend) -> Self {
        match cli_backend {
            CliBackend::OpenAI => BackendKind::OpenAI,
            CliBackend::Anthropic => BackendKind::Anthropic,
            CliBackend::Ollama => BackendKind::Ollama,
            CliBackend::LMStudio => BackendKind::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// Options shared by every command that works on a document
#[derive(Parser, Debug)]
struct DocumentArgs {
    /// Input JSON document (array of rows, or object with a `records` array)
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Source language code (e.g., 'zh', 'ja', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "tablewai.json", env = "TABLEWAI_CONFIG")]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Columns to translate (comma separated); all text columns by default
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Use only this backend
    #[arg(short, long, value_enum)]
    backend: Option<CliBackend>,

    /// Model name for the chosen (or first enabled) backend
    #[arg(short, long)]
    model: Option<String>,

    /// Skip cells that already read as the target language
    #[arg(long)]
    selective: bool,

    /// Continue from the stored snapshot instead of starting over
    #[arg(long)]
    resume: bool,

    /// Audit the output and retry unfinished cells once
    #[arg(long)]
    audit: bool,

    /// Output file; defaults to `<stem>.<target>.<ext>` next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RowsArgs {
    #[command(flatten)]
    document: DocumentArgs,

    /// Zero-based row indices (comma separated)
    #[arg(long, value_delimiter = ',', required = true)]
    rows: Vec<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document
    Translate(TranslateArgs),

    /// Re-translate unfinished cells of specific rows
    Retry {
        #[command(flatten)]
        rows: RowsArgs,

        /// Use only this backend
        #[arg(short, long, value_enum)]
        backend: Option<CliBackend>,

        /// Output file; defaults to `<stem>.<target>.<ext>` next to the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report cells of the stored translation that still need work
    Audit(DocumentArgs),

    /// Stop retrying specific rows
    Abandon(RowsArgs),

    /// Forget stored progress for a document
    Clear(DocumentArgs),

    /// Generate shell completions for tablewai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// TablewAI - resumable translation of tabular records with AI
#[derive(Parser, Debug)]
#[command(name = "tablewai")]
#[command(version)]
#[command(about = "AI-powered translation of tabular JSON records")]
#[command(long_about = "TablewAI translates the text columns of JSON records through AI backends,
saving progress after every batch so an interrupted run can resume.

EXAMPLES:
    tablewai translate catalog.json                  # Translate using default config
    tablewai translate -t fr --audit catalog.json    # Translate to French, audit and retry once
    tablewai translate --resume catalog.json         # Continue after Ctrl-C or a crash
    tablewai translate -b ollama -m qwen2 data.json  # Use one backend and model
    tablewai retry --rows 3,7 catalog.json           # Retry unfinished cells of rows 3 and 7
    tablewai audit catalog.json                      # List cells that still need work
    tablewai completions bash > tablewai.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in tablewai.json by default. If the file doesn't
    exist, a default one is created. Backends are tried in the listed order.

SUPPORTED BACKENDS:
    openai    - OpenAI API (requires API key)
    anthropic - Anthropic API (requires API key)
    ollama    - Local Ollama server
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger::new(level)))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Marker and ANSI color for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("[x]", "1;31"),
            Level::Warn => ("[!]", "1;33"),
            Level::Info => ("   ", "1;32"),
            Level::Debug => ("[?]", "1;36"),
            Level::Trace => ("[.]", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (marker, color) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color,
                now,
                marker,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Trace is the ceiling; the effective level is narrowed once the config is known
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "tablewai", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => run_translate(args).await,
        Commands::Retry { rows, backend, output } => run_retry(rows, backend, output).await,
        Commands::Audit(args) => run_audit(args).await,
        Commands::Abandon(args) => run_abandon(args).await,
        Commands::Clear(args) => run_clear(args).await,
    }
}

// @loads: Configuration with command line overrides applied
fn load_config(args: &DocumentArgs) -> Result<Config> {
    if let Some(level) = args.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    if !args.config_path.exists() {
        warn!("Config file not found at {:?}, creating default config.", args.config_path);
    }
    let mut config = Config::load_or_create(&args.config_path)?;

    if let Some(source_language) = &args.source_language {
        config.source_language = source_language.clone();
    }
    if let Some(target_language) = &args.target_language {
        config.target_language = target_language.clone();
    }
    match args.log_level {
        Some(level) => config.log_level = level.into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

// @applies: Backend and model overrides
fn apply_backend_overrides(config: &mut Config, backend: Option<BackendKind>, model: Option<&str>) -> Result<()> {
    if let Some(kind) = backend {
        let entry = config
            .translation
            .backends
            .iter_mut()
            .find(|b| b.kind == kind)
            .ok_or_else(|| anyhow!("Backend '{}' is not configured in the backend list", kind))?;
        entry.enabled = true;
    }

    if let Some(model) = model {
        let entry = match backend {
            Some(kind) => config.translation.backends.iter_mut().find(|b| b.kind == kind),
            None => config.translation.backends.iter_mut().find(|b| b.enabled),
        };
        if let Some(entry) = entry {
            entry.model = model.to_string();
        }
    }
    Ok(())
}

// @creates: Controller whose translations pause on Ctrl-C
fn controller_with_interrupt(config: Config) -> Result<Controller> {
    let controller = Controller::with_config(config)?;
    let pause = controller.pause_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; pausing after the current batch");
            pause.pause();
        }
    });
    Ok(controller)
}

fn row_set(rows: &[usize]) -> BTreeSet<usize> {
    rows.iter().copied().collect()
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let mut config = load_config(&args.document)?;
    let backend = args.backend.map(BackendKind::from);
    apply_backend_overrides(&mut config, backend, args.model.as_deref())?;
    if args.selective {
        config.orchestrator.selective = true;
    }

    let controller = controller_with_interrupt(config)?;
    let options = TranslateOptions {
        resume: args.resume,
        audit: args.audit,
        backend: backend.map(|kind| kind.as_str().to_string()),
        output: args.output,
        columns: args.document.columns.clone(),
    };

    let summary = controller.translate(&args.document.input_path, &options).await?;
    if let Some(audit) = &summary.audit {
        if audit.is_clean() {
            info!("Audit clean");
        } else {
            warn!(
                "Audit: {} cell(s) in {} row(s) still need work",
                audit.cell_count(),
                audit.discrepant_rows().len()
            );
        }
    }
    Ok(())
}

async fn run_retry(args: RowsArgs, backend: Option<CliBackend>, output: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(&args.document)?;
    let backend = backend.map(BackendKind::from);
    apply_backend_overrides(&mut config, backend, None)?;

    let controller = controller_with_interrupt(config)?;
    let options = TranslateOptions {
        backend: backend.map(|kind| kind.as_str().to_string()),
        output,
        columns: args.document.columns.clone(),
        ..TranslateOptions::default()
    };
    controller
        .retry(&args.document.input_path, &row_set(&args.rows), &options)
        .await?;
    Ok(())
}

async fn run_audit(args: DocumentArgs) -> Result<()> {
    let controller = Controller::with_config(load_config(&args)?)?;
    let report = controller.audit(&args.input_path, &args.columns).await?;

    if report.is_clean() {
        info!("No discrepancies in {}", display_name(&args.input_path));
        return Ok(());
    }

    for cell in report.cells() {
        warn!("Not in target language: {}", cell);
    }
    for line in report.quality.summary().lines() {
        info!("{}", line);
    }
    let rows: Vec<String> = report.discrepant_rows().iter().map(|r| r.to_string()).collect();
    info!("Retry with: tablewai retry --rows {} {}", rows.join(","), args.input_path.display());
    Ok(())
}

async fn run_abandon(args: RowsArgs) -> Result<()> {
    let controller = Controller::with_config(load_config(&args.document)?)?;
    controller
        .abandon(&args.document.input_path, &row_set(&args.rows), &args.document.columns)
        .await?;
    Ok(())
}

async fn run_clear(args: DocumentArgs) -> Result<()> {
    let controller = Controller::with_config(load_config(&args)?)?;
    if let Err(e) = controller.clear(&args.input_path, &args.columns).await {
        error!("Failed to clear {}: {}", display_name(&args.input_path), e);
        return Err(e);
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
