//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use assetdeploy_core::pipeline::{self, ProgressReporter};
use assetdeploy_core::summary::{DeploySummary, MediaTotals, RunOutcome, RunWarning};
use assetdeploy_shared::{AppConfig, DeployConfig, init_config, load_config, load_config_from};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Exit code for a run that wrote its output but recorded warnings.
const EXIT_DEGRADED: u8 = 2;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// assetdeploy: move embedded media out of scenario JSON.
#[derive(Parser)]
#[command(
    name = "assetdeploy",
    version,
    about = "Externalize embedded base64 media from scenario JSON into content-addressed files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.assetdeploy/assetdeploy.toml.
    #[arg(long = "config", global = true, env = "ASSETDEPLOY_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Externalize assets and write the merged catalog.
    Deploy {
        /// Directory of input JSON documents.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Merged catalog output file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory to write asset files to.
        #[arg(short, long)]
        assets: Option<PathBuf>,

        /// Remove the asset directory before deploying.
        #[arg(short, long)]
        clean: bool,

        /// Maximum documents processed at once.
        #[arg(long)]
        concurrency: Option<u32>,

        /// Print the run summary as JSON instead of a tree.
        #[arg(long)]
        summary_json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "assetdeploy=info",
        1 => "assetdeploy=debug",
        _ => "assetdeploy=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `--summary-json` output stays parseable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config_file;
    match cli.command {
        Command::Deploy {
            input,
            output,
            assets,
            clean,
            concurrency,
            summary_json,
        } => {
            let overrides = DeployOverrides {
                input,
                output,
                assets,
                clean,
                concurrency,
            };
            cmd_deploy(config_path, overrides, summary_json).await
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Init => cmd_config_init()?,
                ConfigAction::Show => cmd_config_show(config_path)?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Resolve the config file: explicit path, or the default location.
fn resolve_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(&path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// deploy
// ---------------------------------------------------------------------------

/// Command-line values that take precedence over the config file.
struct DeployOverrides {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    assets: Option<PathBuf>,
    clean: bool,
    concurrency: Option<u32>,
}

impl DeployOverrides {
    fn apply(self, config: &mut DeployConfig) {
        if let Some(input) = self.input {
            config.input_dir = input;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(assets) = self.assets {
            config.assets_dir = assets;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.clean |= self.clean;
    }
}

async fn cmd_deploy(
    config_path: Option<PathBuf>,
    overrides: DeployOverrides,
    summary_json: bool,
) -> Result<ExitCode> {
    let app_config = resolve_config(config_path)?;
    let mut config = DeployConfig::from(&app_config);
    overrides.apply(&mut config);

    info!(
        input = %config.input_dir.display(),
        output = %config.output_path.display(),
        assets = %config.assets_dir.display(),
        clean = config.clean,
        "deploying assets"
    );

    let reporter = if summary_json {
        CliProgress::hidden()
    } else {
        CliProgress::new()
    };
    let summary = match pipeline::deploy(&config, &reporter).await {
        Ok(summary) => summary,
        Err(e) => {
            reporter.clear();
            return Err(e.into());
        }
    };

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(match summary.outcome() {
        RunOutcome::Clean => ExitCode::SUCCESS,
        RunOutcome::Degraded => ExitCode::from(EXIT_DEGRADED),
    })
}

// ---------------------------------------------------------------------------
// Summary rendering
// ---------------------------------------------------------------------------

fn print_summary(summary: &DeploySummary) {
    let elapsed = (summary.finished_at - summary.started_at)
        .to_std()
        .unwrap_or_default();

    println!();
    match summary.outcome() {
        RunOutcome::Clean => println!("  Deployment complete"),
        RunOutcome::Degraded => println!("  Deployment complete with warnings"),
    }
    println!(
        "  ├─ Documents: {} processed of {} found",
        summary.documents_processed, summary.documents_found
    );
    println!(
        "  ├─ Catalog:   {} entries → {}",
        summary.catalog_entries,
        summary.output_path.display()
    );
    println!(
        "  ├─ Assets:    {} distinct, {} written → {}",
        summary.distinct_assets,
        summary.files_written,
        summary.assets_dir.display()
    );

    let by_extension = totals_by_extension(summary);
    let last = by_extension.len().saturating_sub(1);
    for (i, (ext, totals)) in by_extension.iter().enumerate() {
        let branch = if i == last { "└─" } else { "├─" };
        println!(
            "  │  {branch} {ext:<6} {:>4} files  {:>10}",
            totals.files,
            format_bytes(totals.bytes)
        );
    }

    println!("  ├─ Rewrites:  {}", summary.rewrites);
    if let Some(pct) = summary.size_reduction_pct() {
        println!(
            "  ├─ Size:      {} of embedded text → {} of paths ({pct:.1}% smaller)",
            format_bytes(summary.reference_text_bytes as u64),
            format_bytes(summary.externalized_path_bytes as u64)
        );
    }
    println!("  └─ Time:      {:.1}s", elapsed.as_secs_f64());

    if !summary.warnings.is_empty() {
        println!();
        println!("  Warnings ({}):", summary.warnings.len());
        for warning in &summary.warnings {
            println!("    - {}", format_warning(warning));
        }
    }
    println!();
}

/// Totals per file extension. `audio/mpeg` and `audio/mp3` share `.mp3`.
fn totals_by_extension(summary: &DeploySummary) -> BTreeMap<&'static str, MediaTotals> {
    let mut out: BTreeMap<&'static str, MediaTotals> = BTreeMap::new();
    for (media_type, totals) in &summary.media {
        let entry = out.entry(media_type.extension()).or_default();
        entry.files += totals.files;
        entry.bytes += totals.bytes;
    }
    out
}

fn format_warning(warning: &RunWarning) -> String {
    match warning {
        RunWarning::SkippedReference {
            document,
            path,
            error,
            ..
        } => format!("{document}: {path}: skipped reference: {error}"),
        RunWarning::UnresolvedReference {
            document,
            path,
            error,
            ..
        } => format!("{document}: {path}: left unresolved: {error}"),
        RunWarning::SkippedDocument { document, error } => {
            format!("{document}: skipped document: {error}")
        }
        RunWarning::NotACatalogEntry { document, reason } => {
            format!("{document}: not added to catalog: {reason}")
        }
        RunWarning::IdentityCollision {
            id,
            kept_from,
            dropped_from,
        } => format!("duplicate id '{id}': kept {kept_from}, dropped {dropped_from}"),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn hidden() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
        }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_processed(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Processing [{current}/{total}] {name}"));
    }

    fn done(&self, _summary: &DeploySummary) {
        self.clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
