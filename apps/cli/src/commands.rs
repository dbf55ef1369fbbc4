//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use boardpress_core::{Inspection, PipelineResult, execute, inspect, load_root};
use boardpress_shared::{
    AppConfig, AssetStrategy, FormatStrategy, IncludeStrategy, OperationOptions, PipelineConfig,
    Scope, TagVisibility, init_config, load_config,
};

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// boardpress: export boards and slide decks with their includes.
#[derive(Parser)]
#[command(
    name = "boardpress",
    version,
    about = "Resolve includes, convert between board and slide syntax, and bundle assets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Export a document and everything it includes.
    Export(ExportArgs),

    /// Show a document's layout and include directives without writing.
    Inspect {
        /// Board or slide document.
        root: PathBuf,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `export`. Anything left unset falls back to the config file.
#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Board or slide document to export.
    pub root: PathBuf,

    /// Output directory.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Sub-tree to export: full, row:N, stack:R:S, section:I or item:ID.
    #[arg(short, long, default_value = "full")]
    pub scope: Scope,

    /// Target format: keep, to-board or to-slides.
    #[arg(short, long)]
    pub format: Option<FormatStrategy>,

    /// Include handling: merge or separate.
    #[arg(short, long)]
    pub includes: Option<IncludeStrategy>,

    /// Asset handling: embed, copy, reference or ignore.
    #[arg(short, long)]
    pub assets: Option<AssetStrategy>,

    /// Tag visibility: all, hide-layout or none.
    #[arg(short, long)]
    pub tags: Option<TagVisibility>,

    /// File name of the primary output (defaults to the root's name).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Maximum include nesting depth.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Do not add the board marker block when converting to board syntax.
    #[arg(long)]
    pub no_marker: bool,

    /// Print the full result as JSON instead of a summary.
    #[arg(long)]
    pub report_json: bool,
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
        0 => "boardpress=warn",
        1 => "boardpress=info",
        2 => "boardpress=debug",
        _ => "boardpress=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Export(args) => cmd_export(args).await,
        Command::Inspect { root, json } => cmd_inspect(&root, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

/// Merge CLI flags over config defaults.
fn operation_options(args: &ExportArgs, config: &AppConfig) -> OperationOptions {
    let defaults = &config.defaults;
    OperationOptions {
        scope: args.scope.clone(),
        format_strategy: args.format.unwrap_or(defaults.format_strategy),
        include_strategy: args.includes.unwrap_or(defaults.include_strategy),
        asset_strategy: args.assets.unwrap_or(defaults.asset_strategy),
        tag_visibility: args.tags.unwrap_or(defaults.tag_visibility),
        board_marker: defaults.board_marker && !args.no_marker,
        output_root: args.out.clone(),
        primary_name: args.name.clone(),
    }
}

fn pipeline_config(args: &ExportArgs, config: &AppConfig) -> PipelineConfig {
    let mut pipeline = PipelineConfig::from(config);
    if let Some(depth) = args.max_depth {
        pipeline.max_include_depth = depth;
    }
    pipeline
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling export");
            token.cancel();
        }
    });
}

async fn cmd_export(args: ExportArgs) -> Result<()> {
    let config = load_config()?;
    let options = operation_options(&args, &config);
    let pipeline = pipeline_config(&args, &config);

    let root = load_root(&args.root)
        .await
        .wrap_err_with(|| format!("cannot read root document {}", args.root.display()))?;

    info!(
        root = %args.root.display(),
        out = %options.output_root.display(),
        scope = %options.scope,
        format = %options.format_strategy,
        includes = %options.include_strategy,
        assets = %options.asset_strategy,
        "exporting"
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let reporter = if args.report_json {
        CliProgress::hidden()
    } else {
        CliProgress::new()
    };
    let result = match execute(&root, &options, &pipeline, cancel, &reporter).await {
        Ok(result) => result,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };

    if args.report_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, &options.output_root);
    }

    if result.errors.is_empty() {
        Ok(())
    } else {
        Err(eyre!("export finished with {} error(s)", result.errors.len()))
    }
}

fn print_summary(result: &PipelineResult, out: &Path) {
    println!();
    if result.artifacts.is_empty() {
        println!("  Nothing written.");
    } else {
        println!("  Exported to {}", out.display());
        for artifact in &result.artifacts {
            let kind = format!("{:?}", artifact.kind).to_lowercase();
            println!("    {kind:<10} {}", artifact.relative_path);
        }
    }
    if !result.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for issue in &result.warnings {
            println!("    {issue}");
        }
    }
    if !result.errors.is_empty() {
        println!();
        println!("  Errors:");
        for issue in &result.errors {
            println!("    {issue}");
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

async fn cmd_inspect(root: &Path, json: bool) -> Result<()> {
    let unit = load_root(root)
        .await
        .wrap_err_with(|| format!("cannot read {}", root.display()))?;
    let report = inspect(&unit);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_inspection(&report, root);
    }
    Ok(())
}

fn print_inspection(report: &Inspection, root: &Path) {
    println!();
    println!("  {}", root.display());
    println!(
        "  Format: {}{}",
        report.format,
        if report.has_marker { " (marked)" } else { "" }
    );
    println!("  Sections: {}  Items: {}", report.sections, report.items);

    for row in &report.rows {
        println!();
        println!("  Row {}", row.row);
        for (index, stack) in row.stacks.iter().enumerate() {
            println!("    Stack {index}");
            for section in stack {
                println!(
                    "      [{}] {}  ({} item(s): {})",
                    section.index,
                    section.header,
                    section.items.len(),
                    section.items.join(", ")
                );
            }
        }
    }

    if !report.directives.is_empty() {
        println!();
        println!("  Directives:");
        for directive in &report.directives {
            let exists = if directive.resolved_path.exists() { "" } else { "  (missing)" };
            println!("    {:<15} {}{exists}", directive.kind, directive.raw_argument);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid args")
    }

    #[test]
    fn export_flags_override_config() {
        let cli = parse(&[
            "boardpress",
            "export",
            "board.md",
            "--out",
            "dist",
            "--scope",
            "stack:2:1",
            "--includes",
            "separate",
            "--tags",
            "hide-layout",
            "--no-marker",
            "--max-depth",
            "3",
        ]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };

        let config = AppConfig::default();
        let options = operation_options(&args, &config);
        assert_eq!(options.scope, Scope::Stack { row: 2, stack: 1 });
        assert_eq!(options.include_strategy, IncludeStrategy::Separate);
        assert_eq!(options.tag_visibility, TagVisibility::HideLayout);
        assert_eq!(options.asset_strategy, config.defaults.asset_strategy);
        assert!(!options.board_marker);
        assert_eq!(pipeline_config(&args, &config).max_include_depth, 3);
    }

    #[test]
    fn rejects_bad_scope() {
        let args = ["boardpress", "export", "b.md", "--out", "d", "--scope", "row:x"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn inspect_and_config_parse() {
        assert!(matches!(
            parse(&["boardpress", "inspect", "b.md", "--json"]).command,
            Command::Inspect { json: true, .. }
        ));
        assert!(matches!(
            parse(&["boardpress", "config", "show"]).command,
            Command::Config { action: ConfigAction::Show }
        ));
    }
}
