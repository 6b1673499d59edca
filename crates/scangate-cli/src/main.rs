mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use scangate_core::config::{self, ScanConfig, DEFAULT_CONFIG_FILE};
use scangate_core::policy::{self, Policy, PolicyPreset};
use scangate_core::reporter::{json, sarif, OutputFormat, USAGE_EXIT_CODE};
use scangate_core::{Aggregator, ScanTarget, ToolKind};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scangate",
    version,
    about = "scangate - run SAST, dependency and secret scanners and gate the build on one verdict",
    long_about = "Run every configured security scanner against a codebase, normalize their results into one report, and exit 0 (pass) or nonzero (fail).\n\nA scanner that is missing, times out or produces unreadable output is a coverage gap and fails the gate unless marked advisory."
)]
struct Cli {
    /// Increase log verbosity on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a codebase with all configured scanners and render a verdict
    Scan {
        /// Path to the codebase to scan
        path: PathBuf,

        /// Output format (text, json, sarif)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Decision policy preset (strict, errors-only, advisory); overrides the config file
        #[arg(short, long)]
        policy: Option<PolicyPreset>,

        /// Treat a tool kind as advisory (sast, dependencies, secrets); repeatable
        #[arg(long, value_name = "KIND")]
        advisory: Vec<ToolKind>,

        /// Configuration file (defaults to ./.scangate.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Per-tool timeout in seconds, applied to every scanner
        #[arg(long)]
        timeout: Option<u64>,

        /// Write the rendered report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a starter configuration file
    Init {
        /// Where to write the configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            path,
            format,
            policy,
            advisory,
            config,
            timeout,
            output,
        } => cmd_scan(ScanArgs {
            path,
            format,
            preset: policy,
            advisory,
            config,
            timeout,
            output,
        }),
        Commands::Init { output, force } => cmd_init(&output, force),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {:#}", "error:".red().bold(), error);
            exit_code(USAGE_EXIT_CODE)
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

struct ScanArgs {
    path: PathBuf,
    format: OutputFormat,
    preset: Option<PolicyPreset>,
    advisory: Vec<ToolKind>,
    config: Option<PathBuf>,
    timeout: Option<u64>,
    output: Option<PathBuf>,
}

fn cmd_scan(args: ScanArgs) -> Result<ExitCode> {
    // Validate everything before any scanner runs.
    let target = ScanTarget::resolve(&args.path)?;

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let (mut config, origin) = config::resolve_config(args.config.as_deref(), &cwd)?;
    if let Some(path) = &origin {
        tracing::info!(config = %path.display(), "loaded configuration");
    }

    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            anyhow::bail!("--timeout must be greater than zero");
        }
        config.set_timeout(timeout);
    }

    let policy = build_policy(&config, args.preset, &args.advisory);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    tracing::info!(path = %target.display(), policy = %policy.name, "starting scan");
    let report = runtime.block_on(Aggregator::new(config.tool_specs()).run(&target));
    let decision = policy::evaluate(&report, &policy);

    let rendered = match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&json::to_json(&report, &decision, &policy))?
        }
        OutputFormat::Sarif => serde_json::to_string_pretty(&sarif::to_sarif(&report, &decision))?,
        OutputFormat::Text => display::render_report(&report, &decision, &policy)?,
    };

    match &args.output {
        Some(out_path) => {
            write_report(out_path, &rendered)?;
            println!(
                "Report written to {} (verdict: {})",
                out_path.display(),
                decision.verdict.label().to_uppercase()
            );
        }
        None => println!("{}", rendered.trim_end()),
    }

    Ok(exit_code(config.exit_codes.for_verdict(&decision.verdict)))
}

fn build_policy(
    config: &ScanConfig,
    preset: Option<PolicyPreset>,
    advisory: &[ToolKind],
) -> Policy {
    let mut policy_config = config.policy.clone();
    if let Some(preset) = preset {
        policy_config.preset = preset;
    }
    let mut policy = Policy::from_config(&policy_config);
    for kind in advisory {
        policy.set_advisory(*kind);
    }
    policy
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    let mut content = content.to_string();
    if !content.ends_with('\n') {
        content.push('\n');
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn cmd_init(output: &Path, force: bool) -> Result<ExitCode> {
    if output.exists() && !force {
        anyhow::bail!(
            "'{}' already exists. Use --force to overwrite it.",
            output.display()
        );
    }
    std::fs::write(output, config::default_config_toml())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Configuration written to {}", output.display());
    Ok(ExitCode::SUCCESS)
}
