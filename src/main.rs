//! AL Trace Studio CLI
//!
//! A performance profiling tool for AL server trace captures.
//! Reconstructs aggregated call trees and generates flamegraphs and
//! detailed profiles from recorded trace-event streams.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use altrace_studio::commands::{execute_analyze, validate_args, AnalyzeArgs};
use altrace_studio::flamegraph::FlamegraphConfig;
use altrace_studio::output::read_profile;
use altrace_studio::utils::config::{MULTIPLE_SESSIONS_ID, SCHEMA_VERSION};

/// AL Trace Studio - call-tree profiling for AL server traces
#[derive(Parser, Debug)]
#[command(name = "altrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a recorded trace file
    Analyze {
        /// Path to the recorded trace file
        #[arg(short, long)]
        file: PathBuf,

        /// Aggregate only this session (default: all sessions)
        #[arg(short, long)]
        session: Option<i32>,

        /// Prune subtrees below this duration, in milliseconds
        #[arg(short = 'T', long, default_value = "0")]
        threshold: f64,

        /// Output path for JSON profile
        #[arg(short, long, default_value = "profile.json")]
        output: PathBuf,

        /// Output path for SVG flamegraph (optional)
        #[arg(short = 'g', long)]
        flamegraph: Option<PathBuf>,

        /// Flamegraph title
        #[arg(long)]
        title: Option<String>,

        /// Flamegraph width in pixels
        #[arg(long, default_value = "1200")]
        width: usize,

        /// Print the call tree to stdout
        #[arg(long)]
        tree: bool,
    },

    /// Validate a profile JSON file
    Validate {
        /// Path to profile JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Analyze {
            file,
            session,
            threshold,
            output,
            flamegraph,
            title,
            width,
            tree,
        } => {
            let fg_config = if flamegraph.is_some() {
                let mut config = FlamegraphConfig::new().with_width(width);
                if let Some(title_str) = title {
                    config = config.with_title(title_str);
                }
                Some(config)
            } else {
                None
            };

            let args = AnalyzeArgs {
                trace_file: file,
                session_id: session.unwrap_or(MULTIPLE_SESSIONS_ID),
                threshold_msec: threshold,
                output_json: Some(output),
                output_svg: flamegraph,
                flamegraph_config: fg_config,
                print_tree: tree,
            };

            validate_args(&args)?;
            execute_analyze(args)?;
        }

        Commands::Validate { file } => {
            validate_profile_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// Validate a profile JSON file
///
/// **Private** - internal command implementation
fn validate_profile_file(file_path: PathBuf) -> Result<()> {
    println!("Validating profile: {}", file_path.display());

    let profile = read_profile(&file_path)?;

    println!("✓ Valid profile JSON");
    println!("  Version: {}", profile.version);
    println!("  Source: {}", profile.source);
    println!("  Sessions: {}", profile.session_count);
    println!("  Nodes: {}", profile.nodes.len());
    println!(
        "  Captured: {:.1} ms",
        profile.max_relative_timestamp_msec
    );

    Ok(())
}

/// Display schema information
///
/// **Private** - internal command implementation
fn display_schema(show_details: bool) {
    println!("AL Trace Studio Profile Schema");
    println!("Current Version: {SCHEMA_VERSION}");
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  version: string              - Schema version (e.g., '1.0.0')");
        println!("  source: string               - Trace file the profile was built from");
        println!("  threshold_msec: number       - Pruning threshold in milliseconds");
        println!("  session_count: number        - Number of sessions in the capture");
        println!("  max_relative_timestamp_msec: number - Latest activity in the capture");
        println!("  nodes: array                 - Flattened call tree, pre-order");
        println!("    session_id: number         - Owning session");
        println!("    depth: number              - Tree depth");
        println!("    statement: string          - Statement or method name");
        println!("    object_type: string        - Owning object type (AL nodes only)");
        println!("    object_id: number          - Owning object id (AL nodes only)");
        println!("    line_no: number            - Source line (statement nodes only)");
        println!("    hit_count: number          - Occurrences at this position");
        println!("    duration_msec: number      - Cumulative duration");
        println!("    min_duration_msec: number  - Shortest occurrence");
        println!("    max_duration_msec: number  - Longest occurrence");
        println!("    last_active_msec: number   - Time since last activity");
        println!("  generated_at: string         - ISO 8601 timestamp");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("AL Trace Studio v{}", env!("CARGO_PKG_VERSION"));
    println!("Profile Schema: v{SCHEMA_VERSION}");
    println!();
    println!("Call-tree profiling for AL server trace captures.");
}
