//! Analyze command implementation.
//!
//! The analyze command:
//! 1. Reads a recorded trace file
//! 2. Feeds every event through the call-tree aggregator
//! 3. Finalizes statistics and prunes below the threshold
//! 4. Generates flamegraph (if requested)
//! 5. Writes output files and prints the tree

use crate::aggregator::aggregator_for_session;
use crate::events::read_trace_file;
use crate::flamegraph::{collapse_call_tree, generate_flamegraph, FlamegraphConfig};
use crate::output::{render_profile, to_profile, write_profile, write_svg};
use crate::utils::config::MULTIPLE_SESSIONS_ID;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the analyze command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    /// Recorded trace file to analyze
    pub trace_file: PathBuf,

    /// Session to aggregate; [`MULTIPLE_SESSIONS_ID`] selects all
    pub session_id: i32,

    /// Pruning threshold in milliseconds; 0 keeps everything
    pub threshold_msec: f64,

    /// Output path for JSON profile (optional)
    pub output_json: Option<PathBuf>,

    /// Output path for SVG flamegraph (optional)
    pub output_svg: Option<PathBuf>,

    /// Flamegraph configuration
    pub flamegraph_config: Option<FlamegraphConfig>,

    /// Print the call tree to stdout
    pub print_tree: bool,
}

impl Default for AnalyzeArgs {
    fn default() -> Self {
        Self {
            trace_file: PathBuf::new(),
            session_id: MULTIPLE_SESSIONS_ID,
            threshold_msec: 0.0,
            output_json: Some(PathBuf::from("profile.json")),
            output_svg: None,
            flamegraph_config: None,
            print_tree: false,
        }
    }
}

/// Validate analyze arguments before doing any work
///
/// **Public** - called from main.rs before execute_analyze
pub fn validate_args(args: &AnalyzeArgs) -> Result<()> {
    if !args.trace_file.exists() {
        bail!("Trace file does not exist: {}", args.trace_file.display());
    }

    if !args.threshold_msec.is_finite() || args.threshold_msec < 0.0 {
        bail!(
            "Threshold must be a non-negative number of milliseconds, got {}",
            args.threshold_msec
        );
    }

    if args.output_json.is_none() && args.output_svg.is_none() && !args.print_tree {
        bail!("Nothing to do: pass --output, --flamegraph, or --tree");
    }

    Ok(())
}

/// Execute the analyze command
///
/// **Public** - main entry point called from main.rs
pub fn execute_analyze(args: AnalyzeArgs) -> Result<()> {
    let start_time = Instant::now();

    info!("Analyzing trace file: {}", args.trace_file.display());
    if args.session_id == MULTIPLE_SESSIONS_ID {
        info!("Aggregating all sessions");
    } else {
        info!("Aggregating session {}", args.session_id);
    }

    // Step 1: Read the trace file
    info!("Step 1/4: Reading trace file...");
    let events = read_trace_file(&args.trace_file).context("Failed to read trace file")?;
    debug!("Read {} raw events", events.len());

    // Step 2: Aggregate the call tree
    info!("Step 2/4: Aggregating call tree...");
    let mut aggregator = aggregator_for_session(args.session_id, args.threshold_msec);
    for event in &events {
        aggregator.on_event(event);
    }
    aggregator.finish_aggregation(true);

    debug!(
        "Aggregated {} session(s), {:.1} ms captured",
        aggregator.session_count(),
        aggregator.max_relative_timestamp()
    );

    let source = args.trace_file.display().to_string();
    let session_count = aggregator.session_count();
    let profile = to_profile(
        aggregator.as_mut(),
        &source,
        args.threshold_msec,
        session_count,
    );

    // Step 3: Generate flamegraph (if requested)
    let svg_content = if args.output_svg.is_some() {
        info!("Step 3/4: Generating flamegraph...");
        let lines = collapse_call_tree(aggregator.as_mut());
        let svg = generate_flamegraph(&lines, args.flamegraph_config.as_ref())
            .context("Failed to generate flamegraph")?;
        Some(svg)
    } else {
        info!("Step 3/4: Skipping flamegraph generation (not requested)");
        None
    };

    // Step 4: Write outputs
    info!("Step 4/4: Writing output files...");

    if let Some(output_json) = &args.output_json {
        write_profile(&profile, output_json).context("Failed to write JSON profile")?;
    }

    if let (Some(output_svg), Some(svg)) = (&args.output_svg, svg_content) {
        write_svg(&svg, output_svg).context("Failed to write flamegraph SVG")?;
    }

    if args.print_tree {
        println!("{}", render_profile(&profile));
    }

    info!(
        "Analysis complete in {:.2}s ({} nodes)",
        start_time.elapsed().as_secs_f64(),
        profile.nodes.len()
    );

    Ok(())
}
