//! SVG flamegraph generation from an aggregated call tree.
//!
//! The tree is first collapsed into folded-stack lines ("a;b;c 12"), one
//! per node, weighted by the node's self time in whole milliseconds.
//! Rendering is delegated to inferno.

use crate::aggregator::{EventAggregator, NodeView};
use crate::utils::error::FlamegraphError;
use log::{debug, info};

/// Flamegraph configuration
#[derive(Debug, Clone)]
pub struct FlamegraphConfig {
    pub title: String,
    pub width: usize,
}

impl Default for FlamegraphConfig {
    fn default() -> Self {
        Self {
            title: "AL Trace Profile".to_string(),
            width: 1200,
        }
    }
}

impl FlamegraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }
}

/// Collapse a finished aggregation into folded-stack lines.
///
/// **Public** - the bridge between the call tree and inferno
///
/// A node's weight is its self time: total duration minus the duration
/// of its children, floored at zero (anomaly repairs can make children
/// overlap their parent). Zero-weight frames still appear in the stacks
/// of their descendants but emit no line of their own.
pub fn collapse_call_tree(aggregator: &mut dyn EventAggregator) -> Vec<String> {
    // (frame name, depth, total duration, children's duration so far)
    let mut stack: Vec<(String, u32, f64, f64)> = Vec::new();
    let mut lines = Vec::new();

    for view in aggregator.flatten_call_tree() {
        let depth = view.depth();

        while stack.last().is_some_and(|&(_, d, _, _)| d >= depth) {
            emit_frame(&mut stack, &mut lines);
        }

        stack.push((frame_name(view), depth, view.node().duration_msec, 0.0));
    }

    while !stack.is_empty() {
        emit_frame(&mut stack, &mut lines);
    }

    debug!("Collapsed call tree into {} folded stacks", lines.len());

    lines
}

fn emit_frame(stack: &mut Vec<(String, u32, f64, f64)>, lines: &mut Vec<String>) {
    let (_, _, duration, children) = *stack.last().unwrap();

    let self_time_msec = (duration - children).max(0.0).round() as u64;
    if self_time_msec > 0 {
        let path: Vec<&str> = stack.iter().map(|(name, _, _, _)| name.as_str()).collect();
        lines.push(format!("{} {}", path.join(";"), self_time_msec));
    }

    stack.pop();
    if let Some(parent) = stack.last_mut() {
        parent.3 += duration;
    }
}

/// The folded-stack frame of one node. Semicolons separate frames in
/// the collapsed format, so they cannot appear inside one.
fn frame_name(view: NodeView<'_>) -> String {
    view.node().statement.replace(';', ",")
}

/// Generate an SVG flamegraph from collapsed stacks
///
/// **Public** - main entry point for flamegraph output
pub fn generate_flamegraph(
    lines: &[String],
    config: Option<&FlamegraphConfig>,
) -> Result<String, FlamegraphError> {
    if lines.is_empty() {
        return Err(FlamegraphError::EmptyTree);
    }

    let config = config.cloned().unwrap_or_default();
    info!("Generating flamegraph from {} folded stacks", lines.len());

    let mut options = inferno::flamegraph::Options::default();
    options.title = config.title.clone();
    options.image_width = Some(config.width);
    options.count_name = "ms".to_string();

    let mut svg = Vec::new();
    inferno::flamegraph::from_lines(&mut options, lines.iter().map(String::as_str), &mut svg)
        .map_err(|e| FlamegraphError::RenderFailed(e.to_string()))?;

    let svg =
        String::from_utf8(svg).map_err(|e| FlamegraphError::RenderFailed(e.to_string()))?;

    info!("Flamegraph generated successfully ({} bytes)", svg.len());
    Ok(svg)
}
