//! # Wafercut
//!
//! Slices a solid model into planar cross-sections and turns them into
//! tool-radius-compensated G-code for routers, lasers, needle cutters and
//! pen plotters.
//!
//! ## Architecture
//!
//! Wafercut is organized as a workspace with multiple crates:
//!
//! 1. **wafercut-core** - Geometry primitives, segments, polylines, units, numeric formatting
//! 2. **wafercut-settings** - Run configuration, validation and persistence
//! 3. **wafercut-camtools** - Loop reconstruction, offset paths, pass driver, G-code and preview sinks
//! 4. **wafercut** - Command line binary that wires the crates together
//!
//! ## Machining modes
//!
//! - **Single**: one pass at the bottom of the part
//! - **Repeated depth**: the top outline cut again at every depth step
//! - **Descending contour**: the part re-sliced at every depth step

pub mod cli;

use std::path::Path;

use anyhow::Context;
use tracing::info;

pub use cli::Cli;

pub use wafercut_core::{
    Bounds, LengthUnit, MeasurementSystem, NumericFormatter, Point, Polyline, Segment, Toolpath,
};

pub use wafercut_camtools::{
    isolate_part, router_path, CamToolError, Diagnostic, DiagnosticEntry, Diagnostics,
    GcodeFileSink, GcodeWriter, MeshSegmentProvider, PassDriver, PreviewRecorder, RunReport,
    SegmentProvider, ToolpathSink,
};

pub use wafercut_settings::{MachiningMode, PreviewLayout, RunConfig, ToolKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Logs go to stderr so the program itself can be piped. `RUST_LOG`
/// overrides the level picked from `verbosity` (0 info, 1 debug, 2+ trace).
pub fn init_logging(verbosity: u8, json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity > 0)
                    .with_level(true)
                    .with_line_number(verbosity > 1),
            )
            .try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Run one job as described by the command line.
pub fn run(cli: &Cli) -> anyhow::Result<RunReport> {
    let config = cli.resolve_config()?;

    if cli.save_config {
        let path = RunConfig::default_path()?;
        config
            .save_to_file(&path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        info!("Saved configuration to {}", path.display());
    }

    let mut provider = MeshSegmentProvider::from_stl_file(&cli.model)
        .with_context(|| format!("Failed to read model {}", cli.model.display()))?;
    let output = cli.output_path(&config);
    let formatter = config.formatter();
    let gcode = GcodeFileSink::create(&output, formatter)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut driver = PassDriver::new(config.clone())?;
    let report = match &cli.preview {
        Some(preview_path) => {
            let preview = PreviewRecorder::new(config.output.preview_layout, formatter);
            let mut sink = (gcode, preview);
            let report = driver.run(&mut provider, &mut sink)?;
            write_preview(&sink.1, preview_path)?;
            report
        }
        None => {
            let mut sink = gcode;
            driver.run(&mut provider, &mut sink)?
        }
    };

    info!(
        "{} passes, {} moves written to {}",
        report.passes.len(),
        report.total_moves(),
        output.display()
    );
    if !report.diagnostics.is_empty() {
        info!("{} diagnostics reported", report.diagnostics.len());
    }
    Ok(report)
}

fn write_preview(preview: &PreviewRecorder, path: &Path) -> anyhow::Result<()> {
    preview
        .write_json(path)
        .with_context(|| format!("Failed to write preview {}", path.display()))
}
