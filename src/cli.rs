//! Command line interface.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use wafercut_settings::{
    LengthUnit, MachiningMode, MeasurementSystem, PreviewLayout, RunConfig, ToolKind,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// STL model of the part
    #[arg(value_name = "MODEL")]
    pub model: PathBuf,

    /// G-code output file [default: <job>_<tool>.nc next to the model]
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Run configuration (TOML or JSON) [default: the user configuration file]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// single, repeated-depth or contour
    #[arg(short, long)]
    pub mode: Option<MachiningMode>,

    /// router, laser, needle-cutter or pen
    #[arg(short, long)]
    pub tool: Option<ToolKind>,

    /// Tool diameter in model units; 0 cuts on the line
    #[arg(long, value_name = "D")]
    pub tool_diameter: Option<f64>,

    /// Depth removed per pass in model units
    #[arg(long, value_name = "DEPTH")]
    pub cut_depth: Option<f64>,

    /// Feed rate in model units per minute
    #[arg(long, value_name = "RATE")]
    pub feed_rate: Option<f64>,

    /// Output measurement system: mm or inches
    #[arg(long)]
    pub units: Option<MeasurementSystem>,

    /// Unit the model is drawn in: mm or inches
    #[arg(long)]
    pub model_units: Option<LengthUnit>,

    /// Largest end-to-end gap closed into a loop
    #[arg(long, value_name = "DIST")]
    pub close_gaps: Option<f64>,

    /// Name written into the program header
    #[arg(long)]
    pub job_name: Option<String>,

    /// Switch coolant on
    #[arg(long)]
    pub coolant: bool,

    /// Also write a JSON preview of every pass
    #[arg(long, value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// on-part, spread or stacked
    #[arg(long)]
    pub preview_layout: Option<PreviewLayout>,

    /// Store the resulting configuration as the user configuration
    #[arg(long)]
    pub save_config: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Configuration from `--config`, else the user file when present, else
    /// defaults; command line flags applied on top.
    pub fn resolve_config(&self) -> anyhow::Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => match RunConfig::default_path() {
                Ok(path) if path.exists() => {
                    info!("Using configuration {}", path.display());
                    RunConfig::load_from_file(&path).with_context(|| {
                        format!("Failed to load configuration {}", path.display())
                    })?
                }
                _ => RunConfig::default(),
            },
        };
        self.apply_overrides(&mut config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut RunConfig) {
        if let Some(mode) = self.mode {
            config.machining.mode = mode;
        }
        if let Some(kind) = self.tool {
            config.tool.kind = kind;
        }
        if let Some(diameter) = self.tool_diameter {
            config.tool.diameter = diameter;
        }
        if let Some(depth) = self.cut_depth {
            config.tool.cut_depth = depth;
        }
        if let Some(rate) = self.feed_rate {
            config.tool.feed_rate = rate;
        }
        if let Some(system) = self.units {
            config.output.measurement_system = system;
        }
        if let Some(unit) = self.model_units {
            config.output.model_units = unit;
        }
        if let Some(gap) = self.close_gaps {
            config.machining.close_gaps = gap;
        }
        if let Some(name) = &self.job_name {
            config.output.job_name = name.clone();
        }
        if self.coolant {
            config.machining.coolant = true;
        }
        if let Some(layout) = self.preview_layout {
            config.output.preview_layout = layout;
        }
        debug!("Effective configuration: {:?}", config);
    }

    /// Where the program goes.
    pub fn output_path(&self, config: &RunConfig) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None => self
                .model
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(config.output_file_name()),
        }
    }
}
