//! Run configuration for Wafercut
//!
//! Provides the configuration of one toolpath run, its validation and its
//! persistence. Supports JSON and TOML files; the default location lives in
//! the platform configuration directory.
//!
//! Configuration is organized into logical sections:
//! - Tool settings (kind, diameter, depth per pass, feed rate)
//! - Machining settings (mode, gap closing, resolution, clearance, coolant)
//! - Output settings (units, decimal places, job name, preview layout)

use crate::error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use wafercut_core::units::{LengthUnit, MeasurementSystem, NumericFormatter};

/// Smallest depth per pass accepted by the multi-pass modes.
pub const MIN_CUT_DEPTH: f64 = 1e-6;

/// Kind of tool doing the cutting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Rotating end mill
    Router,
    /// Laser head; never moves in Z
    Laser,
    /// Drag or needle knife
    NeedleCutter,
    /// Pen plotter
    Pen,
}

impl Default for ToolKind {
    fn default() -> Self {
        Self::Router
    }
}

impl ToolKind {
    /// Suffix appended to the job name of generated files.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Self::Router => "R",
            Self::Laser => "L",
            Self::NeedleCutter => "NC",
            Self::Pen => "P",
        }
    }

    /// Whether the tool retracts and plunges along Z.
    pub fn moves_z(self) -> bool {
        !matches!(self, Self::Laser)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Router => write!(f, "Router"),
            Self::Laser => write!(f, "Laser"),
            Self::NeedleCutter => write!(f, "Needle Cutter"),
            Self::Pen => write!(f, "Pen"),
        }
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "router" => Ok(Self::Router),
            "laser" => Ok(Self::Laser),
            "needlecutter" | "needle" => Ok(Self::NeedleCutter),
            "pen" => Ok(Self::Pen),
            _ => Err(format!("Unknown tool kind: {}", s)),
        }
    }
}

/// How slice heights are chosen and re-used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachiningMode {
    /// One slice at the bottom of the part
    Single,
    /// Slice once at the top, re-cut the same paths at every depth step
    RepeatedDepth,
    /// Re-slice the part at every depth step
    DescendingContour,
}

impl Default for MachiningMode {
    fn default() -> Self {
        Self::Single
    }
}

impl MachiningMode {
    /// Modes that step down by the cut depth need a positive cut depth.
    pub fn is_multi_pass(self) -> bool {
        !matches!(self, Self::Single)
    }
}

impl fmt::Display for MachiningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "Single Plane"),
            Self::RepeatedDepth => write!(f, "Multiple Depths"),
            Self::DescendingContour => write!(f, "Contour"),
        }
    }
}

impl FromStr for MachiningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "single" | "singleplane" => Ok(Self::Single),
            "repeated" | "repeateddepth" | "multipledepths" => Ok(Self::RepeatedDepth),
            "contour" | "descendingcontour" => Ok(Self::DescendingContour),
            _ => Err(format!("Unknown machining mode: {}", s)),
        }
    }
}

/// Where previewed passes are drawn relative to the part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewLayout {
    /// On top of the part, outlines hidden
    OnPart,
    /// Each pass shifted one more part depth along Y
    Spread,
    /// All passes shifted once along Y
    Stacked,
}

impl Default for PreviewLayout {
    fn default() -> Self {
        Self::Stacked
    }
}

impl fmt::Display for PreviewLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnPart => write!(f, "On Part"),
            Self::Spread => write!(f, "Spread"),
            Self::Stacked => write!(f, "Stacked"),
        }
    }
}

impl FromStr for PreviewLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "onpart" => Ok(Self::OnPart),
            "spread" => Ok(Self::Spread),
            "stacked" => Ok(Self::Stacked),
            _ => Err(format!("Unknown preview layout: {}", s)),
        }
    }
}

/// Tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Tool kind
    pub kind: ToolKind,
    /// Cutting diameter in model units; 0 cuts on the line
    pub diameter: f64,
    /// Depth removed per pass in model units
    pub cut_depth: f64,
    /// Feed rate in model units per minute
    pub feed_rate: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            kind: ToolKind::Router,
            diameter: 2.0,
            cut_depth: 0.5,
            feed_rate: 500.0,
        }
    }
}

/// Machining settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachiningSettings {
    /// Slice height strategy
    pub mode: MachiningMode,
    /// Open chains whose ends are closer than this are closed into loops
    pub close_gaps: f64,
    /// Moves shorter than this on both axes are dropped
    pub minimum_resolution: f64,
    /// Height above the top of the part used for rapid travel
    pub safe_height_clearance: f64,
    /// Switch coolant on for the run
    pub coolant: bool,
}

impl Default for MachiningSettings {
    fn default() -> Self {
        Self {
            mode: MachiningMode::Single,
            close_gaps: 1.0,
            minimum_resolution: 0.01,
            safe_height_clearance: 5.0,
            coolant: false,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Name written into the program header and used for file names
    pub job_name: String,
    /// Measurement system of the generated program
    pub measurement_system: MeasurementSystem,
    /// Unit the model geometry is expressed in
    pub model_units: LengthUnit,
    /// Decimal places override; defaults to 3 for mm and 4 for inches
    pub decimal_places: Option<u8>,
    /// Preview placement
    pub preview_layout: PreviewLayout,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            job_name: "untitled".to_string(),
            measurement_system: MeasurementSystem::Metric,
            model_units: LengthUnit::Millimeters,
            decimal_places: None,
            preview_layout: PreviewLayout::Stacked,
        }
    }
}

/// Complete configuration of one run
///
/// Immutable once the pass driver starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    /// Tool settings
    pub tool: ToolSettings,
    /// Machining settings
    pub machining: MachiningSettings,
    /// Output settings
    pub output: OutputSettings,
}

impl RunConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file: `<config dir>/wafercut/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no configuration directory on this platform".into())
        })?;
        Ok(dir.join("wafercut").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        debug!("Loading run configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config: Self = match extension(path)?.as_str() {
            "json" => serde_json::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match extension(path)?.as_str() {
            "json" => serde_json::to_string_pretty(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SettingsError::ConfigDirectory(format!("{}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        debug!("Saved run configuration to {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        non_negative("tool.diameter", self.tool.diameter)?;
        non_negative("tool.cut_depth", self.tool.cut_depth)?;
        if self.machining.mode.is_multi_pass() && self.tool.cut_depth < MIN_CUT_DEPTH {
            return Err(ConfigError::InvalidValue {
                key: "tool.cut_depth".to_string(),
                reason: format!(
                    "must be at least {} in {} mode",
                    MIN_CUT_DEPTH, self.machining.mode
                ),
            });
        }

        if !self.tool.feed_rate.is_finite() || self.tool.feed_rate <= 0.0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "tool.feed_rate".to_string(),
                value: self.tool.feed_rate.to_string(),
            });
        }

        non_negative("machining.close_gaps", self.machining.close_gaps)?;
        non_negative("machining.minimum_resolution", self.machining.minimum_resolution)?;
        non_negative(
            "machining.safe_height_clearance",
            self.machining.safe_height_clearance,
        )?;

        if let Some(places) = self.output.decimal_places {
            if places > 9 {
                return Err(ConfigError::ValueOutOfRange {
                    key: "output.decimal_places".to_string(),
                    value: places.to_string(),
                });
            }
        }

        if self.output.job_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.job_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Formatter for every number written by output sinks.
    pub fn formatter(&self) -> NumericFormatter {
        let formatter =
            NumericFormatter::new(self.output.model_units, self.output.measurement_system);
        match self.output.decimal_places {
            Some(places) => formatter.with_places(places),
            None => formatter,
        }
    }

    /// Default program file name, e.g. `bracket_R.nc`.
    pub fn output_file_name(&self) -> String {
        format!(
            "{}_{}.nc",
            self.output.job_name.trim(),
            self.tool.kind.file_suffix()
        )
    }
}

fn non_negative(key: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValueOutOfRange {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn extension(path: &Path) -> SettingsResult<String> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "json" | "toml" => Ok(ext),
        _ => Err(ConfigError::UnsupportedFormat(format!(
            "{} (config file must be .json or .toml)",
            path.display()
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.output_file_name(), "untitled_R.nc");
        assert_eq!(config.formatter().places(), 3);
    }

    #[test]
    fn test_negative_diameter_rejected() {
        let mut config = RunConfig::default();
        config.tool.diameter = -1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ValueOutOfRange {
                key: "tool.diameter".to_string(),
                value: "-1".to_string(),
            })
        );

        config.tool.diameter = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cut_depth_only_allowed_for_single() {
        let mut config = RunConfig::default();
        config.tool.cut_depth = 0.0;
        assert!(config.validate().is_ok());

        config.machining.mode = MachiningMode::DescendingContour;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.machining.mode = MachiningMode::RepeatedDepth;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cut_depth_below_floor_rejected() {
        let mut config = RunConfig::default();
        config.machining.mode = MachiningMode::DescendingContour;
        config.tool.cut_depth = 1e-20;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.tool.cut_depth = MIN_CUT_DEPTH;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decimal_places_and_job_name() {
        let mut config = RunConfig::default();
        config.output.decimal_places = Some(12);
        assert!(config.validate().is_err());

        config.output.decimal_places = Some(2);
        assert_eq!(config.formatter().places(), 2);
        assert!(config.validate().is_ok());

        config.output.job_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_imperial_formatter_places() {
        let mut config = RunConfig::default();
        config.output.measurement_system = MeasurementSystem::Imperial;
        assert_eq!(config.formatter().places(), 4);
        assert_eq!(config.formatter().format(25.4), "1.0000");
    }

    #[test]
    fn test_tool_kind() {
        assert_eq!("needle cutter".parse::<ToolKind>(), Ok(ToolKind::NeedleCutter));
        assert_eq!("Laser".parse::<ToolKind>(), Ok(ToolKind::Laser));
        assert!(!ToolKind::Laser.moves_z());
        assert!(ToolKind::Pen.moves_z());
        assert_eq!(ToolKind::NeedleCutter.file_suffix(), "NC");
        assert_eq!(ToolKind::NeedleCutter.to_string(), "Needle Cutter");
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("single".parse::<MachiningMode>(), Ok(MachiningMode::Single));
        assert_eq!(
            "repeated-depth".parse::<MachiningMode>(),
            Ok(MachiningMode::RepeatedDepth)
        );
        assert_eq!(
            "Multiple Depths".parse::<MachiningMode>(),
            Ok(MachiningMode::RepeatedDepth)
        );
        assert_eq!(
            "descending_contour".parse::<MachiningMode>(),
            Ok(MachiningMode::DescendingContour)
        );
        assert!("spiral".parse::<MachiningMode>().is_err());
    }

    #[test]
    fn test_preview_layout_parse() {
        assert_eq!("on-part".parse::<PreviewLayout>(), Ok(PreviewLayout::OnPart));
        assert_eq!("Stacked".parse::<PreviewLayout>(), Ok(PreviewLayout::Stacked));
        assert!("grid".parse::<PreviewLayout>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            [tool]
            kind = "laser"
            diameter = 0.2

            [machining]
            mode = "descending_contour"
            "#,
        )
        .unwrap();
        assert_eq!(config.tool.kind, ToolKind::Laser);
        assert_eq!(config.tool.diameter, 0.2);
        assert_eq!(config.tool.cut_depth, 0.5);
        assert_eq!(config.machining.mode, MachiningMode::DescendingContour);
        assert_eq!(config.output.job_name, "untitled");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = RunConfig::default()
            .save_to_file(Path::new("config.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Config(ConfigError::UnsupportedFormat(_))
        ));
    }
}
