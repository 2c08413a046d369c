//! Wafercut Settings Crate
//!
//! Handles the run configuration: tool, machining and output sections,
//! validation before a run starts, and JSON/TOML persistence.

pub mod config;
pub mod error;

pub use config::{
    MachiningMode, MachiningSettings, OutputSettings, PreviewLayout, RunConfig, ToolKind,
    ToolSettings, MIN_CUT_DEPTH,
};
pub use error::{ConfigError, ConfigResult, SettingsError, SettingsResult};
pub use wafercut_core::units::{LengthUnit, MeasurementSystem};
