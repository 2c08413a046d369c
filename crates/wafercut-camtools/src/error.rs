//! Error types for the CAM tools crate.
//!
//! This module provides structured error types for pass driving,
//! segment providers and output sinks. Per-shape and per-vertex
//! anomalies are not errors; they are collected as diagnostics.

use std::io;
use thiserror::Error;
use wafercut_settings::error::ConfigError;

/// Errors that abort a whole toolpath run.
#[derive(Error, Debug)]
pub enum CamToolError {
    /// The run configuration was rejected before any slicing started.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// No slice height produced any segments.
    #[error("No geometry found at any of {heights} slice height(s)")]
    NoGeometry { heights: usize },

    /// A depth step left the cutting height where it was.
    #[error("Cut depth {depth} does not lower the cutting height below {height}")]
    DepthStalled { depth: f64, height: f64 },

    /// The pass driver was asked for a transition its state does not allow.
    #[error("Invalid state transition from {current} to {requested}")]
    InvalidStateTransition { current: String, requested: String },

    /// A segment provider error occurred.
    #[error("Segment provider error: {0}")]
    Provider(#[from] ProviderError),

    /// An output sink error occurred.
    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors raised while producing raw segments.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The model file could not be parsed.
    #[error("Failed to parse model {path}: {reason}")]
    ParseError { path: String, reason: String },

    /// The model contains no triangles.
    #[error("Model is empty: {0}")]
    EmptyModel(String),

    /// The model file extension is not recognized.
    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    /// A slice height is not a finite number.
    #[error("Invalid slice height: {0}")]
    InvalidHeight(f64),

    /// I/O error during model reading.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Errors raised by an output sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink was used after it was finished or aborted.
    #[error("Sink is already closed")]
    Closed,

    /// The finished output could not be moved into place.
    #[error("Failed to persist output to {path}: {reason}")]
    Persist { path: String, reason: String },

    /// I/O error while writing output.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error while writing a preview.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for CAM tool operations.
pub type CamToolResult<T> = Result<T, CamToolError>;

/// Result type alias for segment provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type alias for output sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
