//! Per-shape and per-vertex anomalies collected during a run.
//!
//! None of these abort the run. Each one is logged at `warn` level when it
//! is reported and kept in the run report next to the best-effort result.

use serde::Serialize;
use std::fmt;
use tracing::warn;

/// One anomaly found while reconstructing or offsetting a slice.
///
/// Shape and contour numbers are 1-based and match the `Contour N` labels
/// written to the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// No segments were produced at this height.
    EmptySlice,
    /// An open chain was closed by appending its first point.
    GapClosed { shape: usize, gap: f64 },
    /// More than one unconsumed segment met a chain end at the same vertex.
    NonManifoldVertex {
        shape: usize,
        x: f64,
        y: f64,
        candidates: usize,
    },
    /// An open chain could not be tool compensated.
    OpenLoop { shape: usize, gap: f64 },
    /// An edge with no XY length was skipped.
    DegenerateEdge { shape: usize, edge: usize },
    /// Two consecutive offset lines did not intersect; the corner was dropped.
    DegenerateCorner { shape: usize, vertex: usize },
    /// The averaged side vote rounded to zero.
    AmbiguousSide { shape: usize, average: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySlice => write!(f, "no geometry at this height"),
            Self::GapClosed { shape, gap } => {
                write!(f, "closed a gap of {:.4} in shape {}", gap, shape)
            }
            Self::NonManifoldVertex {
                shape,
                x,
                y,
                candidates,
            } => write!(
                f,
                "shape {} has {} segments meeting at ({:.4}, {:.4}); joined in input order",
                shape, candidates, x, y
            ),
            Self::OpenLoop { shape, gap } => write!(
                f,
                "shape {} is not a loop (ends {:.4} apart); try increasing close_gaps",
                shape, gap
            ),
            Self::DegenerateEdge { shape, edge } => {
                write!(f, "edge {} of shape {} has zero length", edge, shape)
            }
            Self::DegenerateCorner { shape, vertex } => write!(
                f,
                "no corner intersection at vertex {} of shape {}",
                vertex, shape
            ),
            Self::AmbiguousSide { shape, average } => write!(
                f,
                "cut side of shape {} is ambiguous (average vote {:.3})",
                shape, average
            ),
        }
    }
}

/// A diagnostic together with the slice height it was found at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEntry {
    pub height: f64,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

/// Collector threaded through reconstruction, offsetting and pass driving.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    height: f64,
    entries: Vec<DiagnosticEntry>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice height attached to subsequently reported diagnostics.
    pub fn at_height(&mut self, height: f64) {
        self.height = height;
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        warn!("Z {:.4}: {}", self.height, diagnostic);
        self.entries.push(DiagnosticEntry {
            height: self.height,
            diagnostic,
        });
    }

    pub fn entries(&self) -> &[DiagnosticEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DiagnosticEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.diagnostic)).count()
    }
}
