//! # Pass Driver
//!
//! Runs a whole job: picks the slice heights for the configured
//! [`MachiningMode`], asks the [`SegmentProvider`] for each slice, turns the
//! segments into toolpaths and hands every pass to a [`ToolpathSink`].
//!
//! The driver moves through
//! `Idle -> HeaderEmitted -> Cutting(mode) -> FooterEmitted -> Done`.
//! Any error on the way aborts the sink exactly once and leaves the driver
//! in `Aborted`; a driver runs a single job.

use crate::diagnostics::{Diagnostic, DiagnosticEntry, Diagnostics};
use crate::error::{CamToolError, CamToolResult};
use crate::isolate::LoopReconstructor;
use crate::provider::SegmentProvider;
use crate::router::OffsetPathGenerator;
use crate::session::MachiningSession;
use crate::sink::{JobHeader, ToolpathSink};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};
use wafercut_core::{Bounds, Polyline, Toolpath};
use wafercut_settings::{MachiningMode, RunConfig};

/// Tolerance of the height loop conditions.
pub const HEIGHT_EPSILON: f64 = 1e-9;

/// Lifecycle of a [`PassDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassState {
    Idle,
    HeaderEmitted,
    Cutting(MachiningMode),
    FooterEmitted,
    Done,
    Aborted,
}

impl PassState {
    /// Check if a transition from this state to `target` is valid.
    ///
    /// Every state except `Done` may abort; otherwise transitions are
    /// strictly sequential.
    pub fn can_transition_to(&self, target: PassState) -> bool {
        use PassState::*;
        matches!(
            (self, target),
            (Idle, HeaderEmitted)
                | (HeaderEmitted, Cutting(_))
                | (Cutting(_), FooterEmitted)
                | (FooterEmitted, Done)
                | (Idle | HeaderEmitted | Cutting(_) | FooterEmitted, Aborted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PassState::Done | PassState::Aborted)
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::HeaderEmitted => write!(f, "HeaderEmitted"),
            Self::Cutting(mode) => write!(f, "Cutting({})", mode),
            Self::FooterEmitted => write!(f, "FooterEmitted"),
            Self::Done => write!(f, "Done"),
            Self::Aborted => write!(f, "Aborted"),
        }
    }
}

/// What one emitted pass contained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub index: usize,
    pub height: f64,
    /// Raw segments of the slice the toolpaths came from.
    pub segments: usize,
    pub polylines: usize,
    pub toolpaths: usize,
    /// Toolpaths left empty because their shape was not a loop.
    pub skipped: usize,
    pub moves: usize,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: MachiningMode,
    pub bounds: Bounds,
    pub safe_height: f64,
    /// Number of heights the provider was asked to slice.
    pub slices: usize,
    pub passes: Vec<PassReport>,
    pub diagnostics: Vec<DiagnosticEntry>,
}

impl RunReport {
    pub fn total_moves(&self) -> usize {
        self.passes.iter().map(|p| p.moves).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.passes.iter().map(|p| p.skipped).sum()
    }

    /// Heights of the emitted passes, in emission order.
    pub fn heights(&self) -> Vec<f64> {
        self.passes.iter().map(|p| p.height).collect()
    }
}

/// Geometry of one slice.
struct Slice {
    segments: usize,
    polylines: Vec<Polyline>,
    toolpaths: Vec<Toolpath>,
}

/// Per-run bookkeeping shared by the mode drivers.
struct RunState {
    session: MachiningSession,
    diagnostics: Diagnostics,
    passes: Vec<PassReport>,
    slices: usize,
    found_geometry: bool,
}

/// Drives a single job from configuration to a closed sink.
pub struct PassDriver {
    config: RunConfig,
    state: PassState,
    sink_closed: bool,
}

impl PassDriver {
    /// Validate `config` and create an idle driver. Configuration errors are
    /// fatal and reported before anything is sliced.
    pub fn new(config: RunConfig) -> CamToolResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: PassState::Idle,
            sink_closed: false,
        })
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn transition(&mut self, target: PassState) -> CamToolResult<()> {
        if !self.state.can_transition_to(target) {
            return Err(CamToolError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: target.to_string(),
            });
        }
        debug!("Pass driver: {} -> {}", self.state, target);
        self.state = target;
        Ok(())
    }

    /// Run the job. On error the sink has been aborted and nothing it wrote
    /// is presented as complete.
    pub fn run<P, S>(&mut self, provider: &mut P, sink: &mut S) -> CamToolResult<RunReport>
    where
        P: SegmentProvider + ?Sized,
        S: ToolpathSink + ?Sized,
    {
        if self.state != PassState::Idle {
            return Err(CamToolError::InvalidStateTransition {
                current: self.state.to_string(),
                requested: PassState::HeaderEmitted.to_string(),
            });
        }

        let started = Instant::now();
        match self.execute(provider, sink) {
            Ok(report) => {
                info!(
                    "{} run finished: {} passes, {} moves in {:?}",
                    report.mode,
                    report.passes.len(),
                    report.total_moves(),
                    started.elapsed()
                );
                Ok(report)
            }
            Err(e) => {
                if !self.sink_closed {
                    self.sink_closed = true;
                    sink.abort(&e.to_string());
                }
                if !self.state.is_terminal() {
                    self.state = PassState::Aborted;
                }
                warn!("Run aborted: {}", e);
                Err(e)
            }
        }
    }

    fn execute<P, S>(&mut self, provider: &mut P, sink: &mut S) -> CamToolResult<RunReport>
    where
        P: SegmentProvider + ?Sized,
        S: ToolpathSink + ?Sized,
    {
        let mode = self.config.machining.mode;
        let bounds = provider
            .bounds()
            .ok_or(CamToolError::NoGeometry { heights: 0 })?;
        debug!(
            "Part bounds Z {} to {}, Y extent {}",
            bounds.bottom(),
            bounds.top(),
            bounds.depth_y()
        );

        let session = MachiningSession::new(
            &bounds,
            self.config.machining.safe_height_clearance,
            self.config.machining.minimum_resolution,
        );
        let safe_height = session.safe_height();
        let mut run = RunState {
            session,
            diagnostics: Diagnostics::new(),
            passes: Vec::new(),
            slices: 0,
            found_geometry: false,
        };

        self.transition(PassState::HeaderEmitted)?;
        sink.begin(&JobHeader::new(&self.config, bounds, safe_height))?;

        self.transition(PassState::Cutting(mode))?;
        match mode {
            MachiningMode::Single => self.single(&bounds, &mut run, provider, sink)?,
            MachiningMode::RepeatedDepth => self.repeated_depth(&bounds, &mut run, provider, sink)?,
            MachiningMode::DescendingContour => {
                self.descending_contour(&bounds, &mut run, provider, sink)?
            }
        }

        if !run.found_geometry {
            return Err(CamToolError::NoGeometry {
                heights: run.slices,
            });
        }

        self.transition(PassState::FooterEmitted)?;
        self.sink_closed = true;
        sink.finish()?;
        self.transition(PassState::Done)?;

        Ok(RunReport {
            mode,
            bounds,
            safe_height,
            slices: run.slices,
            passes: run.passes,
            diagnostics: run.diagnostics.into_entries(),
        })
    }

    /// One slice at the bottom of the part.
    fn single<P, S>(
        &self,
        bounds: &Bounds,
        run: &mut RunState,
        provider: &mut P,
        sink: &mut S,
    ) -> CamToolResult<()>
    where
        P: SegmentProvider + ?Sized,
        S: ToolpathSink + ?Sized,
    {
        let height = run.session.set_height(bounds.bottom());
        let slice = self.slice(provider, height, run)?;
        self.emit(sink, run, &slice)
    }

    /// Slice once at the top, then cut the same toolpaths at every depth
    /// step down to the bottom.
    fn repeated_depth<P, S>(
        &self,
        bounds: &Bounds,
        run: &mut RunState,
        provider: &mut P,
        sink: &mut S,
    ) -> CamToolResult<()>
    where
        P: SegmentProvider + ?Sized,
        S: ToolpathSink + ?Sized,
    {
        let depth = self.config.tool.cut_depth;
        let mut height = run.session.set_height(bounds.top());
        let slice = self.slice(provider, height, run)?;

        let mut thickness = bounds.thickness();
        while thickness > HEIGHT_EPSILON {
            let (next_thickness, next_height) = (thickness - depth, height - depth);
            if next_thickness >= thickness || next_height >= height {
                return Err(CamToolError::DepthStalled { depth, height });
            }
            thickness = next_thickness;
            height = next_height;
            run.session.set_height(height);
            self.emit(sink, run, &slice)?;
        }
        Ok(())
    }

    /// Re-slice at every depth step below the top, the last step clamped to
    /// the bottom.
    fn descending_contour<P, S>(
        &self,
        bounds: &Bounds,
        run: &mut RunState,
        provider: &mut P,
        sink: &mut S,
    ) -> CamToolResult<()>
    where
        P: SegmentProvider + ?Sized,
        S: ToolpathSink + ?Sized,
    {
        let depth = self.config.tool.cut_depth;
        let bottom = bounds.bottom();
        let mut height = bounds.top();
        while height > bottom + HEIGHT_EPSILON {
            let next = height - depth;
            if next >= height {
                return Err(CamToolError::DepthStalled { depth, height });
            }
            height = run.session.set_height(next);
            let slice = self.slice(provider, height, run)?;
            self.emit(sink, run, &slice)?;
        }
        Ok(())
    }

    fn slice<P>(&self, provider: &mut P, height: f64, run: &mut RunState) -> CamToolResult<Slice>
    where
        P: SegmentProvider + ?Sized,
    {
        let started = Instant::now();
        run.slices += 1;
        run.diagnostics.at_height(height);

        let segments = provider.segments_at(height)?;
        if segments.is_empty() {
            run.diagnostics.report(Diagnostic::EmptySlice);
        } else {
            run.found_geometry = true;
        }
        let sliced = started.elapsed();

        let polylines = LoopReconstructor::new(self.config.machining.close_gaps)
            .isolate(&segments, &mut run.diagnostics);
        let isolated = started.elapsed();

        let toolpaths = OffsetPathGenerator::new(self.config.tool.diameter).generate(
            &polylines,
            height,
            &mut run.diagnostics,
        );
        debug!(
            "Z {}: {} segments ({:?}), {} polylines ({:?}), {} toolpaths ({:?})",
            height,
            segments.len(),
            sliced,
            polylines.len(),
            isolated - sliced,
            toolpaths.len(),
            started.elapsed() - isolated
        );

        Ok(Slice {
            segments: segments.len(),
            polylines,
            toolpaths,
        })
    }

    fn emit<S>(&self, sink: &mut S, run: &mut RunState, slice: &Slice) -> CamToolResult<()>
    where
        S: ToolpathSink + ?Sized,
    {
        let index = run.passes.len();
        let summary = run
            .session
            .emit_pass(sink, index, &slice.polylines, &slice.toolpaths)?;
        run.passes.push(PassReport {
            index,
            height: run.session.height(),
            segments: slice.segments,
            polylines: slice.polylines.len(),
            toolpaths: slice.toolpaths.len(),
            skipped: summary.skipped,
            moves: summary.moves,
        });
        Ok(())
    }
}
