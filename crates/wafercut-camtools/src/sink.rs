//! Output sink contract.
//!
//! The engine never formats machine code itself. It describes a run as a
//! header, a sequence of passes made of contours, comments and motions, and
//! a footer; a sink turns that into G-code, a preview, or both.
//!
//! A sink is closed exactly once, by either [`ToolpathSink::finish`] or
//! [`ToolpathSink::abort`]. Only a finished sink may present its output as
//! complete.

use crate::error::SinkResult;
use serde::Serialize;
use wafercut_core::{Bounds, Polyline};
use wafercut_settings::{MachiningMode, RunConfig, ToolKind};

/// A single tool movement, coordinates in model units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Motion {
    /// Rapid vertical move to the safe height.
    Retract { z: f64 },
    /// Rapid move in XY at the current height.
    Rapid { x: f64, y: f64 },
    /// Feed move in Z down to the cutting height.
    Plunge { z: f64 },
    /// Feed move in XY at the cutting height `z`.
    Linear { x: f64, y: f64, z: f64 },
}

/// Everything a sink needs to write its preamble.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHeader {
    pub job_name: String,
    pub tool: ToolKind,
    pub tool_diameter: f64,
    pub cut_depth: f64,
    pub feed_rate: f64,
    pub coolant: bool,
    pub mode: MachiningMode,
    pub safe_height: f64,
    pub bounds: Bounds,
}

impl JobHeader {
    pub fn new(config: &RunConfig, bounds: Bounds, safe_height: f64) -> Self {
        Self {
            job_name: config.output.job_name.clone(),
            tool: config.tool.kind,
            tool_diameter: config.tool.diameter,
            cut_depth: config.tool.cut_depth,
            feed_rate: config.tool.feed_rate,
            coolant: config.machining.coolant,
            mode: config.machining.mode,
            safe_height,
            bounds,
        }
    }
}

/// Start of one emitted pass.
#[derive(Debug, Clone, Copy)]
pub struct PassInfo<'a> {
    /// 0-based pass number.
    pub index: usize,
    /// Cutting height of the pass.
    pub height: f64,
    /// Source polylines the toolpaths of this pass were computed from.
    pub outlines: &'a [Polyline],
}

/// Receiver of the emission calls of a run.
pub trait ToolpathSink {
    /// Write the preamble.
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()>;

    /// A new pass starts.
    fn start_pass(&mut self, pass: &PassInfo<'_>) -> SinkResult<()> {
        let _ = pass;
        Ok(())
    }

    /// Contour `number` (1-based within the pass) starts at `height`.
    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()>;

    /// A plain comment line.
    fn comment(&mut self, text: &str) -> SinkResult<()>;

    /// A tool movement.
    fn motion(&mut self, motion: Motion) -> SinkResult<()>;

    /// Write the postamble and commit the output.
    fn finish(&mut self) -> SinkResult<()>;

    /// Discard the output; nothing written so far may look complete.
    fn abort(&mut self, reason: &str);
}

impl<T: ToolpathSink + ?Sized> ToolpathSink for &mut T {
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()> {
        (**self).begin(job)
    }

    fn start_pass(&mut self, pass: &PassInfo<'_>) -> SinkResult<()> {
        (**self).start_pass(pass)
    }

    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()> {
        (**self).start_contour(number, height)
    }

    fn comment(&mut self, text: &str) -> SinkResult<()> {
        (**self).comment(text)
    }

    fn motion(&mut self, motion: Motion) -> SinkResult<()> {
        (**self).motion(motion)
    }

    fn finish(&mut self) -> SinkResult<()> {
        (**self).finish()
    }

    fn abort(&mut self, reason: &str) {
        (**self).abort(reason)
    }
}

/// Forwards every call to both sinks, e.g. a G-code writer and a preview.
impl<A: ToolpathSink, B: ToolpathSink> ToolpathSink for (A, B) {
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()> {
        self.0.begin(job)?;
        self.1.begin(job)
    }

    fn start_pass(&mut self, pass: &PassInfo<'_>) -> SinkResult<()> {
        self.0.start_pass(pass)?;
        self.1.start_pass(pass)
    }

    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()> {
        self.0.start_contour(number, height)?;
        self.1.start_contour(number, height)
    }

    fn comment(&mut self, text: &str) -> SinkResult<()> {
        self.0.comment(text)?;
        self.1.comment(text)
    }

    fn motion(&mut self, motion: Motion) -> SinkResult<()> {
        self.0.motion(motion)?;
        self.1.motion(motion)
    }

    /// Finishes the second sink first, so a failure there still aborts the
    /// first one. Put the sink that commits output to disk first.
    fn finish(&mut self) -> SinkResult<()> {
        if let Err(e) = self.1.finish() {
            self.0.abort(&e.to_string());
            return Err(e);
        }
        self.0.finish()
    }

    fn abort(&mut self, reason: &str) {
        self.0.abort(reason);
        self.1.abort(reason);
    }
}
