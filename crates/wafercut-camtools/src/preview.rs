//! # Preview Recorder
//!
//! A [`ToolpathSink`] that records what a run would cut as plain line
//! segments and labels, displaced per [`PreviewLayout`] so the passes can be
//! drawn next to the model. The result serializes to JSON for an external
//! viewer.
//!
//! Coordinates and label heights go through the run's [`NumericFormatter`],
//! so the preview shows exactly the numbers the G-code contains.

use crate::error::{SinkError, SinkResult};
use crate::sink::{JobHeader, Motion, PassInfo, ToolpathSink};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};
use wafercut_core::{NumericFormatter, Point};
use wafercut_settings::PreviewLayout;

/// What a recorded line represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Source polyline of the slice.
    Outline,
    /// Travel at safe height.
    Rapid,
    /// Feed move at cutting height.
    Cut,
}

impl LineKind {
    pub fn colour(self) -> &'static str {
        match self {
            Self::Outline => "red",
            Self::Rapid => "grey",
            Self::Cut => "green",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewLine {
    pub kind: LineKind,
    pub colour: &'static str,
    pub start: [f64; 3],
    pub end: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewLabel {
    pub text: String,
    pub position: [f64; 3],
}

/// Everything recorded for one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewPass {
    pub index: usize,
    pub height: f64,
    /// Y displacement applied to every coordinate of the pass, in output units.
    pub offset_y: f64,
    pub lines: Vec<PreviewLine>,
    pub labels: Vec<PreviewLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum RecorderState {
    Open,
    Finished,
    Aborted,
}

/// Records a run for display.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRecorder {
    job_name: String,
    layout: PreviewLayout,
    units: &'static str,
    passes: Vec<PreviewPass>,
    #[serde(skip)]
    formatter: NumericFormatter,
    #[serde(skip)]
    extent_y: f64,
    #[serde(skip)]
    position: Option<Point>,
    #[serde(skip)]
    height: f64,
    #[serde(skip)]
    offset_y: f64,
    #[serde(skip)]
    label_pending: bool,
    state: RecorderState,
}

impl PreviewRecorder {
    pub fn new(layout: PreviewLayout, formatter: NumericFormatter) -> Self {
        Self {
            job_name: String::new(),
            layout,
            units: formatter.system().label(),
            passes: Vec::new(),
            formatter,
            extent_y: 0.0,
            position: None,
            height: 0.0,
            offset_y: 0.0,
            label_pending: false,
            state: RecorderState::Open,
        }
    }

    pub fn passes(&self) -> &[PreviewPass] {
        &self.passes
    }

    pub fn is_finished(&self) -> bool {
        self.state == RecorderState::Finished
    }

    /// Y displacement for pass `index`.
    pub fn offset_for(&self, index: usize) -> f64 {
        match self.layout {
            PreviewLayout::OnPart => 0.0,
            PreviewLayout::Stacked => self.extent_y,
            PreviewLayout::Spread => self.extent_y * (index + 1) as f64,
        }
    }

    pub fn to_json(&self) -> SinkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the recorded preview as JSON. Only a finished recording may be
    /// written.
    pub fn write_json(&self, path: &Path) -> SinkResult<()> {
        if !self.is_finished() {
            return Err(SinkError::Closed);
        }
        std::fs::write(path, self.to_json()?)?;
        debug!("Wrote preview of {} passes to {}", self.passes.len(), path.display());
        Ok(())
    }

    fn check_open(&self) -> SinkResult<()> {
        match self.state {
            RecorderState::Open => Ok(()),
            _ => Err(SinkError::Closed),
        }
    }

    fn current_pass(&mut self) -> SinkResult<&mut PreviewPass> {
        self.check_open()?;
        self.passes.last_mut().ok_or(SinkError::Closed)
    }

    fn project(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        [
            self.formatter.round(x),
            self.formatter.round(y + self.offset_y),
            self.formatter.round(z),
        ]
    }

    fn anchor_label(&mut self, x: f64, y: f64) -> SinkResult<()> {
        if !self.label_pending {
            return Ok(());
        }
        self.label_pending = false;
        let position = self.project(x, y, self.height);
        if let Some(label) = self.current_pass()?.labels.last_mut() {
            label.position = position;
        }
        Ok(())
    }

    fn push_line(&mut self, kind: LineKind, from: Point, to: Point) -> SinkResult<()> {
        let line = PreviewLine {
            kind,
            colour: kind.colour(),
            start: self.project(from.x, from.y, from.z),
            end: self.project(to.x, to.y, to.z),
        };
        self.current_pass()?.lines.push(line);
        Ok(())
    }
}

impl ToolpathSink for PreviewRecorder {
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()> {
        self.check_open()?;
        self.job_name = job.job_name.clone();
        self.extent_y = job.bounds.depth_y();
        self.position = Some(Point::new(0.0, 0.0, job.safe_height));
        Ok(())
    }

    fn start_pass(&mut self, pass: &PassInfo<'_>) -> SinkResult<()> {
        self.check_open()?;
        self.offset_y = self.offset_for(pass.index);
        self.height = pass.height;
        self.label_pending = false;
        self.passes.push(PreviewPass {
            index: pass.index,
            height: self.formatter.round(pass.height),
            offset_y: self.formatter.round(self.offset_y),
            lines: Vec::new(),
            labels: Vec::new(),
        });

        if self.layout != PreviewLayout::OnPart {
            for outline in pass.outlines {
                for (from, to) in outline.edges() {
                    let mut from = *from;
                    let mut to = *to;
                    from.z = pass.height;
                    to.z = pass.height;
                    self.push_line(LineKind::Outline, from, to)?;
                }
            }
        }
        Ok(())
    }

    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()> {
        self.height = height;
        let text = format!("Contour {} Z {}", number, self.formatter.format(height));
        // moved to the first point of the path once it is known; a skipped
        // contour keeps the tool position
        let anchor = self.position.unwrap_or_else(|| Point::new(0.0, 0.0, height));
        let position = self.project(anchor.x, anchor.y, height);
        self.current_pass()?.labels.push(PreviewLabel { text, position });
        self.label_pending = true;
        Ok(())
    }

    fn comment(&mut self, _text: &str) -> SinkResult<()> {
        self.check_open()
    }

    fn motion(&mut self, motion: Motion) -> SinkResult<()> {
        self.check_open()?;
        let from = self
            .position
            .unwrap_or_else(|| Point::new(0.0, 0.0, self.height));
        let to = match motion {
            Motion::Retract { z } | Motion::Plunge { z } => Point::new(from.x, from.y, z),
            Motion::Rapid { x, y } => {
                let to = Point::new(x, y, from.z);
                self.anchor_label(x, y)?;
                self.push_line(LineKind::Rapid, from, to)?;
                to
            }
            Motion::Linear { x, y, z } => {
                let to = Point::new(x, y, z);
                self.anchor_label(from.x, from.y)?;
                self.push_line(LineKind::Cut, from, to)?;
                to
            }
        };
        self.position = Some(to);
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.check_open()?;
        self.state = RecorderState::Finished;
        debug!(
            "Preview recorded: {} passes, {} lines",
            self.passes.len(),
            self.passes.iter().map(|p| p.lines.len()).sum::<usize>()
        );
        Ok(())
    }

    fn abort(&mut self, reason: &str) {
        if self.state == RecorderState::Open {
            warn!("Preview discarded: {}", reason);
            self.state = RecorderState::Aborted;
            self.passes.clear();
        }
    }
}
