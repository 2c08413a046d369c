//! # G-code Output
//!
//! [`GcodeWriter`] renders emission calls as G-code on any `Write`;
//! [`GcodeFileSink`] wraps it around a temporary file that only replaces the
//! target once the run finishes, so an aborted run leaves nothing behind.
//!
//! Every coordinate goes through the run's [`NumericFormatter`]. Lasers get
//! no Z moves at all.

use crate::error::{SinkError, SinkResult};
use crate::sink::{JobHeader, Motion, ToolpathSink};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use wafercut_core::{MeasurementSystem, NumericFormatter};
use wafercut_settings::ToolKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Finished,
    Aborted,
}

/// G-code writer over any output stream.
pub struct GcodeWriter<W: Write> {
    out: W,
    formatter: NumericFormatter,
    tool: ToolKind,
    coolant: bool,
    safe_height: f64,
    lines: usize,
    state: WriterState,
}

impl<W: Write> GcodeWriter<W> {
    pub fn new(out: W, formatter: NumericFormatter) -> Self {
        Self {
            out,
            formatter,
            tool: ToolKind::Router,
            coolant: false,
            safe_height: 0.0,
            lines: 0,
            state: WriterState::Open,
        }
    }

    /// Number of lines written so far.
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    pub fn is_finished(&self) -> bool {
        self.state == WriterState::Finished
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) -> SinkResult<()> {
        if self.state != WriterState::Open {
            return Err(SinkError::Closed);
        }
        writeln!(self.out, "{}", text)?;
        self.lines += 1;
        Ok(())
    }

    fn fmt(&self, value: f64) -> String {
        self.formatter.format(value)
    }

    fn units(&self) -> &'static str {
        self.formatter.system().label()
    }
}

/// Parentheses end a G-code comment early.
fn sanitize_comment(text: &str) -> String {
    text.replace('(', "[").replace(')', "]")
}

impl<W: Write> ToolpathSink for GcodeWriter<W> {
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()> {
        self.tool = job.tool;
        self.coolant = job.coolant;
        self.safe_height = job.safe_height;

        self.line(&format!(
            "( Gcode for Machining of {} )",
            sanitize_comment(&job.job_name)
        ))?;
        self.line("")?;
        self.line(&format!("( Tool used: {} )", job.tool))?;
        self.line(&format!(
            "( Tool Diameter {} {} )",
            self.fmt(job.tool_diameter),
            self.units()
        ))?;
        self.line(&format!(
            "( Depth of Pass {} {} )",
            self.fmt(job.cut_depth),
            self.units()
        ))?;
        self.line(&format!("( Mode: {} )", job.mode))?;
        match self.formatter.system() {
            MeasurementSystem::Metric => self.line("G21 ( Unit of measure: mm )")?,
            MeasurementSystem::Imperial => self.line("G20 ( Unit of measure: inches )")?,
        }
        self.line("G90 ( Absolute programming )")?;
        self.line("M03 ( Spindle on clockwise )")?;
        if self.coolant {
            self.line("M7 ( Mist coolant on )")?;
            self.line("M8 ( Flood coolant on )")?;
        }
        if self.tool.moves_z() {
            self.line(&format!(
                "G00 Z{} ( Rapid to safe height )",
                self.fmt(self.safe_height)
            ))?;
        }
        let feed_units = match self.formatter.system() {
            MeasurementSystem::Metric => "mm/min",
            MeasurementSystem::Imperial => "in/min",
        };
        self.line(&format!(
            "F{} ( Feed rate in {} )",
            self.fmt(job.feed_rate),
            feed_units
        ))
    }

    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()> {
        self.line("")?;
        self.line(&format!("( Contour {} Path {} )", number, self.fmt(height)))
    }

    fn comment(&mut self, text: &str) -> SinkResult<()> {
        self.line(&format!("( {} )", sanitize_comment(text)))
    }

    fn motion(&mut self, motion: Motion) -> SinkResult<()> {
        match motion {
            Motion::Retract { z } if self.tool.moves_z() => {
                self.line(&format!("G00 Z{}", self.fmt(z)))
            }
            Motion::Plunge { z } if self.tool.moves_z() => {
                self.line(&format!("G01 Z{}", self.fmt(z)))
            }
            Motion::Retract { .. } | Motion::Plunge { .. } => Ok(()),
            Motion::Rapid { x, y } => {
                self.line(&format!("G00 X{} Y{}", self.fmt(x), self.fmt(y)))
            }
            Motion::Linear { x, y, .. } => {
                self.line(&format!("G01 X{} Y{}", self.fmt(x), self.fmt(y)))
            }
        }
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.line("")?;
        if self.coolant {
            self.line("M9 ( Coolant off )")?;
        }
        if self.tool.moves_z() {
            self.line(&format!(
                "G00 Z{} ( Rapid to safe height )",
                self.fmt(self.safe_height)
            ))?;
        }
        self.line("M05 ( Spindle stop )")?;
        self.line("M02 ( End of program )")?;
        self.line("")?;
        self.line("( end )")?;
        self.out.flush()?;
        self.state = WriterState::Finished;
        debug!("G-code complete, {} lines", self.lines);
        Ok(())
    }

    fn abort(&mut self, reason: &str) {
        if self.state == WriterState::Open {
            warn!("G-code output aborted: {}", reason);
            self.state = WriterState::Aborted;
        }
    }
}

/// G-code sink that atomically replaces `target` on a successful finish.
pub struct GcodeFileSink {
    writer: Option<GcodeWriter<BufWriter<NamedTempFile>>>,
    target: PathBuf,
}

impl GcodeFileSink {
    /// Stage output in a temporary file next to `target`.
    pub fn create(target: impl Into<PathBuf>, formatter: NumericFormatter) -> SinkResult<Self> {
        let target = target.into();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let staging = tempfile::Builder::new()
            .prefix(".wafercut-")
            .suffix(".nc.part")
            .tempfile_in(&dir)?;
        debug!(
            "Staging G-code for {} in {}",
            target.display(),
            staging.path().display()
        );
        Ok(Self {
            writer: Some(GcodeWriter::new(BufWriter::new(staging), formatter)),
            target,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn writer(&mut self) -> SinkResult<&mut GcodeWriter<BufWriter<NamedTempFile>>> {
        self.writer.as_mut().ok_or(SinkError::Closed)
    }
}

impl ToolpathSink for GcodeFileSink {
    fn begin(&mut self, job: &JobHeader) -> SinkResult<()> {
        self.writer()?.begin(job)
    }

    fn start_contour(&mut self, number: usize, height: f64) -> SinkResult<()> {
        self.writer()?.start_contour(number, height)
    }

    fn comment(&mut self, text: &str) -> SinkResult<()> {
        self.writer()?.comment(text)
    }

    fn motion(&mut self, motion: Motion) -> SinkResult<()> {
        self.writer()?.motion(motion)
    }

    fn finish(&mut self) -> SinkResult<()> {
        let mut writer = self.writer.take().ok_or(SinkError::Closed)?;
        writer.finish()?;
        let lines = writer.lines_written();
        let staging = writer
            .into_inner()
            .into_inner()
            .map_err(|e| SinkError::IoError(e.into_error()))?;
        staging
            .persist(&self.target)
            .map_err(|e| SinkError::Persist {
                path: self.target.display().to_string(),
                reason: e.error.to_string(),
            })?;
        info!("Wrote {} lines of G-code to {}", lines, self.target.display());
        Ok(())
    }

    fn abort(&mut self, reason: &str) {
        if let Some(mut writer) = self.writer.take() {
            writer.abort(reason);
            // dropping the staging file deletes it
            debug!("Discarded staged output for {}", self.target.display());
        }
    }
}
