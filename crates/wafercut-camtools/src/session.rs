//! Machining session: the tool state threaded through a run.
//!
//! Holds the current tool position, the active cutting height and the fixed
//! safe and bottom heights. Emission decisions (retract before moving to a
//! new start point, plunge when the height changes, dropping moves below the
//! minimum resolution) are made here from that state, never from globals.

use crate::error::SinkResult;
use crate::sink::{Motion, PassInfo, ToolpathSink};
use tracing::debug;
use wafercut_core::{Bounds, Point, Polyline, Toolpath};

/// Counts of what one pass emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitSummary {
    pub contours: usize,
    pub skipped: usize,
    pub moves: usize,
}

#[derive(Debug, Clone)]
pub struct MachiningSession {
    x: f64,
    y: f64,
    z: f64,
    height: f64,
    safe_height: f64,
    bottom: f64,
    minimum_resolution: f64,
}

impl MachiningSession {
    /// Tool parked at the XY origin at safe height, `clearance` above the part.
    pub fn new(bounds: &Bounds, clearance: f64, minimum_resolution: f64) -> Self {
        let safe_height = bounds.top() + clearance;
        Self {
            x: 0.0,
            y: 0.0,
            z: safe_height,
            height: bounds.bottom(),
            safe_height,
            bottom: bounds.bottom(),
            minimum_resolution,
        }
    }

    /// Set the cutting height, clamped so it never goes below the part.
    /// Returns the height actually used.
    pub fn set_height(&mut self, height: f64) -> f64 {
        self.height = height.max(self.bottom);
        self.height
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn safe_height(&self) -> f64 {
        self.safe_height
    }

    pub fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Current tool position.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y, self.z)
    }

    /// Emit every toolpath of one pass at the current height.
    pub fn emit_pass<S: ToolpathSink + ?Sized>(
        &mut self,
        sink: &mut S,
        index: usize,
        outlines: &[Polyline],
        toolpaths: &[Toolpath],
    ) -> SinkResult<EmitSummary> {
        sink.start_pass(&PassInfo {
            index,
            height: self.height,
            outlines,
        })?;

        let mut summary = EmitSummary::default();
        for (i, path) in toolpaths.iter().enumerate() {
            let number = i + 1;
            sink.start_contour(number, self.height)?;
            if path.is_empty() {
                sink.comment(&format!(
                    "Contour {} is not a loop, compensation skipped",
                    number
                ))?;
                summary.skipped += 1;
                continue;
            }
            summary.moves += self.cut_path(sink, path)?;
            summary.contours += 1;
        }
        debug!(
            "Pass {} at Z {}: {} contours, {} skipped, {} moves",
            index, self.height, summary.contours, summary.skipped, summary.moves
        );
        Ok(summary)
    }

    /// Cut one toolpath. Loops are entered at their last point, open paths
    /// at their first so no move bridges the open ends. Returns the number
    /// of feed moves emitted.
    fn cut_path<S: ToolpathSink + ?Sized>(
        &mut self,
        sink: &mut S,
        path: &Toolpath,
    ) -> SinkResult<usize> {
        let (start, points) = if path.is_closed() {
            match path.last() {
                Some(last) => (*last, path.points()),
                None => return Ok(0),
            }
        } else {
            match path.points().split_first() {
                Some((first, rest)) => (*first, rest),
                None => return Ok(0),
            }
        };

        if self.x != start.x || self.y != start.y {
            self.z = self.safe_height;
            sink.motion(Motion::Retract { z: self.z })?;
        }
        self.x = start.x;
        self.y = start.y;
        sink.motion(Motion::Rapid { x: self.x, y: self.y })?;
        self.descend(sink)?;

        let mut moves = 0;
        let mut previous = start;
        for point in points {
            let dx = (point.x - previous.x).abs();
            let dy = (point.y - previous.y).abs();
            if dx > self.minimum_resolution || dy > self.minimum_resolution {
                self.x = point.x;
                self.y = point.y;
                sink.motion(Motion::Linear {
                    x: self.x,
                    y: self.y,
                    z: self.height,
                })?;
                self.descend(sink)?;
                previous = *point;
                moves += 1;
            }
        }
        Ok(moves)
    }

    fn descend<S: ToolpathSink + ?Sized>(&mut self, sink: &mut S) -> SinkResult<()> {
        if self.z != self.height {
            self.z = self.height;
            sink.motion(Motion::Plunge { z: self.z })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkResult;
    use crate::sink::JobHeader;

    #[derive(Default)]
    struct Log {
        motions: Vec<Motion>,
        comments: Vec<String>,
    }

    impl ToolpathSink for Log {
        fn begin(&mut self, _job: &JobHeader) -> SinkResult<()> {
            Ok(())
        }
        fn start_contour(&mut self, _number: usize, _height: f64) -> SinkResult<()> {
            Ok(())
        }
        fn comment(&mut self, text: &str) -> SinkResult<()> {
            self.comments.push(text.to_string());
            Ok(())
        }
        fn motion(&mut self, motion: Motion) -> SinkResult<()> {
            self.motions.push(motion);
            Ok(())
        }
        fn finish(&mut self) -> SinkResult<()> {
            Ok(())
        }
        fn abort(&mut self, _reason: &str) {}
    }

    fn bounds() -> Bounds {
        Bounds::new(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 10.0, 10.0))
    }

    fn square(h: f64, z: f64) -> Toolpath {
        Toolpath::new(vec![
            Point::new(1.0, 1.0, z),
            Point::new(h, 1.0, z),
            Point::new(h, h, z),
            Point::new(1.0, h, z),
            Point::new(1.0, 1.0, z),
        ])
    }

    #[test]
    fn test_height_is_clamped_to_bottom() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.01);
        assert_eq!(session.safe_height(), 15.0);
        assert_eq!(session.set_height(4.0), 4.0);
        assert_eq!(session.set_height(-2.0), 0.0);
        assert_eq!(session.height(), 0.0);
    }

    #[test]
    fn test_first_path_retracts_rapids_and_plunges() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.01);
        session.set_height(3.0);
        let mut log = Log::default();
        let summary = session
            .emit_pass(&mut log, 0, &[], &[square(4.0, 3.0)])
            .unwrap();

        assert_eq!(summary.contours, 1);
        assert_eq!(summary.moves, 4);
        assert_eq!(log.motions[0], Motion::Retract { z: 15.0 });
        assert_eq!(log.motions[1], Motion::Rapid { x: 1.0, y: 1.0 });
        assert_eq!(log.motions[2], Motion::Plunge { z: 3.0 });
        assert_eq!(
            log.motions[3],
            Motion::Linear {
                x: 4.0,
                y: 1.0,
                z: 3.0
            }
        );
        assert_eq!(log.motions.len(), 7);
        assert_eq!(session.position(), Point::new(1.0, 1.0, 3.0));
    }

    #[test]
    fn test_same_start_next_depth_skips_retract() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.01);
        let mut log = Log::default();
        session.set_height(6.0);
        session
            .emit_pass(&mut log, 0, &[], &[square(4.0, 6.0)])
            .unwrap();
        log.motions.clear();

        session.set_height(3.0);
        session
            .emit_pass(&mut log, 1, &[], &[square(4.0, 3.0)])
            .unwrap();
        assert!(!log
            .motions
            .iter()
            .any(|m| matches!(m, Motion::Retract { .. })));
        assert_eq!(log.motions[1], Motion::Plunge { z: 3.0 });
    }

    #[test]
    fn test_moves_below_resolution_are_coalesced() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.5);
        let path = Toolpath::new(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(0.2, 0.3, 0.0),
            Point::new(0.4, 0.4, 0.0),
            Point::new(2.0, 0.0, 0.0),
            Point::new(0.0, 0.0, 0.0),
        ]);
        let mut log = Log::default();
        let summary = session.emit_pass(&mut log, 0, &[], &[path]).unwrap();
        // (0.2,0.3) and (0.4,0.4) are both within 0.5 of the origin on each axis
        assert_eq!(summary.moves, 2);
    }

    #[test]
    fn test_open_path_is_cut_from_its_first_point() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.01);
        let chain = Toolpath::new(vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(5.0, 0.0, 0.0),
            Point::new(5.0, 5.0, 0.0),
        ]);
        let mut log = Log::default();
        let summary = session.emit_pass(&mut log, 0, &[], &[chain]).unwrap();

        assert_eq!(summary.moves, 2);
        assert_eq!(
            log.motions,
            vec![
                Motion::Retract { z: 15.0 },
                Motion::Rapid { x: 0.0, y: 0.0 },
                Motion::Plunge { z: 0.0 },
                Motion::Linear {
                    x: 5.0,
                    y: 0.0,
                    z: 0.0
                },
                Motion::Linear {
                    x: 5.0,
                    y: 5.0,
                    z: 0.0
                },
            ]
        );
        assert_eq!(session.position(), Point::new(5.0, 5.0, 0.0));
    }

    #[test]
    fn test_empty_path_gets_comment() {
        let mut session = MachiningSession::new(&bounds(), 5.0, 0.01);
        let mut log = Log::default();
        let summary = session
            .emit_pass(&mut log, 0, &[], &[Toolpath::default()])
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(log.motions.is_empty());
        assert_eq!(
            log.comments,
            vec!["Contour 1 is not a loop, compensation skipped".to_string()]
        );
    }
}
