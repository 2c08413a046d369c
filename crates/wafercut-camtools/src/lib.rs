//! # Wafercut CAM Tools
//!
//! The toolpath engine: turns the cross-sections of a part into G-code for
//! profile cutting, one or more slice heights at a time.
//!
//! ## Pipeline
//!
//! - **Segment Providers**: raw, unordered cross-section segments per height
//!   (triangle mesh slicing, STL import, fixed prisms)
//! - **Loop Reconstruction**: stitches segments into polylines, closing small gaps
//! - **Offset Path Generation**: tool radius compensation with nesting-aware cut side
//! - **Pass Driver**: Single, RepeatedDepth and DescendingContour runs
//! - **Machining Session**: tool position and height threaded through a run
//!
//! ## Output
//!
//! - **G-code Writer**: header, moves and footer; atomic file output
//! - **Preview Recorder**: JSON preview of every pass
//! - **Diagnostics**: non-fatal anomalies collected per run

pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod gcode;
pub mod isolate;
pub mod preview;
pub mod provider;
pub mod router;
pub mod session;
pub mod sink;

// Re-export commonly used items
pub use diagnostics::{Diagnostic, DiagnosticEntry, Diagnostics};
pub use driver::{PassDriver, PassReport, PassState, RunReport, HEIGHT_EPSILON};
pub use error::{
    CamToolError, CamToolResult, ProviderError, ProviderResult, SinkError, SinkResult,
};
pub use gcode::{GcodeFileSink, GcodeWriter};
pub use isolate::{isolate_part, LoopReconstructor};
pub use preview::{LineKind, PreviewLabel, PreviewLine, PreviewPass, PreviewRecorder};
pub use provider::{Mesh, MeshSegmentProvider, SegmentProvider, StaticSegmentProvider, Triangle};
pub use router::{router_path, OffsetPathGenerator};
pub use session::{EmitSummary, MachiningSession};
pub use sink::{JobHeader, Motion, PassInfo, ToolpathSink};
