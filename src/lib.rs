//! map-model-viewer
//!
//! Engine core of a browser-based 3D model viewer overlaid on an
//! interactive map. Callers hand in glTF-binary models keyed by unique ids;
//! the crate places them on a deterministic grid of map-coordinate offsets,
//! renders them through one of two interchangeable backends and measures
//! rendering performance: load-to-first-render duration and mean FPS over a
//! scripted 360 degree camera sweep. Asynchronous engine events (warnings,
//! load failures, stats, benchmark results) fan out to observers through
//! typed broadcast channels.
//!
//! High-level modules
//! - `layout`: pure square-grid placement of model instances
//! - `surface`: the host map seam (`MapBackend`) and its thin wrapper
//! - `engines`: the `RenderEngine` trait and its two backends
//! - `resources`: glTF decode, post-processing, stats, texture replacement
//! - `bench`: FPS sampling and the scripted camera-sweep orchestration
//! - `notify`: replay and fire-forward notification channels
//! - `viewer`: the facade composing everything
//! - `export`: CSV rendering of collected records
//!

pub mod bench;
pub mod engines;
pub mod error;
pub mod export;
pub mod layout;
pub mod notify;
pub mod resources;
pub mod surface;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use bench::{BenchmarkReport, BenchmarkSettings, FrameDriver};
pub use engines::{EngineKind, EngineState, Orientation, OrientationUpdate, RenderEngine};
pub use error::{ViewerError, ViewerResult};
pub use notify::{MessageLog, ViewerChannels};
pub use resources::Stats;
pub use surface::{CameraPose, MapBackend};
pub use viewer::{Viewer, ViewerOptions};
