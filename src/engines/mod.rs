//! The rendering engine abstraction and its two backends.
//!
//! Exactly one engine renders at a time. Both backends implement
//! [`RenderEngine`] and are selected at runtime through [`EngineKind`]:
//!
//! - [`scenegraph::ScenegraphEngine`] decodes models itself and hands the
//!   host renderer per-model overlay layers with packed instance data
//! - [`map_model::MapModelEngine`] registers models as native map resources
//!   and lets the host map render them
//!
//! The engines share the pure grid layout in [`crate::layout`]; neither
//! holds state the other depends on.

use futures::future::LocalBoxFuture;

use crate::error::ViewerResult;
use crate::resources::Stats;

pub mod map_model;
pub mod scenegraph;

/// Which backend renders the current model set. Chosen once per model set;
/// switching tears down the previous engine's layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Scenegraph,
    MapModel,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Scenegraph => "scenegraph",
            EngineKind::MapModel => "native map",
        }
    }
}

/// Observable engine slot state of the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    ScenegraphActive,
    MapModelActive,
}

/// Model rotation in degrees per axis.
///
/// Defaults to `{0, 0, 90}`, the upright pose for y-up glTF assets placed on
/// a z-up map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 90.0,
        }
    }
}

impl Orientation {
    /// Merge a partial update: axes that are absent or NaN keep their
    /// previous value.
    pub fn merge(&mut self, update: OrientationUpdate) {
        if let Some(x) = update.x {
            if !x.is_nan() {
                self.x = x;
            }
        }
        if let Some(y) = update.y {
            if !y.is_nan() {
                self.y = y;
            }
        }
        if let Some(z) = update.z {
            if !z.is_nan() {
                self.z = z;
            }
        }
    }
}

/// Partial orientation change; only supplied axes update.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrientationUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// Capability set shared by both rendering backends.
pub trait RenderEngine {
    fn kind(&self) -> EngineKind;

    /// Load and place the given models, each bound to a caller-issued
    /// unique id, with an optional replacement texture image applying to
    /// the whole batch. Resolves once every model was attempted; individual
    /// failures are published on the load-failure channel and do not abort
    /// the remaining loads.
    fn add_models(
        &mut self,
        models: Vec<(String, Vec<u8>)>,
        image: Option<Vec<u8>>,
    ) -> LocalBoxFuture<'_, ()>;

    /// Release all render-layer handles and clear model and count state.
    /// Idempotent.
    fn remove_all(&mut self);

    /// Change one model's instance count. The full layout is recomputed
    /// across all registered models. A count of zero hides the model's
    /// instances but keeps it registered.
    fn set_instance_count(&mut self, model_id: &str, count: usize);

    fn set_orientation(&mut self, update: OrientationUpdate);

    fn set_elevation(&mut self, height: f64);

    fn orientation(&self) -> Orientation;

    fn elevation(&self) -> f64;

    /// Registered model ids in registration order.
    fn model_ids(&self) -> Vec<String>;

    /// Whether this backend can run per-model isolated benchmarks.
    fn supports_isolated_benchmark(&self) -> bool;

    /// Restrict the rendered layers to a single registered model. Used by
    /// the per-model benchmark loop so only one model's layer exists at a
    /// time.
    fn isolate_model(&mut self, model_id: &str) -> LocalBoxFuture<'_, ViewerResult<()>>;

    /// Restore the full layer set after an isolated run. Safe to call when
    /// no isolation is active.
    fn end_isolation(&mut self);

    /// Statistics of the current single-model session, if one was recorded.
    fn stats(&self) -> Option<Stats>;

    /// Attach a completed benchmark's mean FPS to the recorded stats and
    /// return the updated record for republication.
    fn attach_benchmark_fps(&mut self, fps: f64) -> Option<Stats>;
}
