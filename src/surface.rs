//! Base map surface: the seam between the viewer and the host map.
//!
//! The host map (base layer, draw scheduling, camera animation) lives on the
//! other side of the [`MapBackend`] trait. The crate itself ships no
//! implementation; the host binding provides one. [`MapSurface`] is the thin
//! wrapper the engines and the benchmarker talk to: it owns the canonical
//! start pose, the zoom configuration and the access token, and forwards
//! everything else to the backend.

use futures::future::LocalBoxFuture;
use instant::Duration;

use cgmath::Vector2;

use crate::engines::scenegraph::OverlayLayer;

/// Full camera pose on the host map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub center: Vector2<f64>,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl CameraPose {
    /// The canonical start pose every benchmark sweep begins from.
    pub fn start() -> Self {
        Self {
            center: Vector2::new(0.0, 0.0),
            zoom: 20.0,
            pitch: 60.0,
            bearing: 0.0,
        }
    }
}

/// Host map binding.
///
/// Camera transitions are animated on the host side; `fly_to` returns a
/// future that resolves once the map has settled (the host's "idle" signal).
/// The returned future must not borrow the backend, so callers can keep
/// issuing frame ticks while a transition is in flight.
pub trait MapBackend {
    fn jump_to(&mut self, pose: CameraPose);

    fn fly_to(&mut self, pose: CameraPose, duration: Duration) -> LocalBoxFuture<'static, ()>;

    fn current_pose(&self) -> CameraPose;

    /// Enable or disable user interaction (drag, rotate, zoom, keyboard).
    fn set_interaction_enabled(&mut self, enabled: bool);

    /// Attach or replace the scenegraph overlay's layer collection.
    fn set_overlay_layers(&mut self, layers: Vec<OverlayLayer>);

    /// Detach the scenegraph overlay entirely.
    fn remove_overlay(&mut self);

    /// Register a binary model resource under `id` on the host map.
    fn add_model(&mut self, id: &str, glb: &[u8]) -> anyhow::Result<()>;

    fn remove_model(&mut self, id: &str);

    /// Add a GeoJSON source. `data` is a FeatureCollection value.
    fn add_source(&mut self, id: &str, data: serde_json::Value);

    /// Replace a GeoJSON source's data in place.
    fn set_source_data(&mut self, id: &str, data: serde_json::Value);

    fn remove_source(&mut self, id: &str);

    /// Add a native model layer drawing `model_id` at the points of
    /// `source_id`.
    fn add_model_layer(&mut self, layer_id: &str, model_id: &str, source_id: &str);

    /// Update a native model layer's rotation (degrees per axis) and
    /// elevation offset.
    fn set_model_layer_transform(&mut self, layer_id: &str, rotation: [f64; 3], elevation: f64);

    fn remove_layer(&mut self, id: &str);
}

/// Thin wrapper around the host map.
pub struct MapSurface {
    backend: Box<dyn MapBackend>,
    access_token: String,
    start_pose: CameraPose,
}

impl MapSurface {
    pub fn new(backend: Box<dyn MapBackend>, access_token: String) -> Self {
        Self {
            backend,
            access_token,
            start_pose: CameraPose::start(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Zoom level used by the canonical start pose of every sweep.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.start_pose.zoom = zoom;
    }

    pub fn start_pose(&self) -> CameraPose {
        self.start_pose
    }

    /// Snap the camera to the start pose without animation.
    pub fn snap_to_start(&mut self) {
        self.backend.jump_to(self.start_pose);
    }

    /// Animate the camera to `bearing`, keeping the rest of the current
    /// pose. Resolves once the host map has settled.
    pub fn fly_to_bearing(
        &mut self,
        bearing: f64,
        duration: Duration,
    ) -> LocalBoxFuture<'static, ()> {
        let mut pose = self.backend.current_pose();
        pose.bearing = bearing;
        self.backend.fly_to(pose, duration)
    }

    pub fn lock_interaction(&mut self) {
        self.backend.set_interaction_enabled(false);
    }

    pub fn unlock_interaction(&mut self) {
        self.backend.set_interaction_enabled(true);
    }

    pub fn backend_mut(&mut self) -> &mut dyn MapBackend {
        &mut *self.backend
    }
}
