//! Primary backend: decode models into scenegraphs and render them through
//! the host's WebGL overlay.
//!
//! Each registered model becomes one [`OverlayLayer`] carrying the decoded
//! scene and a packed per-instance transform table. Count, orientation and
//! elevation changes rebuild the whole layer collection from a freshly
//! generated grid; the host only ever sees complete layer sets.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cgmath::Vector2;
use futures::future::LocalBoxFuture;
use instant::Instant;

use crate::engines::{EngineKind, Orientation, OrientationUpdate, RenderEngine};
use crate::error::{ViewerError, ViewerResult};
use crate::layout;
use crate::notify::ViewerChannels;
use crate::resources::{self, ScenegraphAsset, texture};
use crate::surface::MapSurface;

/// Per-instance data handed to the host renderer, packed for direct upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    /// Map-coordinate offset plus elevation.
    position: [f32; 3],
    /// Rotation in degrees per axis.
    rotation: [f32; 3],
}

/// One model's renderable layer: the decoded scene plus its instance table.
///
/// The host calls [`OverlayLayer::mark_rendered`] when it first draws the
/// layer; the engine uses that to publish the load-to-first-render duration
/// exactly once per model, surviving layer rebuilds.
pub struct OverlayLayer {
    id: String,
    scene: Rc<ScenegraphAsset>,
    instances: Vec<InstanceRaw>,
    drawn: Cell<bool>,
    on_first_draw: Rc<dyn Fn()>,
}

impl OverlayLayer {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scene(&self) -> &ScenegraphAsset {
        &self.scene
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Raw instance attribute table for upload.
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }

    /// Notify the engine that this layer produced its first frame.
    pub fn mark_rendered(&self) {
        if !self.drawn.replace(true) {
            (self.on_first_draw)();
        }
    }
}

struct ModelEntry {
    id: String,
    asset: Rc<ScenegraphAsset>,
    count: usize,
    load_started: Instant,
    // Shared with every layer built for this model so the duration fires
    // once even across rebuilds.
    duration_reported: Rc<Cell<bool>>,
}

pub struct ScenegraphEngine {
    surface: Rc<RefCell<MapSurface>>,
    channels: ViewerChannels,
    models: Vec<ModelEntry>,
    orientation: Orientation,
    elevation: f64,
    single_model: bool,
    stats: Option<resources::Stats>,
    isolated: Option<String>,
    attached: bool,
}

impl ScenegraphEngine {
    pub fn new(surface: Rc<RefCell<MapSurface>>, channels: ViewerChannels) -> Self {
        Self {
            surface,
            channels,
            models: Vec::new(),
            orientation: Orientation::default(),
            elevation: 0.0,
            single_model: true,
            stats: None,
            isolated: None,
            attached: false,
        }
    }

    fn report_warning(&self, message: String) {
        log::warn!("{message}");
        self.channels.warnings.publish(message);
    }

    fn build_layer(&self, entry: &ModelEntry, coords: Vec<Vector2<f64>>) -> OverlayLayer {
        let instances = coords
            .iter()
            .map(|coord| InstanceRaw {
                position: [coord.x as f32, coord.y as f32, self.elevation as f32],
                rotation: [
                    self.orientation.x as f32,
                    self.orientation.y as f32,
                    self.orientation.z as f32,
                ],
            })
            .collect();

        let reported = entry.duration_reported.clone();
        let channel = self.channels.scene_rendered.clone();
        let load_started = entry.load_started;

        OverlayLayer {
            id: entry.id.clone(),
            scene: entry.asset.clone(),
            instances,
            drawn: Cell::new(false),
            on_first_draw: Rc::new(move || {
                if !reported.replace(true) {
                    channel.publish(load_started.elapsed().as_secs_f64());
                }
            }),
        }
    }

    /// Regenerate the grid for the live model set and hand the host a fresh
    /// layer collection.
    fn rebuild_layers(&mut self) {
        let live: Vec<&ModelEntry> = match &self.isolated {
            Some(isolated_id) => self
                .models
                .iter()
                .filter(|entry| &entry.id == isolated_id)
                .collect(),
            None => self.models.iter().collect(),
        };

        let counts: Vec<usize> = live.iter().map(|entry| entry.count).collect();
        let slices = layout::layout_slices(&counts);

        let layers: Vec<OverlayLayer> = live
            .into_iter()
            .zip(slices)
            .map(|(entry, coords)| self.build_layer(entry, coords))
            .collect();

        self.surface
            .borrow_mut()
            .backend_mut()
            .set_overlay_layers(layers);
        self.attached = true;
    }
}

impl RenderEngine for ScenegraphEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Scenegraph
    }

    fn add_models(
        &mut self,
        models: Vec<(String, Vec<u8>)>,
        image: Option<Vec<u8>>,
    ) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            self.single_model = models.len() == 1;

            for (id, bytes) in models {
                if self.models.iter().any(|entry| entry.id == id) {
                    self.report_warning(format!("model id \"{id}\" is already registered"));
                    continue;
                }

                let load_started = Instant::now();
                let mut asset = match resources::load_scene(&bytes).await {
                    Ok(asset) => asset,
                    Err(err) => {
                        log::error!("model \"{id}\" failed to load: {err}");
                        self.channels.load_failures.publish(err.to_string());
                        continue;
                    }
                };

                if let Some(image_bytes) = image.as_deref() {
                    match texture::replace_placeholder_texture(&mut asset, &id, image_bytes) {
                        Ok(()) => {}
                        Err(err @ ViewerError::MissingTextureSlot(_)) => {
                            self.report_warning(err.to_string());
                        }
                        Err(err) => {
                            self.channels.load_failures.publish(err.to_string());
                        }
                    }
                }

                for warning in asset.take_warnings() {
                    self.report_warning(warning);
                }

                if self.single_model {
                    let stats = resources::stats_for(&id, &asset);
                    self.stats = Some(stats.clone());
                    self.channels.stats.publish(stats);
                }

                self.models.push(ModelEntry {
                    id,
                    asset: Rc::new(asset),
                    count: 1,
                    load_started,
                    duration_reported: Rc::new(Cell::new(false)),
                });
            }

            self.rebuild_layers();
        })
    }

    fn remove_all(&mut self) {
        if !self.attached && self.models.is_empty() {
            return;
        }

        if self.attached {
            self.surface.borrow_mut().backend_mut().remove_overlay();
            self.attached = false;
        }

        self.models.clear();
        self.stats = None;
        self.isolated = None;
        self.single_model = true;
    }

    fn set_instance_count(&mut self, model_id: &str, count: usize) {
        let Some(index) = self.models.iter().position(|entry| entry.id == model_id) else {
            self.report_warning(format!("model \"{model_id}\" is not registered"));
            return;
        };
        self.models[index].count = count;
        self.rebuild_layers();
    }

    fn set_orientation(&mut self, update: OrientationUpdate) {
        self.orientation.merge(update);
        if !self.models.is_empty() {
            self.rebuild_layers();
        }
    }

    fn set_elevation(&mut self, height: f64) {
        self.elevation = height;
        if !self.models.is_empty() {
            self.rebuild_layers();
        }
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn elevation(&self) -> f64 {
        self.elevation
    }

    fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|entry| entry.id.clone()).collect()
    }

    fn supports_isolated_benchmark(&self) -> bool {
        true
    }

    fn isolate_model(&mut self, model_id: &str) -> LocalBoxFuture<'_, ViewerResult<()>> {
        let model_id = model_id.to_string();
        Box::pin(async move {
            if !self.models.iter().any(|entry| entry.id == model_id) {
                return Err(ViewerError::AssetLoad(format!(
                    "model \"{model_id}\" is not registered"
                )));
            }

            self.surface.borrow_mut().backend_mut().remove_overlay();
            self.isolated = Some(model_id);
            self.rebuild_layers();
            Ok(())
        })
    }

    fn end_isolation(&mut self) {
        if self.isolated.take().is_some() {
            self.rebuild_layers();
        }
    }

    fn stats(&self) -> Option<resources::Stats> {
        self.stats.clone()
    }

    fn attach_benchmark_fps(&mut self, fps: f64) -> Option<resources::Stats> {
        let stats = self.stats.as_mut()?;
        stats.fps = Some(fps);
        Some(stats.clone())
    }
}
