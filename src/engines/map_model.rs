//! Alternate backend: render models through the host map's own model layer.
//!
//! Every model is registered as a native map model resource and drawn by one
//! map layer fed from one GeoJSON point source. Count changes mutate the
//! point sources in place; there is no layer rebuild. The host map renders
//! and meters itself, so this backend reports no live FPS and refuses
//! per-model isolated benchmarking.

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::Vector2;
use futures::future::LocalBoxFuture;
use serde_json::json;

use crate::engines::{EngineKind, Orientation, OrientationUpdate, RenderEngine};
use crate::error::{ViewerError, ViewerResult};
use crate::layout;
use crate::notify::ViewerChannels;
use crate::resources::{self, Stats};
use crate::surface::MapSurface;

fn model_layer_id(model_id: &str) -> String {
    format!("model-layer-{model_id}")
}

fn model_source_id(model_id: &str) -> String {
    format!("model-source-{model_id}")
}

fn feature_collection(points: &[Vector2<f64>]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = points
        .iter()
        .map(|point| {
            json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [point.x, point.y] },
                "properties": {}
            })
        })
        .collect();

    json!({ "type": "FeatureCollection", "features": features })
}

struct NativeModel {
    id: String,
    count: usize,
}

pub struct MapModelEngine {
    surface: Rc<RefCell<MapSurface>>,
    channels: ViewerChannels,
    models: Vec<NativeModel>,
    orientation: Orientation,
    elevation: f64,
    stats: Option<Stats>,
    attached: bool,
}

impl MapModelEngine {
    pub fn new(surface: Rc<RefCell<MapSurface>>, channels: ViewerChannels) -> Self {
        Self {
            surface,
            channels,
            models: Vec::new(),
            orientation: Orientation::default(),
            elevation: 0.0,
            stats: None,
            attached: false,
        }
    }

    fn report_warning(&self, message: String) {
        log::warn!("{message}");
        self.channels.warnings.publish(message);
    }

    /// Push the current grid into every model's point source, in place.
    fn sync_sources(&mut self) {
        let counts: Vec<usize> = self.models.iter().map(|model| model.count).collect();
        let slices = layout::layout_slices(&counts);

        let mut surface = self.surface.borrow_mut();
        let backend = surface.backend_mut();
        for (model, coords) in self.models.iter().zip(slices) {
            backend.set_source_data(&model_source_id(&model.id), feature_collection(&coords));
        }
    }

    fn apply_transforms(&mut self) {
        let rotation = [self.orientation.x, self.orientation.y, self.orientation.z];
        let mut surface = self.surface.borrow_mut();
        let backend = surface.backend_mut();
        for model in &self.models {
            backend.set_model_layer_transform(&model_layer_id(&model.id), rotation, self.elevation);
        }
    }
}

impl RenderEngine for MapModelEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::MapModel
    }

    fn add_models(
        &mut self,
        models: Vec<(String, Vec<u8>)>,
        image: Option<Vec<u8>>,
    ) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            if image.is_some() {
                let err = ViewerError::Unsupported {
                    operation: "texture replacement".to_string(),
                    engine: self.kind().name(),
                };
                log::error!("{err}");
                self.channels.load_failures.publish(err.to_string());
            }

            let single_model = models.len() == 1;

            for (id, bytes) in models {
                if self.models.iter().any(|model| model.id == id) {
                    self.report_warning(format!("model id \"{id}\" is already registered"));
                    continue;
                }

                {
                    let mut surface = self.surface.borrow_mut();
                    if let Err(err) = surface.backend_mut().add_model(&id, &bytes) {
                        log::error!("model \"{id}\" failed to load: {err}");
                        self.channels.load_failures.publish(err.to_string());
                        continue;
                    }
                }

                if single_model {
                    match resources::stats_from_bytes(&id, &bytes) {
                        Ok(stats) => {
                            self.stats = Some(stats.clone());
                            self.channels.stats.publish(stats);
                        }
                        Err(err) => {
                            self.report_warning(format!(
                                "stats unavailable for model \"{id}\": {err}"
                            ));
                        }
                    }
                }

                {
                    let source_id = model_source_id(&id);
                    let mut surface = self.surface.borrow_mut();
                    let backend = surface.backend_mut();
                    backend.add_source(&source_id, feature_collection(&[]));
                    backend.add_model_layer(&model_layer_id(&id), &id, &source_id);
                }

                self.models.push(NativeModel { id, count: 1 });
                self.attached = true;
            }

            self.sync_sources();
        })
    }

    fn remove_all(&mut self) {
        if !self.attached && self.models.is_empty() {
            return;
        }

        {
            let mut surface = self.surface.borrow_mut();
            let backend = surface.backend_mut();
            for model in &self.models {
                backend.remove_layer(&model_layer_id(&model.id));
                backend.remove_source(&model_source_id(&model.id));
                backend.remove_model(&model.id);
            }
        }

        self.models.clear();
        self.stats = None;
        self.attached = false;
    }

    fn set_instance_count(&mut self, model_id: &str, count: usize) {
        let Some(index) = self.models.iter().position(|model| model.id == model_id) else {
            self.report_warning(format!("model \"{model_id}\" is not registered"));
            return;
        };
        self.models[index].count = count;
        self.sync_sources();
    }

    fn set_orientation(&mut self, update: OrientationUpdate) {
        self.orientation.merge(update);
        self.apply_transforms();
    }

    fn set_elevation(&mut self, height: f64) {
        self.elevation = height;
        self.apply_transforms();
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn elevation(&self) -> f64 {
        self.elevation
    }

    fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|model| model.id.clone()).collect()
    }

    fn supports_isolated_benchmark(&self) -> bool {
        false
    }

    fn isolate_model(&mut self, _model_id: &str) -> LocalBoxFuture<'_, ViewerResult<()>> {
        let engine = self.kind().name();
        Box::pin(async move {
            Err(ViewerError::Unsupported {
                operation: "per-model isolated benchmarking".to_string(),
                engine,
            })
        })
    }

    fn end_isolation(&mut self) {}

    fn stats(&self) -> Option<Stats> {
        self.stats.clone()
    }

    fn attach_benchmark_fps(&mut self, fps: f64) -> Option<Stats> {
        let stats = self.stats.as_mut()?;
        stats.fps = Some(fps);
        Some(stats.clone())
    }
}
