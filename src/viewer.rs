//! The viewer facade: composes the map surface, the notification channels,
//! the engine slot and the benchmarker, and exposes the public operation
//! set.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::bench::{BenchmarkReport, BenchmarkSettings, Benchmarker, FrameDriver};
use crate::engines::map_model::MapModelEngine;
use crate::engines::scenegraph::ScenegraphEngine;
use crate::engines::{EngineKind, EngineState, Orientation, OrientationUpdate, RenderEngine};
use crate::error::{ViewerError, ViewerResult};
use crate::notify::ViewerChannels;
use crate::surface::{MapBackend, MapSurface};

/// Construction parameters. The access token and the host map binding are
/// required; channels may be handed in to bridge an existing observer
/// graph.
#[derive(Default)]
pub struct ViewerOptions {
    pub access_token: Option<String>,
    pub map: Option<Box<dyn MapBackend>>,
    pub channels: Option<ViewerChannels>,
}

pub struct Viewer {
    surface: Rc<RefCell<MapSurface>>,
    channels: ViewerChannels,
    engine: Option<Box<dyn RenderEngine>>,
    bench: Benchmarker,
    epoch: Rc<Cell<u64>>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("engine", &self.engine.as_ref().map(|e| e.kind()))
            .finish_non_exhaustive()
    }
}

impl Viewer {
    /// Missing required options are fatal here; everything that can go
    /// wrong later surfaces through the notification channels instead.
    pub fn new(options: ViewerOptions) -> ViewerResult<Self> {
        let access_token = options.access_token.ok_or_else(|| {
            ViewerError::Configuration("map access token needs to be present".to_string())
        })?;
        let backend = options.map.ok_or_else(|| {
            ViewerError::Configuration("map backend needs to be present".to_string())
        })?;

        #[cfg(not(target_arch = "wasm32"))]
        let _ = env_logger::try_init();

        let channels = options.channels.unwrap_or_default();
        let surface = Rc::new(RefCell::new(MapSurface::new(backend, access_token)));
        let epoch = Rc::new(Cell::new(0));
        let bench = Benchmarker::new(surface.clone(), channels.clone(), epoch.clone());

        Ok(Self {
            surface,
            channels,
            engine: None,
            bench,
            epoch,
        })
    }

    pub fn channels(&self) -> &ViewerChannels {
        &self.channels
    }

    pub fn engine_state(&self) -> EngineState {
        match self.engine.as_deref().map(|engine| engine.kind()) {
            None => EngineState::Uninitialized,
            Some(EngineKind::Scenegraph) => EngineState::ScenegraphActive,
            Some(EngineKind::MapModel) => EngineState::MapModelActive,
        }
    }

    /// Select the rendering backend for this model set. Any previous
    /// engine's layers are released first.
    pub fn set_engine(&mut self, kind: EngineKind) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.remove_all();
        }

        self.engine = Some(match kind {
            EngineKind::Scenegraph => Box::new(ScenegraphEngine::new(
                self.surface.clone(),
                self.channels.clone(),
            )),
            EngineKind::MapModel => Box::new(MapModelEngine::new(
                self.surface.clone(),
                self.channels.clone(),
            )),
        });
    }

    /// Load models into the active engine. See
    /// [`RenderEngine::add_models`] for the per-model failure semantics.
    pub async fn add_models(&mut self, models: Vec<(String, Vec<u8>)>, image: Option<Vec<u8>>) {
        match self.engine.as_deref_mut() {
            Some(engine) => engine.add_models(models, image).await,
            None => log::warn!("no engine selected; call set_engine before adding models"),
        }
    }

    /// Reset the model set: tear down the engine's layers, close out the
    /// replay histories and end any in-flight benchmark loop.
    pub fn remove_models(&mut self) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.remove_all();
        }
        self.channels.reset_replay();
        self.epoch.set(self.epoch.get() + 1);
        self.bench.clear_session();
    }

    pub fn set_model_amount(&mut self, model_id: &str, amount: usize) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.set_instance_count(model_id, amount);
        }
    }

    pub fn set_model_orientation(&mut self, update: OrientationUpdate) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.set_orientation(update);
        }
    }

    pub fn set_model_elevation(&mut self, height: f64) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.set_elevation(height);
        }
    }

    pub fn model_orientation(&self) -> Option<Orientation> {
        self.engine.as_deref().map(|engine| engine.orientation())
    }

    /// Zoom level of the canonical start pose used by every sweep.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.surface.borrow_mut().set_zoom(zoom);
    }

    /// Handle for the host's animation-frame loop; see
    /// [`FrameDriver::on_frame`].
    pub fn frame_driver(&self) -> FrameDriver {
        self.bench.frame_driver()
    }

    /// Run a benchmark with the active engine.
    ///
    /// Whole-scene mode sweeps once over the currently placed models and
    /// attaches the resulting mean FPS to the recorded single-model stats.
    /// Single-model mode runs one isolated sweep per registered model and
    /// fails fast when the engine cannot isolate models.
    pub async fn run_benchmark(
        &mut self,
        settings: BenchmarkSettings,
    ) -> ViewerResult<BenchmarkReport> {
        let engine = self.engine.as_deref_mut().ok_or_else(|| {
            ViewerError::Configuration("an engine must be selected before benchmarking".to_string())
        })?;

        if settings.single_model_mode {
            let per_model = self
                .bench
                .run_per_model(engine, settings.per_model_instance_count)
                .await?;
            engine.end_isolation();
            Ok(BenchmarkReport {
                overall: None,
                per_model,
            })
        } else {
            let overall = self.bench.run_whole_scene().await;
            if let Some(fps) = overall {
                if let Some(stats) = engine.attach_benchmark_fps(fps) {
                    self.channels.stats.publish(stats);
                }
            }
            Ok(BenchmarkReport {
                overall,
                per_model: HashMap::new(),
            })
        }
    }
}
