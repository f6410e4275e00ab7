//! Benchmark orchestration: the scripted camera sweep, FPS sampling and the
//! per-model isolation loop.
//!
//! A benchmark run is a full 360 degree bearing rotation in 10 degree
//! increments. Every increment is an animated camera transition; the next
//! one is only issued once the host map reports the previous transition
//! settled. While the sweep runs, every animation-frame tick records one
//! sample: the number of frames rendered in the trailing one-second window.
//! The arithmetic mean of all samples is the run's single result.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use instant::{Duration, Instant};

use crate::engines::RenderEngine;
use crate::error::{ViewerError, ViewerResult};
use crate::notify::ViewerChannels;
use crate::surface::MapSurface;

/// Bearing increment per sweep step, degrees.
pub const SWEEP_STEP_DEG: f64 = 10.0;

/// Animation duration of one sweep step.
pub const SWEEP_STEP_DURATION: Duration = Duration::from_millis(300);

const SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Trailing one-second frame counter.
///
/// [`FpsWindow::on_frame`] must be called once per rendered frame with a
/// monotonically non-decreasing timestamp. Samples are only retained between
/// [`FpsWindow::start`] and [`FpsWindow::finish`]; outside a run the window
/// ring is maintained but nothing is buffered.
pub struct FpsWindow {
    frames: VecDeque<Instant>,
    recording: bool,
    samples: Vec<usize>,
}

impl FpsWindow {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            recording: false,
            samples: Vec::new(),
        }
    }

    pub fn on_frame(&mut self, now: Instant) {
        while self
            .frames
            .front()
            .is_some_and(|&frame| now.duration_since(frame) >= SAMPLE_WINDOW)
        {
            self.frames.pop_front();
        }
        self.frames.push_back(now);

        if self.recording {
            self.samples.push(self.frames.len());
        }
    }

    pub fn start(&mut self) {
        self.samples.clear();
        self.recording = true;
    }

    /// Stop recording and return the mean of the collected samples. An
    /// empty run yields 0.0.
    pub fn finish(&mut self) -> f64 {
        self.recording = false;
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: usize = self.samples.iter().sum();
        sum as f64 / self.samples.len() as f64
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn samples(&self) -> &[usize] {
        &self.samples
    }
}

impl Default for FpsWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle the host invokes on every animation-frame tick. Cheap to clone;
/// wired to the renderer's frame-metrics callback (or the host's equivalent
/// of an animation-frame loop).
#[derive(Clone)]
pub struct FrameDriver {
    sampler: Rc<RefCell<FpsWindow>>,
}

impl FrameDriver {
    pub fn on_frame(&self) {
        self.on_frame_at(Instant::now());
    }

    pub fn on_frame_at(&self, now: Instant) {
        self.sampler.borrow_mut().on_frame(now);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BenchmarkMode {
    WholeScene,
    PerModelIsolated,
}

/// Transient state of an in-flight benchmark.
#[derive(Clone, Debug)]
pub struct BenchmarkSession {
    pub mode: BenchmarkMode,
    pub per_model: HashMap<String, f64>,
}

/// Caller-facing benchmark inputs.
#[derive(Clone, Copy, Debug)]
pub struct BenchmarkSettings {
    /// Run one isolated sweep per registered model instead of a single
    /// whole-scene sweep.
    pub single_model_mode: bool,
    /// Instance count applied to each model in isolated mode. Whole-scene
    /// mode ignores this in favor of the externally set counts.
    pub per_model_instance_count: usize,
}

#[derive(Clone, Debug, Default)]
pub struct BenchmarkReport {
    /// Whole-scene mean FPS. Absent in isolated mode or when the run was
    /// cut short by a model-set reset.
    pub overall: Option<f64>,
    /// Mean FPS keyed by model id, isolated mode only.
    pub per_model: HashMap<String, f64>,
}

pub struct Benchmarker {
    surface: Rc<RefCell<MapSurface>>,
    channels: ViewerChannels,
    sampler: Rc<RefCell<FpsWindow>>,
    phase: Cell<Phase>,
    session: RefCell<Option<BenchmarkSession>>,
    // Bumped by every model-set reset; an in-flight run that observes a
    // bump stops issuing camera steps and discards its result.
    epoch: Rc<Cell<u64>>,
}

impl Benchmarker {
    pub fn new(
        surface: Rc<RefCell<MapSurface>>,
        channels: ViewerChannels,
        epoch: Rc<Cell<u64>>,
    ) -> Self {
        Self {
            surface,
            channels,
            sampler: Rc::new(RefCell::new(FpsWindow::new())),
            phase: Cell::new(Phase::Idle),
            session: RefCell::new(None),
            epoch,
        }
    }

    pub fn frame_driver(&self) -> FrameDriver {
        FrameDriver {
            sampler: self.sampler.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn session(&self) -> Option<BenchmarkSession> {
        self.session.borrow().clone()
    }

    pub fn clear_session(&self) {
        *self.session.borrow_mut() = None;
    }

    /// One whole-scene sweep. Returns the mean FPS, or `None` when a reset
    /// interrupted the run or another run is already in flight.
    pub async fn run_whole_scene(&self) -> Option<f64> {
        if self.phase.get() == Phase::Running {
            log::warn!("a benchmark is already running");
            return None;
        }

        self.phase.set(Phase::Running);
        *self.session.borrow_mut() = Some(BenchmarkSession {
            mode: BenchmarkMode::WholeScene,
            per_model: HashMap::new(),
        });

        let result = self.sweep().await;

        self.phase.set(Phase::Idle);
        *self.session.borrow_mut() = None;
        result
    }

    /// One isolated sweep per registered model, strictly serial. A model
    /// that fails to isolate is skipped; a reset mid-loop ends the run with
    /// the results gathered so far.
    pub async fn run_per_model(
        &self,
        engine: &mut dyn RenderEngine,
        instance_count: usize,
    ) -> ViewerResult<HashMap<String, f64>> {
        if !engine.supports_isolated_benchmark() {
            return Err(ViewerError::Unsupported {
                operation: "per-model isolated benchmarking".to_string(),
                engine: engine.kind().name(),
            });
        }

        if self.phase.get() == Phase::Running {
            log::warn!("a benchmark is already running");
            return Ok(HashMap::new());
        }

        self.phase.set(Phase::Running);
        *self.session.borrow_mut() = Some(BenchmarkSession {
            mode: BenchmarkMode::PerModelIsolated,
            per_model: HashMap::new(),
        });

        let epoch = self.epoch.get();
        let mut results = HashMap::new();

        for model_id in engine.model_ids() {
            if self.epoch.get() != epoch {
                break;
            }

            if let Err(err) = engine.isolate_model(&model_id).await {
                log::error!("skipping model \"{model_id}\": {err}");
                self.channels.load_failures.publish(err.to_string());
                continue;
            }
            engine.set_instance_count(&model_id, instance_count);

            match self.sweep().await {
                Some(mean) => {
                    results.insert(model_id.clone(), mean);
                    if let Some(session) = self.session.borrow_mut().as_mut() {
                        session.per_model.insert(model_id, mean);
                    }
                }
                None => break,
            }
        }

        self.phase.set(Phase::Idle);
        *self.session.borrow_mut() = None;
        Ok(results)
    }

    /// The scripted sweep: lock interaction, snap to the start pose, rotate
    /// the bearing 0..=360 in fixed increments, one settled transition at a
    /// time, then publish the mean. Returns `None` when a reset interrupted
    /// the sweep; the camera still settles and interaction is re-enabled.
    async fn sweep(&self) -> Option<f64> {
        let epoch = self.epoch.get();

        {
            let mut surface = self.surface.borrow_mut();
            surface.lock_interaction();
            surface.snap_to_start();
        }
        self.channels.testing.publish(true);
        self.sampler.borrow_mut().start();

        let mut bearing = 0.0;
        while bearing < 361.0 {
            let transition = self
                .surface
                .borrow_mut()
                .fly_to_bearing(bearing, SWEEP_STEP_DURATION);
            transition.await;

            if self.epoch.get() != epoch {
                break;
            }
            bearing += SWEEP_STEP_DEG;
        }

        let mean = self.sampler.borrow_mut().finish();
        self.channels.testing.publish(false);
        self.surface.borrow_mut().unlock_interaction();

        if self.epoch.get() != epoch {
            return None;
        }

        self.channels.testing_result.publish(mean);
        Some(mean)
    }
}
