//! Shared fixtures: a scripted inference runtime and label files.

#![allow(dead_code, clippy::unwrap_used)]

use image::DynamicImage;
use plantid::gate::GateConfig;
use plantid::inference::{InferenceRuntime, ModelSource, RawOutput, Tensor};
use plantid::labels::LabelFormat;
use plantid::pipeline::{ModelAsset, Orchestrator, PipelineAssets};
use plantid::preprocess::{InputSpec, Normalization};
use plantid::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use tempfile::TempDir;
use tokio::sync::mpsc as async_mpsc;

/// Gate output accepted as "daisy" at 0.6.
pub const PLANT: [f32; 3] = [0.6, 0.3, 0.1];
/// Gate output whose best guess is "rock".
pub const NOT_PLANT: [f32; 3] = [0.05, 0.9, 0.05];
/// Species output whose best guess is "Rosa canina".
pub const ROSE: [f32; 3] = [0.1, 0.7, 0.2];

/// Model loaded by [`FakeRuntime`].
#[derive(Debug)]
pub struct FakeModel {
    pub name: String,
    pub output_len: usize,
}

/// Runtime whose outputs are scripted per model name.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<FakeState>,
}

#[derive(Default)]
struct FakeState {
    output_len: usize,
    outputs: Mutex<HashMap<String, VecDeque<Vec<f32>>>>,
    failing_loads: Mutex<HashSet<String>>,
    loads: AtomicUsize,
    paused: Mutex<Option<mpsc::Receiver<()>>>,
    runs: Mutex<Option<async_mpsc::UnboundedSender<String>>>,
    finished: Mutex<Option<async_mpsc::UnboundedSender<String>>>,
}

impl FakeRuntime {
    pub fn new(output_len: usize) -> Self {
        Self {
            state: Arc::new(FakeState {
                output_len,
                ..FakeState::default()
            }),
        }
    }

    /// Queue the output of the next run of `model`.
    pub fn push_output(&self, model: &str, values: &[f32]) {
        self.state
            .outputs
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(values.to_vec());
    }

    pub fn fail_load(&self, model: &str) {
        self.state
            .failing_loads
            .lock()
            .unwrap()
            .insert(model.to_string());
    }

    pub fn allow_load(&self, model: &str) {
        self.state.failing_loads.lock().unwrap().remove(model);
    }

    /// Number of model loads attempted.
    pub fn loads(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    /// Block the next run until the returned sender fires or is dropped.
    pub fn pause_next_run(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.state.paused.lock().unwrap() = Some(rx);
        tx
    }

    /// Receive the model name of every run as it starts.
    pub fn watch_runs(&self) -> async_mpsc::UnboundedReceiver<String> {
        let (tx, rx) = async_mpsc::unbounded_channel();
        *self.state.runs.lock().unwrap() = Some(tx);
        rx
    }

    /// Receive the model name of every run as it returns.
    pub fn watch_finished(&self) -> async_mpsc::UnboundedReceiver<String> {
        let (tx, rx) = async_mpsc::unbounded_channel();
        *self.state.finished.lock().unwrap() = Some(tx);
        rx
    }
}

impl InferenceRuntime for FakeRuntime {
    type Handle = FakeModel;

    fn load(&self, source: &ModelSource) -> impl Future<Output = Result<FakeModel>> + Send {
        let state = Arc::clone(&self.state);
        let name = source.name.clone();
        async move {
            state.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if state.failing_loads.lock().unwrap().contains(&name) {
                return Err(Error::AssetLoad {
                    asset: format!("{name} model"),
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(FakeModel {
                name,
                output_len: state.output_len,
            })
        }
    }

    fn output_len(&self, handle: &FakeModel) -> Option<usize> {
        Some(handle.output_len)
    }

    fn run(&self, handle: &FakeModel, _tensor: Tensor) -> Result<RawOutput> {
        let paused = self.state.paused.lock().unwrap().take();
        if let Some(runs) = self.state.runs.lock().unwrap().as_ref() {
            let _ = runs.send(handle.name.clone());
        }
        if let Some(paused) = paused {
            let _ = paused.recv();
        }

        let output = self
            .state
            .outputs
            .lock()
            .unwrap()
            .get_mut(&handle.name)
            .and_then(VecDeque::pop_front)
            .map(RawOutput)
            .ok_or_else(|| Error::Inference {
                reason: format!("no scripted output for {}", handle.name),
            });

        if let Some(finished) = self.state.finished.lock().unwrap().as_ref() {
            let _ = finished.send(handle.name.clone());
        }
        output
    }
}

/// Label files for a three-class gate and a three-class species model.
pub fn write_labels(dir: &Path) {
    std::fs::write(dir.join("gate.txt"), "daisy\nrock\nvase\n").unwrap();
    std::fs::write(
        dir.join("species.csv"),
        "id,name\n0,Bellis perennis\n1,Rosa canina\n2,\"Quercus robur, pedunculate oak\"\n",
    )
    .unwrap();
}

fn asset(dir: &Path, name: &str, labels: &str, format: LabelFormat, top_k: usize) -> ModelAsset {
    ModelAsset {
        source: ModelSource {
            name: name.to_string(),
            path: dir.join(format!("{name}.onnx")),
            input: InputSpec {
                size: 4,
                normalization: Normalization::Unit,
            },
        },
        labels: dir.join(labels),
        label_format: format,
        top_k,
    }
}

pub fn assets(dir: &Path) -> PipelineAssets {
    PipelineAssets {
        gate: asset(dir, "gate", "gate.txt", LabelFormat::Lines, 3),
        species: asset(dir, "species", "species.csv", LabelFormat::Csv, 2),
    }
}

pub fn gate_config() -> GateConfig {
    GateConfig::new(["daisy", "rose"], ["coral"], 0.18, 0.12)
}

/// Orchestrator over `runtime` with label files in a fresh temp dir.
pub fn orchestrator(runtime: &FakeRuntime) -> (Orchestrator<FakeRuntime>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    write_labels(dir.path());
    let orchestrator = Orchestrator::new(runtime.clone(), assets(dir.path()), gate_config());
    (orchestrator, dir)
}

/// Initialized orchestrator over `runtime`.
pub async fn ready(runtime: &FakeRuntime) -> (Orchestrator<FakeRuntime>, TempDir) {
    let (orchestrator, dir) = orchestrator(runtime);
    orchestrator.initialize().await.unwrap();
    (orchestrator, dir)
}

pub fn photo() -> DynamicImage {
    DynamicImage::new_rgb8(8, 6)
}
