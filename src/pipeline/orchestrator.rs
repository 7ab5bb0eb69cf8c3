//! Two-stage classification state machine.
//!
//! Each submitted photo gets a session id and a spawned task that drives it
//! through preprocessing, gate inference, the gate decision and (when
//! accepted or bypassed) species inference. Only the most recent session is
//! current. Every state change and event delivery checks the session id
//! under the slot lock, so results from a superseded or cancelled session
//! are dropped instead of reaching the caller.

use super::session::{
    ActiveSession, ClassificationSession, GateChoice, Phase, SessionEvent, SessionHandle,
    SessionId,
};
use crate::config::{ModelConfig, ModelsConfig};
use crate::error::{Error, Result};
use crate::gate::{self, GateConfig};
use crate::inference::{
    InferenceRuntime, ModelSource, PredictionSet, Tensor, interpret, rank,
};
use crate::labels::{LabelFormat, LabelSet, load_labels};
use crate::preprocess::{InputSpec, preprocess};
use image::{DynamicImage, GenericImageView};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OnceCell, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Model file, labels and ranking settings for one pipeline stage.
#[derive(Debug, Clone)]
pub struct ModelAsset {
    /// Model file and input contract.
    pub source: ModelSource,
    /// Labels file.
    pub labels: PathBuf,
    /// Layout of the labels file.
    pub label_format: LabelFormat,
    /// Number of ranked predictions to keep.
    pub top_k: usize,
}

impl ModelAsset {
    /// Build an asset description from its config section.
    pub fn from_config(name: &str, config: &ModelConfig) -> Self {
        Self {
            source: ModelSource {
                name: name.to_string(),
                path: config.path.clone(),
                input: InputSpec {
                    size: config.input_size,
                    normalization: config.normalization,
                },
            },
            labels: config.labels.clone(),
            label_format: config.label_format,
            top_k: config.top_k,
        }
    }
}

/// Assets for both stages.
#[derive(Debug, Clone)]
pub struct PipelineAssets {
    /// Plant-likeness gate.
    pub gate: ModelAsset,
    /// Species classifier.
    pub species: ModelAsset,
}

impl PipelineAssets {
    /// Build both asset descriptions from the `[models]` config section.
    pub fn from_config(models: &ModelsConfig) -> Self {
        Self {
            gate: ModelAsset::from_config("gate", &models.gate),
            species: ModelAsset::from_config("species", &models.species),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Gate,
    Species,
}

struct LoadedModel<H> {
    handle: H,
    labels: LabelSet,
    input: InputSpec,
    top_k: usize,
}

struct LoadedModels<H> {
    gate: LoadedModel<H>,
    species: LoadedModel<H>,
}

impl<H> LoadedModels<H> {
    fn get(&self, stage: Stage) -> &LoadedModel<H> {
        match stage {
            Stage::Gate => &self.gate,
            Stage::Species => &self.species,
        }
    }
}

/// Why a session task stopped early.
enum Halt {
    /// The session is no longer current.
    Stale,
    /// The session failed.
    Failed(Error),
}

impl From<Error> for Halt {
    fn from(error: Error) -> Self {
        Self::Failed(error)
    }
}

type Step<T> = std::result::Result<T, Halt>;

/// Coordinates the gate and species models over a stream of photos.
///
/// Cheap to clone; clones share models and the current session.
pub struct Orchestrator<R: InferenceRuntime> {
    inner: Arc<Inner<R>>,
}

impl<R: InferenceRuntime> Clone for Orchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<R: InferenceRuntime> {
    runtime: Arc<R>,
    assets: PipelineAssets,
    gate: GateConfig,
    models: OnceCell<Arc<LoadedModels<R::Handle>>>,
    current: Mutex<Option<ActiveSession>>,
    next_id: AtomicU64,
}

impl<R: InferenceRuntime> Orchestrator<R> {
    /// Create an orchestrator. No assets are loaded until [`initialize`](Self::initialize).
    pub fn new(runtime: R, assets: PipelineAssets, gate: GateConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime: Arc::new(runtime),
                assets,
                gate,
                models: OnceCell::new(),
                current: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Load both models and their labels concurrently.
    ///
    /// Idempotent: once loading has succeeded later calls return immediately,
    /// and concurrent callers share one load. A failed load leaves nothing
    /// behind, so the call can be retried.
    ///
    /// # Errors
    ///
    /// Returns an asset-load error when a model or labels file cannot be
    /// read or parsed.
    pub async fn initialize(&self) -> Result<()> {
        self.inner
            .models
            .get_or_try_init(|| self.inner.load_models())
            .await?;
        Ok(())
    }

    /// Whether both models are loaded.
    pub fn is_initialized(&self) -> bool {
        self.inner.models.initialized()
    }

    /// Start a new session for a decoded photo.
    ///
    /// Any in-flight session is superseded: its remaining results are
    /// discarded and its event stream closes. The new session starts at
    /// [`Phase::Idle`] with bypass cleared.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotLoaded`] before [`initialize`](Self::initialize)
    /// has succeeded and [`Error::ImageNotReady`] for an image without pixels.
    pub fn submit_photo(&self, image: DynamicImage) -> Result<SessionHandle> {
        let models = self
            .inner
            .models
            .get()
            .cloned()
            .ok_or_else(|| Error::ModelNotLoaded {
                model: "gate".to_string(),
            })?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::ImageNotReady { width, height });
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Internal {
            message: format!("submit_photo called outside an async runtime: {e}"),
        })?;

        let id = SessionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (events, receiver) = mpsc::unbounded_channel();

        let previous = self
            .inner
            .lock_current()
            .replace(ActiveSession::new(id, width, height, events));
        if let Some(previous) = previous
            && !previous.state.phase.is_terminal()
        {
            info!(
                "Session {} superseded by {id} while {}",
                previous.state.id, previous.state.phase
            );
        }

        info!("Session {id}: classifying {width}x{height} photo");
        runtime.spawn(Arc::clone(&self.inner).run_session(models, id, Arc::new(image)));

        Ok(SessionHandle {
            id,
            events: receiver,
        })
    }

    /// Answer a gate rejection for the current session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotActive`] when `session` is not current and
    /// [`Error::InvalidTransition`] when it is not waiting for a choice.
    pub fn resolve_gate_rejection(&self, session: SessionId, choice: GateChoice) -> Result<()> {
        let mut slot = self.inner.lock_current();
        let active = slot
            .as_mut()
            .filter(|active| active.state.id == session)
            .ok_or(Error::SessionNotActive { session })?;

        let phase = active.state.phase;
        let sender = match active.choice.take() {
            Some(sender) if phase == Phase::AwaitingUserChoice => sender,
            _ => return Err(Error::InvalidTransition { session, phase }),
        };

        debug!("Session {session}: user chose {choice:?}");
        sender.send(choice).map_err(|_| Error::Internal {
            message: format!("session {session} task is no longer running"),
        })
    }

    /// Drop the current session, whatever phase it is in.
    ///
    /// Its event stream closes without a further event.
    pub fn cancel(&self) {
        if let Some(active) = self.inner.lock_current().take()
            && !active.state.phase.is_terminal()
        {
            info!("Session {} cancelled while {}", active.state.id, active.state.phase);
        }
    }

    /// Snapshot of the current session, if any.
    pub fn current_session(&self) -> Option<ClassificationSession> {
        self.inner
            .lock_current()
            .as_ref()
            .map(|active| active.state.clone())
    }
}

impl<R: InferenceRuntime> Inner<R> {
    fn lock_current(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the session if it is still current.
    fn with_current<T>(&self, id: SessionId, f: impl FnOnce(&mut ActiveSession) -> T) -> Step<T> {
        match self.lock_current().as_mut() {
            Some(active) if active.state.id == id => Ok(f(active)),
            _ => Err(Halt::Stale),
        }
    }

    fn advance(&self, id: SessionId, phase: Phase) -> Step<()> {
        self.with_current(id, |active| {
            debug!("Session {id}: {} -> {phase}", active.state.phase);
            active.state.phase = phase;
        })
    }

    async fn load_models(&self) -> Result<Arc<LoadedModels<R::Handle>>> {
        info!("Loading gate and species models");
        let (gate, species) = tokio::try_join!(
            self.load_model(&self.assets.gate),
            self.load_model(&self.assets.species)
        )?;
        info!(
            "Models ready: gate ({} labels), species ({} labels)",
            gate.labels.len(),
            species.labels.len()
        );
        Ok(Arc::new(LoadedModels { gate, species }))
    }

    async fn load_model(&self, asset: &ModelAsset) -> Result<LoadedModel<R::Handle>> {
        let (handle, labels) = tokio::try_join!(
            self.runtime.load(&asset.source),
            load_labels(&asset.labels, asset.label_format)
        )?;

        let output_len = self.runtime.output_len(&handle);
        if output_len.is_none() {
            warn!(
                "{} model does not report its output width; labels are used unshifted",
                asset.source.name
            );
        }

        Ok(LoadedModel {
            handle,
            labels: LabelSet::aligned(labels, output_len),
            input: asset.source.input,
            top_k: asset.top_k,
        })
    }

    async fn run_session(
        self: Arc<Self>,
        models: Arc<LoadedModels<R::Handle>>,
        id: SessionId,
        image: Arc<DynamicImage>,
    ) {
        match self.drive(&models, id, &image).await {
            Ok(()) => {}
            Err(Halt::Stale) => debug!("Session {id}: no longer current, result discarded"),
            Err(Halt::Failed(error)) => self.fail(id, error),
        }
    }

    async fn drive(
        &self,
        models: &Arc<LoadedModels<R::Handle>>,
        id: SessionId,
        image: &Arc<DynamicImage>,
    ) -> Step<()> {
        self.advance(id, Phase::Preprocessing)?;
        let tensor = self.prepare(models, Stage::Gate, image).await?;
        self.advance(id, Phase::GateInference)?;
        let predictions = self.infer(models, Stage::Gate, tensor).await?;

        let decision = gate::decide(&predictions, &self.gate);
        let accepted = decision.accepted;
        self.with_current(id, |active| {
            active.state.phase = Phase::GateEvaluated;
            active.state.gate_predictions = Some(predictions.clone());
            active.state.decision = Some(decision.clone());
            active.send(SessionEvent::GateEvaluated {
                predictions,
                decision,
            });
        })?;

        if accepted {
            info!("Session {id}: gate accepted photo");
        } else {
            info!("Session {id}: gate rejected photo, waiting for user choice");
            let (sender, receiver) = oneshot::channel();
            self.with_current(id, |active| {
                active.state.phase = Phase::AwaitingUserChoice;
                active.choice = Some(sender);
                active.send(SessionEvent::AwaitingUserChoice);
            })?;

            // A dropped sender means the session was superseded or cancelled.
            match receiver.await.map_err(|_| Halt::Stale)? {
                GateChoice::Cancel => {
                    return self.finish_cancelled(id);
                }
                GateChoice::Bypass => {
                    self.with_current(id, |active| {
                        active.state.bypass = true;
                        active.state.phase = Phase::BypassAccepted;
                    })?;
                    info!("Session {id}: gate bypassed by user");
                }
            }
        }

        self.advance(id, Phase::SpeciesInference)?;
        let tensor = self.prepare(models, Stage::Species, image).await?;
        let predictions = self.infer(models, Stage::Species, tensor).await?;

        self.with_current(id, |active| {
            info!(
                "Session {id}: identified '{}' ({:.1}%)",
                predictions.top_label(),
                predictions.top_probability() * 100.0
            );
            active.state.phase = Phase::Done;
            active.state.species_predictions = Some(predictions.clone());
            active.send(SessionEvent::SpeciesIdentified {
                predictions,
                bypassed: active.state.bypass,
            });
            active.close();
        })
    }

    async fn prepare(
        &self,
        models: &Arc<LoadedModels<R::Handle>>,
        stage: Stage,
        image: &Arc<DynamicImage>,
    ) -> Result<Tensor> {
        let input = models.get(stage).input;
        let image = Arc::clone(image);
        blocking(move || preprocess(&image, input)).await
    }

    async fn infer(
        &self,
        models: &Arc<LoadedModels<R::Handle>>,
        stage: Stage,
        tensor: Tensor,
    ) -> Result<PredictionSet> {
        let runtime = Arc::clone(&self.runtime);
        let shared = Arc::clone(models);
        let raw = blocking(move || runtime.run(&shared.get(stage).handle, tensor)).await?;

        let model = models.get(stage);
        let probabilities = interpret(&raw);
        Ok(rank(&probabilities, &model.labels, model.top_k))
    }

    fn finish_cancelled(&self, id: SessionId) -> Step<()> {
        let mut slot = self.lock_current();
        match slot.as_ref() {
            Some(active) if active.state.id == id => {
                active.send(SessionEvent::Cancelled);
                *slot = None;
                info!("Session {id}: cancelled by user");
                Ok(())
            }
            _ => Err(Halt::Stale),
        }
    }

    fn fail(&self, id: SessionId, error: Error) {
        let message = error.to_string();
        let delivered = self.with_current(id, |active| {
            active.state.phase = Phase::Failed;
            active.state.failure = Some(message.clone());
            active.send(SessionEvent::Failed(error));
            active.close();
        });
        match delivered {
            Ok(()) => warn!("Session {id} failed: {message}"),
            Err(_) => debug!("Session {id} failed after it was superseded: {message}"),
        }
    }
}

/// Run CPU-bound work off the async workers.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> Result<T> + Send + 'static) -> Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal {
            message: format!("worker task failed: {e}"),
        })?
}
