//! Session orchestration for the two-stage pipeline.

mod orchestrator;
mod session;

pub use orchestrator::{ModelAsset, Orchestrator, PipelineAssets};
pub use session::{
    ClassificationSession, GateChoice, Phase, SessionEvent, SessionHandle, SessionId,
};
