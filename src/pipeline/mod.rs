// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod orchestrator;
mod stage;

pub use orchestrator::{Answer, RagPipeline};
pub use stage::PipelineStage;
