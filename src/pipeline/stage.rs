// file: src/pipeline/stage.rs
// description: per-query state machine of the retrieval-augmented pipeline

use std::fmt;

/// `Start → Locate → Enrich → Retrieve → BuildPrompt → Generate → Done`,
/// with `Failed` reachable only from `Retrieve` and `Generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Locate,
    Enrich,
    Retrieve,
    BuildPrompt,
    Generate,
    Done,
    Failed,
}

impl PipelineStage {
    /// The next stage on the success path. Terminal stages stay put.
    pub fn advance(self) -> Self {
        match self {
            PipelineStage::Start => PipelineStage::Locate,
            PipelineStage::Locate => PipelineStage::Enrich,
            PipelineStage::Enrich => PipelineStage::Retrieve,
            PipelineStage::Retrieve => PipelineStage::BuildPrompt,
            PipelineStage::BuildPrompt => PipelineStage::Generate,
            PipelineStage::Generate => PipelineStage::Done,
            PipelineStage::Done => PipelineStage::Done,
            PipelineStage::Failed => PipelineStage::Failed,
        }
    }

    pub fn can_fail(self) -> bool {
        matches!(self, PipelineStage::Retrieve | PipelineStage::Generate)
    }

    /// Moves to `Failed` from a stage that can fail; other stages are unchanged.
    pub fn fail(self) -> Self {
        if self.can_fail() {
            PipelineStage::Failed
        } else {
            self
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "START",
            PipelineStage::Locate => "LOCATE",
            PipelineStage::Enrich => "ENRICH",
            PipelineStage::Retrieve => "RETRIEVE",
            PipelineStage::BuildPrompt => "BUILD_PROMPT",
            PipelineStage::Generate => "GENERATE",
            PipelineStage::Done => "DONE",
            PipelineStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
