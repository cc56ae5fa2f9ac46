pub mod orchestrator;
pub mod state;

pub use orchestrator::QuotationPipeline;
pub use state::{
    PipelineError, PipelineOutcome, PipelineStage, PipelineState, StageDiagnostic, StageUpdate,
};
