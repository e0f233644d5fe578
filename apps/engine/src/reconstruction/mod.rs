// Document reconstruction: per-page pipeline, worker pool and layout report.

pub mod engine;
pub mod pipeline;
pub mod report;

pub use engine::{Reconstruction, ReconstructionEngine};
pub use pipeline::{run_page, FinalizedPage, PageFailure, PageState, PipelineStage};
pub use report::{LayoutReport, LayoutScore, LayoutVerdict, PageReport};
