//! The conversion pipeline and batch orchestration.
//!
//! - **convert**: single-asset conversion, routed by source/destination kind
//! - **discovery**: enumerate a directory tree into conversion jobs
//! - **batch**: dispatch a job list sequentially or over a worker pool

pub mod batch;
pub mod convert;
pub mod discovery;

pub use batch::{BatchOrchestrator, BatchOutput};
pub use convert::ConversionPipeline;
pub use discovery::discover_jobs;
