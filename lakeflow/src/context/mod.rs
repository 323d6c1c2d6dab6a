//! Run context and pipeline configuration.
//!
//! A [`RunContext`] identifies one logical execution of the pipeline and
//! is the sole source of every derived path and key, which is what makes
//! reruns deterministic and distinct logical dates collision-free.

mod config;
mod run;

pub use config::PipelineConfig;
pub use run::RunContext;
