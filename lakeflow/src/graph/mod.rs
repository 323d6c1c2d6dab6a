//! Task dependency graph: explicit construction, trigger rules, and the
//! immutable graph value the engine walks.

mod builder;
mod dag;
mod trigger;

pub use builder::GraphBuilder;
pub use dag::TaskGraph;
pub use trigger::{TriggerDecision, TriggerRule};
