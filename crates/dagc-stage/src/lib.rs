#![forbid(unsafe_code)]
//! dagc-stage: lowering of an optimized logical DAG into a physical plan.
//!
//! Responsibilities:
//! - Partition the DAG into stages of one-to-one connected, property-compatible vertices.
//! - Summarize every stage-crossing edge as a `StageEdge` for the data-transfer layer.
//! - Map stage-internal task ids back to the logical vertices they run.
//! - Provide stage-level verification helpers.
//!
//! **No pass logic, no scheduling** here. The runtime consumes the plan read-only.

pub mod lower;
pub mod physical;
pub mod verify;

pub use lower::{assign_stages, lower_to_physical};
pub use physical::{PhysicalPlan, Stage, StageEdge, StageTask};
pub use verify::verify_physical_plan;
