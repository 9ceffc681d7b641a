//! Convenient re-exports for downstream crates.

pub use crate::builder::DagBuilder;
pub use crate::config::CompilerConfig;
pub use crate::dag::Dag;
pub use crate::error::{Error, Result};
pub use crate::id::{EdgeId, StageId, TaskId, VertexId};
pub use crate::ir::{Coder, Edge, Vertex, VertexKind};
pub use crate::loop_vertex::{LoopHeader, LoopVertex};
pub use crate::property::{
    CommunicationPattern, DataFlowModel, DataStore, ExecutionProperty, ExecutionPropertyMap,
    ExecutorPlacement, MetricCollection, Partitioner, PropertyKey,
};
