//! Physical plan: a DAG of stages handed to the runtime scheduler.
//!
//! Stages are kept in a `BTreeMap` and stage edges in a `Vec` ordered by
//! creation, so serialization (and therefore the fingerprint) is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use dagc_core::hash::{hash_serde, Hash256};
use dagc_core::id::{EdgeId, StageId, TaskId, VertexId};
use dagc_core::ir::Coder;
use dagc_core::property::{
    CommunicationPattern, DataFlowModel, DataStore, ExecutorPlacement, Partitioner,
};
use dagc_core::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One runtime task: a logical vertex as scheduled inside its stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTask {
    pub id: TaskId,
    pub vertex: VertexId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    /// Vertices in execution order (topological order of the logical DAG).
    pub vertices: Vec<VertexId>,
    pub tasks: Vec<StageTask>,
    pub parallelism: usize,
    pub placement: ExecutorPlacement,
}

impl Stage {
    pub fn first_vertex(&self) -> Option<VertexId> {
        self.vertices.first().copied()
    }

    pub fn last_vertex(&self) -> Option<VertexId> {
        self.vertices.last().copied()
    }
}

/// A logical edge that crosses a stage boundary, with the transfer settings
/// the data layer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEdge {
    pub id: u64,
    pub src_stage: StageId,
    pub dst_stage: StageId,
    pub src_vertex: VertexId,
    pub dst_vertex: VertexId,
    /// The logical edge this stage edge was lowered from.
    pub edge: EdgeId,
    pub pattern: CommunicationPattern,
    pub data_store: Option<DataStore>,
    pub partitioner: Option<Partitioner>,
    pub data_flow_model: DataFlowModel,
    pub side_input: bool,
    pub coder: Coder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalPlan {
    /// Fresh for every lowering, even of the same DAG.
    pub id: Uuid,
    pub stages: BTreeMap<StageId, Stage>,
    pub stage_edges: Vec<StageEdge>,
    pub task_vertex_map: BTreeMap<TaskId, VertexId>,
    /// blake3 digest of the stages and stage edges; equal for equal input.
    pub fingerprint: Hash256,
}

impl PhysicalPlan {
    pub fn new(stages: BTreeMap<StageId, Stage>, stage_edges: Vec<StageEdge>) -> Result<Self> {
        let task_vertex_map = stages
            .values()
            .flat_map(|s| s.tasks.iter().map(|t| (t.id, t.vertex)))
            .collect();
        let fingerprint = hash_serde(&(&stages, &stage_edges))?;
        Ok(Self {
            id: Uuid::new_v4(),
            stages,
            stage_edges,
            task_vertex_map,
            fingerprint,
        })
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn stage_of(&self, vertex: VertexId) -> Option<StageId> {
        self.stages
            .values()
            .find(|s| s.vertices.contains(&vertex))
            .map(|s| s.id)
    }

    pub fn incoming_stage_edges(&self, stage: StageId) -> Vec<&StageEdge> {
        self.stage_edges.iter().filter(|e| e.dst_stage == stage).collect()
    }

    pub fn outgoing_stage_edges(&self, stage: StageId) -> Vec<&StageEdge> {
        self.stage_edges.iter().filter(|e| e.src_stage == stage).collect()
    }

    /// Stages in topological order (Kahn, lowest id first). If the stage graph
    /// has a cycle, the stages on it are missing from the result.
    pub fn topological_stages(&self) -> Vec<StageId> {
        let mut in_degree: BTreeMap<StageId, usize> =
            self.stages.keys().map(|s| (*s, 0)).collect();
        let mut children: BTreeMap<StageId, BTreeSet<StageId>> = BTreeMap::new();
        for e in &self.stage_edges {
            if children.entry(e.src_stage).or_default().insert(e.dst_stage) {
                *in_degree.entry(e.dst_stage).or_default() += 1;
            }
        }

        let mut ready: BTreeSet<StageId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(s, _)| *s)
            .collect();
        let mut order = Vec::with_capacity(self.stages.len());
        while let Some(s) = ready.pop_first() {
            order.push(s);
            for child in children.get(&s).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
        order
    }
}
