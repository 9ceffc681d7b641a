//! Stage partitioning.
//!
//! Walk the DAG in topological order. A vertex joins the stage of one of its
//! parents when the connecting edge is a one-to-one, non-side-input edge, both
//! ends agree on parallelism, executor placement and stage-id hint, and the
//! join does not close a cycle among stages. A stage that any other edge into
//! the vertex leaves from is off limits, so a stage never holds an edge that
//! cannot be fused. Otherwise the vertex opens a new stage.
//! Every logical edge whose endpoints end up in different stages becomes one
//! `StageEdge`.

use std::collections::{BTreeMap, BTreeSet};

use dagc_core::dag::Dag;
use dagc_core::error::{Error, Result};
use dagc_core::id::{IdSequence, StageId, VertexId};
use dagc_core::ir::{Edge, Vertex};
use dagc_core::property::CommunicationPattern;
use tracing::{debug, info};

use crate::physical::{PhysicalPlan, Stage, StageEdge, StageTask};

/// Stage grouping before ids are assigned. Stage indices follow creation order.
#[derive(Debug, Default)]
struct Partition {
    stage_of: BTreeMap<VertexId, usize>,
    members: Vec<Vec<VertexId>>,
    children: Vec<BTreeSet<usize>>,
}

impl Partition {
    fn open_stage(&mut self, v: VertexId) -> usize {
        self.members.push(vec![v]);
        self.children.push(BTreeSet::new());
        let idx = self.members.len() - 1;
        self.stage_of.insert(v, idx);
        idx
    }

    fn join_stage(&mut self, v: VertexId, idx: usize) {
        self.members[idx].push(v);
        self.stage_of.insert(v, idx);
    }

    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(s) = stack.pop() {
            if s == to {
                return true;
            }
            if seen.insert(s) {
                stack.extend(self.children[s].iter().copied());
            }
        }
        false
    }

    /// Joining `idx` adds an arc from every other parent stage into `idx`; that
    /// closes a cycle if `idx` already reaches one of them.
    fn join_creates_cycle(&self, idx: usize, parent_stages: &BTreeSet<usize>) -> bool {
        parent_stages
            .iter()
            .filter(|p| **p != idx)
            .any(|p| self.reaches(idx, *p))
    }
}

fn compatible(parent: &Vertex, child: &Vertex) -> bool {
    let (a, b) = (parent.properties(), child.properties());
    a.parallelism() == b.parallelism()
        && a.executor_placement() == b.executor_placement()
        && a.stage_id() == b.stage_id()
}

fn fusable(edge: &Edge) -> bool {
    edge.pattern() == CommunicationPattern::OneToOne && !edge.is_side_input()
}

fn partition(dag: &Dag) -> Result<Partition> {
    let mut part = Partition::default();

    for vertex in dag.topological_vertices() {
        let v = vertex.id();
        if vertex.is_loop() {
            return Err(Error::Lowering(format!(
                "loop vertex {} ('{}') must be unrolled before stage partitioning",
                v,
                vertex.name()
            )));
        }

        let incoming = dag.incoming_edges_of(v);
        let parent_stages: BTreeSet<usize> = incoming
            .iter()
            .filter_map(|e| part.stage_of.get(&e.src()).copied())
            .collect();
        // Stages reached by an edge that cannot be fused into them.
        let blocked: BTreeSet<usize> = incoming
            .iter()
            .filter(|e| {
                !fusable(e) || !dag.vertex(e.src()).map_or(false, |p| compatible(p, vertex))
            })
            .filter_map(|e| part.stage_of.get(&e.src()).copied())
            .collect();

        // (stage index, whether the parent is that stage's current tail)
        let mut candidates: Vec<(usize, bool)> = Vec::new();
        for edge in incoming.iter().filter(|e| fusable(e)) {
            let Some(parent) = dag.vertex(edge.src()) else {
                continue;
            };
            if !compatible(parent, vertex) {
                continue;
            }
            let Some(&idx) = part.stage_of.get(&parent.id()) else {
                continue;
            };
            if blocked.contains(&idx) || part.join_creates_cycle(idx, &parent_stages) {
                continue;
            }
            let is_tail = part.members[idx].last() == Some(&parent.id());
            candidates.push((idx, is_tail));
        }
        // Prefer extending a chain at its tail, then the oldest stage.
        candidates.sort_by_key(|(idx, is_tail)| (!*is_tail, *idx));

        let idx = match candidates.first() {
            Some(&(idx, _)) => {
                part.join_stage(v, idx);
                idx
            }
            None => part.open_stage(v),
        };
        for p in parent_stages.iter().filter(|p| **p != idx) {
            part.children[*p].insert(idx);
        }
    }
    Ok(part)
}

/// Stage id of every vertex, as `lower_to_physical` would assign it.
pub fn assign_stages(dag: &Dag) -> Result<BTreeMap<VertexId, StageId>> {
    let part = partition(dag)?;
    let ids = stage_ids(&part);
    Ok(part
        .stage_of
        .iter()
        .map(|(v, idx)| (*v, ids[*idx]))
        .collect())
}

fn stage_ids(part: &Partition) -> Vec<StageId> {
    let mut seq = IdSequence::new();
    part.members.iter().map(|_| seq.next_stage()).collect()
}

/// Lower an optimized DAG into a physical plan.
pub fn lower_to_physical(dag: &Dag) -> Result<PhysicalPlan> {
    let part = partition(dag)?;
    let ids = stage_ids(&part);
    let mut tasks = IdSequence::new();

    let mut stages = BTreeMap::new();
    for (idx, members) in part.members.iter().enumerate() {
        let first = members
            .first()
            .and_then(|v| dag.vertex(*v))
            .ok_or_else(|| Error::Lowering(format!("stage {} has no vertices", ids[idx])))?;
        let stage = Stage {
            id: ids[idx],
            vertices: members.clone(),
            tasks: members
                .iter()
                .map(|v| StageTask {
                    id: tasks.next_task(),
                    vertex: *v,
                })
                .collect(),
            parallelism: first.properties().parallelism(),
            placement: first.properties().executor_placement(),
        };
        debug!(stage = %stage.id, vertices = stage.vertices.len(), parallelism = stage.parallelism, "formed stage");
        stages.insert(stage.id, stage);
    }

    let mut stage_edges = Vec::new();
    for v in dag.topological_sort() {
        for edge in dag.incoming_edges_of(*v) {
            let (Some(&src), Some(&dst)) = (part.stage_of.get(&edge.src()), part.stage_of.get(&edge.dst())) else {
                return Err(Error::Lowering(format!("edge {} touches an unpartitioned vertex", edge.id())));
            };
            if src == dst {
                continue;
            }
            let props = edge.properties();
            stage_edges.push(StageEdge {
                id: stage_edges.len() as u64,
                src_stage: ids[src],
                dst_stage: ids[dst],
                src_vertex: edge.src(),
                dst_vertex: edge.dst(),
                edge: edge.id(),
                pattern: edge.pattern(),
                data_store: props.data_store(),
                partitioner: props.partitioner(),
                data_flow_model: props.data_flow_model(),
                side_input: edge.is_side_input(),
                coder: edge.coder().clone(),
            });
        }
    }

    let plan = PhysicalPlan::new(stages, stage_edges)?;
    info!(
        stages = plan.stage_count(),
        stage_edges = plan.stage_edges.len(),
        fingerprint = %plan.fingerprint,
        "partitioned DAG into stages"
    );
    Ok(plan)
}
