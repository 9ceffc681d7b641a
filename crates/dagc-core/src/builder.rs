//! Mutable DAG accumulator.
//!
//! The builder owns its vertices and adjacency maps exclusively. `build`
//! consumes it, runs the integrity checks, and moves the maps into the
//! resulting `Dag`, so a snapshot can never alias a builder that keeps being
//! mutated. Callers that want to keep building clone first.
//!
//! Integrity rules checked at build time:
//! 1. no directed cycle;
//! 2. vertices without inputs are sources (skipped for loop bodies);
//! 3. vertices without outputs are operators or loops (skipped for loop bodies);
//! 4. side-input edges are one-to-one and never push;
//! 5. data-skew metric collection edges never push;
//! 6. vertices sharing a stage id share their parallelism.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dag::Dag;
use crate::error::{Error, Result};
use crate::id::{EdgeId, VertexId};
use crate::ir::{Edge, Vertex};
use crate::loop_vertex::LoopHeader;
use crate::property::{CommunicationPattern, DataFlowModel, MetricCollection};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DagBuilder {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<EdgeId, Edge>,
    incoming: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    outgoing: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    assigned_loops: BTreeMap<VertexId, LoopHeader>,
    loop_depths: BTreeMap<VertexId, usize>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a copy of an existing snapshot.
    pub fn from_dag(dag: &Dag) -> Self {
        Self {
            vertices: dag.vertices.clone(),
            edges: dag.edges.clone(),
            incoming: dag.incoming.clone(),
            outgoing: dag.outgoing.clone(),
            assigned_loops: dag.assigned_loops.clone(),
            loop_depths: dag.loop_depths.clone(),
        }
    }

    pub(crate) fn from_parts(
        vertices: BTreeMap<VertexId, Vertex>,
        edges: BTreeMap<EdgeId, Edge>,
        incoming: BTreeMap<VertexId, BTreeSet<EdgeId>>,
        outgoing: BTreeMap<VertexId, BTreeSet<EdgeId>>,
        assigned_loops: BTreeMap<VertexId, LoopHeader>,
        loop_depths: BTreeMap<VertexId, usize>,
    ) -> Self {
        Self {
            vertices,
            edges,
            incoming,
            outgoing,
            assigned_loops,
            loop_depths,
        }
    }

    /// Register a vertex. Re-adding a known id replaces the vertex value but
    /// keeps its edges.
    pub fn add_vertex(&mut self, v: Vertex) -> &mut Self {
        let id = v.id();
        self.incoming.entry(id).or_default();
        self.outgoing.entry(id).or_default();
        self.vertices.insert(id, v);
        self
    }

    /// Register a vertex the front end emitted inside `header`'s loop.
    pub fn add_vertex_in_loop(&mut self, v: Vertex, header: &LoopHeader) -> &mut Self {
        let id = v.id();
        self.add_vertex(v);
        self.assigned_loops.insert(id, header.clone());
        self.loop_depths.insert(id, header.depth());
        self
    }

    /// Register a vertex carrying over whatever loop context `dag` records for it.
    pub fn add_vertex_like(&mut self, v: Vertex, dag: &Dag) -> &mut Self {
        match dag.assigned_loop_of(v.id()) {
            Some(header) => {
                let header = header.clone();
                self.add_vertex_in_loop(v, &header)
            }
            None => self.add_vertex(v),
        }
    }

    /// Remove a vertex and every edge touching it, on both sides.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<Vertex> {
        let vertex = self.vertices.remove(&id).ok_or(Error::MissingVertex(id))?;
        let inbound = self.incoming.remove(&id).unwrap_or_default();
        let outbound = self.outgoing.remove(&id).unwrap_or_default();
        for edge_id in inbound {
            if let Some(edge) = self.edges.remove(&edge_id) {
                if let Some(set) = self.outgoing.get_mut(&edge.src()) {
                    set.remove(&edge_id);
                }
            }
        }
        for edge_id in outbound {
            if let Some(edge) = self.edges.remove(&edge_id) {
                if let Some(set) = self.incoming.get_mut(&edge.dst()) {
                    set.remove(&edge_id);
                }
            }
        }
        self.assigned_loops.remove(&id);
        self.loop_depths.remove(&id);
        Ok(vertex)
    }

    /// Add an edge. Both endpoints must already be registered.
    pub fn connect_vertices(&mut self, edge: Edge) -> Result<&mut Self> {
        let (src, dst) = (edge.src(), edge.dst());
        let missing = if !self.vertices.contains_key(&src) {
            Some(src)
        } else if !self.vertices.contains_key(&dst) {
            Some(dst)
        } else {
            None
        };
        if let Some(missing) = missing {
            return Err(Error::MissingEndpoint {
                edge: edge.id(),
                src,
                dst,
                missing,
            });
        }
        let id = edge.id();
        self.incoming.entry(dst).or_default().insert(id);
        self.outgoing.entry(src).or_default().insert(id);
        self.edges.insert(id, edge);
        Ok(self)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&id)?;
        if let Some(set) = self.outgoing.get_mut(&edge.src()) {
            set.remove(&id);
        }
        if let Some(set) = self.incoming.get_mut(&edge.dst()) {
            set.remove(&id);
        }
        Some(edge)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn contains_where(&self, pred: impl Fn(&Vertex) -> bool) -> bool {
        self.vertices.values().any(pred)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    pub fn incoming_edges_of(&self, id: VertexId) -> Vec<&Edge> {
        self.incoming
            .get(&id)
            .map(|ids| ids.iter().filter_map(|e| self.edges.get(e)).collect())
            .unwrap_or_default()
    }

    pub fn outgoing_edges_of(&self, id: VertexId) -> Vec<&Edge> {
        self.outgoing
            .get(&id)
            .map(|ids| ids.iter().filter_map(|e| self.edges.get(e)).collect())
            .unwrap_or_default()
    }

    pub fn has_edge_between(&self, src: VertexId, dst: VertexId) -> bool {
        self.outgoing_edges_of(src).iter().any(|e| e.dst() == dst)
    }

    /// Iterative DFS. A child that is still on the DFS stack closes a cycle;
    /// a child that was merely visited before does not.
    fn cycle_check(&self) -> Result<()> {
        let mut visited: BTreeSet<VertexId> = BTreeSet::new();
        let mut on_stack: BTreeSet<VertexId> = BTreeSet::new();

        for &start in self.vertices.keys() {
            if visited.contains(&start) {
                continue;
            }
            visited.insert(start);
            on_stack.insert(start);
            // (vertex, its children, index of the next child to explore)
            let mut stack: Vec<(VertexId, Vec<VertexId>, usize)> =
                vec![(start, self.child_ids(start), 0)];

            while let Some(top) = stack.last_mut() {
                let (vertex, children, next) = (top.0, &top.1, &mut top.2);
                let Some(&child) = children.get(*next) else {
                    on_stack.remove(&vertex);
                    stack.pop();
                    continue;
                };
                *next += 1;
                if on_stack.contains(&child) {
                    let from = stack.iter().position(|(v, _, _)| *v == child).unwrap_or(0);
                    let cycle: Vec<VertexId> = stack[from..].iter().map(|(v, _, _)| *v).collect();
                    return Err(Error::Cycle(cycle));
                }
                if visited.insert(child) {
                    on_stack.insert(child);
                    stack.push((child, self.child_ids(child), 0));
                }
            }
        }
        Ok(())
    }

    fn child_ids(&self, id: VertexId) -> Vec<VertexId> {
        self.outgoing_edges_of(id).iter().map(|e| e.dst()).collect()
    }

    fn source_check(&self) -> Result<()> {
        let offenders: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|v| self.incoming.get(&v.id()).map_or(true, |s| s.is_empty()))
            .filter(|v| !v.is_source())
            .map(|v| v.id())
            .collect();
        if offenders.is_empty() {
            Ok(())
        } else {
            Err(Error::SourceRule(offenders))
        }
    }

    fn sink_check(&self) -> Result<()> {
        let offenders: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|v| self.outgoing.get(&v.id()).map_or(true, |s| s.is_empty()))
            .filter(|v| !(v.is_operator() || v.is_loop()))
            .map(|v| v.id())
            .collect();
        if offenders.is_empty() {
            Ok(())
        } else {
            Err(Error::SinkRule(offenders))
        }
    }

    fn execution_property_check(&self) -> Result<()> {
        let side_inputs: Vec<&Edge> = self.edges.values().filter(|e| e.is_side_input()).collect();

        let not_one_to_one: Vec<String> = side_inputs
            .iter()
            .filter(|e| e.properties().communication_pattern() != Some(CommunicationPattern::OneToOne))
            .map(|e| e.id().to_string())
            .collect();
        if !not_one_to_one.is_empty() {
            return Err(Error::PropertyConflict {
                reason: "side-input edge must be one-to-one",
                offenders: not_one_to_one,
            });
        }

        let pushed_side_inputs: Vec<String> = side_inputs
            .iter()
            .filter(|e| e.properties().data_flow_model() == DataFlowModel::Push)
            .map(|e| e.id().to_string())
            .collect();
        if !pushed_side_inputs.is_empty() {
            return Err(Error::PropertyConflict {
                reason: "side-input edge is not compatible with push",
                offenders: pushed_side_inputs,
            });
        }

        // All data has to be stored before its size can be collected.
        let pushed_skew_edges: Vec<String> = self
            .edges
            .values()
            .filter(|e| e.properties().metric_collection() == Some(MetricCollection::DataSkew))
            .filter(|e| e.properties().data_flow_model() == DataFlowModel::Push)
            .map(|e| e.id().to_string())
            .collect();
        if !pushed_skew_edges.is_empty() {
            return Err(Error::PropertyConflict {
                reason: "data-skew metric collection edge is not compatible with push",
                offenders: pushed_skew_edges,
            });
        }

        let mut groups: BTreeMap<u32, Vec<&Vertex>> = BTreeMap::new();
        for v in self.vertices.values() {
            if let Some(stage) = v.properties().stage_id() {
                groups.entry(stage).or_default().push(v);
            }
        }
        let mut mismatched = Vec::new();
        for (stage, members) in &groups {
            let first = members[0].properties().parallelism();
            if members.iter().any(|v| v.properties().parallelism() != first) {
                mismatched.extend(members.iter().map(|v| {
                    format!("Stage{}:{}(parallelism {})", stage, v.id(), v.properties().parallelism())
                }));
            }
        }
        if !mismatched.is_empty() {
            return Err(Error::PropertyConflict {
                reason: "vertices in the same stage have different parallelism",
                offenders: mismatched,
            });
        }
        Ok(())
    }

    fn integrity_check(&self, source_sink: bool) -> Result<()> {
        self.cycle_check()?;
        if source_sink {
            self.source_check()?;
            self.sink_check()?;
        }
        self.execution_property_check()
    }

    /// Kahn's algorithm with a min-id ready set; only called on acyclic graphs.
    fn topological_order(&self) -> Vec<VertexId> {
        let mut in_degree: BTreeMap<VertexId, usize> = self
            .vertices
            .keys()
            .map(|v| (*v, self.incoming.get(v).map_or(0, |s| s.len())))
            .collect();
        let mut ready: BTreeSet<VertexId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(v, _)| *v)
            .collect();
        let mut order = Vec::with_capacity(self.vertices.len());
        while let Some(v) = ready.pop_first() {
            order.push(v);
            for child in self.child_ids(v) {
                if let Some(d) = in_degree.get_mut(&child) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(child);
                    }
                }
            }
        }
        order
    }

    fn snapshot(self, source_sink: bool) -> Result<Dag> {
        if let Err(e) = self.integrity_check(source_sink) {
            warn!(error = %e, vertices = self.vertices.len(), edges = self.edges.len(), "DAG integrity check failed");
            return Err(e);
        }
        let topological_order = self.topological_order();
        debug!(
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            source_sink_checked = source_sink,
            "built DAG"
        );
        Ok(Dag {
            vertices: self.vertices,
            edges: self.edges,
            incoming: self.incoming,
            outgoing: self.outgoing,
            assigned_loops: self.assigned_loops,
            loop_depths: self.loop_depths,
            topological_order,
        })
    }

    /// Build a loop body: every rule except the source/sink shape rules.
    pub fn build_without_source_sink_check(self) -> Result<Dag> {
        self.snapshot(false)
    }

    /// Build the DAG, running every integrity rule.
    pub fn build(self) -> Result<Dag> {
        self.snapshot(true)
    }
}
