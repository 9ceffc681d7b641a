//! Composite loop vertices.
//!
//! A loop vertex owns the builder of its body plus the bookkeeping that ties
//! the body to the enclosing graph:
//! - `dag_incoming_edges`: edges from outside into body vertices, as seen by
//!   the first iteration.
//! - `iterative_incoming_edges`: loop-carried edges, from a body vertex of
//!   iteration `i` into a body vertex of iteration `i + 1`.
//! - `non_iterative_incoming_edges`: edges from outside that every iteration
//!   reads again (loop invariant inputs).
//! - `dag_outgoing_edges`: edges from body vertices of the last iteration to
//!   the outside.
//!
//! Incoming maps are keyed by the body vertex the edge enters, the outgoing map
//! by the body vertex the edge leaves.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::builder::DagBuilder;
use crate::dag::Dag;
use crate::error::Result;
use crate::id::VertexId;
use crate::ir::{Edge, Vertex};
use crate::property::CommunicationPattern;

/// Loop context a front end attaches to the vertices it emits inside a loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopHeader {
    id: VertexId,
    name: String,
    max_iterations: usize,
    enclosing: Option<Box<LoopHeader>>,
}

impl LoopHeader {
    pub fn new(name: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            id: VertexId::fresh(),
            name: name.into(),
            max_iterations,
            enclosing: None,
        }
    }

    /// Nest this loop inside `outer`.
    pub fn within(mut self, outer: &LoopHeader) -> Self {
        self.enclosing = Some(Box::new(outer.clone()));
        self
    }

    /// Id the extracted loop vertex will carry.
    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn enclosing(&self) -> Option<&LoopHeader> {
        self.enclosing.as_deref()
    }

    /// Nesting depth, 1 for an outermost loop.
    pub fn depth(&self) -> usize {
        1 + self.enclosing.as_ref().map(|h| h.depth()).unwrap_or(0)
    }

    /// An empty loop vertex for this header.
    pub fn to_vertex(&self) -> Vertex {
        Vertex::looped(self.id, LoopVertex::new(self.name.clone(), self.max_iterations))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopVertex {
    name: String,
    max_iterations: usize,
    builder: DagBuilder,
    dag_incoming_edges: BTreeMap<VertexId, Vec<Edge>>,
    iterative_incoming_edges: BTreeMap<VertexId, Vec<Edge>>,
    non_iterative_incoming_edges: BTreeMap<VertexId, Vec<Edge>>,
    dag_outgoing_edges: BTreeMap<VertexId, Vec<Edge>>,
}

fn push_unique(map: &mut BTreeMap<VertexId, Vec<Edge>>, key: VertexId, edge: Edge) {
    let entry = map.entry(key).or_default();
    if !entry.iter().any(|e| e.id() == edge.id()) {
        entry.push(edge);
    }
}

impl LoopVertex {
    pub fn new(name: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            name: name.into(),
            max_iterations,
            builder: DagBuilder::new(),
            dag_incoming_edges: BTreeMap::new(),
            iterative_incoming_edges: BTreeMap::new(),
            non_iterative_incoming_edges: BTreeMap::new(),
            dag_outgoing_edges: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn increase_max_iterations(&mut self, by: usize) {
        self.max_iterations += by;
    }

    pub fn builder(&self) -> &DagBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut DagBuilder {
        &mut self.builder
    }

    /// Snapshot of the body. Source/sink rules do not apply to loop bodies.
    pub fn dag(&self) -> Result<Dag> {
        self.builder.clone().build_without_source_sink_check()
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.builder.contains(v)
    }

    pub fn add_dag_incoming_edge(&mut self, edge: Edge) {
        push_unique(&mut self.dag_incoming_edges, edge.dst(), edge);
    }

    pub fn add_iterative_incoming_edge(&mut self, edge: Edge) {
        push_unique(&mut self.iterative_incoming_edges, edge.dst(), edge);
    }

    pub fn add_non_iterative_incoming_edge(&mut self, edge: Edge) {
        push_unique(&mut self.non_iterative_incoming_edges, edge.dst(), edge);
    }

    pub fn add_dag_outgoing_edge(&mut self, edge: Edge) {
        push_unique(&mut self.dag_outgoing_edges, edge.src(), edge);
    }

    pub fn dag_incoming_edges(&self) -> &BTreeMap<VertexId, Vec<Edge>> {
        &self.dag_incoming_edges
    }

    pub fn iterative_incoming_edges(&self) -> &BTreeMap<VertexId, Vec<Edge>> {
        &self.iterative_incoming_edges
    }

    pub fn non_iterative_incoming_edges(&self) -> &BTreeMap<VertexId, Vec<Edge>> {
        &self.non_iterative_incoming_edges
    }

    pub fn dag_outgoing_edges(&self) -> &BTreeMap<VertexId, Vec<Edge>> {
        &self.dag_outgoing_edges
    }

    pub fn take_dag_incoming_edges(&mut self, v: VertexId) -> Vec<Edge> {
        self.dag_incoming_edges.remove(&v).unwrap_or_default()
    }

    pub fn take_iterative_incoming_edges(&mut self, v: VertexId) -> Vec<Edge> {
        self.iterative_incoming_edges.remove(&v).unwrap_or_default()
    }

    pub fn take_non_iterative_incoming_edges(&mut self, v: VertexId) -> Vec<Edge> {
        self.non_iterative_incoming_edges.remove(&v).unwrap_or_default()
    }

    pub fn take_dag_outgoing_edges(&mut self, v: VertexId) -> Vec<Edge> {
        self.dag_outgoing_edges.remove(&v).unwrap_or_default()
    }

    pub fn clear_iterative_incoming_edges(&mut self) {
        self.iterative_incoming_edges.clear();
    }

    pub fn clear_non_iterative_incoming_edges(&mut self) {
        self.non_iterative_incoming_edges.clear();
    }

    /// Keep only the outgoing edges `keep` accepts.
    pub fn retain_dag_outgoing_edges(&mut self, mut keep: impl FnMut(&Edge) -> bool) {
        for edges in self.dag_outgoing_edges.values_mut() {
            edges.retain(|e| keep(e));
        }
        self.dag_outgoing_edges.retain(|_, edges| !edges.is_empty());
    }

    /// Outside vertices feeding the body, in any iteration.
    pub fn external_sources(&self) -> BTreeSet<VertexId> {
        self.dag_incoming_edges
            .values()
            .chain(self.non_iterative_incoming_edges.values())
            .flatten()
            .map(|e| e.src())
            .filter(|src| !self.builder.contains(*src))
            .collect()
    }

    /// Outside vertices consuming the last iteration.
    pub fn external_destinations(&self) -> BTreeSet<VertexId> {
        self.dag_outgoing_edges
            .values()
            .flatten()
            .map(|e| e.dst())
            .collect()
    }

    /// Re-target bookkeeping edges whose outside endpoint was replaced.
    /// Used when a nested loop is copied together with its enclosing body.
    pub fn remap_external(&mut self, mapping: &BTreeMap<VertexId, VertexId>) {
        fn remap_src(
            map: &mut BTreeMap<VertexId, Vec<Edge>>,
            mapping: &BTreeMap<VertexId, VertexId>,
        ) {
            for edges in map.values_mut() {
                for e in edges.iter_mut() {
                    if let Some(new_src) = mapping.get(&e.src()) {
                        *e = e.reconnect(*new_src, e.dst());
                    }
                }
            }
        }
        remap_src(&mut self.dag_incoming_edges, mapping);
        remap_src(&mut self.non_iterative_incoming_edges, mapping);
        for edges in self.dag_outgoing_edges.values_mut() {
            for e in edges.iter_mut() {
                if let Some(new_dst) = mapping.get(&e.dst()) {
                    *e = e.reconnect(e.src(), *new_dst);
                }
            }
        }
    }

    /// If `other` is another iteration of the same loop, map each of its body
    /// vertices to the matching vertex of this body.
    ///
    /// Bodies match when they have the same name, the same vertex signatures
    /// in topological order, and the same internal wiring.
    pub fn equivalent_body(&self, other: &LoopVertex) -> Result<Option<BTreeMap<VertexId, VertexId>>> {
        if self.name != other.name {
            return Ok(None);
        }
        let ours = self.dag()?;
        let theirs = other.dag()?;
        let a = ours.topological_sort();
        let b = theirs.topological_sort();
        if a.len() != b.len() || ours.edge_count() != theirs.edge_count() {
            return Ok(None);
        }

        let pos_a: BTreeMap<VertexId, usize> = a.iter().enumerate().map(|(i, v)| (*v, i)).collect();
        let pos_b: BTreeMap<VertexId, usize> = b.iter().enumerate().map(|(i, v)| (*v, i)).collect();

        let wiring = |dag: &Dag, pos: &BTreeMap<VertexId, usize>, v: VertexId| {
            let mut inputs: Vec<(usize, CommunicationPattern)> = dag
                .incoming_edges_of(v)
                .iter()
                .filter_map(|e| pos.get(&e.src()).map(|p| (*p, e.pattern())))
                .collect();
            inputs.sort();
            inputs
        };

        let mut mapping = BTreeMap::new();
        for (x, y) in a.iter().zip(b.iter()) {
            let (vx, vy) = match (ours.vertex(*x), theirs.vertex(*y)) {
                (Some(vx), Some(vy)) => (vx, vy),
                _ => return Ok(None),
            };
            if vx.signature() != vy.signature() {
                return Ok(None);
            }
            if wiring(&ours, &pos_a, *x) != wiring(&theirs, &pos_b, *y) {
                return Ok(None);
            }
            mapping.insert(*y, *x);
        }
        Ok(Some(mapping))
    }
}
