//! Immutable, validated DAG snapshots.
//!
//! A `Dag` only comes out of `DagBuilder::build` (or the loop-body variant),
//! so every value of this type satisfies the integrity rules checked there.
//! Rewrites go through `into_builder`/`DagBuilder::from_dag` and a new build.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::builder::DagBuilder;
use crate::id::{EdgeId, VertexId};
use crate::ir::{Edge, Vertex};
use crate::loop_vertex::LoopHeader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dag {
    pub(crate) vertices: BTreeMap<VertexId, Vertex>,
    pub(crate) edges: BTreeMap<EdgeId, Edge>,
    pub(crate) incoming: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    pub(crate) outgoing: BTreeMap<VertexId, BTreeSet<EdgeId>>,
    pub(crate) assigned_loops: BTreeMap<VertexId, LoopHeader>,
    pub(crate) loop_depths: BTreeMap<VertexId, usize>,
    pub(crate) topological_order: Vec<VertexId>,
}

impl Dag {
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn contains_where(&self, pred: impl Fn(&Vertex) -> bool) -> bool {
        self.vertices.values().any(pred)
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

    pub fn parents(&self, id: VertexId) -> Vec<VertexId> {
        self.incoming_edges_of(id).iter().map(|e| e.src()).collect()
    }

    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        self.outgoing_edges_of(id).iter().map(|e| e.dst()).collect()
    }

    pub fn has_edge_between(&self, src: VertexId, dst: VertexId) -> bool {
        self.outgoing_edges_of(src).iter().any(|e| e.dst() == dst)
    }

    /// Vertex ids in topological order; ties are broken by id.
    pub fn topological_sort(&self) -> &[VertexId] {
        &self.topological_order
    }

    pub fn topological_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.topological_order
            .iter()
            .filter_map(|id| self.vertices.get(id))
    }

    pub fn sources(&self) -> Vec<VertexId> {
        self.topological_order
            .iter()
            .copied()
            .filter(|v| self.incoming.get(v).map_or(true, |s| s.is_empty()))
            .collect()
    }

    pub fn sinks(&self) -> Vec<VertexId> {
        self.topological_order
            .iter()
            .copied()
            .filter(|v| self.outgoing.get(v).map_or(true, |s| s.is_empty()))
            .collect()
    }

    /// Whether the front end placed this vertex inside a not yet extracted loop.
    pub fn is_composite_vertex(&self, id: VertexId) -> bool {
        self.assigned_loops.contains_key(&id)
    }

    pub fn assigned_loop_of(&self, id: VertexId) -> Option<&LoopHeader> {
        self.assigned_loops.get(&id)
    }

    /// Loop nesting depth, 0 outside any loop.
    pub fn loop_depth_of(&self, id: VertexId) -> usize {
        self.loop_depths.get(&id).copied().unwrap_or(0)
    }

    pub fn max_loop_depth(&self) -> usize {
        self.loop_depths.values().copied().max().unwrap_or(0)
    }

    /// Loop vertices in topological order.
    pub fn loop_vertices(&self) -> Vec<&Vertex> {
        self.topological_vertices().filter(|v| v.is_loop()).collect()
    }

    /// Seed a builder with a copy of this snapshot.
    pub fn to_builder(&self) -> DagBuilder {
        DagBuilder::from_dag(self)
    }

    /// Hand this snapshot's contents to a builder without copying.
    pub fn into_builder(self) -> DagBuilder {
        DagBuilder::from_parts(
            self.vertices,
            self.edges,
            self.incoming,
            self.outgoing,
            self.assigned_loops,
            self.loop_depths,
        )
    }
}
