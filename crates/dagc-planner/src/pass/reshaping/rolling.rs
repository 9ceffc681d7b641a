//! Loop rolling: fold a chain of equivalent loop vertices (typically one per
//! iteration, as emitted by a front end that unrolls user loops eagerly) into
//! a single loop vertex whose iteration count is the sum of theirs.
//!
//! While merging, the edges entering each later iteration are classified:
//! an edge coming from the previous iteration's body is loop-carried
//! (iterative); any other edge is read again by every iteration
//! (non-iterative).

use std::collections::BTreeMap;

use dagc_core::builder::DagBuilder;
use dagc_core::dag::Dag;
use dagc_core::error::Result;
use dagc_core::id::VertexId;
use dagc_core::loop_vertex::LoopVertex;
use tracing::debug;

use super::loop_bodies;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopRollingPass;

#[derive(Debug, Default)]
struct Rolling {
    /// merged loop -> root loop
    merged_into: BTreeMap<VertexId, VertexId>,
    /// root loop -> (merged body vertex -> root body vertex)
    equivalents: BTreeMap<VertexId, BTreeMap<VertexId, VertexId>>,
}

impl Rolling {
    fn root_of(&self, v: VertexId) -> VertexId {
        self.merged_into.get(&v).copied().unwrap_or(v)
    }

    /// Map a body vertex of any loop merged into `root` onto the root's body.
    fn equiv(&self, root: VertexId, v: VertexId) -> Option<VertexId> {
        self.equivalents.get(&root).and_then(|m| m.get(&v).copied())
    }

    /// Every merged body vertex, over all roots.
    fn all_equivalents(&self) -> BTreeMap<VertexId, VertexId> {
        self.equivalents
            .values()
            .flat_map(|m| m.iter().map(|(k, v)| (*k, *v)))
            .filter(|(k, v)| k != v)
            .collect()
    }
}

impl LoopRollingPass {
    pub fn apply(&self, dag: Dag) -> Result<Dag> {
        let mut loops = loop_bodies(&dag);
        if loops.is_empty() {
            return Ok(dag);
        }
        let mut state = Rolling::default();

        for id in dag.loop_vertices().iter().map(|v| v.id()) {
            let Some(candidate) = loops.get(&id) else {
                continue;
            };
            let mut target = None;
            for parent in dag.parents(id) {
                let root = state.root_of(parent);
                if root == id {
                    continue;
                }
                let Some(root_loop) = loops.get(&root) else {
                    continue;
                };
                if let Some(mapping) = root_loop.equivalent_body(candidate)? {
                    target = Some((root, mapping));
                    break;
                }
            }
            let Some((root, mapping)) = target else {
                continue;
            };
            let Some(merged) = loops.remove(&id) else {
                continue;
            };
            let root_body: Vec<VertexId> = mapping.values().copied().collect();
            let known = state.equivalents.entry(root).or_default();
            for v in root_body {
                known.insert(v, v);
            }
            known.extend(mapping.iter().map(|(k, v)| (*k, *v)));
            state.merged_into.insert(id, root);
            if let Some(root_loop) = loops.get_mut(&root) {
                merge(&state, root, root_loop, merged, &mapping);
                debug!(root = %root, merged = %id, iterations = root_loop.max_iterations(), "rolled loop");
            }
        }

        // Loops that read from or write into a merged body now talk to the root body.
        let remap = state.all_equivalents();
        for lv in loops.values_mut() {
            lv.remap_external(&remap);
        }

        let mut builder = DagBuilder::new();
        for v in dag.vertices() {
            if state.merged_into.contains_key(&v.id()) {
                continue;
            }
            let id = v.id();
            let mut v = v.clone();
            if let (Some(slot), Some(lv)) = (v.as_loop_mut(), loops.remove(&id)) {
                *slot = lv;
            }
            builder.add_vertex_like(v, &dag);
        }
        // Untouched edges keep their multiplicity; only edges re-targeted onto
        // a root loop collapse into one.
        let mut retargeted = Vec::new();
        for e in dag.edges() {
            let (src, dst) = (state.root_of(e.src()), state.root_of(e.dst()));
            if (src, dst) == (e.src(), e.dst()) {
                builder.connect_vertices(e.clone())?;
            } else {
                retargeted.push((e, src, dst));
            }
        }
        for (e, src, dst) in retargeted {
            if src == dst || builder.has_edge_between(src, dst) {
                continue;
            }
            builder.connect_vertices(e.reconnect(src, dst))?;
        }
        builder.build()
    }
}

/// Fold `merged` (already mapped onto the root body by `mapping`) into `root_loop`.
fn merge(
    state: &Rolling,
    root: VertexId,
    root_loop: &mut LoopVertex,
    mut merged: LoopVertex,
    mapping: &BTreeMap<VertexId, VertexId>,
) {
    root_loop.increase_max_iterations(merged.max_iterations());

    // Every later iteration reads the same way; the newest merge describes it.
    root_loop.clear_iterative_incoming_edges();
    root_loop.clear_non_iterative_incoming_edges();
    let dsts: Vec<VertexId> = merged.dag_incoming_edges().keys().copied().collect();
    for dst in dsts {
        for e in merged.take_dag_incoming_edges(dst) {
            let Some(equiv_dst) = mapping.get(&e.dst()).copied() else {
                continue;
            };
            match state.equiv(root, e.src()) {
                Some(equiv_src) => {
                    root_loop.add_iterative_incoming_edge(e.reconnect(equiv_src, equiv_dst));
                }
                None => {
                    root_loop.add_non_iterative_incoming_edge(e.reconnect(e.src(), equiv_dst));
                }
            }
        }
    }

    // The previous last iteration no longer feeds the merged body from outside.
    root_loop.retain_dag_outgoing_edges(|e| !mapping.contains_key(&e.dst()));
    let srcs: Vec<VertexId> = merged.dag_outgoing_edges().keys().copied().collect();
    for src in srcs {
        for e in merged.take_dag_outgoing_edges(src) {
            if let Some(equiv_src) = mapping.get(&e.src()).copied() {
                root_loop.add_dag_outgoing_edge(e.reconnect(equiv_src, e.dst()));
            }
        }
    }
}
