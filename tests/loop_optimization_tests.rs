//! Loop extraction, rolling, invariant code motion and unrolling on an
//! alternating-least-squares style program.

mod common;

use common::{o2o, shuffle, signatures, Als};
use dagc_core::prelude::*;
use dagc_planner::pass::{
    LoopExtractionPass, LoopInvariantCodeMotionPass, LoopRollingPass, LoopUnrollingPass, Pass,
};

const ITERATIONS: usize = 3;

fn extracted(als: &Als) -> Dag {
    Pass::from(LoopExtractionPass).apply(als.dag()).unwrap()
}

fn rolled(als: &Als) -> Dag {
    Pass::from(LoopRollingPass).apply(extracted(als)).unwrap()
}

fn root_loop(dag: &Dag, id: VertexId) -> LoopVertex {
    dag.vertex(id).and_then(|v| v.as_loop()).cloned().unwrap()
}

#[test]
fn test_extraction_creates_one_loop_per_iteration() {
    let als = Als::new(ITERATIONS);
    let dag = extracted(&als);
    assert_eq!(dag.vertex_count(), Als::OUTSIDE + ITERATIONS);
    assert_eq!(dag.loop_vertices().len(), ITERATIONS);
    assert_eq!(dag.max_loop_depth(), 0);

    let first = root_loop(&dag, als.headers[0].id());
    assert_eq!(first.builder().vertex_count(), 2);
    let user = als.user_updates[0].id();
    let inputs: Vec<VertexId> = first.dag_incoming_edges()[&user].iter().map(|e| e.src()).collect();
    assert!(inputs.contains(&als.user_ratings.id()));
    assert!(inputs.contains(&als.init_factors.id()));
    // the first iteration feeds the second one's body
    let item = als.item_updates[0].id();
    assert_eq!(first.dag_outgoing_edges()[&item][0].dst(), als.user_updates[1].id());
    assert!(dag.has_edge_between(als.headers[0].id(), als.headers[1].id()));
}

#[test]
fn test_rolling_merges_iterations() {
    let als = Als::new(ITERATIONS);
    let dag = rolled(&als);
    assert_eq!(dag.vertex_count(), Als::OUTSIDE + 1);

    let root = root_loop(&dag, als.root_loop());
    assert_eq!(root.max_iterations(), ITERATIONS);

    let user = als.user_updates[0].id();
    let item = als.item_updates[0].id();
    let carried: Vec<(VertexId, VertexId)> = root
        .iterative_incoming_edges()
        .values()
        .flatten()
        .map(|e| (e.src(), e.dst()))
        .collect();
    assert_eq!(carried, vec![(item, user)]);

    let mut invariant: Vec<(VertexId, VertexId)> = root
        .non_iterative_incoming_edges()
        .values()
        .flatten()
        .map(|e| (e.src(), e.dst()))
        .collect();
    invariant.sort();
    let mut expected = vec![(als.user_ratings.id(), user), (als.item_ratings.id(), item)];
    expected.sort();
    assert_eq!(invariant, expected);

    // only the final iteration leaves the loop
    let out: Vec<VertexId> = root.dag_outgoing_edges().values().flatten().map(|e| e.dst()).collect();
    assert_eq!(out, vec![als.write.id()]);
    assert!(dag.has_edge_between(als.root_loop(), als.write.id()));
}

#[test]
fn test_rolling_keeps_parallel_edges_outside_loops() {
    let als = Als::new(ITERATIONS);
    let mut builder = als.builder.clone();
    let self_join = Vertex::operator("selfJoin");
    builder.add_vertex(self_join.clone());
    builder.connect_vertices(o2o(&als.parse, &self_join)).unwrap();
    builder.connect_vertices(shuffle(&als.parse, &self_join)).unwrap();

    let dag = Pass::from(LoopExtractionPass).apply(builder.build().unwrap()).unwrap();
    let out = Pass::from(LoopRollingPass).apply(dag).unwrap();
    let into_join: Vec<CommunicationPattern> = out
        .incoming_edges_of(self_join.id())
        .iter()
        .map(|e| e.pattern())
        .collect();
    assert_eq!(into_join.len(), 2);
    assert!(into_join.contains(&CommunicationPattern::OneToOne));
    assert!(into_join.contains(&CommunicationPattern::Shuffle));
    assert_eq!(out.edge_count(), rolled(&als).edge_count() + 2);
}

#[test]
fn test_rolling_leaves_different_loops_alone() {
    let als = Als::new(2);
    let mut builder = als.builder.clone();
    // A third loop with a different body shape hangs off the last iteration.
    let header = LoopHeader::new("ALS", 1);
    let extra = Vertex::operator("postProcess");
    builder.add_vertex_in_loop(extra.clone(), &header);
    builder.connect_vertices(shuffle(&als.item_updates[1], &extra)).unwrap();

    let dag = Pass::from(LoopExtractionPass).apply(builder.build().unwrap()).unwrap();
    let out = Pass::from(LoopRollingPass).apply(dag).unwrap();
    assert_eq!(out.loop_vertices().len(), 2);
    let post = root_loop(&out, header.id());
    // its input now comes from the rolled loop's body
    let src = post.dag_incoming_edges()[&extra.id()][0].src();
    assert_eq!(src, als.item_updates[0].id());
    assert!(out.has_edge_between(als.root_loop(), header.id()));
}

#[test]
fn test_licm_leaves_a_processed_loop_unchanged() {
    let als = Als::new(ITERATIONS);
    let dag = rolled(&als);
    let before = dag.vertex_count();
    let out = Pass::from(LoopInvariantCodeMotionPass).apply(dag).unwrap();
    assert_eq!(out.vertex_count(), before);
    assert_eq!(root_loop(&out, als.root_loop()).builder().vertex_count(), 2);

    let again = Pass::from(LoopInvariantCodeMotionPass).apply(out).unwrap();
    assert_eq!(again.vertex_count(), before);
}

/// Move `userRatings` into the rolled loop body, keeping all three
/// bookkeeping sites consistent, the way a naive front end might emit it.
fn with_invariant_inside(als: &Als, dag: &Dag) -> Dag {
    let loop_id = als.root_loop();
    let user = als.user_updates[0].id();
    let user_ratings = als.user_ratings.clone();
    let mut lv = root_loop(dag, loop_id);

    let mut moved = None;
    for e in lv.take_dag_incoming_edges(user) {
        if e.src() == user_ratings.id() {
            moved = Some(e);
        } else {
            lv.add_dag_incoming_edge(e);
        }
    }
    for e in lv.take_non_iterative_incoming_edges(user) {
        if e.src() != user_ratings.id() {
            lv.add_non_iterative_incoming_edge(e);
        }
    }
    let moved = moved.unwrap();
    let feed = dag.incoming_edges_of(user_ratings.id())[0].clone();

    lv.builder_mut().add_vertex(user_ratings.clone());
    lv.builder_mut().connect_vertices(moved).unwrap();
    lv.add_dag_incoming_edge(feed.clone());
    lv.add_non_iterative_incoming_edge(feed.clone());

    let mut builder = dag.to_builder();
    builder.remove_vertex(user_ratings.id()).unwrap();
    builder
        .connect_vertices(feed.reconnect(als.parse.id(), loop_id))
        .unwrap();
    *builder.vertex_mut(loop_id).unwrap().as_loop_mut().unwrap() = lv;
    builder.build().unwrap()
}

#[test]
fn test_licm_hoists_invariant_vertex_back_out() {
    let als = Als::new(ITERATIONS);
    let grouped = rolled(&als);
    let tampered = with_invariant_inside(&als, &grouped);
    assert_eq!(tampered.vertex_count(), grouped.vertex_count() - 1);

    let out = Pass::from(LoopInvariantCodeMotionPass).apply(tampered).unwrap();
    assert_eq!(out.vertex_count(), grouped.vertex_count());
    assert!(out.contains(als.user_ratings.id()));
    assert!(out.has_edge_between(als.parse.id(), als.user_ratings.id()));
    assert!(out.has_edge_between(als.user_ratings.id(), als.root_loop()));
    assert!(!out.has_edge_between(als.parse.id(), als.root_loop()));

    let lv = root_loop(&out, als.root_loop());
    assert_eq!(lv.builder().vertex_count(), 2);
    assert!(!lv.contains(als.user_ratings.id()));
    let user = als.user_updates[0].id();
    let srcs: Vec<VertexId> = lv.non_iterative_incoming_edges()[&user].iter().map(|e| e.src()).collect();
    assert_eq!(srcs, vec![als.user_ratings.id()]);

    // Re-applying converges on the same vertex count.
    let again = Pass::from(LoopInvariantCodeMotionPass).apply(out).unwrap();
    assert_eq!(again.vertex_count(), grouped.vertex_count());
}

#[test]
fn test_unrolling_rolled_loop() {
    let als = Als::new(ITERATIONS);
    let out = Pass::from(LoopUnrollingPass).apply(rolled(&als)).unwrap();
    assert_eq!(out.vertex_count(), Als::OUTSIDE + 2 * ITERATIONS);
    assert!(!out.contains_where(|v| v.is_loop()));

    let users: Vec<&Vertex> = out.topological_vertices().filter(|v| v.name() == "userUpdate").collect();
    assert_eq!(users.len(), ITERATIONS);
    // every iteration re-reads userRatings
    for u in &users {
        assert!(out.parents(u.id()).contains(&als.user_ratings.id()));
    }
    // only the first iteration reads initFactors
    let readers: Vec<VertexId> = out.children(als.init_factors.id());
    assert_eq!(readers, vec![users[0].id()]);
    // write hangs off exactly one itemUpdate
    let writers = out.parents(als.write.id());
    assert_eq!(writers.len(), 1);
    assert_eq!(out.vertex(writers[0]).map(|v| v.name()), Some("itemUpdate"));
}

#[test]
fn test_unrolling_without_rolling_keeps_shape() {
    let als = Als::new(ITERATIONS);
    let direct = Pass::from(LoopUnrollingPass).apply(extracted(&als)).unwrap();
    let via_rolling = Pass::from(LoopUnrollingPass).apply(rolled(&als)).unwrap();
    assert_eq!(direct.vertex_count(), via_rolling.vertex_count());
    assert_eq!(direct.edge_count(), via_rolling.edge_count());
    assert_eq!(signatures(&direct), signatures(&via_rolling));
    assert_eq!(signatures(&direct), signatures(&als.dag()));
}

#[test]
fn test_unrolling_nested_loops() {
    let outer = LoopHeader::new("outer", 2);
    let inner = LoopHeader::new("inner", 3).within(&outer);
    let s = Vertex::source("in");
    let a = Vertex::operator("a");
    let b = Vertex::operator("b");
    let w = Vertex::operator("write");

    let mut builder = DagBuilder::new();
    builder.add_vertex(s.clone());
    builder.add_vertex_in_loop(a.clone(), &outer);
    builder.add_vertex_in_loop(b.clone(), &inner);
    builder.add_vertex(w.clone());
    builder.connect_vertices(o2o(&s, &a)).unwrap();
    builder.connect_vertices(o2o(&a, &b)).unwrap();
    builder.connect_vertices(o2o(&b, &w)).unwrap();

    let extracted = Pass::from(LoopExtractionPass).apply(builder.build().unwrap()).unwrap();
    let out = Pass::from(LoopUnrollingPass).apply(extracted).unwrap();
    assert!(!out.contains_where(|v| v.is_loop()));
    let count = |name: &str| out.vertices().filter(|v| v.name() == name).count();
    assert_eq!(count("a"), 2);
    assert_eq!(count("b"), 2 * 3);
    assert_eq!(out.parents(w.id()).len(), 1);
}

#[test]
fn test_zero_iteration_loop_cannot_unroll() {
    let header = LoopHeader::new("never", 0);
    let s = Vertex::source("in");
    let a = Vertex::operator("a");
    let mut builder = DagBuilder::new();
    builder.add_vertex(s.clone());
    builder.add_vertex_in_loop(a.clone(), &header);
    builder.connect_vertices(o2o(&s, &a)).unwrap();

    let extracted = Pass::from(LoopExtractionPass).apply(builder.build().unwrap()).unwrap();
    let err = Pass::from(LoopUnrollingPass).apply(extracted).unwrap_err();
    assert!(matches!(err, Error::PassPrecondition { pass: "loop-unrolling", .. }));
}
