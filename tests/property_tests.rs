//! Execution property defaults and map semantics as seen through the IR.

use dagc_core::prelude::*;

#[test]
fn test_fresh_vertex_defaults() {
    for v in [Vertex::source("in"), Vertex::operator("map")] {
        let props = v.properties();
        assert_eq!(props.parallelism(), 1);
        assert_eq!(props.executor_placement(), ExecutorPlacement::Any);
        assert_eq!(props.stage_id(), None);
        assert_eq!(props.owner(), v.id().to_string());
    }
}

#[test]
fn test_fresh_edge_defaults_follow_pattern() {
    let a = Vertex::source("in");
    let b = Vertex::operator("map");

    let o2o = Edge::new(CommunicationPattern::OneToOne, a.id(), b.id(), Coder::bytes());
    assert_eq!(o2o.properties().partitioner(), Some(Partitioner::Intact));
    assert_eq!(o2o.properties().data_store(), Some(DataStore::Memory));

    let shuffle = Edge::new(CommunicationPattern::Shuffle, a.id(), b.id(), Coder::bytes());
    assert_eq!(shuffle.properties().partitioner(), Some(Partitioner::Hash));
    assert_eq!(shuffle.properties().data_store(), Some(DataStore::LocalFile));

    let broadcast = Edge::new(CommunicationPattern::Broadcast, a.id(), b.id(), Coder::bytes());
    assert_eq!(broadcast.properties().partitioner(), Some(Partitioner::Intact));
    assert_eq!(broadcast.properties().data_store(), Some(DataStore::LocalFile));

    for e in [&o2o, &shuffle, &broadcast] {
        assert_eq!(e.properties().data_flow_model(), DataFlowModel::Pull);
        assert!(!e.is_side_input());
    }
}

#[test]
fn test_put_overwrites_and_reports_previous() {
    let mut v = Vertex::operator("map");
    let previous = v
        .properties_mut()
        .put(ExecutionProperty::ExecutorPlacement(ExecutorPlacement::Reserved));
    assert_eq!(
        previous,
        Some(ExecutionProperty::ExecutorPlacement(ExecutorPlacement::Any))
    );
    assert_eq!(v.properties().executor_placement(), ExecutorPlacement::Reserved);
    assert_eq!(
        v.properties().get(PropertyKey::ExecutorPlacement),
        Some(&ExecutionProperty::ExecutorPlacement(ExecutorPlacement::Reserved))
    );
}

#[test]
fn test_removed_key_reads_default() {
    let mut v = Vertex::operator("map");
    v.properties_mut().put(ExecutionProperty::Parallelism(12));
    v.properties_mut().remove(PropertyKey::Parallelism);
    assert!(!v.properties().contains_key(PropertyKey::Parallelism));
    assert_eq!(v.properties().parallelism(), 1);
}

#[test]
fn test_maps_compare_by_key_not_by_value_set() {
    let mut a = ExecutionPropertyMap::new("a");
    a.put(ExecutionProperty::DataStore(DataStore::Memory));
    a.put(ExecutionProperty::Parallelism(4));
    a.put(ExecutionProperty::StageId(4));

    let mut b = ExecutionPropertyMap::new("b");
    b.put(ExecutionProperty::DataStore(DataStore::Memory));
    b.put(ExecutionProperty::Parallelism(4));
    assert_ne!(a, b);

    b.put(ExecutionProperty::StageId(4));
    assert_eq!(a, b);

    b.put(ExecutionProperty::StageId(5));
    assert_ne!(a, b);
}

#[test]
fn test_property_map_serde_round_trip_preserves_equality() {
    let mut map = ExecutionPropertyMap::for_edge("e", CommunicationPattern::Shuffle);
    map.put(ExecutionProperty::MetricCollection(MetricCollection::DataSkew));
    let json = serde_json::to_string(&map).unwrap();
    let back: ExecutionPropertyMap = serde_json::from_str(&json).unwrap();
    assert_eq!(back, map);
    assert_eq!(back.owner(), "e");
    assert_eq!(back.len(), map.len());
}
