//! Execution properties: the typed metadata attached to every vertex and edge.
//!
//! An `ExecutionPropertyMap` holds at most one value per `PropertyKey`. Passes
//! read and write these entries; the stage partitioner and the runtime read
//! them to decide grouping, placement and how data moves between tasks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How records are redistributed across an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CommunicationPattern {
    OneToOne,
    Broadcast,
    Shuffle,
}

/// Whether the consumer pulls data or the producer pushes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataFlowModel {
    Pull,
    Push,
}

/// Where intermediate data lives between producer and consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataStore {
    Memory,
    SerializedMemory,
    LocalFile,
    RemoteFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Partitioner {
    Hash,
    /// Keeps the producer's partitioning untouched.
    Intact,
}

/// Kind of executor a vertex must run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExecutorPlacement {
    Any,
    Transient,
    Reserved,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricCollection {
    /// Collect partition sizes so a runtime pass can rebalance skewed keys.
    DataSkew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKey {
    CommunicationPattern,
    DataFlowModel,
    DataStore,
    Partitioner,
    Parallelism,
    ExecutorPlacement,
    StageId,
    MetricCollection,
}

/// A single keyed value. The variant determines the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionProperty {
    CommunicationPattern(CommunicationPattern),
    DataFlowModel(DataFlowModel),
    DataStore(DataStore),
    Partitioner(Partitioner),
    Parallelism(usize),
    ExecutorPlacement(ExecutorPlacement),
    StageId(u32),
    MetricCollection(MetricCollection),
}

impl ExecutionProperty {
    pub fn key(&self) -> PropertyKey {
        match self {
            ExecutionProperty::CommunicationPattern(_) => PropertyKey::CommunicationPattern,
            ExecutionProperty::DataFlowModel(_) => PropertyKey::DataFlowModel,
            ExecutionProperty::DataStore(_) => PropertyKey::DataStore,
            ExecutionProperty::Partitioner(_) => PropertyKey::Partitioner,
            ExecutionProperty::Parallelism(_) => PropertyKey::Parallelism,
            ExecutionProperty::ExecutorPlacement(_) => PropertyKey::ExecutorPlacement,
            ExecutionProperty::StageId(_) => PropertyKey::StageId,
            ExecutionProperty::MetricCollection(_) => PropertyKey::MetricCollection,
        }
    }

    fn value_string(&self) -> String {
        match self {
            ExecutionProperty::CommunicationPattern(v) => format!("{:?}", v),
            ExecutionProperty::DataFlowModel(v) => format!("{:?}", v),
            ExecutionProperty::DataStore(v) => format!("{:?}", v),
            ExecutionProperty::Partitioner(v) => format!("{:?}", v),
            ExecutionProperty::Parallelism(v) => v.to_string(),
            ExecutionProperty::ExecutorPlacement(v) => format!("{:?}", v),
            ExecutionProperty::StageId(v) => v.to_string(),
            ExecutionProperty::MetricCollection(v) => format!("{:?}", v),
        }
    }
}

/// Property store of one vertex or edge.
///
/// Equality compares key by key and ignores `owner`: two maps are equal when
/// every key maps to the same value in both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPropertyMap {
    owner: String,
    properties: BTreeMap<PropertyKey, ExecutionProperty>,
}

impl ExecutionPropertyMap {
    /// Empty map for the vertex or edge identified by `owner`.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Defaults for a freshly created vertex: parallelism 1, no placement constraint.
    pub fn for_vertex(owner: impl Into<String>) -> Self {
        let mut map = Self::new(owner);
        map.put(ExecutionProperty::Parallelism(1));
        map.put(ExecutionProperty::ExecutorPlacement(ExecutorPlacement::Any));
        map
    }

    /// Defaults for a freshly created edge with the given communication pattern.
    pub fn for_edge(owner: impl Into<String>, pattern: CommunicationPattern) -> Self {
        let mut map = Self::new(owner);
        map.put(ExecutionProperty::CommunicationPattern(pattern));
        map.put(ExecutionProperty::DataFlowModel(DataFlowModel::Pull));
        let (partitioner, store) = match pattern {
            CommunicationPattern::Shuffle => (Partitioner::Hash, DataStore::LocalFile),
            CommunicationPattern::Broadcast => (Partitioner::Intact, DataStore::LocalFile),
            CommunicationPattern::OneToOne => (Partitioner::Intact, DataStore::Memory),
        };
        map.put(ExecutionProperty::Partitioner(partitioner));
        map.put(ExecutionProperty::DataStore(store));
        map
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Insert `property`, returning whatever was stored under its key before.
    pub fn put(&mut self, property: ExecutionProperty) -> Option<ExecutionProperty> {
        self.properties.insert(property.key(), property)
    }

    pub fn get(&self, key: PropertyKey) -> Option<&ExecutionProperty> {
        self.properties.get(&key)
    }

    pub fn remove(&mut self, key: PropertyKey) -> Option<ExecutionProperty> {
        self.properties.remove(&key)
    }

    pub fn contains_key(&self, key: PropertyKey) -> bool {
        self.properties.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionProperty> {
        self.properties.values()
    }

    /// Copy every entry into `other`, overwriting what it already holds.
    pub fn copy_into(&self, other: &mut ExecutionPropertyMap) {
        for p in self.properties.values() {
            other.put(*p);
        }
    }

    pub fn communication_pattern(&self) -> Option<CommunicationPattern> {
        match self.get(PropertyKey::CommunicationPattern) {
            Some(ExecutionProperty::CommunicationPattern(v)) => Some(*v),
            _ => None,
        }
    }

    /// Defaults to `Pull`; push is always opt-in.
    pub fn data_flow_model(&self) -> DataFlowModel {
        match self.get(PropertyKey::DataFlowModel) {
            Some(ExecutionProperty::DataFlowModel(v)) => *v,
            _ => DataFlowModel::Pull,
        }
    }

    pub fn data_store(&self) -> Option<DataStore> {
        match self.get(PropertyKey::DataStore) {
            Some(ExecutionProperty::DataStore(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn partitioner(&self) -> Option<Partitioner> {
        match self.get(PropertyKey::Partitioner) {
            Some(ExecutionProperty::Partitioner(v)) => Some(*v),
            _ => None,
        }
    }

    /// Defaults to 1.
    pub fn parallelism(&self) -> usize {
        match self.get(PropertyKey::Parallelism) {
            Some(ExecutionProperty::Parallelism(v)) => *v,
            _ => 1,
        }
    }

    /// Defaults to `Any`.
    pub fn executor_placement(&self) -> ExecutorPlacement {
        match self.get(PropertyKey::ExecutorPlacement) {
            Some(ExecutionProperty::ExecutorPlacement(v)) => *v,
            _ => ExecutorPlacement::Any,
        }
    }

    pub fn stage_id(&self) -> Option<u32> {
        match self.get(PropertyKey::StageId) {
            Some(ExecutionProperty::StageId(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn metric_collection(&self) -> Option<MetricCollection> {
        match self.get(PropertyKey::MetricCollection) {
            Some(ExecutionProperty::MetricCollection(v)) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for ExecutionPropertyMap {
    fn eq(&self, other: &Self) -> bool {
        self.properties == other.properties
    }
}

impl Eq for ExecutionPropertyMap {}

impl std::hash::Hash for ExecutionPropertyMap {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.properties.hash(state);
    }
}

impl fmt::Display for ExecutionPropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.properties.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{:?}\": \"{}\"", key, value.value_string())?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_returns_previous_value() {
        let mut map = ExecutionPropertyMap::new("v1");
        assert_eq!(map.put(ExecutionProperty::Parallelism(4)), None);
        assert_eq!(
            map.put(ExecutionProperty::Parallelism(8)),
            Some(ExecutionProperty::Parallelism(4))
        );
        assert_eq!(map.parallelism(), 8);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_absent_keys_fall_back_to_defaults() {
        let map = ExecutionPropertyMap::new("e1");
        assert_eq!(map.data_flow_model(), DataFlowModel::Pull);
        assert_eq!(map.parallelism(), 1);
        assert_eq!(map.executor_placement(), ExecutorPlacement::Any);
        assert_eq!(map.data_store(), None);
        assert_eq!(map.stage_id(), None);
    }

    #[test]
    fn test_remove_and_contains() {
        let mut map = ExecutionPropertyMap::for_vertex("v1");
        assert!(map.contains_key(PropertyKey::Parallelism));
        assert_eq!(
            map.remove(PropertyKey::Parallelism),
            Some(ExecutionProperty::Parallelism(1))
        );
        assert!(!map.contains_key(PropertyKey::Parallelism));
        assert_eq!(map.remove(PropertyKey::Parallelism), None);
    }

    #[test]
    fn test_edge_defaults_per_pattern() {
        let o2o = ExecutionPropertyMap::for_edge("e1", CommunicationPattern::OneToOne);
        assert_eq!(o2o.partitioner(), Some(Partitioner::Intact));
        assert_eq!(o2o.data_store(), Some(DataStore::Memory));
        assert_eq!(o2o.data_flow_model(), DataFlowModel::Pull);

        let shuffle = ExecutionPropertyMap::for_edge("e2", CommunicationPattern::Shuffle);
        assert_eq!(shuffle.partitioner(), Some(Partitioner::Hash));
        assert_eq!(shuffle.data_store(), Some(DataStore::LocalFile));

        let broadcast = ExecutionPropertyMap::for_edge("e3", CommunicationPattern::Broadcast);
        assert_eq!(broadcast.partitioner(), Some(Partitioner::Intact));
        assert_eq!(broadcast.data_store(), Some(DataStore::LocalFile));
    }

    #[test]
    fn test_equality_is_keywise() {
        // Same multiset of values under swapped keys must not compare equal.
        let mut a = ExecutionPropertyMap::new("a");
        a.put(ExecutionProperty::Parallelism(2));
        a.put(ExecutionProperty::StageId(3));

        let mut b = ExecutionPropertyMap::new("b");
        b.put(ExecutionProperty::Parallelism(3));
        b.put(ExecutionProperty::StageId(2));
        assert_ne!(a, b);

        let mut c = ExecutionPropertyMap::new("c");
        c.put(ExecutionProperty::StageId(3));
        c.put(ExecutionProperty::Parallelism(2));
        assert_eq!(a, c);
    }

    #[test]
    fn test_display_lists_keys_in_order() {
        let map = ExecutionPropertyMap::for_vertex("v1");
        assert_eq!(
            map.to_string(),
            "{\"Parallelism\": \"1\", \"ExecutorPlacement\": \"Any\"}"
        );
    }
}
