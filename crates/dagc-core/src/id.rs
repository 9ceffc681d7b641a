//! Strongly-typed identifiers used across the compiler.
//!
//! Downstream crates (stage, planner) should *not* use raw integers for IDs.
//! Vertex and edge ids come from a process-wide counter so that copies made by
//! reshaping passes never collide with the originals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(VertexId);
new_id!(EdgeId);
new_id!(StageId);
new_id!(TaskId);

static NEXT_VERTEX: AtomicU64 = AtomicU64::new(0);
static NEXT_EDGE: AtomicU64 = AtomicU64::new(0);

impl VertexId {
    /// Allocate an id that no other vertex in this process carries.
    pub fn fresh() -> Self {
        Self(NEXT_VERTEX.fetch_add(1, Ordering::Relaxed))
    }
}

impl EdgeId {
    /// Allocate an id that no other edge in this process carries.
    pub fn fresh() -> Self {
        Self(NEXT_EDGE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sequential allocator for ids that are only unique within one lowering run.
#[derive(Debug, Default)]
pub struct IdSequence(u64);

impl IdSequence {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next_stage(&mut self) -> StageId {
        let id = StageId(self.0);
        self.0 += 1;
        id
    }

    pub fn next_task(&mut self) -> TaskId {
        let id = TaskId(self.0);
        self.0 += 1;
        id
    }
}
