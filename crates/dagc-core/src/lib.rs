#![forbid(unsafe_code)]
//! dagc-core: the logical IR of the dagc dataflow compiler.
//!
//! Responsibilities:
//! - Strongly-typed ids for vertices, edges, stages and tasks.
//! - Execution properties (`ExecutionPropertyMap`) attached to vertices/edges.
//! - The vertex/edge IR, including composite loop vertices.
//! - `DagBuilder` and the validated, immutable `Dag` it produces.
//! - Compiler configuration, errors and stable hashing shared by the other crates.
//!
//! **No pass logic and no lowering** here; see `dagc-planner` and `dagc-stage`.

pub mod builder;
pub mod config;
pub mod dag;
pub mod error;
pub mod hash;
pub mod id;
pub mod ir;
pub mod loop_vertex;
pub mod prelude;
pub mod property;

pub use builder::DagBuilder;
pub use config::CompilerConfig;
pub use dag::Dag;
pub use error::{Error, Result};
