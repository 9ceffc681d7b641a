//! Graph description front ends.

pub mod yaml;
