//! Cluster membership as seen by the migration.

pub mod registry;

pub use registry::{InMemoryNodeRegistry, NodeRegistry, NodeSnapshot};
