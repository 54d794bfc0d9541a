//! Mesh topology vocabulary shared by both sides of the bridge.
//!
//! - [`ids`]: strong handles for flat rows, global ids and adaptive-mesh ids
//! - [`element`]: element families, the flat-format type vocabulary, side templates
//! - [`side_convention`]: flat ↔ adaptive-mesh local side numbering
//! - [`ownership`]: per-rank shard distribution metadata
//! - [`class_sets`]: named surface/region sets
//! - [`mesh`]: the adaptive-mesh client interface and construction trait
//! - [`in_memory`]: an in-process implementation of both

pub mod class_sets;
pub mod element;
pub mod ids;
pub mod in_memory;
pub mod mesh;
pub mod ownership;
pub mod side_convention;

pub use class_sets::{ClassPair, ClassSets};
pub use element::{ElementFamily, ElementType};
pub use ids::{ClassId, FlatIndex, GlobalId, LocalId};
pub use in_memory::{InMemoryMesh, SerialConstructor};
pub use mesh::{AdaptiveMesh, ConstructionInput, MeshConstructor, Tag, TagData, TagValue};
pub use ownership::{GlobalSet, ShardDistribution, VertexClass};
