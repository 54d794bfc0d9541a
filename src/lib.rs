#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-adapt-bridge
//!
//! mesh-adapt-bridge converts between a block/set-based distributed mesh
//! file (element blocks, node sets, side sets, per-rank shards) and an
//! adaptive, classification-bearing mesh representation, so a PDE solver can
//! hand its mesh and fields to an adaptation library and take them back.
//!
//! ## Stages
//! - [`algs::build`]: reconstruct the adaptive mesh from the elements a rank owns
//! - [`algs::classify`]: assign `class_id`/`class_dim` to elements and sides
//!   from blocks, side sets, node sets and exposure
//! - [`algs::metric`]: isotropic target sizes from a level-set field
//! - [`algs::transport`]: per-vertex solver values to mesh tags and back
//! - [`algs::serialize`]: classified mesh back to a flat shard, plus the
//!   write/release/re-read/rebuild bracket
//! - [`algs::adapt`]: the whole cycle around a pluggable [`MeshAdapter`]
//!
//! Entities that live on another rank are never errors: lookups return
//! `None` and the stages skip them. Every other failure is a
//! [`MeshBridgeError`].
//!
//! ## Features
//! - `rayon`: generate metric tensors on the rayon pool.
//!
//! [`MeshAdapter`]: crate::algs::adapt::MeshAdapter
//! [`MeshBridgeError`]: crate::mesh_error::MeshBridgeError

pub mod algs;
pub mod config;
pub mod data;
pub mod io;
pub mod mesh_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::adapt::{
        AdaptContext, AdaptationRequest, MeshAdapter, PassThroughAdapter, adapt_step,
    };
    pub use crate::algs::build::{build_owned_mesh, build_serial_mesh};
    pub use crate::algs::classify::{ClassifyOptions, SetPrecedence, classify};
    pub use crate::algs::metric::{LevelSetMetricConfig, MetricEncoding};
    pub use crate::algs::serialize::{SerializeOptions, mesh_to_flat, rewrite_shard};
    pub use crate::algs::transport::{copy_from_mesh, transport_to_mesh};
    pub use crate::config::BridgeConfig;
    pub use crate::data::fields::{FieldDescriptor, SolutionStore, SolutionVector, SolverBookkeeping};
    pub use crate::data::translator::IndexTranslator;
    pub use crate::io::{FlatMeshReader, FlatMeshWriter, FlatShard, TextFlatReader, TextFlatWriter};
    pub use crate::mesh_error::{ErrorKind, MeshBridgeError};
    pub use crate::topology::{
        AdaptiveMesh, ClassPair, ElementFamily, FlatIndex, GlobalId, InMemoryMesh, LocalId,
        MeshConstructor, SerialConstructor,
    };
}
