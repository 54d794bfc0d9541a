//! Per-rank distribution metadata for a flat-format shard.
//!
//! A shard lists more entities than the rank owns: elements carry an owner
//! rank, and vertex rows are ordered internal, boundary, external. Internal
//! and boundary vertices form the *update range* (the rows this rank solves
//! for); external rows are ghosts managed by other ranks.

use crate::mesh_error::MeshBridgeError;
use crate::topology::ids::{FlatIndex, GlobalId};
use std::ops::Range;

/// Where a vertex row sits inside a shard.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VertexClass {
    /// Owned and referenced only by this rank.
    Internal,
    /// Owned by this rank and shared with neighbours.
    Boundary,
    /// Owned by another rank, present here as a ghost.
    External,
}

/// A set known across all ranks, even those holding none of its entries.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GlobalSet {
    pub id: i32,
    pub name: String,
}

/// Ownership and global numbering of one rank's shard.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShardDistribution {
    /// Rank that holds this shard.
    pub rank: usize,
    /// Number of ranks the mesh is partitioned across.
    pub num_ranks: usize,
    /// Owning rank of each flat element row.
    pub elem_owner: Vec<usize>,
    /// Global id of each flat vertex row.
    pub node_index_global: Vec<GlobalId>,
    /// Global id of each flat element row.
    pub elem_index_global: Vec<GlobalId>,
    pub num_internal_nodes: usize,
    pub num_boundary_nodes: usize,
    pub num_external_nodes: usize,
    /// Side sets present anywhere in the distributed mesh.
    pub side_sets_global: Vec<GlobalSet>,
    /// Node sets present anywhere in the distributed mesh.
    pub node_sets_global: Vec<GlobalSet>,
}

impl ShardDistribution {
    /// Distribution of a single-rank mesh: rank 0 owns everything and
    /// global ids equal flat rows.
    pub fn serial(num_nodes: usize, num_elems: usize) -> Self {
        Self {
            rank: 0,
            num_ranks: 1,
            elem_owner: vec![0; num_elems],
            node_index_global: (0..num_nodes as u64).map(GlobalId).collect(),
            elem_index_global: (0..num_elems as u64).map(GlobalId).collect(),
            num_internal_nodes: num_nodes,
            num_boundary_nodes: 0,
            num_external_nodes: 0,
            side_sets_global: Vec::new(),
            node_sets_global: Vec::new(),
        }
    }

    /// Number of vertex rows this rank updates (internal + boundary).
    pub fn update_vertex_count(&self) -> usize {
        self.num_internal_nodes + self.num_boundary_nodes
    }

    /// Total vertex rows in the shard, ghosts included.
    pub fn total_vertex_count(&self) -> usize {
        self.update_vertex_count() + self.num_external_nodes
    }

    /// Rows this rank updates.
    pub fn update_range(&self) -> Range<usize> {
        0..self.update_vertex_count()
    }

    /// Ghost rows managed by other ranks.
    pub fn external_range(&self) -> Range<usize> {
        self.update_vertex_count()..self.total_vertex_count()
    }

    /// Classify a vertex row by its position in the shard.
    pub fn vertex_class(&self, row: FlatIndex) -> Option<VertexClass> {
        let idx = row.idx();
        if idx < self.num_internal_nodes {
            Some(VertexClass::Internal)
        } else if idx < self.update_vertex_count() {
            Some(VertexClass::Boundary)
        } else if idx < self.total_vertex_count() {
            Some(VertexClass::External)
        } else {
            None
        }
    }

    /// Owning rank of an element row.
    pub fn element_owner(&self, elem: FlatIndex) -> Result<usize, MeshBridgeError> {
        self.elem_owner
            .get(elem.idx())
            .copied()
            .ok_or(MeshBridgeError::OutOfRange {
                what: "element owner array",
                index: elem.idx(),
                len: self.elem_owner.len(),
            })
    }

    /// Returns true if the element row is owned by this shard's rank.
    pub fn owns_element(&self, elem: FlatIndex) -> bool {
        self.elem_owner.get(elem.idx()) == Some(&self.rank)
    }

    /// Element rows owned by this rank, ascending.
    pub fn owned_elements(&self) -> impl Iterator<Item = FlatIndex> + '_ {
        self.elem_owner
            .iter()
            .enumerate()
            .filter(move |&(_, &owner)| owner == self.rank)
            .map(|(idx, _)| FlatIndex(idx))
    }

    /// Check the arrays against the shard's vertex/element counts.
    pub fn validate(&self, num_nodes: usize, num_elems: usize) -> Result<(), MeshBridgeError> {
        if self.node_index_global.len() != num_nodes {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "vertex global ids",
                expected: num_nodes,
                found: self.node_index_global.len(),
            });
        }
        if self.total_vertex_count() != num_nodes {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "internal+boundary+external vertices",
                expected: num_nodes,
                found: self.total_vertex_count(),
            });
        }
        if self.elem_owner.len() != num_elems {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "element owners",
                expected: num_elems,
                found: self.elem_owner.len(),
            });
        }
        if self.elem_index_global.len() != num_elems {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "element global ids",
                expected: num_elems,
                found: self.elem_index_global.len(),
            });
        }
        if let Some(&bad) = self.elem_owner.iter().find(|&&o| o >= self.num_ranks) {
            return Err(MeshBridgeError::InvariantViolation(format!(
                "element owner {bad} is not below rank count {}",
                self.num_ranks
            )));
        }
        Ok(())
    }
}
