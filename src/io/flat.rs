//! In-memory model of a flat-format shard.
//!
//! Element rows are numbered by concatenating the blocks in file order, so a
//! [`FlatIndex`] for an element is its position across all blocks. All
//! connectivity and set entries are 0-based here; codecs apply the 1-based
//! offset on disk.

use crate::mesh_error::MeshBridgeError;
use crate::topology::element::{ElementType, NULL_BLOCK_TYPE};
use crate::topology::ids::FlatIndex;
use crate::topology::ownership::ShardDistribution;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Longest title the flat format stores.
pub const MAX_TITLE_LEN: usize = 80;

/// Base of the integer ids written to node/element id maps.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdBase {
    Zero,
    #[default]
    One,
}

impl IdBase {
    pub fn offset(self) -> u64 {
        match self {
            IdBase::Zero => 0,
            IdBase::One => 1,
        }
    }
}

/// One element block: a run of elements of a single type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementBlock {
    pub id: i32,
    /// Type name as found in the file (aliases allowed).
    pub elem_type: String,
    pub name: Option<String>,
    pub nodes_per_elem: usize,
    /// Vertex rows, `nodes_per_elem` per element.
    pub connectivity: Vec<FlatIndex>,
}

impl ElementBlock {
    pub fn num_elems(&self) -> usize {
        if self.nodes_per_elem == 0 {
            0
        } else {
            self.connectivity.len() / self.nodes_per_elem
        }
    }

    /// Empty placeholder blocks some generators emit.
    pub fn is_null(&self) -> bool {
        self.elem_type.trim() == NULL_BLOCK_TYPE && self.connectivity.is_empty()
    }

    /// Resolved element type; fails for names outside the vocabulary.
    pub fn element_type(&self) -> Result<ElementType, MeshBridgeError> {
        ElementType::from_name(&self.elem_type)
    }

    /// Vertex rows of the `local`-th element of this block.
    pub fn element(&self, local: usize) -> &[FlatIndex] {
        &self.connectivity[local * self.nodes_per_elem..(local + 1) * self.nodes_per_elem]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSet {
    pub id: i32,
    pub name: Option<String>,
    pub nodes: Vec<FlatIndex>,
}

/// Side set entries are `(element row, flat side index)` pairs; side
/// indices follow the flat-format convention and start at 1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSet {
    pub id: i32,
    pub name: Option<String>,
    pub elements: Vec<FlatIndex>,
    pub sides: Vec<i32>,
}

impl SideSet {
    pub fn entries(&self) -> impl Iterator<Item = (FlatIndex, i32)> + '_ {
        self.elements.iter().copied().zip(self.sides.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// One rank's flat-format mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatMesh {
    pub title: String,
    pub dim: usize,
    /// One coordinate array per spatial dimension.
    pub coords: Vec<Vec<f64>>,
    pub blocks: Vec<ElementBlock>,
    pub node_sets: Vec<NodeSet>,
    pub side_sets: Vec<SideSet>,
    /// Optional user-facing vertex ids (empty when absent).
    pub node_id_map: Vec<u64>,
    /// Optional user-facing element ids (empty when absent).
    pub elem_id_map: Vec<u64>,
}

impl FlatMesh {
    pub fn num_nodes(&self) -> usize {
        self.coords.first().map_or(0, Vec::len)
    }

    pub fn num_elems(&self) -> usize {
        self.blocks.iter().map(ElementBlock::num_elems).sum()
    }

    /// Element row range covered by each block, in block order.
    pub fn block_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0;
        self.blocks
            .iter()
            .map(|b| {
                let range = start..start + b.num_elems();
                start = range.end;
                range
            })
            .collect()
    }

    /// Block index and block-local offset of an element row.
    pub fn locate_element(&self, elem: FlatIndex) -> Option<(usize, usize)> {
        let mut start = 0;
        for (b, block) in self.blocks.iter().enumerate() {
            let n = block.num_elems();
            if elem.idx() < start + n {
                return Some((b, elem.idx() - start));
            }
            start += n;
        }
        None
    }

    /// Vertex rows of an element row.
    pub fn element_nodes(&self, elem: FlatIndex) -> Result<&[FlatIndex], MeshBridgeError> {
        let (b, local) = self.locate_element(elem).ok_or(MeshBridgeError::OutOfRange {
            what: "element rows",
            index: elem.idx(),
            len: self.num_elems(),
        })?;
        Ok(self.blocks[b].element(local))
    }

    /// Title clipped to [`MAX_TITLE_LEN`] characters.
    pub fn stored_title(&self) -> &str {
        match self.title.char_indices().nth(MAX_TITLE_LEN) {
            Some((cut, _)) => &self.title[..cut],
            None => &self.title,
        }
    }

    /// Structural consistency of arrays and references.
    pub fn validate(&self) -> Result<(), MeshBridgeError> {
        if self.coords.len() != self.dim {
            return Err(MeshBridgeError::DimensionMismatch {
                block: -1,
                expected: self.dim,
                found: self.coords.len(),
            });
        }
        let num_nodes = self.num_nodes();
        if let Some(axis) = self.coords.iter().find(|c| c.len() != num_nodes) {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "coordinate values",
                expected: num_nodes,
                found: axis.len(),
            });
        }
        for block in &self.blocks {
            if block.nodes_per_elem > 0 && block.connectivity.len() % block.nodes_per_elem != 0 {
                return Err(MeshBridgeError::Parse(format!(
                    "block {} connectivity length {} is not a multiple of {}",
                    block.id,
                    block.connectivity.len(),
                    block.nodes_per_elem
                )));
            }
            check_rows("block connectivity", &block.connectivity, num_nodes)?;
        }
        for set in &self.node_sets {
            check_rows("node set", &set.nodes, num_nodes)?;
        }
        let num_elems = self.num_elems();
        for set in &self.side_sets {
            if set.elements.len() != set.sides.len() {
                return Err(MeshBridgeError::Parse(format!(
                    "side set {} has {} elements but {} sides",
                    set.id,
                    set.elements.len(),
                    set.sides.len()
                )));
            }
            check_rows("side set", &set.elements, num_elems)?;
        }
        for (what, map, len) in [
            ("node id map", &self.node_id_map, num_nodes),
            ("element id map", &self.elem_id_map, num_elems),
        ] {
            if !map.is_empty() && map.len() != len {
                return Err(MeshBridgeError::VertexCountMismatch {
                    what,
                    expected: len,
                    found: map.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_rows(what: &'static str, rows: &[FlatIndex], len: usize) -> Result<(), MeshBridgeError> {
    match rows.iter().find(|r| r.idx() >= len) {
        Some(bad) => Err(MeshBridgeError::OutOfRange {
            what,
            index: bad.idx(),
            len,
        }),
        None => Ok(()),
    }
}

/// A flat mesh together with its rank's distribution metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatShard {
    pub mesh: FlatMesh,
    pub dist: ShardDistribution,
}

impl FlatShard {
    /// Wrap a single-rank mesh with a serial distribution.
    pub fn serial(mesh: FlatMesh) -> Self {
        let dist = ShardDistribution::serial(mesh.num_nodes(), mesh.num_elems());
        Self { mesh, dist }
    }

    pub fn validate(&self) -> Result<(), MeshBridgeError> {
        self.mesh.validate()?;
        self.dist
            .validate(self.mesh.num_nodes(), self.mesh.num_elems())
    }
}
