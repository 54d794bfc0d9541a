//! Element families and the flat-format element type vocabulary.

use crate::mesh_error::MeshBridgeError;
use std::fmt;

/// Topological family of a mesh. One family per mesh object.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementFamily {
    /// Triangles in 2D, tetrahedra in 3D.
    Simplex,
    /// Quadrilaterals in 2D, hexahedra in 3D.
    Hypercube,
}

impl fmt::Display for ElementFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementFamily::Simplex => f.write_str("simplex"),
            ElementFamily::Hypercube => f.write_str("hypercube"),
        }
    }
}

/// Element types accepted in flat-format element blocks.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ElementType {
    /// Linear triangle (3 nodes).
    Tri3,
    /// Linear tetrahedron (4 nodes).
    Tetra4,
}

/// Block type used by some generators for empty placeholder blocks.
pub const NULL_BLOCK_TYPE: &str = "NULL";

impl ElementType {
    /// Resolve a block type name, including historical aliases.
    pub fn from_name(name: &str) -> Result<Self, MeshBridgeError> {
        match name.trim() {
            "tri3" | "TRI" | "TRI3" => Ok(ElementType::Tri3),
            "tetra4" | "TETRA" | "TET4" => Ok(ElementType::Tetra4),
            other => Err(MeshBridgeError::UnsupportedElementType(other.to_string())),
        }
    }

    /// Canonical name written to flat-format files.
    pub fn file_name(self) -> &'static str {
        match self {
            ElementType::Tri3 => "tri3",
            ElementType::Tetra4 => "tetra4",
        }
    }

    /// Element type of the given family and dimension, if it is supported.
    pub fn for_family(family: ElementFamily, dim: usize) -> Option<Self> {
        match (family, dim) {
            (ElementFamily::Simplex, 2) => Some(ElementType::Tri3),
            (ElementFamily::Simplex, 3) => Some(ElementType::Tetra4),
            _ => None,
        }
    }

    pub fn family(self) -> ElementFamily {
        ElementFamily::Simplex
    }

    /// Spatial (and topological) dimension of the element.
    pub fn dimension(self) -> usize {
        match self {
            ElementType::Tri3 => 2,
            ElementType::Tetra4 => 3,
        }
    }

    /// Number of vertices per element.
    pub fn nodes_per_element(self) -> usize {
        self.dimension() + 1
    }
}

/// Local vertex lists of each side, in the adaptive mesh's side order.
///
/// Triangle edges are `[0,1] [1,2] [2,0]`; tetrahedron faces are
/// `[0,2,1] [0,1,3] [1,2,3] [2,0,3]`.
pub fn simplex_side_template(dim: usize) -> Option<&'static [&'static [usize]]> {
    static TRI: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
    static TET: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[2, 0, 3]];
    match dim {
        2 => Some(TRI),
        3 => Some(TET),
        _ => None,
    }
}
