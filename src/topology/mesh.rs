//! Client-side view of the adaptive mesh.
//!
//! The bridge never owns the adaptive mesh's storage; it talks to it through
//! [`AdaptiveMesh`] (entity counts, connectivity, side adjacency, and named
//! tags) and builds it through [`MeshConstructor`]. Entity kinds are
//! addressed by dimension: 0 for vertices, `dim - 1` for sides, `dim` for
//! elements.

use crate::mesh_error::MeshBridgeError;
use crate::topology::class_sets::ClassSets;
use crate::topology::element::ElementFamily;
use crate::topology::ids::{ClassId, GlobalId, LocalId};

/// Tag holding each entity's classification id.
pub const CLASS_ID_TAG: &str = "class_id";
/// Tag holding each entity's classification dimension.
pub const CLASS_DIM_TAG: &str = "class_dim";
/// Vertex tag holding interleaved coordinates.
pub const COORDINATES_TAG: &str = "coordinates";
/// Tag holding global ids (vertices and elements).
pub const GLOBAL_TAG: &str = "global";
/// Vertex tag holding the owning rank.
pub const OWNER_TAG: &str = "owner";

/// Typed storage behind a tag.
#[derive(Clone, Debug, PartialEq)]
pub enum TagData {
    Real(Vec<f64>),
    Int(Vec<ClassId>),
    Byte(Vec<i8>),
    Global(Vec<GlobalId>),
}

impl TagData {
    pub fn len(&self) -> usize {
        match self {
            TagData::Real(v) => v.len(),
            TagData::Int(v) => v.len(),
            TagData::Byte(v) => v.len(),
            TagData::Global(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named per-entity array with `ncomps` values per entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub ncomps: usize,
    pub data: TagData,
}

/// Scalar types that can be stored in a [`Tag`].
pub trait TagValue: Copy + Sized + 'static {
    fn wrap(values: Vec<Self>) -> TagData;
    fn view(data: &TagData) -> Option<&[Self]>;
}

macro_rules! tag_value {
    ($ty:ty, $variant:ident) => {
        impl TagValue for $ty {
            fn wrap(values: Vec<Self>) -> TagData {
                TagData::$variant(values)
            }
            fn view(data: &TagData) -> Option<&[Self]> {
                match data {
                    TagData::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

tag_value!(f64, Real);
tag_value!(ClassId, Int);
tag_value!(i8, Byte);
tag_value!(GlobalId, Global);

/// Upward adjacency from sides to elements in compressed rows.
///
/// Row `s` lists the elements containing side `s` together with the local
/// side index the side has inside each element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SideAdjacency {
    pub offsets: Vec<usize>,
    pub elements: Vec<LocalId>,
    pub which_side: Vec<u8>,
}

impl SideAdjacency {
    /// `(element, local side)` pairs adjacent to `side`.
    pub fn row(&self, side: LocalId) -> impl Iterator<Item = (LocalId, usize)> + '_ {
        let range = self.offsets[side.idx()]..self.offsets[side.idx() + 1];
        self.elements[range.clone()]
            .iter()
            .copied()
            .zip(self.which_side[range].iter().map(|&w| usize::from(w)))
    }

    /// Number of elements adjacent to `side`.
    pub fn degree(&self, side: LocalId) -> usize {
        self.offsets[side.idx() + 1] - self.offsets[side.idx()]
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Narrow interface to an adaptive mesh.
///
/// Implementors provide storage and topology; the tag helpers (`add_tag`,
/// `set_tag`, `get_array`, ...) are provided on top of [`AdaptiveMesh::tag`]
/// and [`AdaptiveMesh::insert_tag`] and validate tag lengths.
pub trait AdaptiveMesh {
    /// Spatial and topological dimension (2 or 3).
    fn dim(&self) -> usize;
    fn family(&self) -> ElementFamily;
    fn nverts(&self) -> usize;
    fn nelems(&self) -> usize;
    /// Number of sides (edges in 2D, faces in 3D).
    fn nsides(&self) -> usize;

    /// Element → vertex connectivity, `dim + 1` entries per element.
    fn elem_verts(&self) -> &[LocalId];
    /// Side → vertex connectivity, `dim` entries per side.
    fn side_verts(&self) -> &[LocalId];
    /// Element → side connectivity in local side order.
    fn elem_sides(&self) -> &[LocalId];
    /// Side → element upward adjacency.
    fn side_elems(&self) -> &SideAdjacency;

    /// Named surface/region sets carried by the mesh.
    fn class_sets(&self) -> &ClassSets;
    fn class_sets_mut(&mut self) -> &mut ClassSets;

    /// Raw tag lookup.
    fn tag(&self, dim: usize, name: &str) -> Option<&Tag>;
    /// Store or replace a tag without validation.
    fn insert_tag(&mut self, dim: usize, name: &str, tag: Tag);
    /// Remove a tag, returning whether it existed.
    fn remove_tag(&mut self, dim: usize, name: &str) -> bool;
    /// Names of the tags stored on `dim`, sorted.
    fn tag_names(&self, dim: usize) -> Vec<String>;

    /// Entity count for a dimension.
    fn nents(&self, dim: usize) -> Result<usize, MeshBridgeError> {
        let mesh_dim = self.dim();
        if dim == 0 {
            Ok(self.nverts())
        } else if dim == mesh_dim {
            Ok(self.nelems())
        } else if dim + 1 == mesh_dim {
            Ok(self.nsides())
        } else {
            Err(MeshBridgeError::UnsupportedEntityDimension(dim))
        }
    }

    fn has_tag(&self, dim: usize, name: &str) -> bool {
        self.tag(dim, name).is_some()
    }

    /// Add (or replace) a tag after checking its length against `nents(dim)`.
    fn add_tag<T: TagValue>(
        &mut self,
        dim: usize,
        name: &str,
        ncomps: usize,
        values: Vec<T>,
    ) -> Result<(), MeshBridgeError> {
        let expected = self.nents(dim)? * ncomps;
        if values.len() != expected {
            return Err(MeshBridgeError::TagLengthMismatch {
                dim,
                name: name.to_string(),
                expected,
                found: values.len(),
            });
        }
        self.insert_tag(
            dim,
            name,
            Tag {
                ncomps,
                data: T::wrap(values),
            },
        );
        Ok(())
    }

    /// Overwrite an existing tag, keeping its component count.
    fn set_tag<T: TagValue>(
        &mut self,
        dim: usize,
        name: &str,
        values: Vec<T>,
    ) -> Result<(), MeshBridgeError> {
        let ncomps = self
            .tag(dim, name)
            .map(|tag| tag.ncomps)
            .ok_or_else(|| MeshBridgeError::MissingTag {
                dim,
                name: name.to_string(),
            })?;
        self.add_tag(dim, name, ncomps, values)
    }

    /// Typed view of a tag's values.
    fn get_array<T: TagValue>(&self, dim: usize, name: &str) -> Result<&[T], MeshBridgeError> {
        let tag = self.tag(dim, name).ok_or_else(|| MeshBridgeError::MissingTag {
            dim,
            name: name.to_string(),
        })?;
        T::view(&tag.data).ok_or_else(|| {
            MeshBridgeError::InvariantViolation(format!(
                "tag \"{name}\" on dimension {dim} has a different value type"
            ))
        })
    }

    /// Global ids of vertices (`dim == 0`) or elements (`dim == self.dim()`).
    fn globals(&self, dim: usize) -> Result<&[GlobalId], MeshBridgeError> {
        self.get_array::<GlobalId>(dim, GLOBAL_TAG)
    }

    /// Interleaved vertex coordinates, `dim` values per vertex.
    fn coords(&self) -> Result<&[f64], MeshBridgeError> {
        self.get_array::<f64>(0, COORDINATES_TAG)
    }

    fn add_coords(&mut self, coords: Vec<f64>) -> Result<(), MeshBridgeError> {
        let dim = self.dim();
        self.add_tag(0, COORDINATES_TAG, dim, coords)
    }

    /// Owning rank of each vertex.
    fn vertex_owners(&self) -> Result<&[ClassId], MeshBridgeError> {
        self.get_array::<ClassId>(0, OWNER_TAG)
    }
}

/// Inputs to the external mesh-construction primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstructionInput {
    pub family: ElementFamily,
    pub dim: usize,
    /// Element → vertex connectivity over `0..vert_globals.len()`.
    pub elem_verts: Vec<LocalId>,
    /// Global id of each input vertex.
    pub vert_globals: Vec<GlobalId>,
    /// Global id of each input element.
    pub elem_globals: Vec<GlobalId>,
}

/// Builds an adaptive mesh from element → vertex connectivity.
///
/// Implementations reconcile shared vertices across ranks and may renumber
/// vertices and elements freely; callers recover the correspondence through
/// [`AdaptiveMesh::globals`].
pub trait MeshConstructor {
    type Mesh: AdaptiveMesh;

    fn build_from_elems2verts(
        &self,
        input: ConstructionInput,
    ) -> Result<Self::Mesh, MeshBridgeError>;
}
