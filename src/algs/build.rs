//! Mesh Builder: flat shard → adaptive mesh.
//!
//! Selects the elements a rank is responsible for, packs the vertices they
//! reference into a dense numbering, hands the connectivity and global ids
//! to a [`MeshConstructor`], and attaches coordinates to whatever vertex
//! order the constructor chose.

use crate::data::translator::{DenseRenumbering, IndexTranslator};
use crate::io::flat::{FlatMesh, FlatShard};
use crate::mesh_error::MeshBridgeError;
use crate::topology::element::{ElementFamily, ElementType};
use crate::topology::ids::{FlatIndex, GlobalId, LocalId};
use crate::topology::mesh::{AdaptiveMesh, ConstructionInput, MeshConstructor};

/// Result of building an adaptive mesh from a shard.
#[derive(Debug)]
pub struct BuiltMesh<M> {
    pub mesh: M,
    /// Flat ↔ mesh correspondence for this conversion.
    pub translator: IndexTranslator,
    pub element_type: ElementType,
    /// Flat element rows represented in the mesh, ascending.
    pub elements: Vec<FlatIndex>,
}

/// Resolve the single element type shared by every non-empty block.
///
/// `NULL` blocks without elements are ignored. A shard without any typed
/// block falls back to the simplex type of its dimension.
pub fn resolve_element_type(flat: &FlatMesh) -> Result<ElementType, MeshBridgeError> {
    let mut resolved: Option<ElementType> = None;
    for block in &flat.blocks {
        if block.is_null() {
            log::debug!("skipping empty NULL block {}", block.id);
            continue;
        }
        let ty = block.element_type()?;
        if let Some(expected) = resolved {
            if ty.dimension() != expected.dimension() {
                return Err(MeshBridgeError::DimensionMismatch {
                    block: block.id,
                    expected: expected.dimension(),
                    found: ty.dimension(),
                });
            }
        }
        if block.nodes_per_elem != ty.nodes_per_element() {
            return Err(MeshBridgeError::NodesPerElementMismatch {
                block: block.id,
                expected: ty.nodes_per_element(),
                found: block.nodes_per_elem,
            });
        }
        resolved = Some(ty);
    }
    let ty = match resolved {
        Some(ty) => ty,
        None => ElementType::for_family(ElementFamily::Simplex, flat.dim).ok_or_else(|| {
            MeshBridgeError::UnsupportedElementType(format!("simplex in {}D", flat.dim))
        })?,
    };
    if ty.dimension() != flat.dim {
        return Err(MeshBridgeError::DimensionMismatch {
            block: -1,
            expected: flat.dim,
            found: ty.dimension(),
        });
    }
    Ok(ty)
}

/// Build the mesh of the elements this rank owns.
///
/// Only vertices referenced by owned elements enter the mesh; ghost rows
/// that no owned element touches are left out.
pub fn build_owned_mesh<C: MeshConstructor>(
    shard: &FlatShard,
    constructor: &C,
) -> Result<BuiltMesh<C::Mesh>, MeshBridgeError> {
    shard.validate()?;
    let elements: Vec<FlatIndex> = shard.dist.owned_elements().collect();
    let mut referenced = Vec::with_capacity(elements.len() * (shard.mesh.dim + 1));
    for &e in &elements {
        referenced.extend_from_slice(shard.mesh.element_nodes(e)?);
    }
    let vertices = DenseRenumbering::from_referenced(referenced);
    log::info!(
        "rank {}/{}: building from {} of {} elements, {} of {} vertices",
        shard.dist.rank,
        shard.dist.num_ranks,
        elements.len(),
        shard.mesh.num_elems(),
        vertices.len(),
        shard.mesh.num_nodes()
    );
    construct(shard, elements, vertices, constructor)
}

/// Build a single-rank mesh from every element of the shard.
///
/// Vertices are the update range (internal + boundary rows); an element
/// referencing a ghost row is rejected.
pub fn build_serial_mesh<C: MeshConstructor>(
    shard: &FlatShard,
    constructor: &C,
) -> Result<BuiltMesh<C::Mesh>, MeshBridgeError> {
    shard.validate()?;
    let update = shard.dist.update_vertex_count();
    let elements: Vec<FlatIndex> = (0..shard.mesh.num_elems()).map(FlatIndex).collect();
    for &e in &elements {
        if let Some(ghost) = shard.mesh.element_nodes(e)?.iter().find(|r| r.idx() >= update) {
            return Err(MeshBridgeError::OutOfRange {
                what: "update vertex range",
                index: ghost.idx(),
                len: update,
            });
        }
    }
    let vertices = DenseRenumbering::from_referenced((0..update).map(FlatIndex));
    log::info!(
        "serial build: {} elements, {} vertices",
        elements.len(),
        vertices.len()
    );
    construct(shard, elements, vertices, constructor)
}

fn construct<C: MeshConstructor>(
    shard: &FlatShard,
    elements: Vec<FlatIndex>,
    vertices: DenseRenumbering,
    constructor: &C,
) -> Result<BuiltMesh<C::Mesh>, MeshBridgeError> {
    let flat = &shard.mesh;
    let element_type = resolve_element_type(flat)?;
    let dim = element_type.dimension();
    let translator = IndexTranslator::new(&shard.dist)?;

    let mut elem_verts = Vec::with_capacity(elements.len() * element_type.nodes_per_element());
    for &e in &elements {
        for row in flat.element_nodes(e)? {
            let new = vertices.new_of(*row).ok_or_else(|| {
                MeshBridgeError::InvariantViolation(format!(
                    "element row {e} references vertex row {row} outside the build set"
                ))
            })?;
            elem_verts.push(LocalId(new));
        }
    }
    let vert_globals = vertices
        .old_ids()
        .iter()
        .map(|&row| translator.vertex_globals().global_of(row))
        .collect::<Result<Vec<GlobalId>, _>>()?;
    let elem_globals = elements
        .iter()
        .map(|&e| translator.element_globals().global_of(e))
        .collect::<Result<Vec<GlobalId>, _>>()?;

    let mut mesh = constructor.build_from_elems2verts(ConstructionInput {
        family: element_type.family(),
        dim,
        elem_verts,
        vert_globals,
        elem_globals,
    })?;

    if mesh.nverts() != vertices.len() {
        return Err(MeshBridgeError::VertexCountMismatch {
            what: "vertices",
            expected: vertices.len(),
            found: mesh.nverts(),
        });
    }
    if mesh.nelems() != elements.len() {
        return Err(MeshBridgeError::VertexCountMismatch {
            what: "elements",
            expected: elements.len(),
            found: mesh.nelems(),
        });
    }

    let mut coords = Vec::with_capacity(mesh.nverts() * dim);
    for &gid in mesh.globals(0)? {
        let row = translator.vertex_globals().flat_of(gid).ok_or_else(|| {
            MeshBridgeError::InvariantViolation(format!(
                "constructed vertex with global id {gid} has no row in this shard"
            ))
        })?;
        coords.extend(flat.coords.iter().map(|axis| axis[row.idx()]));
    }
    mesh.add_coords(coords)?;

    let translator = translator.with_mesh(&mesh)?;
    Ok(BuiltMesh {
        mesh,
        translator,
        element_type,
        elements,
    })
}
