//! Serializer: classified adaptive mesh → flat shard, and the rewrite bracket.
//!
//! Vertex rows list owned vertices first (mesh order) and ghosts after.
//! Elements become one block per region id, sides with a surface id become
//! one side set (or node set) per id, and every row carries its global id so
//! shards of different ranks stay joinable.

use crate::algs::classify::{
    ClassifyWith, EXPOSED_SIDE_ID, block_name, region_groups, surface_groups, surface_name,
    surface_names,
};
use crate::data::fields::SolverBookkeeping;
use crate::io::flat::{ElementBlock, FlatMesh, FlatShard, IdBase, NodeSet, SideSet};
use crate::io::{FlatMeshReader, FlatMeshWriter};
use crate::mesh_error::MeshBridgeError;
use crate::topology::class_sets::ClassPair;
use crate::topology::element::ElementType;
use crate::topology::ids::{ClassId, FlatIndex, GlobalId, LocalId};
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::ownership::{GlobalSet, ShardDistribution};
use crate::topology::side_convention::mesh_to_flat_side;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializeOptions {
    pub title: String,
    pub rank: usize,
    pub num_ranks: usize,
    #[serde(default)]
    pub id_base: IdBase,
    /// Surfaces are written as side sets when side sets classify, as node
    /// sets otherwise.
    #[serde(default)]
    pub classify_with: ClassifyWith,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            rank: 0,
            num_ranks: 1,
            id_base: IdBase::default(),
            classify_with: ClassifyWith::default(),
        }
    }
}

/// Vertex rows of the serialized shard.
struct VertexRows {
    row_of: Vec<FlatIndex>,
    order: Vec<LocalId>,
    owned: usize,
}

fn vertex_rows<M: AdaptiveMesh>(mesh: &M, rank: usize) -> VertexRows {
    let owners = mesh.vertex_owners().ok();
    let is_owned = |v: usize| owners.is_none_or(|o| usize::try_from(o[v]).ok() == Some(rank));
    let (owned, ghosts): (Vec<LocalId>, Vec<LocalId>) =
        (0..mesh.nverts()).map(LocalId).partition(|v| is_owned(v.idx()));
    let owned_count = owned.len();
    let order: Vec<LocalId> = owned.into_iter().chain(ghosts).collect();
    let mut row_of = vec![FlatIndex(0); mesh.nverts()];
    for (row, v) in order.iter().enumerate() {
        row_of[v.idx()] = FlatIndex(row);
    }
    VertexRows {
        row_of,
        order,
        owned: owned_count,
    }
}

/// Walk a classified mesh back into a flat shard.
pub fn mesh_to_flat<M: AdaptiveMesh>(
    mesh: &M,
    options: &SerializeOptions,
) -> Result<FlatShard, MeshBridgeError> {
    let dim = mesh.dim();
    let deg = dim + 1;
    let element_type = ElementType::for_family(mesh.family(), dim).ok_or_else(|| {
        MeshBridgeError::UnsupportedElementType(format!("{} mesh in {dim}D", mesh.family()))
    })?;
    let vert_globals = mesh.globals(0)?;
    let elem_globals = mesh.globals(dim)?;
    let coords = mesh.coords()?;

    let rows = vertex_rows(mesh, options.rank);
    let mut flat = FlatMesh {
        title: options.title.clone(),
        dim,
        coords: vec![Vec::with_capacity(mesh.nverts()); dim],
        ..Default::default()
    };
    for v in &rows.order {
        for (d, axis) in flat.coords.iter_mut().enumerate() {
            axis.push(coords[v.idx() * dim + d]);
        }
    }

    // one block per region id, ascending
    let mut elem_row_of = vec![FlatIndex(0); mesh.nelems()];
    let mut elem_order = Vec::with_capacity(mesh.nelems());
    let elem_verts = mesh.elem_verts();
    for (id, elems) in region_groups(mesh)? {
        let name = mesh
            .class_sets()
            .name_of(ClassPair::new(dim, id))
            .map_or_else(|| block_name(id), str::to_string);
        let mut connectivity = Vec::with_capacity(elems.len() * deg);
        for &e in &elems {
            elem_row_of[e.idx()] = FlatIndex(elem_order.len());
            elem_order.push(e);
            connectivity.extend(
                elem_verts[e.idx() * deg..(e.idx() + 1) * deg]
                    .iter()
                    .map(|v| rows.row_of[v.idx()]),
            );
        }
        log::info!("block {id} \"{name}\": {} elements", elems.len());
        flat.blocks.push(ElementBlock {
            id,
            elem_type: element_type.file_name().to_string(),
            name: Some(name),
            nodes_per_elem: deg,
            connectivity,
        });
    }

    // surfaces: named pairs known to the mesh plus every surface id in use
    let names = surface_names(mesh);
    let groups = surface_groups(mesh)?;
    let mut known: BTreeMap<ClassId, String> = names
        .iter()
        .filter(|(id, _)| **id != EXPOSED_SIDE_ID)
        .map(|(&id, name)| (id, name.clone()))
        .collect();
    for &id in groups.keys() {
        known.entry(id).or_insert_with(|| surface_name(id));
    }

    let as_side_sets = options.classify_with.side_sets || !options.classify_with.node_sets;
    let side_verts = mesh.side_verts();
    let adj = mesh.side_elems();
    for (&id, name) in &known {
        let sides = groups.get(&id).map_or(&[][..], Vec::as_slice);
        if as_side_sets {
            let mut set = SideSet {
                id,
                name: Some(name.clone()),
                ..Default::default()
            };
            for &side in sides {
                let (elem, which) = adj
                    .row(side)
                    .next()
                    .ok_or(MeshBridgeError::OrphanedSide { side: side.idx() })?;
                set.elements.push(elem_row_of[elem.idx()]);
                set.sides
                    .push(mesh_to_flat_side(mesh.family(), dim, which)?);
            }
            log::info!("side set {id} \"{name}\": {} sides", set.len());
            flat.side_sets.push(set);
        } else {
            let mut nodes: Vec<FlatIndex> = sides
                .iter()
                .flat_map(|s| &side_verts[s.idx() * dim..(s.idx() + 1) * dim])
                .map(|v| rows.row_of[v.idx()])
                .collect();
            nodes.sort_unstable();
            nodes.dedup();
            log::info!("node set {id} \"{name}\": {} nodes", nodes.len());
            flat.node_sets.push(NodeSet {
                id,
                name: Some(name.clone()),
                nodes,
            });
        }
    }

    let base = options.id_base.offset();
    let node_index_global: Vec<GlobalId> = rows.order.iter().map(|v| vert_globals[v.idx()]).collect();
    let elem_index_global: Vec<GlobalId> = elem_order.iter().map(|e| elem_globals[e.idx()]).collect();
    flat.node_id_map = node_index_global.iter().map(|g| g.get() + base).collect();
    flat.elem_id_map = elem_index_global.iter().map(|g| g.get() + base).collect();

    let global_sets: Vec<GlobalSet> = known
        .into_iter()
        .map(|(id, name)| GlobalSet { id, name })
        .collect();
    let (side_sets_global, node_sets_global) = if as_side_sets {
        (global_sets, Vec::new())
    } else {
        (Vec::new(), global_sets)
    };
    let dist = ShardDistribution {
        rank: options.rank,
        num_ranks: options.num_ranks,
        elem_owner: vec![options.rank; elem_order.len()],
        node_index_global,
        elem_index_global,
        num_internal_nodes: rows.owned,
        num_boundary_nodes: 0,
        num_external_nodes: rows.order.len() - rows.owned,
        side_sets_global,
        node_sets_global,
    };
    let shard = FlatShard { mesh: flat, dist };
    shard.validate()?;
    Ok(shard)
}

/// Write `shard` to `path`, then rebuild solver bookkeeping from the file.
///
/// The bookkeeping is released only after the write succeeded, and nothing
/// else can reach it until it has been rebuilt from the re-read shard.
pub fn rewrite_shard<W, R, B>(
    path: &Path,
    shard: &FlatShard,
    writer: &W,
    reader: &R,
    bookkeeping: &mut B,
) -> Result<FlatShard, MeshBridgeError>
where
    W: FlatMeshWriter,
    R: FlatMeshReader,
    B: SolverBookkeeping + ?Sized,
{
    writer.write_path(path, shard)?;
    log::info!("wrote {}", path.display());
    bookkeeping.release();
    let reread = reader.read_path(path)?;
    bookkeeping.rebuild(&reread)?;
    Ok(reread)
}
