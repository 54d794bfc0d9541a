//! Classification Engine.
//!
//! Tags every element and side of a freshly built mesh with a
//! `(class_id, class_dim)` pair and fills the mesh's [`ClassSets`]:
//!
//! 1. elements take the id of their flat-format block at the mesh dimension;
//! 2. sides adjacent to one element are exposed: `(0, dim - 1)`; interior
//!    sides take the region of their lowest-numbered element at `dim`;
//! 3. node sets and side sets overwrite sides at `dim - 1` with surface ids
//!    from a [`SurfaceIdAllocator`], in the order fixed by [`SetPrecedence`].
//!
//! Sets that exist elsewhere in the distributed mesh but resolve to nothing
//! on this rank still get a name entry.

use crate::data::translator::IndexTranslator;
use crate::io::flat::{FlatMesh, FlatShard};
use crate::mesh_error::MeshBridgeError;
use crate::topology::class_sets::ClassPair;
use crate::topology::element::simplex_side_template;
use crate::topology::ids::{ClassId, FlatIndex, LocalId};
use crate::topology::mesh::{AdaptiveMesh, CLASS_DIM_TAG, CLASS_ID_TAG};
use crate::topology::side_convention::flat_to_mesh_side;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification id of exposed sides no set claims.
pub const EXPOSED_SIDE_ID: ClassId = 0;

/// Which flat-format set kinds classify sides.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassifyWith {
    pub side_sets: bool,
    pub node_sets: bool,
}

impl Default for ClassifyWith {
    fn default() -> Self {
        Self {
            side_sets: true,
            node_sets: true,
        }
    }
}

/// Order in which set kinds are applied; later applications overwrite.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetPrecedence {
    /// Node sets first, then side sets: side sets win on shared sides.
    #[default]
    SideSetsLast,
    /// Side sets first, then node sets.
    NodeSetsLast,
}

/// How side-set entries become mesh sides.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideSetResolution {
    /// Translate each `(element, side)` pair; entries on elements this rank
    /// does not own are skipped.
    #[default]
    ElementSides,
    /// Collect the vertices of every listed side and mark each mesh side
    /// whose vertices all lie in that list.
    NodeLists,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClassifyOptions {
    #[serde(default)]
    pub classify_with: ClassifyWith,
    #[serde(default)]
    pub precedence: SetPrecedence,
    #[serde(default)]
    pub side_set_resolution: SideSetResolution,
}

/// Origin of a surface id.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum SurfaceKey {
    Side(i32),
    Node(i32),
}

/// Bijection between flat-format set ids and surface classification ids.
///
/// Side-set ids are kept verbatim. Node-set ids are kept verbatim when side
/// sets do not classify; otherwise the `k`-th node set (ascending id, from 1)
/// becomes `max_side_set_id + k`. No set may land on [`EXPOSED_SIDE_ID`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceIdAllocator {
    by_key: BTreeMap<SurfaceKey, ClassId>,
    by_id: BTreeMap<ClassId, SurfaceKey>,
}

impl SurfaceIdAllocator {
    pub fn new(
        side_set_ids: &[i32],
        node_set_ids: &[i32],
        with: ClassifyWith,
    ) -> Result<Self, MeshBridgeError> {
        let mut alloc = Self::default();
        let mut sides: Vec<i32> = side_set_ids.to_vec();
        sides.sort_unstable();
        sides.dedup();
        let mut nodes: Vec<i32> = node_set_ids.to_vec();
        nodes.sort_unstable();
        nodes.dedup();

        let classify_sides = with.side_sets && !sides.is_empty();
        if classify_sides {
            for &id in &sides {
                alloc.insert(SurfaceKey::Side(id), id)?;
            }
        }
        if with.node_sets {
            let base = if classify_sides {
                sides.last().copied().unwrap_or(0)
            } else {
                0
            };
            for (ordinal, &id) in nodes.iter().enumerate() {
                let surface = if classify_sides {
                    base.checked_add(ordinal as i32 + 1).ok_or_else(|| {
                        MeshBridgeError::InvariantViolation(format!(
                            "surface id for node set {id} overflows"
                        ))
                    })?
                } else {
                    id
                };
                alloc.insert(SurfaceKey::Node(id), surface)?;
            }
        }
        if let Some(key) = alloc.key_of(EXPOSED_SIDE_ID) {
            return Err(MeshBridgeError::InvariantViolation(format!(
                "{key:?} would take surface id {EXPOSED_SIDE_ID}, reserved for exposed sides"
            )));
        }
        Ok(alloc)
    }

    fn insert(&mut self, key: SurfaceKey, id: ClassId) -> Result<(), MeshBridgeError> {
        if let Some(other) = self.by_id.insert(id, key) {
            return Err(MeshBridgeError::InvariantViolation(format!(
                "surface id {id} allocated to both {other:?} and {key:?}"
            )));
        }
        self.by_key.insert(key, id);
        Ok(())
    }

    pub fn id_of(&self, key: SurfaceKey) -> Option<ClassId> {
        self.by_key.get(&key).copied()
    }

    pub fn key_of(&self, id: ClassId) -> Option<SurfaceKey> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// Per-name counts of what classification resolved on this rank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Sides resolved per surface name (zero for sets absent on this rank).
    pub resolved_sides: BTreeMap<String, usize>,
    /// Elements per region name.
    pub region_elements: BTreeMap<String, usize>,
    pub exposed_sides: usize,
    pub interior_sides: usize,
}

/// Fallback name of an unnamed block.
pub fn block_name(id: i32) -> String {
    format!("block_{id}")
}

/// Fallback name of an unnamed surface.
pub fn surface_name(id: ClassId) -> String {
    format!("surface_{id}")
}

fn pick_name(name: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => fallback(),
    }
}

/// A set known to the distributed mesh, with its local entries if any.
struct KnownSet {
    id: i32,
    name: Option<String>,
    local: Option<usize>,
}

fn known_sets<'a>(
    local: impl Iterator<Item = (i32, Option<&'a str>)>,
    global: &[crate::topology::ownership::GlobalSet],
) -> Vec<KnownSet> {
    let mut sets: BTreeMap<i32, KnownSet> = BTreeMap::new();
    for (pos, (id, name)) in local.enumerate() {
        sets.insert(
            id,
            KnownSet {
                id,
                name: name.map(str::to_string),
                local: Some(pos),
            },
        );
    }
    for g in global {
        sets.entry(g.id).or_insert_with(|| KnownSet {
            id: g.id,
            name: (!g.name.is_empty()).then(|| g.name.clone()),
            local: None,
        });
    }
    sets.into_values().collect()
}

/// Classify elements and sides of `mesh` from the shard's blocks and sets.
pub fn classify<M: AdaptiveMesh>(
    mesh: &mut M,
    shard: &FlatShard,
    translator: &IndexTranslator,
    options: &ClassifyOptions,
) -> Result<ClassificationReport, MeshBridgeError> {
    let dim = mesh.dim();
    let flat = &shard.mesh;
    let mut report = ClassificationReport::default();

    classify_regions(mesh, flat, translator, &mut report)?;
    let (mut side_ids, mut side_dims) = classify_by_exposure(mesh, &mut report)?;

    let sides = known_sets(
        flat.side_sets.iter().map(|s| (s.id, s.name.as_deref())),
        &shard.dist.side_sets_global,
    );
    let nodes = known_sets(
        flat.node_sets.iter().map(|s| (s.id, s.name.as_deref())),
        &shard.dist.node_sets_global,
    );
    let side_ids_known: Vec<i32> = sides.iter().map(|s| s.id).collect();
    let node_ids_known: Vec<i32> = nodes.iter().map(|s| s.id).collect();
    let alloc = SurfaceIdAllocator::new(&side_ids_known, &node_ids_known, options.classify_with)?;

    let mut order: Vec<(SurfaceKey, &KnownSet)> = Vec::new();
    let node_pass = nodes.iter().map(|s| (SurfaceKey::Node(s.id), s));
    let side_pass = sides.iter().map(|s| (SurfaceKey::Side(s.id), s));
    match options.precedence {
        SetPrecedence::SideSetsLast => order.extend(node_pass.chain(side_pass)),
        SetPrecedence::NodeSetsLast => order.extend(side_pass.chain(node_pass)),
    }

    for (key, set) in order {
        let Some(surface) = alloc.id_of(key) else {
            continue;
        };
        let resolved = match (key, set.local) {
            (SurfaceKey::Node(_), Some(pos)) => {
                let rows = &flat.node_sets[pos].nodes;
                sides_within(mesh, translator, rows.iter().copied())
            }
            (SurfaceKey::Side(_), Some(pos)) => {
                resolve_side_set(mesh, flat, translator, pos, options.side_set_resolution)?
            }
            (_, None) => Vec::new(),
        };
        let name = pick_name(set.name.as_deref(), || surface_name(surface));
        for &side in &resolved {
            side_ids[side.idx()] = surface;
            side_dims[side.idx()] = (dim - 1) as i8;
        }
        log::info!(
            "{key:?} \"{name}\" is surface {surface} with {} sides on this rank",
            resolved.len()
        );
        mesh.class_sets_mut()
            .register(&name, ClassPair::new(dim - 1, surface));
        *report.resolved_sides.entry(name).or_default() += resolved.len();
    }

    mesh.add_tag(dim - 1, CLASS_ID_TAG, 1, side_ids)?;
    mesh.add_tag(dim - 1, CLASS_DIM_TAG, 1, side_dims)?;
    Ok(report)
}

fn classify_regions<M: AdaptiveMesh>(
    mesh: &mut M,
    flat: &FlatMesh,
    translator: &IndexTranslator,
    report: &mut ClassificationReport,
) -> Result<(), MeshBridgeError> {
    let dim = mesh.dim();
    let mut block_of_row = vec![0i32; flat.num_elems()];
    for (block, range) in flat.blocks.iter().zip(flat.block_ranges()) {
        block_of_row[range].fill(block.id);
    }

    let mut elem_ids = Vec::with_capacity(mesh.nelems());
    for e in (0..mesh.nelems()).map(LocalId) {
        let row = translator.flat_element(e).ok_or_else(|| {
            MeshBridgeError::InvariantViolation(format!("mesh element {e} has no flat row"))
        })?;
        elem_ids.push(block_of_row[row.idx()]);
    }

    for block in flat.blocks.iter().filter(|b| !b.is_null()) {
        let name = pick_name(block.name.as_deref(), || block_name(block.id));
        let count = elem_ids.iter().filter(|&&id| id == block.id).count();
        log::info!(
            "block {} \"{name}\": {count} elements of type {} on this rank",
            block.id,
            block.elem_type
        );
        mesh.class_sets_mut()
            .register(&name, ClassPair::new(dim, block.id));
        *report.region_elements.entry(name).or_default() += count;
    }

    mesh.add_tag(dim, CLASS_ID_TAG, 1, elem_ids)?;
    mesh.add_tag(dim, CLASS_DIM_TAG, 1, vec![dim as i8; mesh.nelems()])?;
    Ok(())
}

fn classify_by_exposure<M: AdaptiveMesh>(
    mesh: &M,
    report: &mut ClassificationReport,
) -> Result<(Vec<ClassId>, Vec<i8>), MeshBridgeError> {
    let dim = mesh.dim();
    let elem_ids = mesh.get_array::<ClassId>(dim, CLASS_ID_TAG)?;
    let adj = mesh.side_elems();
    let mut ids = Vec::with_capacity(mesh.nsides());
    let mut dims = Vec::with_capacity(mesh.nsides());
    for side in (0..mesh.nsides()).map(LocalId) {
        match adj.degree(side) {
            0 => return Err(MeshBridgeError::OrphanedSide { side: side.idx() }),
            1 => {
                ids.push(EXPOSED_SIDE_ID);
                dims.push((dim - 1) as i8);
                report.exposed_sides += 1;
            }
            _ => {
                let owner = adj
                    .row(side)
                    .map(|(e, _)| e)
                    .min()
                    .ok_or(MeshBridgeError::OrphanedSide { side: side.idx() })?;
                ids.push(elem_ids[owner.idx()]);
                dims.push(dim as i8);
                report.interior_sides += 1;
            }
        }
    }
    Ok((ids, dims))
}

/// Sides whose every vertex is among `rows`; rows absent here are skipped.
fn sides_within<M: AdaptiveMesh>(
    mesh: &M,
    translator: &IndexTranslator,
    rows: impl Iterator<Item = FlatIndex>,
) -> Vec<LocalId> {
    let mut marked = vec![false; mesh.nverts()];
    let mut absent = 0usize;
    for row in rows {
        match translator.mesh_vertex(row) {
            Some(v) => marked[v.idx()] = true,
            None => absent += 1,
        }
    }
    if absent > 0 {
        log::debug!("{absent} set vertices are not on this rank");
    }
    mesh.side_verts()
        .chunks_exact(mesh.dim())
        .enumerate()
        .filter(|(_, verts)| verts.iter().all(|v| marked[v.idx()]))
        .map(|(s, _)| LocalId(s))
        .collect()
}

fn resolve_side_set<M: AdaptiveMesh>(
    mesh: &M,
    flat: &FlatMesh,
    translator: &IndexTranslator,
    pos: usize,
    resolution: SideSetResolution,
) -> Result<Vec<LocalId>, MeshBridgeError> {
    let set = &flat.side_sets[pos];
    let family = mesh.family();
    let dim = mesh.dim();
    let sides_per_elem = dim + 1;

    let mut translated = Vec::with_capacity(set.len());
    for (elem, flat_side) in set.entries() {
        translated.push((elem, flat_to_mesh_side(family, dim, flat_side)?));
    }

    match resolution {
        SideSetResolution::ElementSides => {
            let elem_sides = mesh.elem_sides();
            let mut seen = HashSet::new();
            let mut out = Vec::new();
            let mut skipped = 0usize;
            for (elem, mesh_side) in translated {
                match translator.mesh_element(elem) {
                    Some(e) => {
                        let side = elem_sides[e.idx() * sides_per_elem + mesh_side];
                        if seen.insert(side) {
                            out.push(side);
                        }
                    }
                    None => skipped += 1,
                }
            }
            if skipped > 0 {
                log::debug!("side set {}: {skipped} entries on elements not owned here", set.id);
            }
            out.sort_unstable();
            Ok(out)
        }
        SideSetResolution::NodeLists => {
            let template = simplex_side_template(dim).ok_or_else(|| {
                MeshBridgeError::UnsupportedSideConvention {
                    family: family.to_string(),
                    dim,
                    side: -1,
                }
            })?;
            let mut rows = Vec::new();
            for (elem, mesh_side) in translated {
                let nodes = flat.element_nodes(elem)?;
                rows.extend(template[mesh_side].iter().map(|&l| nodes[l]));
            }
            Ok(sides_within(mesh, translator, rows.into_iter()))
        }
    }
}

/// Group sides by surface id: `class_dim == dim - 1` and a non-sentinel id.
pub fn surface_groups<M: AdaptiveMesh>(
    mesh: &M,
) -> Result<BTreeMap<ClassId, Vec<LocalId>>, MeshBridgeError> {
    let dim = mesh.dim();
    let ids = mesh.get_array::<ClassId>(dim - 1, CLASS_ID_TAG)?;
    let dims = mesh.get_array::<i8>(dim - 1, CLASS_DIM_TAG)?;
    let mut groups: BTreeMap<ClassId, Vec<LocalId>> = BTreeMap::new();
    for (s, (&id, &d)) in ids.iter().zip(dims).enumerate() {
        if usize::try_from(d).ok() == Some(dim - 1) && id != EXPOSED_SIDE_ID {
            groups.entry(id).or_default().push(LocalId(s));
        }
    }
    Ok(groups)
}

/// Group elements by region id.
pub fn region_groups<M: AdaptiveMesh>(
    mesh: &M,
) -> Result<BTreeMap<ClassId, Vec<LocalId>>, MeshBridgeError> {
    let ids = mesh.get_array::<ClassId>(mesh.dim(), CLASS_ID_TAG)?;
    let mut groups: BTreeMap<ClassId, Vec<LocalId>> = BTreeMap::new();
    for (e, &id) in ids.iter().enumerate() {
        groups.entry(id).or_default().push(LocalId(e));
    }
    Ok(groups)
}

/// Surface id → name for every named surface pair in the mesh.
pub fn surface_names<M: AdaptiveMesh>(mesh: &M) -> HashMap<ClassId, String> {
    let dim = mesh.dim();
    mesh.class_sets()
        .iter()
        .flat_map(|(name, pairs)| {
            pairs
                .iter()
                .filter(move |p| usize::from(p.dim) + 1 == dim)
                .map(move |p| (p.id, name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_sets_offset_past_side_sets() {
        let alloc =
            SurfaceIdAllocator::new(&[3, 1], &[10, 2], ClassifyWith::default()).unwrap();
        assert_eq!(alloc.id_of(SurfaceKey::Side(3)), Some(3));
        assert_eq!(alloc.id_of(SurfaceKey::Node(2)), Some(4));
        assert_eq!(alloc.id_of(SurfaceKey::Node(10)), Some(5));
        assert_eq!(alloc.key_of(5), Some(SurfaceKey::Node(10)));
    }

    #[test]
    fn node_sets_alone_keep_their_ids() {
        let with = ClassifyWith {
            side_sets: false,
            node_sets: true,
        };
        let alloc = SurfaceIdAllocator::new(&[3], &[3, 7], with).unwrap();
        assert_eq!(alloc.id_of(SurfaceKey::Side(3)), None);
        assert_eq!(alloc.id_of(SurfaceKey::Node(3)), Some(3));
        assert_eq!(alloc.len(), 2);
    }

    #[test]
    fn allocation_is_injective() {
        // offsetting by the raw id would map node set 2 onto side set 5
        let alloc = SurfaceIdAllocator::new(&[3, 5], &[2], ClassifyWith::default()).unwrap();
        assert_eq!(alloc.id_of(SurfaceKey::Node(2)), Some(6));
        let mut seen = std::collections::HashSet::new();
        for key in [SurfaceKey::Side(3), SurfaceKey::Side(5), SurfaceKey::Node(2)] {
            assert!(seen.insert(alloc.id_of(key).unwrap()));
        }
    }

    #[test]
    fn exposed_id_is_reserved() {
        let err = SurfaceIdAllocator::new(&[0, 2], &[], ClassifyWith::default()).unwrap_err();
        assert!(matches!(err, MeshBridgeError::InvariantViolation(ref msg) if msg.contains("Side(0)")));
        let nodes_only = ClassifyWith {
            side_sets: false,
            node_sets: true,
        };
        assert!(SurfaceIdAllocator::new(&[0], &[0], nodes_only).is_err());
        // side set 0 is ignored when side sets do not classify
        assert!(SurfaceIdAllocator::new(&[0], &[], nodes_only).unwrap().is_empty());
    }

    #[test]
    fn options_default_from_empty_json() {
        let opts: ClassifyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, ClassifyOptions::default());
        let opts: ClassifyOptions =
            serde_json::from_str(r#"{"precedence":"node_sets_last"}"#).unwrap();
        assert_eq!(opts.precedence, SetPrecedence::NodeSetsLast);
    }
}
