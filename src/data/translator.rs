//! Index Space Translator.
//!
//! Three numbering spaces meet at the bridge: flat rows ([`FlatIndex`]),
//! global ids ([`GlobalId`]) and adaptive-mesh local ids ([`LocalId`]).
//! [`GlobalIdTable`] covers flat ↔ global for one shard, [`DenseRenumbering`]
//! packs a sparse set of flat rows into `0..k`, and [`IndexTranslator`] ties
//! both sides together for the lifetime of one conversion.
//!
//! Lookups of ids that live only on other ranks return `None`; that is the
//! normal case for a partitioned mesh, not an error.

use crate::mesh_error::MeshBridgeError;
use crate::topology::ids::{FlatIndex, GlobalId, LocalId};
use crate::topology::mesh::AdaptiveMesh;
use crate::topology::ownership::ShardDistribution;
use hashbrown::HashMap;

/// Forward (row → global) and reverse (global → row) lookup for one shard.
#[derive(Clone, Debug, Default)]
pub struct GlobalIdTable {
    forward: Vec<GlobalId>,
    reverse: HashMap<GlobalId, FlatIndex>,
}

impl GlobalIdTable {
    /// Build both directions once. Duplicate global ids are rejected.
    pub fn new(globals: Vec<GlobalId>) -> Result<Self, MeshBridgeError> {
        let mut reverse = HashMap::with_capacity(globals.len());
        for (row, &gid) in globals.iter().enumerate() {
            if let Some(prev) = reverse.insert(gid, FlatIndex(row)) {
                return Err(MeshBridgeError::InvariantViolation(format!(
                    "global id {gid} appears at rows {prev} and {row}"
                )));
            }
        }
        Ok(Self {
            forward: globals,
            reverse,
        })
    }

    /// Global id of a flat row.
    #[inline]
    pub fn global_of(&self, row: FlatIndex) -> Result<GlobalId, MeshBridgeError> {
        self.forward
            .get(row.idx())
            .copied()
            .ok_or(MeshBridgeError::OutOfRange {
                what: "global id table",
                index: row.idx(),
                len: self.forward.len(),
            })
    }

    /// Flat row holding `gid`, or `None` when this shard does not have it.
    #[inline]
    pub fn flat_of(&self, gid: GlobalId) -> Option<FlatIndex> {
        self.reverse.get(&gid).copied()
    }

    pub fn globals(&self) -> &[GlobalId] {
        &self.forward
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Dense renumbering of a sorted, deduplicated set of flat rows.
#[derive(Clone, Debug, Default)]
pub struct DenseRenumbering {
    old_of_new: Vec<FlatIndex>,
    new_of_old: HashMap<FlatIndex, usize>,
}

impl DenseRenumbering {
    /// Renumber `old` (sorted ascending, no duplicates) to `0..old.len()`.
    pub fn from_sorted(old: Vec<FlatIndex>) -> Result<Self, MeshBridgeError> {
        if let Some(w) = old.windows(2).find(|w| w[0] >= w[1]) {
            return Err(MeshBridgeError::InvariantViolation(format!(
                "renumbering input not strictly ascending at {} >= {}",
                w[0], w[1]
            )));
        }
        let new_of_old = old
            .iter()
            .enumerate()
            .map(|(new, &row)| (row, new))
            .collect();
        Ok(Self {
            old_of_new: old,
            new_of_old,
        })
    }

    /// Collect, sort and deduplicate the rows referenced by `rows`.
    pub fn from_referenced(rows: impl IntoIterator<Item = FlatIndex>) -> Self {
        let mut old: Vec<FlatIndex> = rows.into_iter().collect();
        old.sort_unstable();
        old.dedup();
        let new_of_old = old
            .iter()
            .enumerate()
            .map(|(new, &row)| (row, new))
            .collect();
        Self {
            old_of_new: old,
            new_of_old,
        }
    }

    pub fn new_of(&self, old: FlatIndex) -> Option<usize> {
        self.new_of_old.get(&old).copied()
    }

    pub fn old_of(&self, new: usize) -> Option<FlatIndex> {
        self.old_of_new.get(new).copied()
    }

    /// Flat rows in new-id order.
    pub fn old_ids(&self) -> &[FlatIndex] {
        &self.old_of_new
    }

    pub fn len(&self) -> usize {
        self.old_of_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old_of_new.is_empty()
    }
}

/// Per-conversion correspondence between a flat shard and an adaptive mesh.
///
/// Created from the shard's distribution, then bound to a mesh with
/// [`IndexTranslator::with_mesh`]. A translator is never shared between
/// conversions; a rebuilt mesh needs a fresh one.
#[derive(Clone, Debug, Default)]
pub struct IndexTranslator {
    vertices: GlobalIdTable,
    elements: GlobalIdTable,
    mesh_of_flat_vertex: Vec<Option<LocalId>>,
    flat_of_mesh_vertex: Vec<Option<FlatIndex>>,
    mesh_of_flat_element: Vec<Option<LocalId>>,
    flat_of_mesh_element: Vec<Option<FlatIndex>>,
}

impl IndexTranslator {
    /// Flat-side tables for a shard; no mesh bound yet.
    pub fn new(dist: &ShardDistribution) -> Result<Self, MeshBridgeError> {
        Ok(Self::from_tables(
            GlobalIdTable::new(dist.node_index_global.clone())?,
            GlobalIdTable::new(dist.elem_index_global.clone())?,
        ))
    }

    pub fn from_tables(vertices: GlobalIdTable, elements: GlobalIdTable) -> Self {
        Self {
            mesh_of_flat_vertex: vec![None; vertices.len()],
            mesh_of_flat_element: vec![None; elements.len()],
            vertices,
            elements,
            flat_of_mesh_vertex: Vec::new(),
            flat_of_mesh_element: Vec::new(),
        }
    }

    /// Bind the translator to `mesh` through the mesh's global ids.
    ///
    /// Mesh entities whose global id is not in this shard stay unmapped.
    pub fn with_mesh<M: AdaptiveMesh>(mut self, mesh: &M) -> Result<Self, MeshBridgeError> {
        let (m2f, f2m) = correspond(&self.vertices, mesh.globals(0)?);
        self.flat_of_mesh_vertex = m2f;
        self.mesh_of_flat_vertex = f2m;
        let (m2f, f2m) = correspond(&self.elements, mesh.globals(mesh.dim())?);
        self.flat_of_mesh_element = m2f;
        self.mesh_of_flat_element = f2m;
        let missing = self.flat_of_mesh_vertex.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            log::debug!("{missing} mesh vertices have no row in this shard");
        }
        Ok(self)
    }

    /// Mesh vertex for a flat vertex row, `None` when absent on this rank.
    #[inline]
    pub fn mesh_vertex(&self, row: FlatIndex) -> Option<LocalId> {
        self.mesh_of_flat_vertex.get(row.idx()).copied().flatten()
    }

    #[inline]
    pub fn flat_vertex(&self, v: LocalId) -> Option<FlatIndex> {
        self.flat_of_mesh_vertex.get(v.idx()).copied().flatten()
    }

    #[inline]
    pub fn mesh_element(&self, row: FlatIndex) -> Option<LocalId> {
        self.mesh_of_flat_element.get(row.idx()).copied().flatten()
    }

    #[inline]
    pub fn flat_element(&self, e: LocalId) -> Option<FlatIndex> {
        self.flat_of_mesh_element.get(e.idx()).copied().flatten()
    }

    pub fn vertex_globals(&self) -> &GlobalIdTable {
        &self.vertices
    }

    pub fn element_globals(&self) -> &GlobalIdTable {
        &self.elements
    }
}

fn correspond(
    table: &GlobalIdTable,
    mesh_globals: &[GlobalId],
) -> (Vec<Option<FlatIndex>>, Vec<Option<LocalId>>) {
    let mut flat_to_mesh = vec![None; table.len()];
    let mesh_to_flat = mesh_globals
        .iter()
        .enumerate()
        .map(|(local, &gid)| {
            let row = table.flat_of(gid);
            if let Some(row) = row {
                flat_to_mesh[row.idx()] = Some(LocalId(local));
            }
            row
        })
        .collect();
    (mesh_to_flat, flat_to_mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absent_global_is_none() {
        let table = GlobalIdTable::new([10, 4, 7].map(GlobalId).to_vec()).unwrap();
        assert_eq!(table.global_of(FlatIndex(1)).unwrap(), GlobalId(4));
        assert_eq!(table.flat_of(GlobalId(7)), Some(FlatIndex(2)));
        assert_eq!(table.flat_of(GlobalId(99)), None);
        assert!(matches!(
            table.global_of(FlatIndex(3)),
            Err(MeshBridgeError::OutOfRange { index: 3, len: 3, .. })
        ));
    }

    #[test]
    fn duplicate_globals_rejected() {
        assert!(GlobalIdTable::new([1, 2, 1].map(GlobalId).to_vec()).is_err());
    }

    #[test]
    fn renumbering_is_dense() {
        let r = DenseRenumbering::from_referenced([7, 2, 7, 5].map(FlatIndex));
        assert_eq!(r.old_ids(), &[2, 5, 7].map(FlatIndex));
        assert_eq!(r.new_of(FlatIndex(5)), Some(1));
        assert_eq!(r.new_of(FlatIndex(3)), None);
        assert_eq!(r.old_of(2), Some(FlatIndex(7)));
        assert!(DenseRenumbering::from_sorted([3, 3].map(FlatIndex).to_vec()).is_err());
    }

    proptest! {
        #[test]
        fn table_round_trips(ids in proptest::collection::hash_set(0u64..10_000, 0..200)) {
            let globals: Vec<GlobalId> = ids.into_iter().map(GlobalId).collect();
            let table = GlobalIdTable::new(globals.clone()).unwrap();
            for (row, gid) in globals.iter().enumerate() {
                prop_assert_eq!(table.global_of(FlatIndex(row)).unwrap(), *gid);
                prop_assert_eq!(table.flat_of(*gid), Some(FlatIndex(row)));
            }
        }

        #[test]
        fn renumbering_round_trips(rows in proptest::collection::vec(0usize..500, 0..100)) {
            let r = DenseRenumbering::from_referenced(rows.iter().copied().map(FlatIndex));
            for new in 0..r.len() {
                let old = r.old_of(new).unwrap();
                prop_assert_eq!(r.new_of(old), Some(new));
            }
            for row in rows {
                prop_assert!(r.new_of(FlatIndex(row)).is_some());
            }
        }
    }
}
