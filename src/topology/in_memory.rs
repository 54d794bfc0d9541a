//! In-memory adaptive mesh and a single-process constructor.
//!
//! `InMemoryMesh` derives its sides from element connectivity using the
//! simplex side templates, and keeps tags per entity dimension. It is the
//! mesh the bridge is exercised against when no external adaptation library
//! is linked in.

use crate::mesh_error::MeshBridgeError;
use crate::topology::class_sets::ClassSets;
use crate::topology::element::{ElementFamily, simplex_side_template};
use crate::topology::ids::{ClassId, GlobalId, LocalId};
use crate::topology::mesh::{
    AdaptiveMesh, ConstructionInput, GLOBAL_TAG, MeshConstructor, OWNER_TAG, SideAdjacency, Tag,
};
use hashbrown::HashMap;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Simplex mesh with derived sides and per-dimension tag storage.
#[derive(Clone, Debug)]
pub struct InMemoryMesh {
    dim: usize,
    family: ElementFamily,
    nverts: usize,
    elem_verts: Vec<LocalId>,
    side_verts: Vec<LocalId>,
    elem_sides: Vec<LocalId>,
    side_elems: SideAdjacency,
    tags: Vec<BTreeMap<String, Tag>>,
    class_sets: ClassSets,
}

/// Sorted vertex key of a side; unused slots hold `usize::MAX`.
type SideKey = [usize; 3];

fn side_key(verts: impl Iterator<Item = usize>) -> SideKey {
    let mut key = [usize::MAX; 3];
    for (slot, v) in key.iter_mut().zip(verts) {
        *slot = v;
    }
    key.sort_unstable();
    key
}

impl InMemoryMesh {
    /// Build the topology of a simplex mesh from element → vertex
    /// connectivity.
    ///
    /// Sides are numbered in order of first appearance while walking elements
    /// and their local sides; a side keeps the orientation it has in the first
    /// element that touches it.
    pub fn from_connectivity(
        family: ElementFamily,
        dim: usize,
        nverts: usize,
        elem_verts: Vec<LocalId>,
    ) -> Result<Self, MeshBridgeError> {
        let template = match family {
            ElementFamily::Simplex => simplex_side_template(dim),
            ElementFamily::Hypercube => None,
        }
        .ok_or_else(|| {
            MeshBridgeError::UnsupportedElementType(format!("{family} mesh in {dim}D"))
        })?;
        let deg = dim + 1;
        if elem_verts.len() % deg != 0 {
            return Err(MeshBridgeError::InvariantViolation(format!(
                "connectivity length {} is not a multiple of {deg}",
                elem_verts.len()
            )));
        }
        if let Some(bad) = elem_verts.iter().find(|v| v.idx() >= nverts) {
            return Err(MeshBridgeError::OutOfRange {
                what: "element connectivity",
                index: bad.idx(),
                len: nverts,
            });
        }

        let nelems = elem_verts.len() / deg;
        let mut key_to_side: HashMap<SideKey, usize> = HashMap::new();
        let mut side_verts = Vec::new();
        let mut elem_sides = Vec::with_capacity(nelems * template.len());
        let mut uses: Vec<Vec<(LocalId, u8)>> = Vec::new();

        for (e, verts) in elem_verts.chunks_exact(deg).enumerate() {
            for (which, local) in template.iter().enumerate() {
                let key = side_key(local.iter().map(|&l| verts[l].idx()));
                let side = *key_to_side.entry(key).or_insert_with(|| {
                    side_verts.extend(local.iter().map(|&l| verts[l]));
                    uses.push(Vec::new());
                    uses.len() - 1
                });
                uses[side].push((LocalId(e), which as u8));
                elem_sides.push(LocalId(side));
            }
        }

        let mut side_elems = SideAdjacency {
            offsets: Vec::with_capacity(uses.len() + 1),
            ..Default::default()
        };
        side_elems.offsets.push(0);
        for row in uses {
            for (elem, which) in row {
                side_elems.elements.push(elem);
                side_elems.which_side.push(which);
            }
            side_elems.offsets.push(side_elems.elements.len());
        }

        Ok(Self {
            dim,
            family,
            nverts,
            elem_verts,
            side_verts,
            elem_sides,
            side_elems,
            tags: vec![BTreeMap::new(); dim + 1],
            class_sets: ClassSets::new(),
        })
    }

    fn tags_at(&self, dim: usize) -> Option<&BTreeMap<String, Tag>> {
        self.tags.get(dim)
    }
}

impl AdaptiveMesh for InMemoryMesh {
    fn dim(&self) -> usize {
        self.dim
    }

    fn family(&self) -> ElementFamily {
        self.family
    }

    fn nverts(&self) -> usize {
        self.nverts
    }

    fn nelems(&self) -> usize {
        self.elem_verts.len() / (self.dim + 1)
    }

    fn nsides(&self) -> usize {
        self.side_elems.len()
    }

    fn elem_verts(&self) -> &[LocalId] {
        &self.elem_verts
    }

    fn side_verts(&self) -> &[LocalId] {
        &self.side_verts
    }

    fn elem_sides(&self) -> &[LocalId] {
        &self.elem_sides
    }

    fn side_elems(&self) -> &SideAdjacency {
        &self.side_elems
    }

    fn class_sets(&self) -> &ClassSets {
        &self.class_sets
    }

    fn class_sets_mut(&mut self) -> &mut ClassSets {
        &mut self.class_sets
    }

    fn tag(&self, dim: usize, name: &str) -> Option<&Tag> {
        self.tags_at(dim)?.get(name)
    }

    fn insert_tag(&mut self, dim: usize, name: &str, tag: Tag) {
        if let Some(map) = self.tags.get_mut(dim) {
            map.insert(name.to_string(), tag);
        }
    }

    fn remove_tag(&mut self, dim: usize, name: &str) -> bool {
        self.tags
            .get_mut(dim)
            .is_some_and(|map| map.remove(name).is_some())
    }

    fn tag_names(&self, dim: usize) -> Vec<String> {
        self.tags_at(dim)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Single-process stand-in for the distributed construction primitive.
///
/// Vertices and elements are renumbered by ascending global id, so callers
/// can never rely on the input order surviving construction. Vertex owners
/// default to the constructing rank; `with_vertex_owners` overrides them for
/// vertices another rank owns.
#[derive(Clone, Debug, Default)]
pub struct SerialConstructor {
    rank: usize,
    vertex_owners: HashMap<GlobalId, usize>,
}

impl SerialConstructor {
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            vertex_owners: HashMap::new(),
        }
    }

    /// Record the owning rank of specific vertices.
    pub fn with_vertex_owners(mut self, owners: impl IntoIterator<Item = (GlobalId, usize)>) -> Self {
        self.vertex_owners.extend(owners);
        self
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

fn check_unique(what: &str, globals: &[GlobalId]) -> Result<(), MeshBridgeError> {
    if let Some(dup) = globals.iter().duplicates().next() {
        return Err(MeshBridgeError::InvariantViolation(format!(
            "duplicate {what} global id {dup}"
        )));
    }
    Ok(())
}

impl MeshConstructor for SerialConstructor {
    type Mesh = InMemoryMesh;

    fn build_from_elems2verts(
        &self,
        input: ConstructionInput,
    ) -> Result<InMemoryMesh, MeshBridgeError> {
        let ConstructionInput {
            family,
            dim,
            elem_verts,
            vert_globals,
            elem_globals,
        } = input;
        let deg = dim + 1;
        let nelems = elem_verts.len() / deg;
        if elem_globals.len() != nelems {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "element global ids",
                expected: nelems,
                found: elem_globals.len(),
            });
        }
        check_unique("vertex", &vert_globals)?;
        check_unique("element", &elem_globals)?;

        let vert_order: Vec<usize> = (0..vert_globals.len())
            .sorted_by_key(|&v| vert_globals[v])
            .collect();
        let mut new_of_old = vec![0usize; vert_globals.len()];
        for (new, &old) in vert_order.iter().enumerate() {
            new_of_old[old] = new;
        }

        let mut conn = Vec::with_capacity(elem_verts.len());
        for e in (0..nelems).sorted_by_key(|&e| elem_globals[e]) {
            for v in &elem_verts[e * deg..(e + 1) * deg] {
                let new = new_of_old.get(v.idx()).ok_or(MeshBridgeError::OutOfRange {
                    what: "construction connectivity",
                    index: v.idx(),
                    len: vert_globals.len(),
                })?;
                conn.push(LocalId(*new));
            }
        }

        let mut mesh = InMemoryMesh::from_connectivity(family, dim, vert_globals.len(), conn)?;
        let sorted_verts: Vec<GlobalId> = vert_order.iter().map(|&v| vert_globals[v]).collect();
        let owners: Vec<ClassId> = sorted_verts
            .iter()
            .map(|g| *self.vertex_owners.get(g).unwrap_or(&self.rank) as ClassId)
            .collect();
        let sorted_elems: Vec<GlobalId> = elem_globals.into_iter().sorted().collect();
        mesh.add_tag(0, GLOBAL_TAG, 1, sorted_verts)?;
        mesh.add_tag(dim, GLOBAL_TAG, 1, sorted_elems)?;
        mesh.add_tag(0, OWNER_TAG, 1, owners)?;
        log::debug!(
            "rank {}: constructed {dim}D mesh with {} vertices, {nelems} elements, {} sides",
            self.rank,
            mesh.nverts(),
            mesh.nsides()
        );
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> InMemoryMesh {
        // 3---2
        // | / |
        // 0---1
        let conn = [0, 1, 2, 0, 2, 3].map(LocalId).to_vec();
        InMemoryMesh::from_connectivity(ElementFamily::Simplex, 2, 4, conn).unwrap()
    }

    #[test]
    fn sides_are_shared_once() {
        let mesh = two_triangles();
        assert_eq!(mesh.nsides(), 5);
        let interior: Vec<_> = (0..mesh.nsides())
            .map(LocalId)
            .filter(|&s| mesh.side_elems().degree(s) == 2)
            .collect();
        assert_eq!(interior.len(), 1);
        let pairs: Vec<_> = mesh.side_elems().row(interior[0]).collect();
        // edge [2,0] of the first triangle is edge [0,1] of the second
        assert_eq!(pairs, vec![(LocalId(0), 2), (LocalId(1), 0)]);
    }

    #[test]
    fn tags_validate_length() {
        let mut mesh = two_triangles();
        mesh.add_tag(0, "u", 1, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(mesh.get_array::<f64>(0, "u").unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert!(mesh.add_tag(0, "v", 1, vec![1.0]).is_err());
        assert!(mesh.get_array::<ClassId>(0, "u").is_err());
        mesh.set_tag(0, "u", vec![0.0; 4]).unwrap();
        assert!(mesh.set_tag(2, "missing", vec![0.0; 2]).is_err());
        assert!(mesh.remove_tag(0, "u"));
        assert!(!mesh.has_tag(0, "u"));
        assert!(mesh.nents(5).is_err());
    }

    #[test]
    fn constructor_orders_by_global_id() {
        let input = ConstructionInput {
            family: ElementFamily::Simplex,
            dim: 2,
            elem_verts: [0, 1, 2].map(LocalId).to_vec(),
            vert_globals: [30, 10, 20].map(GlobalId).to_vec(),
            elem_globals: vec![GlobalId(7)],
        };
        let ctor = SerialConstructor::new(1).with_vertex_owners([(GlobalId(20), 0)]);
        let mesh = ctor.build_from_elems2verts(input).unwrap();
        assert_eq!(mesh.globals(0).unwrap(), &[10, 20, 30].map(GlobalId));
        // input vertex 0 (global 30) is now vertex 2
        assert_eq!(mesh.elem_verts(), &[2, 0, 1].map(LocalId));
        assert_eq!(mesh.vertex_owners().unwrap(), &[1, 0, 1]);
    }

    #[test]
    fn duplicate_globals_are_rejected() {
        let input = ConstructionInput {
            family: ElementFamily::Simplex,
            dim: 2,
            elem_verts: [0, 1, 2].map(LocalId).to_vec(),
            vert_globals: [1, 1, 2].map(GlobalId).to_vec(),
            elem_globals: vec![GlobalId(0)],
        };
        assert!(SerialConstructor::new(0).build_from_elems2verts(input).is_err());
    }
}
