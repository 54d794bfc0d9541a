#![allow(dead_code)]
use mesh_adapt_bridge::{
    io::flat::{ElementBlock, FlatMesh, FlatShard, NodeSet, SideSet},
    topology::ids::{FlatIndex, GlobalId},
    topology::in_memory::SerialConstructor,
    topology::ownership::{GlobalSet, ShardDistribution},
};

pub fn rows(r: &[usize]) -> Vec<FlatIndex> {
    r.iter().copied().map(FlatIndex).collect()
}

pub fn gids(g: &[u64]) -> Vec<GlobalId> {
    g.iter().copied().map(GlobalId).collect()
}

pub fn tri_block(id: i32, name: &str, conn: &[usize]) -> ElementBlock {
    ElementBlock {
        id,
        elem_type: "tri3".into(),
        name: Some(name.into()),
        nodes_per_elem: 3,
        connectivity: rows(conn),
    }
}

pub fn side_set(id: i32, name: &str, entries: &[(usize, i32)]) -> SideSet {
    SideSet {
        id,
        name: Some(name.into()),
        elements: entries.iter().map(|&(e, _)| FlatIndex(e)).collect(),
        sides: entries.iter().map(|&(_, s)| s).collect(),
    }
}

pub fn node_set(id: i32, name: &str, nodes: &[usize]) -> NodeSet {
    NodeSet {
        id,
        name: Some(name.into()),
        nodes: rows(nodes),
    }
}

/// Global vertex positions of the strip below.
pub const STRIP_X: [f64; 6] = [0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
pub const STRIP_Y: [f64; 6] = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

/// Element → global vertex connectivity of the strip.
pub const STRIP_ELEMS: [[usize; 3]; 4] = [[0, 1, 4], [0, 4, 3], [1, 2, 5], [1, 5, 4]];

/// Four triangles on `[0,2] x [0,1]`, serial:
///
/// ```text
/// 3---4---5
/// | / | / |
/// 0---1---2
/// ```
///
/// Blocks 10 "left" (elements 0,1) and 20 "right" (2,3). Side set 1
/// "inlet" is the edge x=0, side set 2 "outlet" the edge x=2, node set 1
/// "walls" the bottom vertices.
pub fn strip() -> FlatShard {
    let flat = FlatMesh {
        title: "strip".into(),
        dim: 2,
        coords: vec![STRIP_X.to_vec(), STRIP_Y.to_vec()],
        blocks: vec![
            tri_block(10, "left", &[0, 1, 4, 0, 4, 3]),
            tri_block(20, "right", &[1, 2, 5, 1, 5, 4]),
        ],
        node_sets: vec![node_set(1, "walls", &[0, 1, 2])],
        side_sets: vec![
            side_set(1, "inlet", &[(1, 3)]),
            side_set(2, "outlet", &[(2, 2)]),
        ],
        ..Default::default()
    };
    FlatShard::serial(flat)
}

fn global_sets() -> (Vec<GlobalSet>, Vec<GlobalSet>) {
    (
        vec![
            GlobalSet {
                id: 1,
                name: "inlet".into(),
            },
            GlobalSet {
                id: 2,
                name: "outlet".into(),
            },
        ],
        vec![GlobalSet {
            id: 1,
            name: "walls".into(),
        }],
    )
}

/// Shard of one rank holding the listed strip elements.
///
/// `owned` and `ghosts` are global vertex ids in row order; set entries
/// are given by global vertex id / global element id.
fn strip_rank(
    rank: usize,
    elems: &[usize],
    owned: &[usize],
    ghosts: &[usize],
    side_sets: &[(i32, &str, usize, i32)],
    walls: &[usize],
) -> FlatShard {
    let order: Vec<usize> = owned.iter().chain(ghosts).copied().collect();
    let row_of = |g: usize| order.iter().position(|&x| x == g).unwrap();
    let conn: Vec<usize> = elems
        .iter()
        .flat_map(|&e| STRIP_ELEMS[e].map(row_of))
        .collect();
    let elem_row = |g: usize| elems.iter().position(|&x| x == g).unwrap();
    let flat = FlatMesh {
        title: "strip".into(),
        dim: 2,
        coords: vec![
            order.iter().map(|&g| STRIP_X[g]).collect(),
            order.iter().map(|&g| STRIP_Y[g]).collect(),
        ],
        blocks: vec![tri_block(10, "fluid", &conn)],
        node_sets: if walls.is_empty() {
            Vec::new()
        } else {
            let nodes: Vec<usize> = walls.iter().map(|&g| row_of(g)).collect();
            vec![node_set(1, "walls", &nodes)]
        },
        side_sets: side_sets
            .iter()
            .map(|&(id, name, e, s)| side_set(id, name, &[(elem_row(e), s)]))
            .collect(),
        ..Default::default()
    };
    let (side_sets_global, node_sets_global) = global_sets();
    let dist = ShardDistribution {
        rank,
        num_ranks: 2,
        elem_owner: vec![rank; elems.len()],
        node_index_global: order.iter().map(|&g| GlobalId(g as u64)).collect(),
        elem_index_global: elems.iter().map(|&e| GlobalId(e as u64)).collect(),
        num_internal_nodes: owned.len(),
        num_boundary_nodes: 0,
        num_external_nodes: ghosts.len(),
        side_sets_global,
        node_sets_global,
    };
    FlatShard { mesh: flat, dist }
}

/// The strip split over two ranks; rank 0 owns vertices 0,1,3,4.
///
/// Rank 0 holds the inlet, rank 1 the outlet; both hold part of the walls.
pub fn strip_two_ranks() -> [FlatShard; 2] {
    [
        strip_rank(0, &[0, 1], &[0, 3, 1, 4], &[], &[(1, "inlet", 1, 3)], &[0, 1]),
        strip_rank(1, &[2, 3], &[2, 5], &[1, 4], &[(2, "outlet", 2, 2)], &[1, 2]),
    ]
}

/// Constructors matching [`strip_two_ranks`].
pub fn strip_constructors() -> [SerialConstructor; 2] {
    [
        SerialConstructor::new(0),
        SerialConstructor::new(1).with_vertex_owners([(GlobalId(1), 0), (GlobalId(4), 0)]),
    ]
}
