mod util;

use mesh_adapt_bridge::algs::build::{build_owned_mesh, build_serial_mesh};
use mesh_adapt_bridge::algs::classify::{ClassificationReport, ClassifyOptions, classify};
use mesh_adapt_bridge::algs::serialize::{SerializeOptions, mesh_to_flat, rewrite_shard};
use mesh_adapt_bridge::data::fields::{FieldDescriptor, SolutionStore, SolutionVector, SolverBookkeeping};
use mesh_adapt_bridge::io::flat::{ElementBlock, FlatMesh, FlatShard, IdBase};
use mesh_adapt_bridge::io::{FlatMeshReader, FlatMeshWriter, TextFlatReader, TextFlatWriter};
use mesh_adapt_bridge::mesh_error::{ErrorKind, MeshBridgeError};
use mesh_adapt_bridge::topology::ids::{ClassId, FlatIndex, GlobalId};
use mesh_adapt_bridge::topology::in_memory::{InMemoryMesh, SerialConstructor};
use mesh_adapt_bridge::topology::mesh::{AdaptiveMesh, CLASS_ID_TAG};
use std::collections::{BTreeMap, BTreeSet};
use util::*;

fn classified(shard: &FlatShard, ctor: &SerialConstructor) -> (InMemoryMesh, ClassificationReport) {
    let mut built = if shard.dist.num_ranks > 1 {
        build_owned_mesh(shard, ctor).unwrap()
    } else {
        build_serial_mesh(shard, ctor).unwrap()
    };
    let report = classify(
        &mut built.mesh,
        shard,
        &built.translator,
        &ClassifyOptions::default(),
    )
    .unwrap();
    (built.mesh, report)
}

/// Side class ids keyed by the sorted global ids of the side's vertices.
fn side_classes(mesh: &InMemoryMesh) -> BTreeMap<Vec<GlobalId>, ClassId> {
    let globals = mesh.globals(0).unwrap();
    let ids = mesh.get_array::<ClassId>(mesh.dim() - 1, CLASS_ID_TAG).unwrap();
    mesh.side_verts()
        .chunks_exact(mesh.dim())
        .zip(ids)
        .map(|(verts, &id)| {
            let mut key: Vec<GlobalId> = verts.iter().map(|v| globals[v.idx()]).collect();
            key.sort_unstable();
            (key, id)
        })
        .collect()
}

fn options(rank: usize, num_ranks: usize) -> SerializeOptions {
    SerializeOptions {
        title: "strip".into(),
        rank,
        num_ranks,
        ..Default::default()
    }
}

#[test]
fn serialized_strip_is_a_classification_fixpoint() {
    let shard = strip();
    let (mesh, report) = classified(&shard, &SerialConstructor::new(0));
    let out = mesh_to_flat(&mesh, &options(0, 1)).unwrap();

    let flat = &out.mesh;
    assert_eq!(flat.blocks.iter().map(|b| b.id).collect::<Vec<_>>(), vec![10, 20]);
    assert!(flat.blocks.iter().all(|b| b.elem_type == "tri3"));
    assert_eq!(flat.blocks[0].name.as_deref(), Some("left"));
    let sets: Vec<_> = flat
        .side_sets
        .iter()
        .map(|s| (s.id, s.name.clone().unwrap(), s.len()))
        .collect();
    assert_eq!(
        sets,
        vec![
            (1, "inlet".to_string(), 1),
            (2, "outlet".to_string(), 1),
            (3, "walls".to_string(), 2),
        ]
    );
    assert!(flat.node_sets.is_empty());
    assert_eq!(flat.node_id_map, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(flat.elem_id_map, vec![1, 2, 3, 4]);

    let (again, report_again) = classified(&out, &SerialConstructor::new(0));
    assert_eq!(report_again, report);
    assert_eq!(side_classes(&again), side_classes(&mesh));
}

#[test]
fn node_set_output_when_only_node_sets_classify() {
    let shard = strip();
    let (mesh, _) = classified(&shard, &SerialConstructor::new(0));
    let out = mesh_to_flat(
        &mesh,
        &SerializeOptions {
            classify_with: mesh_adapt_bridge::algs::classify::ClassifyWith {
                side_sets: false,
                node_sets: true,
            },
            ..options(0, 1)
        },
    )
    .unwrap();
    assert!(out.mesh.side_sets.is_empty());
    let walls = out.mesh.node_sets.iter().find(|s| s.id == 3).unwrap();
    assert_eq!(walls.name.as_deref(), Some("walls"));
    let mut nodes: Vec<usize> = walls.nodes.iter().map(|r| r.idx()).collect();
    nodes.sort_unstable();
    assert_eq!(nodes, vec![0, 1, 2]);
    assert_eq!(out.dist.node_sets_global.len(), 3);
}

#[test]
fn one_rank_and_two_ranks_write_the_same_mesh() {
    let (serial_mesh, _) = classified(&strip(), &SerialConstructor::new(0));
    let serial = mesh_to_flat(&serial_mesh, &options(0, 1)).unwrap();

    let mut vertex_globals = BTreeSet::new();
    let mut elem_globals = BTreeSet::new();
    let mut side_counts: BTreeMap<String, usize> = BTreeMap::new();
    let shards = strip_two_ranks();
    let ctors = strip_constructors();
    for (rank, (shard, ctor)) in shards.iter().zip(&ctors).enumerate() {
        let (mesh, _) = classified(shard, ctor);
        let out = mesh_to_flat(&mesh, &options(rank, 2)).unwrap();
        let names: BTreeSet<_> = out.mesh.side_sets.iter().filter_map(|s| s.name.clone()).collect();
        let serial_names: BTreeSet<_> =
            serial.mesh.side_sets.iter().filter_map(|s| s.name.clone()).collect();
        assert_eq!(names, serial_names, "rank {rank}");
        for set in &out.mesh.side_sets {
            *side_counts.entry(set.name.clone().unwrap()).or_default() += set.len();
        }
        for row in out.dist.update_range() {
            assert!(vertex_globals.insert(out.dist.node_index_global[row]), "vertex owned twice");
        }
        elem_globals.extend(out.dist.elem_index_global.iter().copied());
    }

    let serial_counts: BTreeMap<String, usize> = serial
        .mesh
        .side_sets
        .iter()
        .map(|s| (s.name.clone().unwrap(), s.len()))
        .collect();
    assert_eq!(side_counts, serial_counts);
    assert_eq!(
        vertex_globals,
        serial.dist.node_index_global.iter().copied().collect()
    );
    assert_eq!(
        elem_globals,
        serial.dist.elem_index_global.iter().copied().collect()
    );
}

#[test]
fn ghost_rows_follow_owned_rows() {
    let shards = strip_two_ranks();
    let ctors = strip_constructors();
    let (mesh, _) = classified(&shards[1], &ctors[1]);
    let out = mesh_to_flat(&mesh, &options(1, 2)).unwrap();
    assert_eq!(out.dist.num_internal_nodes, 2);
    assert_eq!(out.dist.num_external_nodes, 2);
    assert_eq!(out.dist.node_index_global, gids(&[2, 5, 1, 4]));
    assert_eq!(out.dist.elem_owner, vec![1, 1]);
}

#[test]
fn global_ids_survive_rewrite() {
    let mut shard = strip();
    shard.dist.node_index_global = gids(&[100, 101, 102, 103, 104, 105]);
    shard.dist.elem_index_global = gids(&[40, 41, 42, 43]);
    let (mesh, _) = classified(&shard, &SerialConstructor::new(0));
    let out = mesh_to_flat(
        &mesh,
        &SerializeOptions {
            id_base: IdBase::Zero,
            ..options(0, 1)
        },
    )
    .unwrap();
    assert_eq!(out.mesh.node_id_map, vec![100, 101, 102, 103, 104, 105]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strip.flat");
    let mut solver = SolutionVector::new(&[FieldDescriptor::scalar("u")], 6);
    let reread = rewrite_shard(&path, &out, &TextFlatWriter, &TextFlatReader, &mut solver).unwrap();
    assert_eq!(reread, out);
    assert_eq!(reread.dist.node_index_global, shard.dist.node_index_global);
    assert_eq!(reread.dist.elem_index_global, shard.dist.elem_index_global);
    assert!(solver.is_ready());
    assert_eq!(solver.num_rows(), 6);
}

#[test]
fn failed_write_names_the_path_and_keeps_bookkeeping() {
    let (mesh, _) = classified(&strip(), &SerialConstructor::new(0));
    let out = mesh_to_flat(&mesh, &options(0, 1)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("strip.flat");
    let mut solver = SolutionVector::new(&[FieldDescriptor::scalar("u")], 6);
    let err = rewrite_shard(&path, &out, &TextFlatWriter, &TextFlatReader, &mut solver).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    match &err {
        MeshBridgeError::Io { path: p, .. } => assert_eq!(p, &path),
        other => panic!("expected an I/O error, got {other:?}"),
    }
    assert!(err.to_string().contains("strip.flat"));
    assert!(solver.is_ready(), "bookkeeping released before a successful write");
}

#[test]
fn text_files_reproduce_the_shard() {
    let shards = strip_two_ranks();
    let dir = tempfile::tempdir().unwrap();
    for shard in &shards {
        let path = dir.path().join(format!("strip.{}", shard.dist.rank));
        TextFlatWriter.write_path(&path, shard).unwrap();
        let back = TextFlatReader.read_path(&path).unwrap();
        assert_eq!(&back, shard);
    }
}

#[test]
fn tetrahedron_faces_survive_a_rewrite() {
    let flat = FlatMesh {
        title: "tet".into(),
        dim: 3,
        coords: vec![
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ],
        blocks: vec![ElementBlock {
            id: 1,
            elem_type: "tetra4".into(),
            name: Some("solid".into()),
            nodes_per_elem: 4,
            connectivity: rows(&[0, 1, 2, 3]),
        }],
        side_sets: vec![
            side_set(5, "base", &[(0, 4)]),
            side_set(6, "front", &[(0, 1)]),
            side_set(7, "slant", &[(0, 2)]),
            side_set(8, "left", &[(0, 3)]),
        ],
        ..Default::default()
    };
    let shard = FlatShard::serial(flat);
    let (mesh, report) = classified(&shard, &SerialConstructor::new(0));
    assert_eq!(report.exposed_sides, 4);
    let out = mesh_to_flat(&mesh, &options(0, 1)).unwrap();

    assert_eq!(out.mesh.blocks[0].elem_type, "tetra4");
    let sets: Vec<(i32, Vec<(FlatIndex, i32)>)> = out
        .mesh
        .side_sets
        .iter()
        .map(|s| (s.id, s.entries().collect()))
        .collect();
    assert_eq!(
        sets,
        vec![
            (5, vec![(FlatIndex(0), 4)]),
            (6, vec![(FlatIndex(0), 1)]),
            (7, vec![(FlatIndex(0), 2)]),
            (8, vec![(FlatIndex(0), 3)]),
        ]
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tet.flat");
    TextFlatWriter.write_path(&path, &out).unwrap();
    let back = TextFlatReader.read_path(&path).unwrap();
    assert_eq!(back, out);
    let (again, report_again) = classified(&back, &SerialConstructor::new(0));
    assert_eq!(report_again, report);
    assert_eq!(side_classes(&again), side_classes(&mesh));
}
