mod util;

use mesh_adapt_bridge::algs::adapt::{AdaptContext, PassThroughAdapter, adapt_step};
use mesh_adapt_bridge::algs::build::{build_owned_mesh, build_serial_mesh};
use mesh_adapt_bridge::algs::metric::{LevelSetMetricConfig, METRIC_TAG, MetricEncoding};
use mesh_adapt_bridge::algs::transport::{copy_from_mesh, transport_to_mesh};
use mesh_adapt_bridge::config::BridgeConfig;
use mesh_adapt_bridge::data::fields::{FieldDescriptor, SolutionStore, SolutionVector, SolverBookkeeping};
use mesh_adapt_bridge::io::{TextFlatReader, TextFlatWriter};
use mesh_adapt_bridge::algs::classify::SetPrecedence;
use mesh_adapt_bridge::mesh_error::MeshBridgeError;
use mesh_adapt_bridge::topology::ids::{FlatIndex, GlobalId, LocalId};
use mesh_adapt_bridge::topology::in_memory::SerialConstructor;
use mesh_adapt_bridge::topology::mesh::AdaptiveMesh;
use util::*;

const LEVEL_SET: [f64; 6] = [-1.0, 0.2, 0.05, 0.9, 0.0, -0.5];

fn band() -> LevelSetMetricConfig {
    LevelSetMetricConfig {
        width: 0.1,
        inner_size: 0.02,
        outer_size: 0.3,
        encoding: MetricEncoding::IsoSize,
    }
}

fn fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::level_set("F"),
        FieldDescriptor::species("Y", 2),
        FieldDescriptor::external("T_ext"),
    ]
}

/// Values chosen so any arithmetic on the way would change their bits.
fn filled_solver(rows: usize) -> SolutionVector {
    let mut sol = SolutionVector::new(&fields(), rows);
    let f: Vec<f64> = LEVEL_SET.iter().copied().take(rows).collect();
    let y0: Vec<f64> = (0..rows).map(|i| 0.1 + 0.2 * i as f64).collect();
    let y1: Vec<f64> = (0..rows).map(|i| 1e-300 / (i as f64 + 3.0)).collect();
    let t: Vec<f64> = (0..rows).map(|i| 300.0 + 1.0 / 3.0 * i as f64).collect();
    sol.set_column("F", &f).unwrap();
    sol.set_column("Y0", &y0).unwrap();
    sol.set_column("Y1", &y1).unwrap();
    sol.set_column("T_ext", &t).unwrap();
    sol
}

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

#[test]
fn level_set_drives_the_size_metric() {
    let shard = strip();
    let mut built = build_serial_mesh(&shard, &SerialConstructor::new(0)).unwrap();
    let solver = filled_solver(6);
    transport_to_mesh(&mut built.mesh, &built.translator, &fields(), &solver, Some(&band())).unwrap();

    let expected = [0.3, 0.3, 0.02, 0.3, 0.02, 0.3];
    let tag = built.mesh.tag(0, METRIC_TAG).unwrap();
    assert_eq!(tag.ncomps, 3);
    let metric = built.mesh.get_array::<f64>(0, METRIC_TAG).unwrap();
    for v in (0..built.mesh.nverts()).map(LocalId) {
        let row = built.translator.flat_vertex(v).unwrap();
        let t = &metric[v.idx() * 3..v.idx() * 3 + 3];
        assert_eq!(t, &[expected[row.idx()], expected[row.idx()], 0.0], "vertex {v}");
    }
}

#[test]
fn values_come_back_bit_for_bit() {
    let shard = strip();
    let mut built = build_serial_mesh(&shard, &SerialConstructor::new(0)).unwrap();
    let solver = filled_solver(6);
    let summary =
        transport_to_mesh(&mut built.mesh, &built.translator, &fields(), &solver, None).unwrap();
    assert_eq!(summary.tags, vec!["F", "Y0", "Y1", "T_ext"]);
    assert_eq!(summary.skipped_rows, 0);
    assert!(!built.mesh.has_tag(0, METRIC_TAG));

    let mut back = SolutionVector::new(&fields(), 6);
    let written =
        copy_from_mesh(&built.mesh, &built.translator, &fields(), &shard.dist, &mut back).unwrap();
    assert_eq!(written, 24);
    for tag in solver.tags() {
        assert_eq!(
            bits(&back.column(tag).unwrap()),
            bits(&solver.column(tag).unwrap()),
            "{tag}"
        );
    }
}

#[test]
fn ghost_rows_are_left_to_the_solver() {
    let shards = strip_two_ranks();
    let ctors = strip_constructors();
    let shard = &shards[1];
    let built = build_owned_mesh(shard, &ctors[1]).unwrap();
    let mut mesh = built.mesh;
    let solver = filled_solver(4);
    transport_to_mesh(&mut mesh, &built.translator, &fields(), &solver, None).unwrap();

    let mut back = SolutionVector::new(&fields(), 4);
    let written = copy_from_mesh(&mesh, &built.translator, &fields(), &shard.dist, &mut back).unwrap();
    assert_eq!(written, 2 * 4);
    let y0 = back.column("Y0").unwrap();
    let sent = solver.column("Y0").unwrap();
    assert_eq!(&y0[..2], &sent[..2]);
    assert_eq!(&y0[2..], &[0.0, 0.0]);
}

#[test]
fn copy_back_needs_every_tag() {
    let shard = strip();
    let built = build_serial_mesh(&shard, &SerialConstructor::new(0)).unwrap();
    let mut back = SolutionVector::new(&fields(), 6);
    let err = copy_from_mesh(&built.mesh, &built.translator, &fields(), &shard.dist, &mut back)
        .unwrap_err();
    assert!(matches!(err, MeshBridgeError::MissingTag { dim: 0, ref name } if name == "F"));
}

#[test]
fn adapt_step_without_changes_restores_the_solution() {
    let shard = strip();
    let config = BridgeConfig {
        level_set: Some(band()),
        ..Default::default()
    };
    let mut solver = filled_solver(6);
    let before: Vec<Vec<u64>> = solver
        .tags()
        .iter()
        .map(|t| bits(&solver.column(t).unwrap()))
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("adapted.flat");
    let ctor = SerialConstructor::new(0);
    let mut adapter = PassThroughAdapter;
    let outcome = adapt_step(
        &shard,
        &fields(),
        &path,
        AdaptContext {
            constructor: &ctor,
            adapter: &mut adapter,
            writer: &TextFlatWriter,
            reader: &TextFlatReader,
            config: &config,
        },
        &mut solver,
    )
    .unwrap();

    assert!(path.exists());
    assert_eq!(outcome.passes, 0);
    assert_eq!(outcome.copied, 24);
    assert_eq!(outcome.classification.resolved_sides["walls"], 2);
    assert!(outcome.mesh.has_tag(0, METRIC_TAG));
    assert_eq!(outcome.shard.mesh.num_nodes(), 6);
    assert!(solver.is_ready());
    let after: Vec<Vec<u64>> = solver
        .tags()
        .iter()
        .map(|t| bits(&solver.column(t).unwrap()))
        .collect();
    assert_eq!(after, before);
    assert_eq!(solver.value("F", FlatIndex(2)), Some(0.05));
}

#[test]
fn adapt_step_rejects_invalid_config_before_touching_the_solver() {
    let config = BridgeConfig::from_json_str(r#"{"adaptation": {"max_passes": 0}}"#);
    assert!(matches!(config, Err(MeshBridgeError::InvalidConfig(_))));

    let mut config = BridgeConfig::default();
    config.adaptation.max_length = -1.0;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.flat");
    let mut solver = filled_solver(6);
    let err = adapt_step(
        &strip(),
        &fields(),
        &path,
        AdaptContext {
            constructor: &SerialConstructor::new(0),
            adapter: &mut PassThroughAdapter,
            writer: &TextFlatWriter,
            reader: &TextFlatReader,
            config: &config,
        },
        &mut solver,
    )
    .unwrap_err();
    assert!(matches!(err, MeshBridgeError::InvalidConfig(_)));
    assert!(!path.exists());
    assert!(solver.is_ready());
}

#[test]
fn config_documents_load_with_defaults() {
    let cfg = BridgeConfig::from_json_str(
        r#"{
            "classify_with": { "side_sets": true, "node_sets": false },
            "precedence": "node_sets_last",
            "id_base": "zero",
            "level_set": { "width": 0.05, "inner_size": 0.01, "outer_size": 0.2,
                           "encoding": "riemannian" },
            "adaptation": { "max_length": 0.4, "should_coarsen_slivers": false }
        }"#,
    )
    .unwrap();
    assert!(!cfg.classify_with.node_sets);
    assert_eq!(cfg.precedence, SetPrecedence::NodeSetsLast);
    assert_eq!(cfg.level_set.unwrap().encoding, MetricEncoding::Riemannian);
    assert_eq!(cfg.adaptation.max_length, 0.4);
    assert!(!cfg.adaptation.should_coarsen_slivers);
    assert_eq!(cfg.adaptation.min_quality_desired, 0.6);
    assert_eq!(cfg.classify_options().precedence, SetPrecedence::NodeSetsLast);
}

#[test]
fn two_rank_adapt_step_keeps_values_with_their_global_ids() {
    let shards = strip_two_ranks();
    let ctors = strip_constructors();
    let fields = [FieldDescriptor::scalar("u")];
    let config = BridgeConfig::default();
    let value_of = |g: GlobalId| g.get() as f64 + 0.5;
    // owned vertices first, in ascending global id; ghosts after
    let expected_rows = [gids(&[0, 1, 3, 4]), gids(&[2, 5, 1, 4])];

    let dir = tempfile::tempdir().unwrap();
    for (shard, ctor) in shards.iter().zip(&ctors) {
        let rank = shard.dist.rank;
        let mut solver = SolutionVector::new(&fields, shard.mesh.num_nodes());
        let values: Vec<f64> = shard.dist.node_index_global.iter().copied().map(value_of).collect();
        solver.set_column("u", &values).unwrap();

        let path = dir.path().join(format!("adapted.{rank}"));
        let outcome = adapt_step(
            shard,
            &fields,
            &path,
            AdaptContext {
                constructor: ctor,
                adapter: &mut PassThroughAdapter,
                writer: &TextFlatWriter,
                reader: &TextFlatReader,
                config: &config,
            },
            &mut solver,
        )
        .unwrap();

        let dist = &outcome.shard.dist;
        assert_eq!(dist.node_index_global, expected_rows[rank], "rank {rank}");
        assert_eq!(dist.num_ranks, 2);
        assert_eq!(outcome.copied, dist.update_vertex_count(), "rank {rank}");
        let u = solver.column("u").unwrap();
        for row in dist.update_range() {
            assert_eq!(u[row], value_of(dist.node_index_global[row]), "rank {rank} row {row}");
        }
        for row in dist.external_range() {
            assert_eq!(u[row], 0.0, "ghost row {row} on rank {rank}");
        }
    }
}
