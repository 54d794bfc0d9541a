//! Bridge stages: build, classify, metric, transport, serialize, adapt.

pub mod adapt;
pub mod build;
pub mod classify;
pub mod metric;
pub mod serialize;
pub mod transport;

pub use adapt::{AdaptContext, AdaptStepOutcome, AdaptationRequest, MeshAdapter, PassThroughAdapter, adapt_step};
pub use build::{BuiltMesh, build_owned_mesh, build_serial_mesh, resolve_element_type};
pub use classify::{
    ClassificationReport, ClassifyOptions, ClassifyWith, EXPOSED_SIDE_ID, SetPrecedence,
    SideSetResolution, SurfaceIdAllocator, SurfaceKey, classify,
};
pub use metric::{LevelSetMetricConfig, METRIC_TAG, MetricEncoding, attach_level_set_metric};
pub use serialize::{SerializeOptions, mesh_to_flat, rewrite_shard};
pub use transport::{TransportSummary, copy_from_mesh, transport_to_mesh};
