//! Field descriptors and the solver-side stores fields move between.
//!
//! The set of transported fields is an explicit list of [`FieldDescriptor`]s;
//! each expands to one or more tag names. [`SolutionStore`] is the solver's
//! view of per-vertex values and [`SolverBookkeeping`] its per-rank tables
//! that must be torn down and rebuilt around a mesh rewrite.
//! [`SolutionVector`] implements both for in-process use.

use crate::io::flat::FlatShard;
use crate::mesh_error::MeshBridgeError;
use crate::topology::ids::FlatIndex;
use serde::{Deserialize, Serialize};

/// Shape of a transported field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// One solver unknown per vertex.
    Scalar,
    /// `count` unknowns per vertex, one tag each, named `base0..base{count-1}`.
    Species { count: usize },
    /// Externally supplied per-vertex values that are not solver unknowns.
    External,
}

/// Extra meaning attached to a field.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    #[default]
    Plain,
    /// The interface field that drives the target-size metric.
    LevelSet,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub role: FieldRole,
}

impl FieldDescriptor {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            role: FieldRole::Plain,
        }
    }

    pub fn species(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Species { count },
            role: FieldRole::Plain,
        }
    }

    pub fn external(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::External,
            role: FieldRole::Plain,
        }
    }

    /// Scalar field marked as the level-set interface.
    pub fn level_set(name: impl Into<String>) -> Self {
        Self {
            role: FieldRole::LevelSet,
            ..Self::scalar(name)
        }
    }

    /// Tag names this field occupies on the mesh.
    pub fn tag_names(&self) -> Vec<String> {
        match self.kind {
            FieldKind::Species { count } => (0..count).map(|i| format!("{}{i}", self.name)).collect(),
            FieldKind::Scalar | FieldKind::External => vec![self.name.clone()],
        }
    }
}

/// Every tag name of every field, in descriptor order.
pub fn expand_tag_names(fields: &[FieldDescriptor]) -> Vec<String> {
    fields.iter().flat_map(FieldDescriptor::tag_names).collect()
}

/// Solver view of per-vertex values, addressed by tag name and flat row.
pub trait SolutionStore {
    /// Number of flat vertex rows the store covers.
    fn num_rows(&self) -> usize;

    /// Value of `tag` at `row`; `None` when the solver has no unknown there.
    fn value(&self, tag: &str, row: FlatIndex) -> Option<f64>;

    fn set_value(&mut self, tag: &str, row: FlatIndex, value: f64) -> Result<(), MeshBridgeError>;
}

/// Per-rank solver tables that depend on the mesh layout.
pub trait SolverBookkeeping {
    /// Drop every table derived from the current mesh.
    fn release(&mut self);

    /// Rebuild the tables for a freshly read shard.
    fn rebuild(&mut self, shard: &FlatShard) -> Result<(), MeshBridgeError>;

    fn is_ready(&self) -> bool;
}

/// Dense per-vertex unknown vector: `ntags` interleaved values per row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SolutionVector {
    tags: Vec<String>,
    rows: usize,
    values: Vec<f64>,
    ready: bool,
}

impl SolutionVector {
    /// Zero-initialized vector over `rows` vertex rows for the given fields.
    pub fn new(fields: &[FieldDescriptor], rows: usize) -> Self {
        let tags = expand_tag_names(fields);
        Self {
            values: vec![0.0; rows * tags.len()],
            tags,
            rows,
            ready: true,
        }
    }

    fn unknown(&self, tag: &str, row: FlatIndex) -> Option<usize> {
        if !self.ready || row.idx() >= self.rows {
            return None;
        }
        let pos = self.tags.iter().position(|t| t == tag)?;
        Some(row.idx() * self.tags.len() + pos)
    }

    /// All values of one tag in row order.
    pub fn column(&self, tag: &str) -> Option<Vec<f64>> {
        let pos = self.tags.iter().position(|t| t == tag)?;
        Some(
            self.values
                .iter()
                .skip(pos)
                .step_by(self.tags.len())
                .copied()
                .collect(),
        )
    }

    /// Overwrite one tag from a slice covering every row.
    pub fn set_column(&mut self, tag: &str, values: &[f64]) -> Result<(), MeshBridgeError> {
        if values.len() != self.rows {
            return Err(MeshBridgeError::VertexCountMismatch {
                what: "column values",
                expected: self.rows,
                found: values.len(),
            });
        }
        for (row, &v) in values.iter().enumerate() {
            self.set_value(tag, FlatIndex(row), v)?;
        }
        Ok(())
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl SolutionStore for SolutionVector {
    fn num_rows(&self) -> usize {
        self.rows
    }

    fn value(&self, tag: &str, row: FlatIndex) -> Option<f64> {
        self.unknown(tag, row).map(|i| self.values[i])
    }

    fn set_value(&mut self, tag: &str, row: FlatIndex, value: f64) -> Result<(), MeshBridgeError> {
        if !self.ready {
            return Err(MeshBridgeError::InvariantViolation(
                "solution vector written while released".into(),
            ));
        }
        let i = self.unknown(tag, row).ok_or_else(|| {
            MeshBridgeError::InvariantViolation(format!("no unknown for \"{tag}\" at row {row}"))
        })?;
        self.values[i] = value;
        Ok(())
    }
}

impl SolverBookkeeping for SolutionVector {
    fn release(&mut self) {
        self.values = Vec::new();
        self.rows = 0;
        self.ready = false;
    }

    fn rebuild(&mut self, shard: &FlatShard) -> Result<(), MeshBridgeError> {
        self.rows = shard.mesh.num_nodes();
        self.values = vec![0.0; self.rows * self.tags.len()];
        self.ready = true;
        log::debug!(
            "solution vector rebuilt: {} rows x {} tags",
            self.rows,
            self.tags.len()
        );
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_expand_to_indexed_tags() {
        let fields = [
            FieldDescriptor::level_set("F"),
            FieldDescriptor::species("Y", 3),
            FieldDescriptor::external("T_ext"),
        ];
        assert_eq!(
            expand_tag_names(&fields),
            vec!["F", "Y0", "Y1", "Y2", "T_ext"]
        );
        assert_eq!(fields[0].role, FieldRole::LevelSet);
    }

    #[test]
    fn release_blocks_access_until_rebuild() {
        let fields = [FieldDescriptor::scalar("u"), FieldDescriptor::scalar("v")];
        let mut sol = SolutionVector::new(&fields, 3);
        sol.set_value("v", FlatIndex(2), 4.5).unwrap();
        assert_eq!(sol.value("v", FlatIndex(2)), Some(4.5));
        assert_eq!(sol.column("v").unwrap(), vec![0.0, 0.0, 4.5]);
        assert_eq!(sol.value("w", FlatIndex(0)), None);

        sol.release();
        assert!(!sol.is_ready());
        assert_eq!(sol.value("v", FlatIndex(2)), None);
        assert!(sol.set_value("v", FlatIndex(0), 1.0).is_err());

        let shard = FlatShard::serial(crate::io::flat::FlatMesh {
            dim: 2,
            coords: vec![vec![0.0; 5], vec![0.0; 5]],
            ..Default::default()
        });
        sol.rebuild(&shard).unwrap();
        assert_eq!(sol.num_rows(), 5);
        assert_eq!(sol.column("u").unwrap(), vec![0.0; 5]);
    }

    #[test]
    fn descriptors_load_from_json() {
        let f: FieldDescriptor =
            serde_json::from_str(r#"{"name":"Y","kind":{"species":{"count":2}}}"#).unwrap();
        assert_eq!(f, FieldDescriptor::species("Y", 2));
    }
}
