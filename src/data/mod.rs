//! Data module: index translation and per-vertex field stores.

pub mod fields;
pub mod translator;

pub use fields::{
    FieldDescriptor, FieldKind, FieldRole, SolutionStore, SolutionVector, SolverBookkeeping,
    expand_tag_names,
};
pub use translator::{DenseRenumbering, GlobalIdTable, IndexTranslator};
