//! MeshBridgeError: unified error type for the bridge's public APIs.
//!
//! Every fallible operation returns this type. Variants fall into four
//! families (see [`ErrorKind`]); all of them are fatal for the conversion
//! that raised them. Entities that simply live on another rank are not
//! errors and are reported as `None` by the lookups instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse classification of a [`MeshBridgeError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Unsupported element type/family or inconsistent block metadata.
    Configuration,
    /// A side index that has no translation for the mesh family/dimension.
    Convention,
    /// Upstream topology or bookkeeping is inconsistent.
    Invariant,
    /// File creation, reading, or parsing failed.
    Io,
}

/// Unified error type for mesh bridge operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshBridgeError {
    /// Element type name outside the recognized vocabulary.
    #[error("unsupported element type \"{0}\"")]
    UnsupportedElementType(String),
    /// Two element blocks resolve to different spatial dimensions.
    #[error("element block {block} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        block: i32,
        expected: usize,
        found: usize,
    },
    /// A block's nodes-per-element disagrees with its element family.
    #[error("element block {block} lists {found} nodes per element, family requires {expected}")]
    NodesPerElementMismatch {
        block: i32,
        expected: usize,
        found: usize,
    },
    /// Bridge configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No side-index translation exists for this family/dimension/index.
    #[error("no side translation for {family} in {dim}D, side {side}")]
    UnsupportedSideConvention {
        family: String,
        dim: usize,
        side: i64,
    },

    /// Generic invariant violation in upstream topology or bookkeeping.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// A side of the adaptive mesh is adjacent to no element.
    #[error("invariant violation: side {side} has no adjacent element")]
    OrphanedSide { side: usize },
    /// The rebuilt mesh does not have the expected number of entities.
    #[error("invariant violation: expected {expected} {what} after rebuild, found {found}")]
    VertexCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A flat-format or mesh index lies outside its table.
    #[error("index {index} out of range for {what} (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
    /// A tag requested from the adaptive mesh does not exist.
    #[error("missing tag \"{name}\" on dimension {dim}")]
    MissingTag { dim: usize, name: String },
    /// A tag's storage disagrees with its entity count.
    #[error("tag \"{name}\" on dimension {dim} has {found} values, expected {expected}")]
    TagLengthMismatch {
        dim: usize,
        name: String,
        expected: usize,
        found: usize,
    },
    /// The adaptive mesh stores no entities of this dimension.
    #[error("entities of dimension {0} are not available")]
    UnsupportedEntityDimension(usize),

    /// File creation or access failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },
    /// Flat-format text could not be parsed.
    #[error("flat mesh parse error: {0}")]
    Parse(String),
}

impl MeshBridgeError {
    /// Wrap an [`std::io::Error`] together with the offending path.
    pub fn io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        MeshBridgeError::Io {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Attach `path` to an I/O error raised on an unnamed stream.
    pub fn with_path(self, path: impl AsRef<Path>) -> Self {
        match self {
            MeshBridgeError::Io { path: p, message } if p.as_os_str().is_empty() => {
                MeshBridgeError::Io {
                    path: path.as_ref().to_path_buf(),
                    message,
                }
            }
            other => other,
        }
    }

    /// Family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        use MeshBridgeError::*;
        match self {
            UnsupportedElementType(_)
            | DimensionMismatch { .. }
            | NodesPerElementMismatch { .. }
            | InvalidConfig(_) => ErrorKind::Configuration,
            UnsupportedSideConvention { .. } => ErrorKind::Convention,
            InvariantViolation(_)
            | OrphanedSide { .. }
            | VertexCountMismatch { .. }
            | OutOfRange { .. }
            | MissingTag { .. }
            | TagLengthMismatch { .. }
            | UnsupportedEntityDimension(_) => ErrorKind::Invariant,
            Io { .. } | Parse(_) => ErrorKind::Io,
        }
    }
}

impl From<std::io::Error> for MeshBridgeError {
    fn from(err: std::io::Error) -> Self {
        MeshBridgeError::Io {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}
