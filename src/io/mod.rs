//! Flat-format mesh I/O.
//!
//! [`FlatMeshReader`] and [`FlatMeshWriter`] are the seams to whatever codec
//! stores shards on disk. The provided `*_path` helpers open the file and
//! attach the path to any I/O error.

pub mod flat;
pub mod text;

pub use flat::{ElementBlock, FlatMesh, FlatShard, IdBase, NodeSet, SideSet};
pub use text::{TextFlatReader, TextFlatWriter};

use crate::mesh_error::MeshBridgeError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Reads one rank's flat-format shard.
pub trait FlatMeshReader {
    /// Parse a shard from a byte stream.
    fn read<R: Read>(&self, reader: R) -> Result<FlatShard, MeshBridgeError>;

    /// Open `path` and parse it.
    fn read_path(&self, path: &Path) -> Result<FlatShard, MeshBridgeError> {
        let file = File::open(path).map_err(|e| MeshBridgeError::io(path, e))?;
        self.read(BufReader::new(file))
            .map_err(|e| e.with_path(path))
    }
}

/// Writes one rank's flat-format shard.
pub trait FlatMeshWriter {
    /// Serialize a shard to a byte stream.
    fn write<W: Write>(&self, writer: W, shard: &FlatShard) -> Result<(), MeshBridgeError>;

    /// Create (or truncate) `path` and write the shard to it.
    fn write_path(&self, path: &Path, shard: &FlatShard) -> Result<(), MeshBridgeError> {
        let file = File::create(path).map_err(|e| MeshBridgeError::io(path, e))?;
        let mut out = BufWriter::new(file);
        self.write(&mut out, shard).map_err(|e| e.with_path(path))?;
        out.flush().map_err(|e| MeshBridgeError::io(path, e))
    }
}
