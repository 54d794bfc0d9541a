//! Translation between flat-format and adaptive-mesh local side numbering.
//!
//! Flat-format side sets number the sides of an element from 1 following the
//! file convention (triangle side `k` joins nodes `k` and `k+1`; tetrahedron
//! sides are `(1,2,4) (2,3,4) (1,4,3) (1,3,2)`). The adaptive mesh numbers
//! sides from 0 following [`simplex_side_template`](super::element::simplex_side_template).
//! Only the simplex family has a table; everything else is a convention error.

use crate::mesh_error::MeshBridgeError;
use crate::topology::element::ElementFamily;

fn unsupported(family: ElementFamily, dim: usize, side: i64) -> MeshBridgeError {
    MeshBridgeError::UnsupportedSideConvention {
        family: family.to_string(),
        dim,
        side,
    }
}

/// Map a flat-format side index to the adaptive mesh's local side index.
///
/// Triangle sides 4 and 5 wrap around modulo 3; some generators emit shell
/// numbering for planar triangles.
pub fn flat_to_mesh_side(
    family: ElementFamily,
    dim: usize,
    flat_side: i32,
) -> Result<usize, MeshBridgeError> {
    let err = || unsupported(family, dim, i64::from(flat_side));
    match (family, dim) {
        (ElementFamily::Simplex, 2) => match flat_side {
            1..=3 => Ok(((flat_side + 2) % 3) as usize),
            4..=5 => {
                log::warn!("triangle side index {flat_side} wrapped modulo 3");
                Ok(((flat_side + 2) % 3) as usize)
            }
            _ => Err(err()),
        },
        (ElementFamily::Simplex, 3) => match flat_side {
            1 => Ok(1),
            2 => Ok(2),
            3 => Ok(3),
            4 => Ok(0),
            _ => Err(err()),
        },
        _ => Err(err()),
    }
}

/// Map an adaptive-mesh local side index back to the flat-format side index.
pub fn mesh_to_flat_side(
    family: ElementFamily,
    dim: usize,
    mesh_side: usize,
) -> Result<i32, MeshBridgeError> {
    let err = || unsupported(family, dim, mesh_side as i64);
    match (family, dim) {
        (ElementFamily::Simplex, 2) => match mesh_side {
            0..=2 => Ok(mesh_side as i32 + 1),
            _ => Err(err()),
        },
        (ElementFamily::Simplex, 3) => match mesh_side {
            0 => Ok(4),
            1 => Ok(1),
            2 => Ok(2),
            3 => Ok(3),
            _ => Err(err()),
        },
        _ => Err(err()),
    }
}
