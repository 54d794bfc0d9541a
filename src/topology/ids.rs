//! Strong handles for the three numbering spaces the bridge juggles.
//!
//! A vertex or element is addressed differently depending on who is asking:
//! - [`FlatIndex`]: its row in this rank's flat-format arrays (0-based).
//! - [`GlobalId`]: the id every rank agrees on; immutable once assigned.
//! - [`LocalId`]: the index the adaptive mesh assigned when it was built;
//!   it changes on every rebuild.
//!
//! Keeping them as distinct newtypes makes it a compile error to index one
//! space with a value from another. All three are `repr(transparent)`.

use std::fmt;

macro_rules! index_newtype {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Returns the raw value.
            #[inline]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(raw: $inner) -> Self {
                $name(raw)
            }
        }
    };
}

index_newtype!(
    /// Row of an entity in this rank's flat-format arrays.
    FlatIndex(usize)
);

index_newtype!(
    /// Rank-independent id of a vertex or element.
    GlobalId(u64)
);

index_newtype!(
    /// Index of an entity inside the adaptive mesh.
    LocalId(usize)
);

impl FlatIndex {
    /// Index usable for slicing flat-format arrays.
    #[inline]
    pub const fn idx(self) -> usize {
        self.0
    }
}

impl LocalId {
    /// Index usable for slicing adaptive-mesh arrays.
    #[inline]
    pub const fn idx(self) -> usize {
        self.0
    }
}

/// Classification id attached to boundary entities and regions.
pub type ClassId = i32;
