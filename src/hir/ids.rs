//! Identifiers for declarations in the resolution arena.

use std::fmt;

/// Index of a declaration slot in a [`DeclTree`](super::DeclTree).
///
/// Ids are assigned in construction order, which is also file-declaration
/// order: a parent always has a smaller id than its children, and earlier
/// siblings have smaller ids than later ones.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeclId(u32);

impl DeclId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeclId({})", self.0)
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

impl From<u32> for DeclId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_id_index() {
        assert_eq!(DeclId::new(5).index(), 5);
        assert_eq!(DeclId::from(5), DeclId::new(5));
    }

    #[test]
    fn test_decl_id_size() {
        assert_eq!(std::mem::size_of::<DeclId>(), 4);
    }
}
