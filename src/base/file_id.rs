//! File identifiers for the module graph.

use std::fmt;

/// Handle of a source file registered in the module graph.
///
/// Files are the outermost containers of a designation: every resolve
/// target path starts at one. The id is assigned by the parser
/// collaborator when it hands the file's declaration tree over.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileId(u32);

impl FileId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

impl From<u32> for FileId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_ordering_follows_index() {
        let mut files = vec![FileId::new(3), FileId::new(1), FileId::new(2)];
        files.sort();
        assert_eq!(files, vec![FileId::new(1), FileId::new(2), FileId::new(3)]);
    }

    #[test]
    fn test_file_id_display() {
        assert_eq!(FileId::new(7).to_string(), "file#7");
        assert_eq!(format!("{:?}", FileId::from(7)), "FileId(7)");
    }
}
