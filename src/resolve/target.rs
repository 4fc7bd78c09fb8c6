//! Resolve targets: what a resolution request is about.

use crate::base::FileId;
use crate::hir::{DeclId, DeclKind, DeclTree};
use super::error::{ResolveError, ResolveResult};

/// A declaration to resolve, optionally addressed through its containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveTarget {
    /// A single declaration; its containers are looked up in the tree.
    Declaration(DeclId),
    /// The ordered path from a file down to the target, file first and
    /// target last.
    Designation(Vec<DeclId>),
}

impl From<DeclId> for ResolveTarget {
    fn from(decl: DeclId) -> Self {
        ResolveTarget::Declaration(decl)
    }
}

impl ResolveTarget {
    /// Address `decl` through its full container path.
    pub fn designate(tree: &DeclTree, decl: DeclId) -> ResolveResult<Self> {
        if !tree.contains(decl) {
            return Err(ResolveError::UnknownDeclaration(decl));
        }
        Ok(ResolveTarget::Designation(tree.designation(decl)))
    }

    /// Address a declaration inside `file` by its dotted member path, such
    /// as `Shape.area`.
    pub fn nested(tree: &DeclTree, file: FileId, path: &str) -> ResolveResult<Self> {
        let not_found = || ResolveError::TargetNotFound {
            file,
            path: path.to_string(),
        };
        let file_decl = tree.file_decl(file).ok_or_else(not_found)?;
        let mut designation = vec![file_decl];
        let mut current = file_decl;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let name = tree.interner().find(segment).ok_or_else(not_found)?;
            current = tree.child_named(current, name).ok_or_else(not_found)?;
            designation.push(current);
        }
        if designation.len() == 1 {
            return Err(not_found());
        }
        Ok(ResolveTarget::Designation(designation))
    }

    /// The leaf declaration.
    pub fn target_declaration(&self) -> Option<DeclId> {
        match self {
            ResolveTarget::Declaration(decl) => Some(*decl),
            ResolveTarget::Designation(path) => path.last().copied(),
        }
    }

    /// Containers below the file down to the target, target included.
    ///
    /// A top-level declaration yields just itself; a file target yields the
    /// file.
    pub fn designation_sequence(&self, tree: &DeclTree) -> Vec<DeclId> {
        let full = match self {
            ResolveTarget::Declaration(decl) => tree.designation(*decl),
            ResolveTarget::Designation(path) => path.clone(),
        };
        match full.split_first() {
            Some((&first, rest))
                if !rest.is_empty() && tree.kind(first) == Some(DeclKind::File) =>
            {
                rest.to_vec()
            }
            _ => full,
        }
    }

    /// Check the target against the tree: the leaf must exist and a
    /// designation must follow real parent links.
    pub fn validate(&self, tree: &DeclTree) -> ResolveResult<DeclId> {
        let leaf = match self.target_declaration() {
            Some(leaf) => leaf,
            None => {
                return Err(ResolveError::TargetNotFound {
                    file: FileId::new(0),
                    path: String::new(),
                });
            }
        };
        if !tree.contains(leaf) {
            return Err(ResolveError::UnknownDeclaration(leaf));
        }
        if let ResolveTarget::Designation(path) = self {
            if *path != tree.designation(leaf) {
                let file = tree.header(leaf).map(|h| h.file).unwrap_or(FileId::new(0));
                let rendered = path
                    .iter()
                    .filter_map(|&d| tree.name_of(d))
                    .collect::<Vec<_>>()
                    .join(".");
                return Err(ResolveError::TargetNotFound {
                    file,
                    path: rendered,
                });
            }
        }
        Ok(leaf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::{ClassData, DeclData, TreeBuilder, VariableData};

    fn sample() -> (DeclTree, DeclId, DeclId, DeclId) {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/shapes.st", "shapes");
        let class = builder.declare(file, "Shape", DeclData::Class(ClassData::default()));
        let area = builder.declare(
            class,
            "area",
            DeclData::Variable(VariableData::new(builder.type_ref("Int"), None)),
        );
        (builder.build(), file, class, area)
    }

    #[test]
    fn test_designation_sequence_skips_file() {
        let (tree, _, class, area) = sample();

        let target = ResolveTarget::from(area);
        assert_eq!(target.designation_sequence(&tree), vec![class, area]);
        assert_eq!(ResolveTarget::from(class).designation_sequence(&tree), vec![class]);
        assert_eq!(target.target_declaration(), Some(area));
    }

    #[test]
    fn test_nested_lookup_by_path() {
        let (tree, file, class, area) = sample();

        let target = ResolveTarget::nested(&tree, FileId::new(0), "Shape.area").unwrap();
        assert_eq!(target, ResolveTarget::Designation(vec![file, class, area]));
        assert_eq!(target.validate(&tree), Ok(area));
    }

    #[test]
    fn test_missing_nested_target() {
        let (tree, _, _, _) = sample();

        let err = ResolveTarget::nested(&tree, FileId::new(0), "Shape.perimeter").unwrap_err();
        assert!(matches!(err, ResolveError::TargetNotFound { ref path, .. } if path == "Shape.perimeter"));
        assert!(ResolveTarget::nested(&tree, FileId::new(9), "Shape").is_err());
    }

    #[test]
    fn test_forged_designation_is_rejected() {
        let (tree, file, _, area) = sample();

        let forged = ResolveTarget::Designation(vec![file, area]);
        assert!(matches!(forged.validate(&tree), Err(ResolveError::TargetNotFound { .. })));
        assert_eq!(
            ResolveTarget::from(DeclId::new(40)).validate(&tree),
            Err(ResolveError::UnknownDeclaration(DeclId::new(40)))
        );
    }
}
