//! Containing-declaration queries.

use std::sync::Arc;

use smol_str::SmolStr;
use text_size::TextSize;

use crate::base::FileId;
use crate::hir::{DeclId, DeclKind, DeclTree, Phase};
use crate::resolve::{ResolutionSession, ResolveResult};

/// The declaration directly containing `decl`.
///
/// Top-level declarations and files have none; class members return their
/// class.
pub fn containing_declaration(tree: &DeclTree, decl: DeclId) -> Option<DeclId> {
    tree.parent(decl)
        .filter(|&parent| tree.kind(parent) != Some(DeclKind::File))
}

/// The file declaration `decl` lives in (itself for files).
pub fn containing_file(tree: &DeclTree, decl: DeclId) -> Option<DeclId> {
    tree.file_of(decl)
}

/// The innermost class strictly enclosing `decl`.
pub fn containing_class(tree: &DeclTree, decl: DeclId) -> Option<DeclId> {
    tree.containing_class(decl)
}

/// The innermost declaration of `file` whose range covers `offset`.
pub fn declaration_at(tree: &DeclTree, file: FileId, offset: TextSize) -> Option<DeclId> {
    let mut current = tree.file_decl(file)?;
    'descend: loop {
        for &child in tree.children(current) {
            let covers = tree
                .header(child)
                .is_some_and(|header| header.range.contains_inclusive(offset));
            if covers {
                current = child;
                continue 'descend;
            }
        }
        return Some(current);
    }
}

/// Names visible from inside `decl`, innermost scope first.
///
/// Uses the tower recorded when `decl` was transformed. Without one, `decl`
/// is brought to [`Phase::Imports`] so its file's imports are bound, and
/// the tower is computed on the spot.
pub fn visible_names(session: &ResolutionSession, decl: DeclId) -> ResolveResult<Vec<SmolStr>> {
    let recorded = session
        .collector()
        .and_then(|collector| collector.declaration_context(decl));
    let tower = match recorded {
        Some(tower) => tower,
        None => {
            session.resolve_to(decl, Phase::Imports)?;
            Arc::new(session.scope_cache().tower(session.tree(), decl))
        }
    };
    let interner = session.tree().interner();
    Ok(tower
        .visible_names()
        .into_iter()
        .filter_map(|name| interner.lookup(name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use text_size::TextRange;

    use crate::hir::{ClassData, DeclData, FunctionData, TreeBuilder, ValueParameter};

    struct Sample {
        tree: Arc<DeclTree>,
        file: DeclId,
        class: DeclId,
        method: DeclId,
    }

    fn sample() -> Sample {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/shapes.st", "shapes");
        let class = builder.declare_at(
            file,
            "Circle",
            DeclData::Class(ClassData::default()),
            TextRange::new(0.into(), 100.into()),
        );
        let radius = builder.name("radius");
        let method = builder.declare_at(
            class,
            "scale",
            DeclData::Function(FunctionData::new(
                vec![ValueParameter {
                    name: radius,
                    ty: builder.type_ref("Int"),
                    default_value: None,
                }],
                builder.type_ref("Int"),
                None,
            )),
            TextRange::new(20.into(), 40.into()),
        );
        Sample {
            tree: Arc::new(builder.build()),
            file,
            class,
            method,
        }
    }

    #[test]
    fn test_containing_declarations() {
        let s = sample();

        assert_eq!(containing_declaration(&s.tree, s.method), Some(s.class));
        assert_eq!(containing_declaration(&s.tree, s.class), None);
        assert_eq!(containing_file(&s.tree, s.method), Some(s.file));
        assert_eq!(containing_class(&s.tree, s.method), Some(s.class));
        assert_eq!(containing_class(&s.tree, s.class), None);
    }

    #[test]
    fn test_declaration_at_offset() {
        let s = sample();

        assert_eq!(declaration_at(&s.tree, FileId::new(0), 30.into()), Some(s.method));
        assert_eq!(declaration_at(&s.tree, FileId::new(0), 50.into()), Some(s.class));
        assert_eq!(declaration_at(&s.tree, FileId::new(0), 500.into()), Some(s.file));
        assert_eq!(declaration_at(&s.tree, FileId::new(9), 0.into()), None);
    }

    #[test]
    fn test_visible_names_after_resolution() {
        let s = sample();
        let session = ResolutionSession::new(Arc::clone(&s.tree));
        session.resolve_to(s.method, Phase::Signatures).unwrap();

        let names = visible_names(&session, s.method).unwrap();

        assert_eq!(names.first().map(SmolStr::as_str), Some("radius"));
        assert!(names.iter().any(|n| n == "scale"));
        assert!(names.iter().any(|n| n == "Circle"));
    }

    #[test]
    fn test_visible_names_without_recorded_tower() {
        let s = sample();
        let config = crate::resolve::SessionConfig::default().with_tower_contexts(false);
        let session = ResolutionSession::with_config(Arc::clone(&s.tree), config);

        let names = visible_names(&session, s.class).unwrap();

        assert!(names.iter().any(|n| n == "Circle"));
        assert!(s.tree.is_at_least(s.file, Phase::Imports));
    }
}
