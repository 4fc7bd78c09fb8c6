//! Fast-forwarding phase markers of declarations with nothing to compute.

use tracing::trace;

use crate::hir::{DeclId, DeclKind, DeclTree, Phase};

/// Whether `phase` rewrites anything in a declaration of `kind`.
///
/// Every kind climbs the full ladder; this only says which steps run a
/// transformer and which are pure marker moves.
pub fn has_work(kind: DeclKind, phase: Phase) -> bool {
    match phase {
        Phase::Raw => false,
        Phase::Imports => kind == DeclKind::File,
        Phase::Supertypes => matches!(kind, DeclKind::Class | DeclKind::TypeAlias),
        Phase::Signatures => matches!(
            kind,
            DeclKind::Function | DeclKind::Constructor | DeclKind::Property | DeclKind::Variable
        ),
        Phase::Body => !matches!(kind, DeclKind::File | DeclKind::TypeAlias),
    }
}

/// After `decl` reached `phase`, move the markers of nested declarations
/// that have no work on the way up to `phase`, recursively.
///
/// A child that still has work on some step keeps its marker, as do all of
/// its own children, so nothing ever skips a transform.
pub(crate) fn update_phase_for_internals(tree: &DeclTree, decl: DeclId, phase: Phase) {
    for &child in tree.children(decl) {
        let (Some(kind), Some(current)) = (tree.kind(child), tree.phase(child)) else {
            continue;
        };
        if current >= phase {
            continue;
        }
        if current.steps_to(phase).any(|step| has_work(kind, step)) {
            continue;
        }
        tree.advance_phase(child, phase);
        trace!(decl = %child, %phase, "phase fast-forwarded");
        update_phase_for_internals(tree, child, phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::hir::{ClassData, DeclData, FunctionData, TreeBuilder, TypeRef};
    use rstest::rstest;

    #[rstest]
    #[case(DeclKind::File, Phase::Imports, true)]
    #[case(DeclKind::File, Phase::Body, false)]
    #[case(DeclKind::Class, Phase::Imports, false)]
    #[case(DeclKind::Class, Phase::Supertypes, true)]
    #[case(DeclKind::TypeAlias, Phase::Signatures, false)]
    #[case(DeclKind::TypeAlias, Phase::Body, false)]
    #[case(DeclKind::Function, Phase::Signatures, true)]
    #[case(DeclKind::Initializer, Phase::Signatures, false)]
    #[case(DeclKind::Initializer, Phase::Body, true)]
    fn test_has_work(#[case] kind: DeclKind, #[case] phase: Phase, #[case] expected: bool) {
        assert_eq!(has_work(kind, phase), expected);
    }

    #[test]
    fn test_internals_move_only_when_idle() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let class = builder.declare(file, "C", DeclData::Class(ClassData::default()));
        let method = builder.declare(
            class,
            "m",
            DeclData::Function(FunctionData::new(Vec::new(), TypeRef::Implicit, None)),
        );
        let tree = builder.build();

        tree.advance_phase(file, Phase::Imports);
        update_phase_for_internals(&tree, file, Phase::Imports);
        assert_eq!(tree.phase(class), Some(Phase::Imports));
        assert_eq!(tree.phase(method), Some(Phase::Imports));

        tree.advance_phase(class, Phase::Supertypes);
        update_phase_for_internals(&tree, class, Phase::Supertypes);
        assert_eq!(tree.phase(method), Some(Phase::Supertypes));

        // Signatures has work for a function; the marker stays.
        update_phase_for_internals(&tree, class, Phase::Signatures);
        assert_eq!(tree.phase(method), Some(Phase::Supertypes));
    }

    #[test]
    fn test_busy_child_shields_its_children() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let outer = builder.declare(file, "Outer", DeclData::Class(ClassData::default()));
        let inner = builder.declare(outer, "Inner", DeclData::Class(ClassData::default()));
        let tree = builder.build();

        tree.advance_phase(outer, Phase::Supertypes);
        update_phase_for_internals(&tree, outer, Phase::Supertypes);

        assert_eq!(tree.phase(inner), Some(Phase::Raw));
    }
}
