//! IMPORTS: bind file import directives to the module graph.

use crate::hir::{DeclData, DeclId, DeclTree, DiagnosticKind, ImportTarget, Lazy, Phase};
use crate::resolve::error::TransformError;
use crate::resolve::transformer::TransformCx;
use super::LazyResolver;

#[derive(Clone, Copy, Debug, Default)]
pub struct ImportsResolver;

impl LazyResolver for ImportsResolver {
    fn phase(&self) -> Phase {
        Phase::Imports
    }

    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        let DeclData::File(file) = data else {
            return Ok(());
        };
        let tree = cx.tree();
        for import in &mut file.imports {
            if import.target.is_resolved() {
                continue;
            }
            cx.check_cancelled()?;
            import.target = Lazy::InProgress;
            let target = if import.star && tree.modules().has_package(&import.path) {
                ImportTarget::Package(import.path.clone())
            } else {
                match tree.lookup_qualified(&import.path) {
                    Some(decl) => ImportTarget::Declaration(decl),
                    None => ImportTarget::Missing,
                }
            };
            if target == ImportTarget::Missing {
                let rendered = cx.path(&import.path);
                let suffix = if import.star { ".*" } else { "" };
                cx.report_in(
                    import.range,
                    DiagnosticKind::UnresolvedImport,
                    format!("unresolved import `{rendered}{suffix}`"),
                );
            }
            import.target = Lazy::Resolved(target);
        }
        Ok(())
    }

    fn check_is_resolved(&self, _tree: &DeclTree, _decl: DeclId, data: &DeclData) -> Result<(), String> {
        match data {
            DeclData::File(file) => match file.imports.iter().position(|i| !i.target.is_resolved()) {
                Some(index) => Err(format!("import {index} is still unbound")),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}
