//! SUPERTYPES: class supertypes and type-alias expansions.

use crate::base::Name;
use crate::hir::{DeclData, DeclId, DeclTree, DiagnosticKind, Phase, Type, TypeRef};
use crate::resolve::error::TransformError;
use crate::resolve::tower::{lookup_type, TowerContext, TypeLookup};
use crate::resolve::transformer::TransformCx;
use super::LazyResolver;

#[derive(Clone, Copy, Debug, Default)]
pub struct SupertypesResolver;

impl LazyResolver for SupertypesResolver {
    fn phase(&self) -> Phase {
        Phase::Supertypes
    }

    fn dependencies(
        &self,
        tree: &DeclTree,
        tower: &TowerContext,
        _decl: DeclId,
        data: &DeclData,
    ) -> Vec<(DeclId, Phase)> {
        let paths: Vec<&[Name]> = match data {
            DeclData::Class(class) => class.supertypes.iter().filter_map(TypeRef::path).collect(),
            DeclData::TypeAlias(alias) => alias.aliased.path().into_iter().collect(),
            _ => Vec::new(),
        };
        paths
            .into_iter()
            .filter_map(|path| match lookup_type(tree, tower, path) {
                TypeLookup::Class(decl) | TypeLookup::Alias(decl) => Some((decl, Phase::Supertypes)),
                _ => None,
            })
            .collect()
    }

    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        match data {
            DeclData::Class(class) => {
                for supertype in &mut class.supertypes {
                    cx.check_cancelled()?;
                    if let TypeRef::Unresolved(path) = supertype {
                        let path = std::mem::take(path);
                        *supertype = TypeRef::Resolved(resolve_supertype(cx, &path));
                    }
                }
                Ok(())
            }
            DeclData::TypeAlias(alias) => {
                alias.aliased = match &alias.aliased {
                    TypeRef::Implicit => {
                        cx.report(DiagnosticKind::UnresolvedType, "type alias has no aliased type");
                        TypeRef::Resolved(Type::Error)
                    }
                    other => cx.resolve_type_ref(other),
                };
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn check_is_resolved(&self, _tree: &DeclTree, _decl: DeclId, data: &DeclData) -> Result<(), String> {
        match data {
            DeclData::Class(class) if !class.supertypes.iter().all(TypeRef::is_resolved) => {
                Err("class supertypes are still unresolved".into())
            }
            DeclData::TypeAlias(alias) if !alias.aliased.is_resolved() => {
                Err("type alias expansion is still unresolved".into())
            }
            _ => Ok(()),
        }
    }

    fn publish(&self, tree: &DeclTree, decl: DeclId, data: &DeclData) {
        let Some(published) = tree.published(decl) else {
            return;
        };
        match data {
            DeclData::Class(class) => published.publish_supertypes(
                class
                    .supertypes
                    .iter()
                    .filter_map(|ty| match ty.resolved() {
                        Some(Type::Class(id)) => Some(*id),
                        _ => None,
                    })
                    .collect(),
            ),
            DeclData::TypeAlias(alias) => {
                if let Some(ty) = alias.aliased.resolved() {
                    published.publish_expanded(ty.clone());
                }
            }
            _ => {}
        }
    }
}

/// Resolve one written supertype of the class being transformed.
fn resolve_supertype(cx: &mut TransformCx<'_>, path: &[Name]) -> Type {
    let tree = cx.tree();
    let rendered = cx.path(path);
    let class = match lookup_type(tree, cx.tower(), path) {
        TypeLookup::Class(class) => class,
        TypeLookup::Alias(alias) => match tree.published(alias).and_then(|p| p.expanded()) {
            Some(Type::Class(class)) => *class,
            Some(Type::Error) => return Type::Error,
            Some(other) => {
                cx.report(
                    DiagnosticKind::InvalidSupertype,
                    format!("`{rendered}` expands to {other}, which is not a class"),
                );
                return Type::Error;
            }
            None => {
                if cx.is_in_flight(alias) {
                    cx.report(
                        DiagnosticKind::RecursiveTypeAlias,
                        format!("type alias `{rendered}` depends on itself"),
                    );
                }
                return Type::Error;
            }
        },
        TypeLookup::Builtin(ty) => {
            cx.report(
                DiagnosticKind::InvalidSupertype,
                format!("builtin type {ty} cannot be a supertype"),
            );
            return Type::Error;
        }
        TypeLookup::NotAType(_) | TypeLookup::NotFound => {
            cx.report(DiagnosticKind::UnresolvedType, format!("unresolved type `{rendered}`"));
            return Type::Error;
        }
    };

    if closes_cycle(cx, class) {
        cx.report(
            DiagnosticKind::CyclicInheritance,
            format!("`{rendered}` inherits from this class"),
        );
        return Type::Error;
    }
    Type::Class(class)
}

/// Whether inheriting from `target` makes the class its own ancestor.
///
/// A supertype still in flight on this chain has not published its own
/// supertypes, which only happens when it is waiting on this class.
fn closes_cycle(cx: &TransformCx<'_>, target: DeclId) -> bool {
    let tree = cx.tree();
    let own = cx.decl();
    let mut stack = vec![target];
    let mut visited = Vec::new();
    while let Some(current) = stack.pop() {
        if current == own {
            return true;
        }
        if visited.contains(&current) {
            continue;
        }
        visited.push(current);
        match tree.published(current).and_then(|p| p.supertypes()) {
            Some(supertypes) => stack.extend_from_slice(supertypes),
            None if cx.is_in_flight(current) => return true,
            None => {}
        }
    }
    false
}
