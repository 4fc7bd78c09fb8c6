//! SIGNATURES: explicitly written parameter, return and variable types.

use crate::base::Name;
use crate::hir::{
    DeclData, DeclId, DeclTree, DiagnosticKind, FunctionData, Phase, Type, TypeRef,
};
use crate::resolve::error::TransformError;
use crate::resolve::tower::{lookup_type, TowerContext, TypeLookup};
use crate::resolve::transformer::TransformCx;
use super::LazyResolver;

#[derive(Clone, Copy, Debug, Default)]
pub struct SignaturesResolver;

impl LazyResolver for SignaturesResolver {
    fn phase(&self) -> Phase {
        Phase::Signatures
    }

    /// Aliases named in written types must be expanded first.
    fn dependencies(
        &self,
        tree: &DeclTree,
        tower: &TowerContext,
        _decl: DeclId,
        data: &DeclData,
    ) -> Vec<(DeclId, Phase)> {
        let mut paths = Vec::new();
        written_paths(data, &mut paths);
        let mut dependencies = Vec::new();
        for path in paths {
            if let TypeLookup::Alias(alias) = lookup_type(tree, tower, path) {
                if !dependencies.contains(&(alias, Phase::Supertypes)) {
                    dependencies.push((alias, Phase::Supertypes));
                }
            }
        }
        dependencies
    }

    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        cx.check_cancelled()?;
        match data {
            DeclData::Function(function) => {
                resolve_function(cx, function, true);
            }
            DeclData::Constructor(constructor) => {
                resolve_function(cx, &mut constructor.function, true);
                let class = cx.tree().containing_class(cx.decl());
                constructor.function.return_type = TypeRef::Resolved(match class {
                    Some(class) => Type::Class(class),
                    None => Type::Error,
                });
            }
            DeclData::Property(property) => {
                property.variable.return_type = cx.resolve_type_ref(&property.variable.return_type);
                if let Some(getter) = &mut property.getter {
                    resolve_function(cx, getter, false);
                }
                if let Some(setter) = &mut property.setter {
                    resolve_function(cx, setter, false);
                }
                if let Some(field) = &mut property.backing_field {
                    field.return_type = cx.resolve_type_ref(&field.return_type);
                }
            }
            DeclData::Variable(variable) => {
                variable.return_type = cx.resolve_type_ref(&variable.return_type);
            }
            _ => {}
        }
        Ok(())
    }

    fn check_is_resolved(&self, _tree: &DeclTree, _decl: DeclId, data: &DeclData) -> Result<(), String> {
        let mut paths = Vec::new();
        written_paths(data, &mut paths);
        if !paths.is_empty() {
            return Err(format!("{} written types are still unresolved", paths.len()));
        }
        if let DeclData::Constructor(constructor) = data {
            if !constructor.function.return_type.is_resolved() {
                return Err("constructor has no result type".into());
            }
        }
        Ok(())
    }

    fn publish(&self, tree: &DeclTree, decl: DeclId, data: &DeclData) {
        let Some(published) = tree.published(decl) else {
            return;
        };
        if let Some(function) = data.as_function() {
            published.publish_parameters(
                function
                    .params
                    .iter()
                    .map(|p| p.ty.resolved().cloned().unwrap_or(Type::Error))
                    .collect(),
            );
        }
        if let Some(ty) = data.return_type().and_then(TypeRef::resolved) {
            published.publish_return_type(ty.clone());
        }
    }
}

/// Resolve the written types of a function-shaped part.
///
/// Parameters of declared functions must be typed; accessor parameters may
/// be left implicit and take the property type at body phase.
fn resolve_function(cx: &mut TransformCx<'_>, function: &mut FunctionData, params_required: bool) {
    for param in &mut function.params {
        if param.ty.is_implicit() && params_required {
            let name = cx.name(param.name);
            cx.report(
                DiagnosticKind::UnresolvedType,
                format!("parameter `{name}` needs an explicit type"),
            );
            param.ty = TypeRef::Resolved(Type::Error);
        } else {
            param.ty = cx.resolve_type_ref(&param.ty);
        }
    }
    function.return_type = cx.resolve_type_ref(&function.return_type);
}

/// Every written, still unresolved type path of a payload.
fn written_paths<'d>(data: &'d DeclData, out: &mut Vec<&'d [Name]>) {
    fn function<'d>(f: &'d FunctionData, out: &mut Vec<&'d [Name]>) {
        out.extend(f.params.iter().filter_map(|p| p.ty.path()));
        out.extend(f.return_type.path());
    }
    match data {
        DeclData::Function(f) => function(f, out),
        DeclData::Constructor(c) => function(&c.function, out),
        DeclData::Property(p) => {
            out.extend(p.variable.return_type.path());
            for accessor in [&p.getter, &p.setter].into_iter().flatten() {
                function(accessor, out);
            }
            if let Some(field) = &p.backing_field {
                out.extend(field.return_type.path());
            }
        }
        DeclData::Variable(v) => out.extend(v.return_type.path()),
        _ => {}
    }
}

