//! BODY: bodies, initializers, implicit types and control-flow graphs.
//!
//! Members are handed to the configured [`BodyTransformer`]. Classes are
//! handled here: every member that contributes to instance initialization
//! is body-resolved first, one lock at a time, and then the class graph is
//! computed under the class lock.

use std::sync::Arc;

use tracing::debug;

use crate::base::Name;
use crate::hir::{
    AssignTarget, CfgNodeKind, ClassData, ControlFlowGraph, DeclData, DeclId, DeclKind, DeclTree,
    DelegatedConstructorCall, DiagnosticKind, FunctionData, InitializerData, Lazy, Phase,
    PropertyBodyState, RawStmt, Stmt, Type, TypeRef,
};
use crate::resolve::context::ResolveCx;
use crate::resolve::error::{ResolveResult, TransformError};
use crate::resolve::session::ResolutionSession;
use crate::resolve::tower::{lookup_type, TowerContext, TypeLookup};
use crate::resolve::transformer::{BodyTransformer, TransformCx};
use super::{resolve_under_lock, LazyResolver};

pub struct BodyResolver {
    transformer: Arc<dyn BodyTransformer>,
}

impl BodyResolver {
    pub fn new(transformer: Arc<dyn BodyTransformer>) -> Self {
        Self { transformer }
    }
}

impl std::fmt::Debug for BodyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyResolver").finish_non_exhaustive()
    }
}

impl LazyResolver for BodyResolver {
    fn phase(&self) -> Phase {
        Phase::Body
    }

    fn do_resolve_without_lock(
        &self,
        session: &ResolutionSession,
        cx: &mut ResolveCx,
        decl: DeclId,
    ) -> ResolveResult<bool> {
        let tree = session.tree();
        if tree.kind(decl) != Some(DeclKind::Class) {
            return Ok(false);
        }
        let members: Vec<DeclId> = tree
            .children(decl)
            .iter()
            .copied()
            .filter(|&m| tree.kind(m).is_some_and(DeclKind::contributes_to_class_graph))
            .collect();
        debug!(class = %decl, members = members.len(), "resolving class members before graph");
        for member in members {
            session.drive(cx, member, Phase::Body)?;
        }
        resolve_under_lock(self, session, cx, decl)?;
        Ok(true)
    }

    fn dependencies(
        &self,
        tree: &DeclTree,
        tower: &TowerContext,
        decl: DeclId,
        data: &DeclData,
    ) -> Vec<(DeclId, Phase)> {
        let mut names = Vec::new();
        referenced_names(data, &mut names);

        let mut dependencies: Vec<(DeclId, Phase)> = Vec::new();
        let mut push = |dependency: (DeclId, Phase)| {
            if dependency.0 != decl && !dependencies.contains(&dependency) {
                dependencies.push(dependency);
            }
        };
        for name in names {
            for &candidate in tower.lookup(name) {
                match tree.kind(candidate) {
                    Some(DeclKind::Property | DeclKind::Variable | DeclKind::Function) => {
                        push((candidate, value_phase(tree, candidate)));
                    }
                    Some(DeclKind::Class) => {
                        for constructor in constructors(tree, candidate) {
                            push((constructor, Phase::Signatures));
                        }
                    }
                    _ => {}
                }
            }
        }

        if let DeclData::Constructor(constructor) = data {
            if let Some(call) = &constructor.delegated {
                let own = tree.containing_class(decl);
                let target_class = match call.target().super_type() {
                    None => own,
                    Some(TypeRef::Unresolved(path)) => match lookup_type(tree, tower, path) {
                        TypeLookup::Class(class) => Some(class),
                        _ => None,
                    },
                    Some(TypeRef::Resolved(Type::Class(class))) => Some(*class),
                    Some(_) => own
                        .and_then(|class| tree.published(class))
                        .and_then(|p| p.supertypes())
                        .and_then(|supertypes| supertypes.first().copied()),
                };
                if let Some(class) = target_class {
                    for constructor in constructors(tree, class) {
                        push((constructor, Phase::Signatures));
                    }
                }
            }
        }
        dependencies
    }

    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        match data {
            DeclData::Class(class) => class_graph(cx, class),
            _ => self.transformer.transform(cx, data),
        }
    }

    fn check_is_resolved(&self, _tree: &DeclTree, _decl: DeclId, data: &DeclData) -> Result<(), String> {
        match data {
            DeclData::Function(function) => check_function(function, "function"),
            DeclData::Constructor(constructor) => {
                check_function(&constructor.function, "constructor")?;
                match &constructor.delegated {
                    Some(DelegatedConstructorCall::Lazy { .. }) => {
                        Err("delegated constructor call is still lazy".into())
                    }
                    _ => Ok(()),
                }
            }
            DeclData::Property(property) => {
                if property.body_state != PropertyBodyState::EverythingResolved {
                    return Err(format!("property stopped at {:?}", property.body_state));
                }
                if !property.variable.return_type.is_resolved() {
                    return Err("property type is not resolved".into());
                }
                if property.variable.initializer.as_ref().is_some_and(|i| !i.resolved.is_resolved()) {
                    return Err("property initializer is still lazy".into());
                }
                if property.delegate.as_ref().is_some_and(|d| !d.expression.resolved.is_resolved()) {
                    return Err("property delegate is still lazy".into());
                }
                for (accessor, label) in [(&property.getter, "getter"), (&property.setter, "setter")] {
                    if let Some(accessor) = accessor {
                        check_function(accessor, label)?;
                    }
                }
                if let Some(field) = &property.backing_field {
                    if !field.return_type.is_resolved() {
                        return Err("backing field type is not resolved".into());
                    }
                }
                Ok(())
            }
            DeclData::Variable(variable) => {
                if !variable.return_type.is_resolved() {
                    return Err("variable type is not resolved".into());
                }
                if variable.initializer.as_ref().is_some_and(|i| !i.resolved.is_resolved()) {
                    return Err("variable initializer is still lazy".into());
                }
                Ok(())
            }
            DeclData::Initializer(initializer) => {
                if initializer.body.resolved.is_resolved() {
                    Ok(())
                } else {
                    Err("initializer body is still lazy".into())
                }
            }
            DeclData::Class(class) => match class.cfg {
                Some(_) => Ok(()),
                None => Err("class has no control-flow graph".into()),
            },
            DeclData::File(_) | DeclData::TypeAlias(_) => Ok(()),
        }
    }

    fn publish(&self, tree: &DeclTree, decl: DeclId, data: &DeclData) {
        if let (Some(published), Some(ty)) = (
            tree.published(decl),
            data.return_type().and_then(TypeRef::resolved),
        ) {
            published.publish_return_type(ty.clone());
        }
    }
}

/// The phase a referenced value must reach before its type can be read:
/// its signature when the type is written, its body when it is inferred.
fn value_phase(tree: &DeclTree, decl: DeclId) -> Phase {
    let implicit = tree
        .read(decl)
        .is_some_and(|data| data.return_type().is_some_and(TypeRef::is_implicit));
    if implicit { Phase::Body } else { Phase::Signatures }
}

fn constructors(tree: &DeclTree, class: DeclId) -> impl Iterator<Item = DeclId> + '_ {
    tree.children(class)
        .iter()
        .copied()
        .filter(move |&c| tree.kind(c) == Some(DeclKind::Constructor))
}

/// Bare names in every part of the payload the body phase resolves.
fn referenced_names(data: &DeclData, out: &mut Vec<Name>) {
    fn function(f: &FunctionData, out: &mut Vec<Name>) {
        for param in &f.params {
            if let Some(default) = &param.default_value {
                default.source.names(out);
            }
        }
        if let Some(body) = &f.body {
            body.source.names(out);
        }
    }
    match data {
        DeclData::Function(f) => function(f, out),
        DeclData::Constructor(c) => {
            function(&c.function, out);
            if let Some(call) = &c.delegated {
                for arg in call.source() {
                    arg.names(out);
                }
            }
        }
        DeclData::Property(p) => {
            let exprs = [
                p.variable.initializer.as_ref().map(|i| &i.source),
                p.delegate.as_ref().map(|d| &d.expression.source),
                p.backing_field
                    .as_ref()
                    .and_then(|f| f.initializer.as_ref())
                    .map(|i| &i.source),
            ];
            for expr in exprs.into_iter().flatten() {
                expr.names(out);
            }
            for accessor in [&p.getter, &p.setter].into_iter().flatten() {
                function(accessor, out);
            }
        }
        DeclData::Variable(v) => {
            if let Some(initializer) = &v.initializer {
                initializer.source.names(out);
            }
        }
        DeclData::Initializer(i) => i.body.source.names(out),
        DeclData::File(_) | DeclData::Class(_) | DeclData::TypeAlias(_) => {}
    }
}

fn check_function(function: &FunctionData, label: &str) -> Result<(), String> {
    if function.params.iter().any(|p| {
        p.default_value.as_ref().is_some_and(|d| !d.resolved.is_resolved()) || !p.ty.is_resolved()
    }) {
        return Err(format!("{label} parameters are not resolved"));
    }
    if !function.return_type.is_resolved() {
        return Err(format!("{label} return type is not resolved"));
    }
    match &function.body {
        Some(body) if !body.resolved.is_resolved() => Err(format!("{label} body is still lazy")),
        Some(_) if function.cfg.is_none() => Err(format!("{label} has a body but no graph")),
        None if function.cfg.is_some() => Err(format!("{label} has a graph but no body")),
        _ => Ok(()),
    }
}

// ============================================================================
// CLASS GRAPH
// ============================================================================

/// Build the class graph over property initializers and initializer
/// blocks, in declaration order, and report properties it leaves
/// uninitialized.
///
/// Runs under the class lock, so member payloads are stable.
fn class_graph(cx: &mut TransformCx<'_>, class: &mut ClassData) -> Result<(), TransformError> {
    let tree = cx.tree();
    let owner = cx.decl();
    let mut cfg = ControlFlowGraph::new(owner);
    let mut initialized = Vec::new();
    let mut needs_init = Vec::new();

    for &member in tree.children(owner) {
        cx.check_cancelled()?;
        let Some(data) = tree.read(member) else {
            continue;
        };
        match &*data {
            DeclData::Property(property) => {
                if property.variable.initializer.is_some() || property.delegate.is_some() {
                    cfg.push(CfgNodeKind::Member(member));
                    initialized.push(member);
                } else if property.getter.is_none() {
                    needs_init.push(member);
                }
            }
            DeclData::Variable(variable) => {
                if variable.initializer.is_some() {
                    cfg.push(CfgNodeKind::Member(member));
                    initialized.push(member);
                } else {
                    needs_init.push(member);
                }
            }
            DeclData::Initializer(initializer) => {
                cfg.push(CfgNodeKind::Member(member));
                for target in assigned_members(tree, owner, initializer) {
                    if !initialized.contains(&target) {
                        initialized.push(target);
                    }
                }
            }
            _ => {}
        }
    }

    for member in needs_init {
        if initialized.contains(&member) {
            continue;
        }
        let name = tree.name_of(member).unwrap_or_default();
        cx.report_at(
            member,
            DiagnosticKind::UninitializedProperty,
            format!("property `{name}` must be initialized"),
        );
    }

    cfg.initialized = initialized;
    class.cfg = Some(cfg.finish());
    Ok(())
}

/// Members of `class` assigned at the top level of an initializer block.
fn assigned_members(
    tree: &DeclTree,
    class: DeclId,
    initializer: &InitializerData,
) -> Vec<DeclId> {
    match &initializer.body.resolved {
        Lazy::Resolved(block) => block
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Assign {
                    target: AssignTarget::Decl(decl),
                    ..
                } if tree.parent(*decl) == Some(class) => Some(*decl),
                _ => None,
            })
            .collect(),
        _ => initializer
            .body
            .source
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                RawStmt::Assign { target, .. } => tree.child_named(class, *target),
                _ => None,
            })
            .collect(),
    }
}

