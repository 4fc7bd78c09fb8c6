//! State keepers for each declaration kind.
//!
//! Each keeper lists the fields a phase transform may rewrite in place. The
//! [`DECLARATION`] keeper dispatches on the payload variant, so one capture
//! call covers any declaration.

use std::sync::LazyLock;

use crate::hir::{
    ClassData, ConstructorData, DeclData, DelegatedConstructorCall, FileData, FunctionData,
    Import, InitializerData, Lazy, LazyBlock, LazyExpr, PropertyBodyState, PropertyData,
    TypeAliasData, ValueParameter, VariableData,
};
use super::state_keeper::{StateKeeper, StateSnapshot};

// ============================================================================
// GUARDS
// ============================================================================

/// A placeholder caught mid-substitution is captured as not computed.
pub fn lazy_guard<T>(value: Lazy<T>) -> Lazy<T> {
    match value {
        Lazy::InProgress => Lazy::Unresolved,
        other => other,
    }
}

/// Delegated calls are always captured in their lazy form, keeping the
/// `this`/`super` target and the written super type.
pub fn delegated_call_guard(
    call: Option<DelegatedConstructorCall>,
) -> Option<DelegatedConstructorCall> {
    call.map(|call| match call {
        lazy @ DelegatedConstructorCall::Lazy { .. } => lazy,
        DelegatedConstructorCall::Resolved { target, source, .. } => {
            DelegatedConstructorCall::Lazy {
                target,
                arguments: source,
            }
        }
    })
}

fn constructor_is_resolved(constructor: &ConstructorData) -> bool {
    let function = &constructor.function;
    let delegated = !constructor.delegated.as_ref().is_some_and(DelegatedConstructorCall::is_lazy);
    let body = match &function.body {
        Some(body) => body.resolved.is_resolved() && function.cfg.is_some(),
        None => true,
    };
    delegated
        && body
        && function.return_type.is_resolved()
        && function.params.iter().all(|p| {
            p.ty.is_resolved() && p.default_value.as_ref().is_none_or(|d| d.resolved.is_resolved())
        })
}

fn imports_guard(imports: Vec<Import>) -> Vec<Import> {
    imports
        .into_iter()
        .map(|import| Import {
            target: lazy_guard(import.target),
            ..import
        })
        .collect()
}

// ============================================================================
// KEEPERS
// ============================================================================

pub static EXPRESSION: LazyLock<StateKeeper<LazyExpr>> = LazyLock::new(|| {
    StateKeeper::<LazyExpr>::builder("expression")
        .add_guarded(
            |expr| expr.resolved.clone(),
            |expr, value| expr.resolved = value,
            lazy_guard,
        )
        .build()
});

pub static BLOCK: LazyLock<StateKeeper<LazyBlock>> = LazyLock::new(|| {
    StateKeeper::<LazyBlock>::builder("block")
        .add_guarded(
            |block| block.resolved.clone(),
            |block, value| block.resolved = value,
            lazy_guard,
        )
        .build()
});

pub static PARAMETER: LazyLock<StateKeeper<ValueParameter>> = LazyLock::new(|| {
    StateKeeper::<ValueParameter>::builder("parameter")
        .add(|param| param.ty.clone(), |param, ty| param.ty = ty)
        .entity(
            |param| param.default_value.as_ref(),
            |param| param.default_value.as_mut(),
            &EXPRESSION,
        )
        .build()
});

pub static FUNCTION: LazyLock<StateKeeper<FunctionData>> = LazyLock::new(|| {
    StateKeeper::<FunctionData>::builder("function")
        .add(|f| f.return_type.clone(), |f, ty| f.return_type = ty)
        .entity_list(|f| f.params.as_slice(), |f| f.params.as_mut_slice(), &PARAMETER)
        .entity(|f| f.body.as_ref(), |f| f.body.as_mut(), &BLOCK)
        .add(|f| f.cfg.clone(), |f, cfg| f.cfg = cfg)
        .build()
});

/// A constructor past its body phase captures nothing, so a snapshot of it
/// restores exactly, resolved delegated call included.
pub static CONSTRUCTOR: LazyLock<StateKeeper<ConstructorData>> = LazyLock::new(|| {
    StateKeeper::<ConstructorData>::builder("constructor")
        .skip_when(constructor_is_resolved)
        .entity(|c| Some(&c.function), |c| Some(&mut c.function), &FUNCTION)
        .add_guarded(
            |c| c.delegated.clone(),
            |c, call| c.delegated = call,
            delegated_call_guard,
        )
        .build()
});

pub static VARIABLE: LazyLock<StateKeeper<VariableData>> = LazyLock::new(|| {
    StateKeeper::<VariableData>::builder("variable")
        .add(|v| v.return_type.clone(), |v, ty| v.return_type = ty)
        .entity(|v| v.initializer.as_ref(), |v| v.initializer.as_mut(), &EXPRESSION)
        .build()
});

/// Sub-parts are captured only while they are below their terminal state;
/// a fully resolved property captures nothing.
pub static PROPERTY: LazyLock<StateKeeper<PropertyData>> = LazyLock::new(|| {
    StateKeeper::<PropertyData>::builder("property")
        .skip_when(|p| p.body_state == PropertyBodyState::EverythingResolved)
        .add(
            |p| p.variable.return_type.clone(),
            |p, ty| p.variable.return_type = ty,
        )
        .entity(
            PropertyData::initializer_if_unresolved,
            |p| p.variable.initializer.as_mut(),
            &EXPRESSION,
        )
        .add(|p| p.body_state, |p, state| p.body_state = state)
        .entity(PropertyData::getter_if_unresolved, |p| p.getter.as_mut(), &FUNCTION)
        .entity(PropertyData::setter_if_unresolved, |p| p.setter.as_mut(), &FUNCTION)
        .entity(
            PropertyData::backing_field_if_unresolved,
            |p| p.backing_field.as_mut(),
            &VARIABLE,
        )
        .entity_with(
            PropertyData::delegate_if_unresolved,
            |p| p.delegate.as_mut(),
            |delegate| {
                delegate.entity(
                    |d| Some(&d.expression),
                    |d| Some(&mut d.expression),
                    &EXPRESSION,
                )
            },
        )
        .build()
});

pub static INITIALIZER: LazyLock<StateKeeper<InitializerData>> = LazyLock::new(|| {
    StateKeeper::<InitializerData>::builder("initializer")
        .entity(|i| Some(&i.body), |i| Some(&mut i.body), &BLOCK)
        .build()
});

pub static CLASS: LazyLock<StateKeeper<ClassData>> = LazyLock::new(|| {
    StateKeeper::<ClassData>::builder("class")
        .add(|c| c.supertypes.clone(), |c, supertypes| c.supertypes = supertypes)
        .add(|c| c.cfg.clone(), |c, cfg| c.cfg = cfg)
        .build()
});

pub static TYPE_ALIAS: LazyLock<StateKeeper<TypeAliasData>> = LazyLock::new(|| {
    StateKeeper::<TypeAliasData>::builder("type alias")
        .add(|a| a.aliased.clone(), |a, aliased| a.aliased = aliased)
        .build()
});

pub static FILE: LazyLock<StateKeeper<FileData>> = LazyLock::new(|| {
    StateKeeper::<FileData>::builder("file")
        .add_guarded(
            |f| f.imports.clone(),
            |f, imports| f.imports = imports,
            imports_guard,
        )
        .build()
});

pub static DECLARATION: LazyLock<StateKeeper<DeclData>> = LazyLock::new(|| {
    StateKeeper::<DeclData>::builder("declaration")
        .entity(
            |d| match d {
                DeclData::File(file) => Some(file),
                _ => None,
            },
            |d| match d {
                DeclData::File(file) => Some(file),
                _ => None,
            },
            &FILE,
        )
        .entity(
            |d| match d {
                DeclData::Class(class) => Some(class),
                _ => None,
            },
            |d| match d {
                DeclData::Class(class) => Some(class),
                _ => None,
            },
            &CLASS,
        )
        .entity(
            |d| match d {
                DeclData::Function(function) => Some(function),
                _ => None,
            },
            |d| match d {
                DeclData::Function(function) => Some(function),
                _ => None,
            },
            &FUNCTION,
        )
        .entity(
            |d| match d {
                DeclData::Constructor(constructor) => Some(constructor),
                _ => None,
            },
            |d| match d {
                DeclData::Constructor(constructor) => Some(constructor),
                _ => None,
            },
            &CONSTRUCTOR,
        )
        .entity(
            |d| match d {
                DeclData::Property(property) => Some(property),
                _ => None,
            },
            |d| match d {
                DeclData::Property(property) => Some(property),
                _ => None,
            },
            &PROPERTY,
        )
        .entity(
            |d| match d {
                DeclData::Variable(variable) => Some(variable),
                _ => None,
            },
            |d| match d {
                DeclData::Variable(variable) => Some(variable),
                _ => None,
            },
            &VARIABLE,
        )
        .entity(
            |d| match d {
                DeclData::Initializer(initializer) => Some(initializer),
                _ => None,
            },
            |d| match d {
                DeclData::Initializer(initializer) => Some(initializer),
                _ => None,
            },
            &INITIALIZER,
        )
        .entity(
            |d| match d {
                DeclData::TypeAlias(alias) => Some(alias),
                _ => None,
            },
            |d| match d {
                DeclData::TypeAlias(alias) => Some(alias),
                _ => None,
            },
            &TYPE_ALIAS,
        )
        .build()
});

/// Snapshot any declaration payload.
///
/// Parts still being computed are captured in their not-computed form: an
/// `InProgress` placeholder comes back as `Unresolved`, and a resolved
/// delegated call of a constructor that is not fully resolved comes back
/// lazy, losing its callee and bound arguments. Fully resolved constructors
/// and properties capture nothing and restore unchanged.
pub fn capture(data: &DeclData) -> StateSnapshot<DeclData> {
    DECLARATION.capture(data)
}
