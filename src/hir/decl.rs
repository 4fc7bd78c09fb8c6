//! Declarations: kinds, immutable headers and mutable payloads.
//!
//! A declaration is split in two. The [`DeclHeader`] (name, kind, owner,
//! location) is fixed by the parser and read without locks. The
//! [`DeclData`] payload holds every part the phase resolvers substitute in
//! place, and lives behind the slot lock in the [`DeclTree`](super::DeclTree).

use std::fmt;

use text_size::TextRange;

use crate::base::{FileId, Name};
use super::cfg::ControlFlowGraph;
use super::expr::{Expr, Lazy, LazyBlock, LazyExpr, RawExpr};
use super::ids::DeclId;
use super::types::TypeRef;

// ============================================================================
// HEADER
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeclKind {
    File,
    Class,
    Function,
    Constructor,
    Property,
    Variable,
    Initializer,
    TypeAlias,
}

impl DeclKind {
    /// Kinds whose children are declarations of their own.
    pub fn is_container(self) -> bool {
        matches!(self, DeclKind::File | DeclKind::Class)
    }

    /// Kinds driven to the previous phase before a class graph is computed.
    pub fn contributes_to_class_graph(self) -> bool {
        matches!(
            self,
            DeclKind::Function
                | DeclKind::Constructor
                | DeclKind::Property
                | DeclKind::Variable
                | DeclKind::Initializer
        )
    }

    pub fn display(self) -> &'static str {
        match self {
            DeclKind::File => "file",
            DeclKind::Class => "class",
            DeclKind::Function => "function",
            DeclKind::Constructor => "constructor",
            DeclKind::Property => "property",
            DeclKind::Variable => "variable",
            DeclKind::Initializer => "initializer",
            DeclKind::TypeAlias => "type alias",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    /// Visible inside the containing class, or the containing file for
    /// top-level declarations.
    Private,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Deprecation {
    #[default]
    None,
    /// Using the declaration is reported as a warning.
    Warning,
    /// Using the declaration is reported as an error.
    Error,
}

/// The parser-fixed part of a declaration.
#[derive(Clone, Debug)]
pub struct DeclHeader {
    pub name: Name,
    pub kind: DeclKind,
    pub file: FileId,
    pub parent: Option<DeclId>,
    pub range: TextRange,
    pub visibility: Visibility,
    pub deprecation: Deprecation,
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// Where an import directive points once bound.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportTarget {
    Declaration(DeclId),
    /// A star import of a package that has at least one file.
    Package(Vec<Name>),
    /// Nothing matched; reported as a diagnostic.
    Missing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub path: Vec<Name>,
    pub star: bool,
    pub range: TextRange,
    pub target: Lazy<ImportTarget>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileData {
    pub imports: Vec<Import>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassData {
    pub supertypes: Vec<TypeRef>,
    /// Unified graph over property initializers and initializer blocks.
    pub cfg: Option<ControlFlowGraph>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueParameter {
    pub name: Name,
    pub ty: TypeRef,
    pub default_value: Option<LazyExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionData {
    pub params: Vec<ValueParameter>,
    pub return_type: TypeRef,
    /// `None` for abstract or external functions.
    pub body: Option<LazyBlock>,
    pub cfg: Option<ControlFlowGraph>,
}

impl FunctionData {
    pub fn new(params: Vec<ValueParameter>, return_type: TypeRef, body: Option<LazyBlock>) -> Self {
        Self {
            params,
            return_type,
            body,
            cfg: None,
        }
    }
}

/// Which constructor a delegated call designates.
#[derive(Clone, Debug, PartialEq)]
pub enum DelegationTarget {
    This,
    /// `super_type` is the supertype the call was written against;
    /// [`TypeRef::Implicit`] means the class's first supertype.
    Super { super_type: TypeRef },
}

impl DelegationTarget {
    pub fn is_this(&self) -> bool {
        matches!(self, DelegationTarget::This)
    }

    pub fn super_type(&self) -> Option<&TypeRef> {
        match self {
            DelegationTarget::This => None,
            DelegationTarget::Super { super_type } => Some(super_type),
        }
    }
}

/// A `this(...)` or `super(...)` call at the head of a constructor.
#[derive(Clone, Debug, PartialEq)]
pub enum DelegatedConstructorCall {
    /// Explicit but not substituted yet.
    Lazy {
        target: DelegationTarget,
        arguments: Vec<RawExpr>,
    },
    Resolved {
        target: DelegationTarget,
        /// `None` when no constructor matched; reported as a diagnostic.
        callee: Option<DeclId>,
        arguments: Vec<Expr>,
        source: Vec<RawExpr>,
    },
}

impl DelegatedConstructorCall {
    pub fn target(&self) -> &DelegationTarget {
        match self {
            DelegatedConstructorCall::Lazy { target, .. }
            | DelegatedConstructorCall::Resolved { target, .. } => target,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, DelegatedConstructorCall::Lazy { .. })
    }

    pub fn source(&self) -> &[RawExpr] {
        match self {
            DelegatedConstructorCall::Lazy { arguments, .. } => arguments,
            DelegatedConstructorCall::Resolved { source, .. } => source,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstructorData {
    pub function: FunctionData,
    pub delegated: Option<DelegatedConstructorCall>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableData {
    pub return_type: TypeRef,
    pub initializer: Option<LazyExpr>,
}

impl VariableData {
    pub fn new(return_type: TypeRef, initializer: Option<RawExpr>) -> Self {
        Self {
            return_type,
            initializer: initializer.map(LazyExpr::new),
        }
    }
}

/// How far a property's own parts got through body resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyBodyState {
    #[default]
    NothingResolved,
    InitializerResolved,
    InitializerAndGetterResolved,
    EverythingResolved,
}

/// `by <expression>` on a property.
#[derive(Clone, Debug, PartialEq)]
pub struct DelegateExpr {
    pub expression: LazyExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PropertyData {
    pub variable: VariableData,
    pub body_state: PropertyBodyState,
    pub getter: Option<FunctionData>,
    pub setter: Option<FunctionData>,
    pub backing_field: Option<VariableData>,
    pub delegate: Option<DelegateExpr>,
}

impl PropertyData {
    pub fn new(return_type: TypeRef, initializer: Option<RawExpr>) -> Self {
        Self {
            variable: VariableData::new(return_type, initializer),
            body_state: PropertyBodyState::NothingResolved,
            getter: None,
            setter: None,
            backing_field: None,
            delegate: None,
        }
    }

    /// The initializer, while it still has to be resolved.
    pub fn initializer_if_unresolved(&self) -> Option<&LazyExpr> {
        if self.body_state < PropertyBodyState::InitializerResolved {
            self.variable.initializer.as_ref()
        } else {
            None
        }
    }

    pub fn backing_field_if_unresolved(&self) -> Option<&VariableData> {
        if self.body_state < PropertyBodyState::InitializerResolved {
            self.backing_field.as_ref()
        } else {
            None
        }
    }

    pub fn getter_if_unresolved(&self) -> Option<&FunctionData> {
        if self.body_state < PropertyBodyState::InitializerAndGetterResolved {
            self.getter.as_ref()
        } else {
            None
        }
    }

    pub fn setter_if_unresolved(&self) -> Option<&FunctionData> {
        if self.body_state < PropertyBodyState::EverythingResolved {
            self.setter.as_ref()
        } else {
            None
        }
    }

    pub fn delegate_if_unresolved(&self) -> Option<&DelegateExpr> {
        if self.body_state < PropertyBodyState::EverythingResolved {
            self.delegate.as_ref()
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InitializerData {
    pub body: LazyBlock,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeAliasData {
    pub aliased: TypeRef,
}

/// The mutable payload of a declaration.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclData {
    File(FileData),
    Class(ClassData),
    Function(FunctionData),
    Constructor(ConstructorData),
    Property(PropertyData),
    Variable(VariableData),
    Initializer(InitializerData),
    TypeAlias(TypeAliasData),
}

impl DeclData {
    pub fn kind(&self) -> DeclKind {
        match self {
            DeclData::File(_) => DeclKind::File,
            DeclData::Class(_) => DeclKind::Class,
            DeclData::Function(_) => DeclKind::Function,
            DeclData::Constructor(_) => DeclKind::Constructor,
            DeclData::Property(_) => DeclKind::Property,
            DeclData::Variable(_) => DeclKind::Variable,
            DeclData::Initializer(_) => DeclKind::Initializer,
            DeclData::TypeAlias(_) => DeclKind::TypeAlias,
        }
    }

    /// The function-shaped part of callables.
    pub fn as_function(&self) -> Option<&FunctionData> {
        match self {
            DeclData::Function(function) => Some(function),
            DeclData::Constructor(constructor) => Some(&constructor.function),
            _ => None,
        }
    }

    /// The declared or inferred type of value-like declarations.
    pub fn return_type(&self) -> Option<&TypeRef> {
        match self {
            DeclData::Function(function) => Some(&function.return_type),
            DeclData::Constructor(constructor) => Some(&constructor.function.return_type),
            DeclData::Property(property) => Some(&property.variable.return_type),
            DeclData::Variable(variable) => Some(&variable.return_type),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::expr::RawExpr;

    #[test]
    fn test_property_parts_hidden_once_resolved() {
        let mut property = PropertyData::new(TypeRef::Implicit, Some(RawExpr::Int(1)));
        property.getter = Some(FunctionData::new(Vec::new(), TypeRef::Implicit, None));

        assert!(property.initializer_if_unresolved().is_some());
        assert!(property.getter_if_unresolved().is_some());

        property.body_state = PropertyBodyState::InitializerResolved;
        assert!(property.initializer_if_unresolved().is_none());
        assert!(property.getter_if_unresolved().is_some());

        property.body_state = PropertyBodyState::EverythingResolved;
        assert!(property.getter_if_unresolved().is_none());
    }

    #[test]
    fn test_delegation_target_super_type() {
        assert!(DelegationTarget::This.super_type().is_none());
        let target = DelegationTarget::Super {
            super_type: TypeRef::Implicit,
        };
        assert_eq!(target.super_type(), Some(&TypeRef::Implicit));
        assert!(!target.is_this());
    }

    #[test]
    fn test_kind_classification() {
        assert!(DeclKind::Class.is_container());
        assert!(!DeclKind::Function.is_container());
        assert!(DeclKind::Initializer.contributes_to_class_graph());
        assert!(!DeclKind::TypeAlias.contributes_to_class_graph());
    }
}
