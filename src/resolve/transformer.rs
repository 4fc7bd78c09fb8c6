//! Phase transforms and the default body transformer.
//!
//! A transform runs under its container lock with a [`TransformCx`]: the
//! declaration's header and tower, the published facts of everything else,
//! and a local diagnostics buffer. It rewrites the declaration payload in
//! place. Diagnostics it reports are only published if the transform
//! succeeds and passes its phase checks.
//!
//! [`BodyTransformer`] is the seam for the body phase. The default
//! [`ExpressionTransformer`] binds names, computes expression types, infers
//! implicit declaration types and builds function control-flow graphs.

use text_size::TextRange;
use tokio_util::sync::CancellationToken;

use crate::base::Name;
use crate::hir::{
    AssignTarget, BinaryOp, Block, Callee, ConstructorData, ControlFlowGraph, CfgNodeKind,
    DeclData, DeclHeader, DeclId, DeclKind, DeclTree, DelegatedConstructorCall,
    DelegationTarget, Deprecation, Diagnostic, DiagnosticKind, Expr, ExprKind, FunctionData,
    InitializerData, Lazy, LazyBlock, LazyExpr, PropertyBodyState, PropertyData, RawBlock,
    RawExpr, RawStmt, Stmt, Type, TypeRef, VariableData, Visibility,
};
use super::error::TransformError;
use super::tower::{lookup_type, TowerContext, TypeLookup};

// ============================================================================
// TRANSFORM CONTEXT
// ============================================================================

/// Everything a transform may look at besides the payload it rewrites.
pub struct TransformCx<'a> {
    tree: &'a DeclTree,
    decl: DeclId,
    header: &'a DeclHeader,
    tower: &'a TowerContext,
    in_flight: &'a [DeclId],
    token: &'a CancellationToken,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TransformCx<'a> {
    pub fn new(
        tree: &'a DeclTree,
        decl: DeclId,
        header: &'a DeclHeader,
        tower: &'a TowerContext,
        in_flight: &'a [DeclId],
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            tree,
            decl,
            header,
            tower,
            in_flight,
            token,
            diagnostics: Vec::new(),
        }
    }

    pub fn tree(&self) -> &'a DeclTree {
        self.tree
    }

    pub fn decl(&self) -> DeclId {
        self.decl
    }

    pub fn header(&self) -> &'a DeclHeader {
        self.header
    }

    pub fn tower(&self) -> &'a TowerContext {
        self.tower
    }

    pub fn is_in_flight(&self, decl: DeclId) -> bool {
        self.in_flight.contains(&decl)
    }

    pub fn check_cancelled(&self) -> Result<(), TransformError> {
        if self.token.is_cancelled() {
            Err(TransformError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Report a problem at the declaration being transformed.
    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(self.header.file, self.header.range, kind, message.into())
            .for_decl(self.decl);
        self.diagnostics.push(diagnostic);
    }

    /// Report a problem at a range inside the declaration being transformed.
    pub fn report_in(&mut self, range: TextRange, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic =
            Diagnostic::new(self.header.file, range, kind, message.into()).for_decl(self.decl);
        self.diagnostics.push(diagnostic);
    }

    /// Report a problem at another declaration of the same container.
    pub fn report_at(&mut self, decl: DeclId, kind: DiagnosticKind, message: impl Into<String>) {
        let Some(header) = self.tree.header(decl) else {
            return self.report(kind, message);
        };
        let diagnostic =
            Diagnostic::new(header.file, header.range, kind, message.into()).for_decl(decl);
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn name(&self, name: Name) -> String {
        self.tree
            .interner()
            .lookup(name)
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("<{}>", name.index()))
    }

    pub fn path(&self, path: &[Name]) -> String {
        self.tree.interner().display_path(path)
    }

    /// The value type another declaration published.
    ///
    /// A declaration further up this call chain has not published yet; that
    /// is a type that depends on itself and is reported as such.
    pub fn value_type(&mut self, decl: DeclId) -> Type {
        if let Some(ty) = self
            .tree
            .published(decl)
            .and_then(|published| published.return_type())
        {
            return ty.clone();
        }
        if self.is_in_flight(decl) {
            let name = self
                .tree
                .header(decl)
                .map(|h| self.name(h.name))
                .unwrap_or_default();
            self.report(
                DiagnosticKind::RecursiveType,
                format!("type of `{name}` depends on itself; specify it explicitly"),
            );
        }
        Type::Error
    }

    /// Parameter types another callable published.
    pub fn parameter_types(&self, callable: DeclId) -> Option<&'a [Type]> {
        self.tree
            .published(callable)
            .and_then(|published| published.parameters())
    }

    /// Resolve a written type path.
    pub fn resolve_type_path(&mut self, path: &[Name]) -> Type {
        match lookup_type(self.tree, self.tower, path) {
            TypeLookup::Builtin(ty) => ty,
            TypeLookup::Class(class) => Type::Class(class),
            TypeLookup::Alias(alias) => {
                let expanded = self
                    .tree
                    .published(alias)
                    .and_then(|published| published.expanded())
                    .cloned();
                match expanded {
                    Some(ty) => ty,
                    None => {
                        if alias == self.decl || self.is_in_flight(alias) {
                            let rendered = self.path(path);
                            self.report(
                                DiagnosticKind::RecursiveTypeAlias,
                                format!("type alias `{rendered}` expands to itself"),
                            );
                        }
                        Type::Error
                    }
                }
            }
            TypeLookup::NotAType(_) | TypeLookup::NotFound => {
                let rendered = self.path(path);
                self.report(
                    DiagnosticKind::UnresolvedType,
                    format!("unresolved type `{rendered}`"),
                );
                Type::Error
            }
        }
    }

    /// Resolve a type position; implicit positions stay implicit.
    pub fn resolve_type_ref(&mut self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Implicit => TypeRef::Implicit,
            TypeRef::Resolved(ty) => TypeRef::Resolved(ty.clone()),
            TypeRef::Unresolved(path) => TypeRef::Resolved(self.resolve_type_path(path)),
        }
    }

    /// Report use of `target` when it is invisible or deprecated from here.
    pub fn check_access(&mut self, target: DeclId) {
        let Some(header) = self.tree.header(target) else {
            return;
        };
        let name = self.name(header.name);
        if header.visibility == Visibility::Private && !self.can_see_private(target, header) {
            self.report(
                DiagnosticKind::InvisibleReference,
                format!("`{name}` is private in its {}", self.container_kind(header)),
            );
        }
        match header.deprecation {
            Deprecation::None => {}
            Deprecation::Warning => {
                self.report(DiagnosticKind::Deprecation, format!("`{name}` is deprecated"))
            }
            Deprecation::Error => self.report(
                DiagnosticKind::DeprecationError,
                format!("`{name}` is deprecated and must not be used"),
            ),
        }
    }

    fn container_kind(&self, header: &DeclHeader) -> DeclKind {
        header
            .parent
            .and_then(|parent| self.tree.kind(parent))
            .unwrap_or(DeclKind::File)
    }

    fn can_see_private(&self, target: DeclId, header: &DeclHeader) -> bool {
        match header.parent {
            Some(parent) if self.tree.kind(parent) == Some(DeclKind::Class) => {
                self.decl == target || self.tree.designation(self.decl).contains(&parent)
            }
            _ => self.header.file == header.file,
        }
    }
}

// ============================================================================
// BODY TRANSFORMER
// ============================================================================

/// The body-phase transform of one declaration.
///
/// Implementations must leave every lazy part of the payload resolved; the
/// body resolver checks this afterwards and treats anything left over as an
/// internal error.
pub trait BodyTransformer: Send + Sync {
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError>;
}

/// Default body transformer: name binding, expression typing and type
/// inference.
#[derive(Clone, Copy, Debug)]
pub struct ExpressionTransformer {
    max_depth: usize,
}

impl Default for ExpressionTransformer {
    fn default() -> Self {
        Self { max_depth: 256 }
    }
}

impl ExpressionTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expressions nested deeper than `max_depth` fail the transform.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl BodyTransformer for ExpressionTransformer {
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        let mut body = BodyWalker {
            cx,
            max_depth: self.max_depth,
        };
        match data {
            DeclData::Function(function) => body.function(function, None),
            DeclData::Constructor(constructor) => body.constructor(constructor),
            DeclData::Property(property) => body.property(property),
            DeclData::Variable(variable) => body.variable(variable),
            DeclData::Initializer(initializer) => body.initializer(initializer),
            DeclData::File(_) | DeclData::Class(_) | DeclData::TypeAlias(_) => Ok(()),
        }
    }
}

// ============================================================================
// EXPRESSION RESOLUTION
// ============================================================================

/// Names local to the body being resolved.
#[derive(Default)]
struct Locals {
    params: Vec<(Name, Type)>,
    locals: Vec<(Name, Type)>,
}

enum LocalBinding {
    Param(u32, Type),
    Local(u32, Type),
}

impl Locals {
    fn with_params(params: Vec<(Name, Type)>) -> Self {
        Self {
            params,
            locals: Vec::new(),
        }
    }

    fn lookup(&self, name: Name) -> Option<LocalBinding> {
        if let Some(index) = self.locals.iter().rposition(|(n, _)| *n == name) {
            return Some(LocalBinding::Local(index as u32, self.locals[index].1.clone()));
        }
        self.params
            .iter()
            .position(|(n, _)| *n == name)
            .map(|index| LocalBinding::Param(index as u32, self.params[index].1.clone()))
    }

    fn declare(&mut self, name: Name, ty: Type) -> u32 {
        self.locals.push((name, ty));
        (self.locals.len() - 1) as u32
    }
}

struct BodyWalker<'c, 'a> {
    cx: &'c mut TransformCx<'a>,
    max_depth: usize,
}

impl BodyWalker<'_, '_> {
    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn function(
        &mut self,
        function: &mut FunctionData,
        expected: Option<Type>,
    ) -> Result<(), TransformError> {
        for param in &mut function.params {
            let param_ty = param.ty.resolved().cloned();
            if let Some(default) = &mut param.default_value {
                self.lazy_expr(default, param_ty.as_ref(), &mut Locals::default())?;
            }
        }

        if function.return_type.is_implicit() {
            if let Some(expected) = expected {
                function.return_type = TypeRef::Resolved(expected);
            }
        }
        let declared = function.return_type.resolved().cloned();
        let params = function
            .params
            .iter()
            .map(|p| (p.name, p.ty.resolved().cloned().unwrap_or(Type::Error)))
            .collect();
        let mut locals = Locals::with_params(params);

        let mut returns = Vec::new();
        if let Some(body) = &mut function.body {
            if !body.resolved.is_resolved() {
                let cfg = self.lazy_block(body, declared.as_ref(), &mut locals, &mut returns)?;
                function.cfg = Some(cfg);
            }
        }

        if function.return_type.is_implicit() {
            let inferred = returns.into_iter().next().unwrap_or(Type::Unit);
            function.return_type = TypeRef::Resolved(inferred);
        }
        Ok(())
    }

    fn constructor(&mut self, constructor: &mut ConstructorData) -> Result<(), TransformError> {
        self.function(&mut constructor.function, None)?;

        let Some(DelegatedConstructorCall::Lazy { target, arguments }) = constructor.delegated.clone()
        else {
            return Ok(());
        };
        let params = constructor
            .function
            .params
            .iter()
            .map(|p| (p.name, p.ty.resolved().cloned().unwrap_or(Type::Error)))
            .collect();
        let mut locals = Locals::with_params(params);
        let args = arguments
            .iter()
            .map(|arg| self.expr(arg, &mut locals, 0))
            .collect::<Result<Vec<_>, _>>()?;

        let (class, target) = self.delegation_class(target);
        let callee = match class {
            Some(class) => self.pick_constructor(class, &args, Some(self.cx.decl())),
            None => None,
        };
        constructor.delegated = Some(DelegatedConstructorCall::Resolved {
            target,
            callee,
            arguments: args,
            source: arguments,
        });
        Ok(())
    }

    /// The class a delegated call constructs, and the target with its super
    /// type resolved.
    fn delegation_class(&mut self, target: DelegationTarget) -> (Option<DeclId>, DelegationTarget) {
        let own_class = self.cx.tree().containing_class(self.cx.decl());
        match target {
            DelegationTarget::This => (own_class, DelegationTarget::This),
            DelegationTarget::Super { super_type } => {
                let first_super = own_class
                    .and_then(|class| self.cx.tree().published(class))
                    .and_then(|published| published.supertypes())
                    .and_then(|supertypes| supertypes.first().copied());
                let (class, super_type) = match &super_type {
                    TypeRef::Implicit => (first_super, TypeRef::Implicit),
                    TypeRef::Resolved(Type::Class(class)) => (Some(*class), super_type.clone()),
                    TypeRef::Resolved(_) => (None, super_type.clone()),
                    TypeRef::Unresolved(path) => match self.cx.resolve_type_path(path) {
                        Type::Class(class) => (Some(class), TypeRef::Resolved(Type::Class(class))),
                        other => (None, TypeRef::Resolved(other)),
                    },
                };
                if class.is_none() {
                    self.cx.report(
                        DiagnosticKind::NoConstructor,
                        "no supertype constructor to delegate to",
                    );
                }
                (class, DelegationTarget::Super { super_type })
            }
        }
    }

    fn property(&mut self, property: &mut PropertyData) -> Result<(), TransformError> {
        let mut locals = Locals::default();

        if property.body_state < PropertyBodyState::InitializerResolved {
            let declared = property.variable.return_type.resolved().cloned();
            if let Some(initializer) = &mut property.variable.initializer {
                let ty = self.lazy_expr(initializer, declared.as_ref(), &mut locals)?;
                if property.variable.return_type.is_implicit() {
                    property.variable.return_type = TypeRef::Resolved(ty);
                }
            }
            property.body_state = PropertyBodyState::InitializerResolved;
        }

        if property.body_state < PropertyBodyState::InitializerAndGetterResolved {
            let declared = property.variable.return_type.resolved().cloned();
            if let Some(getter) = &mut property.getter {
                self.function(getter, declared)?;
                if property.variable.return_type.is_implicit() {
                    property.variable.return_type = getter.return_type.clone();
                }
            }
            property.body_state = PropertyBodyState::InitializerAndGetterResolved;
        }

        if property.body_state < PropertyBodyState::EverythingResolved {
            if let Some(delegate) = &mut property.delegate {
                let ty = self.lazy_expr(&mut delegate.expression, None, &mut locals)?;
                if property.variable.return_type.is_implicit() {
                    property.variable.return_type = TypeRef::Resolved(ty);
                }
            }
            if property.variable.return_type.is_implicit() {
                self.cx.report(
                    DiagnosticKind::UnresolvedType,
                    "property type cannot be inferred without an initializer",
                );
                property.variable.return_type = TypeRef::Resolved(Type::Error);
            }
            let ty = property
                .variable
                .return_type
                .resolved()
                .cloned()
                .unwrap_or(Type::Error);
            if let Some(setter) = &mut property.setter {
                for param in &mut setter.params {
                    if param.ty.is_implicit() {
                        param.ty = TypeRef::Resolved(ty.clone());
                    }
                }
                self.function(setter, Some(Type::Unit))?;
            }
            if let Some(field) = &mut property.backing_field {
                if field.return_type.is_implicit() {
                    field.return_type = TypeRef::Resolved(ty.clone());
                }
                if let Some(initializer) = &mut field.initializer {
                    self.lazy_expr(initializer, Some(&ty), &mut locals)?;
                }
            }
            let initialized = property.variable.initializer.is_some()
                || property.delegate.is_some()
                || property.getter.is_some();
            if !initialized && self.is_top_level() {
                self.cx.report(
                    DiagnosticKind::UninitializedProperty,
                    "top-level property must be initialized",
                );
            }
            property.body_state = PropertyBodyState::EverythingResolved;
        }
        Ok(())
    }

    fn variable(&mut self, variable: &mut VariableData) -> Result<(), TransformError> {
        let declared = variable.return_type.resolved().cloned();
        if let Some(initializer) = &mut variable.initializer {
            let ty = self.lazy_expr(initializer, declared.as_ref(), &mut Locals::default())?;
            if variable.return_type.is_implicit() {
                variable.return_type = TypeRef::Resolved(ty);
            }
        } else if self.is_top_level() {
            self.cx.report(
                DiagnosticKind::UninitializedProperty,
                "top-level variable must be initialized",
            );
        }
        if variable.return_type.is_implicit() {
            self.cx.report(
                DiagnosticKind::UnresolvedType,
                "variable type cannot be inferred without an initializer",
            );
            variable.return_type = TypeRef::Resolved(Type::Error);
        }
        Ok(())
    }

    fn initializer(&mut self, initializer: &mut InitializerData) -> Result<(), TransformError> {
        let mut returns = Vec::new();
        self.lazy_block(&mut initializer.body, None, &mut Locals::default(), &mut returns)?;
        Ok(())
    }

    fn is_top_level(&self) -> bool {
        let tree = self.cx.tree();
        self.cx
            .header()
            .parent
            .is_some_and(|parent| tree.kind(parent) == Some(DeclKind::File))
    }

    // ------------------------------------------------------------------------
    // Lazy parts
    // ------------------------------------------------------------------------

    /// Resolve a lazy expression in place; returns its type.
    fn lazy_expr(
        &mut self,
        lazy: &mut LazyExpr,
        expected: Option<&Type>,
        locals: &mut Locals,
    ) -> Result<Type, TransformError> {
        if let Lazy::Resolved(expr) = &lazy.resolved {
            return Ok(expr.ty.clone());
        }
        lazy.resolved = Lazy::InProgress;
        let expr = self.expr(&lazy.source, locals, 0)?;
        if let Some(expected) = expected {
            self.expect(expected, &expr.ty);
        }
        let ty = expr.ty.clone();
        lazy.resolved = Lazy::Resolved(expr);
        Ok(ty)
    }

    /// Resolve a lazy block in place and return its control-flow graph.
    fn lazy_block(
        &mut self,
        lazy: &mut LazyBlock,
        expected_return: Option<&Type>,
        locals: &mut Locals,
        returns: &mut Vec<Type>,
    ) -> Result<ControlFlowGraph, TransformError> {
        lazy.resolved = Lazy::InProgress;
        let (block, cfg) = self.block(&lazy.source, expected_return, locals, returns)?;
        lazy.resolved = Lazy::Resolved(block);
        Ok(cfg)
    }

    fn block(
        &mut self,
        raw: &RawBlock,
        expected_return: Option<&Type>,
        locals: &mut Locals,
        returns: &mut Vec<Type>,
    ) -> Result<(Block, ControlFlowGraph), TransformError> {
        let mut cfg = ControlFlowGraph::new(self.cx.decl());
        let mut stmts = Vec::with_capacity(raw.stmts.len());
        for (index, stmt) in raw.stmts.iter().enumerate() {
            self.cx.check_cancelled()?;
            cfg.push(CfgNodeKind::Statement(index as u32));
            let resolved = self.stmt(stmt, expected_return, locals, returns)?;
            if matches!(resolved, Stmt::Return(_)) {
                cfg.jump_to_exit();
            }
            stmts.push(resolved);
        }
        let cfg = cfg.finish();
        if let Some(first) = cfg.unreachable_statements().next() {
            self.cx.report(
                DiagnosticKind::UnreachableCode,
                format!("statement {first} and everything after it is unreachable"),
            );
        }
        Ok((Block { stmts }, cfg))
    }

    fn stmt(
        &mut self,
        raw: &RawStmt,
        expected_return: Option<&Type>,
        locals: &mut Locals,
        returns: &mut Vec<Type>,
    ) -> Result<Stmt, TransformError> {
        Ok(match raw {
            RawStmt::Expr(expr) => Stmt::Expr(self.expr(expr, locals, 0)?),
            RawStmt::Let { name, init } => {
                let init = self.expr(init, locals, 0)?;
                let local = locals.declare(*name, init.ty.clone());
                Stmt::Let { local, init }
            }
            RawStmt::Assign { target, value } => {
                let value = self.expr(value, locals, 0)?;
                let target = match locals.lookup(*target) {
                    Some(LocalBinding::Local(index, ty)) => {
                        self.expect(&ty, &value.ty);
                        AssignTarget::Local(index)
                    }
                    Some(LocalBinding::Param(..)) => {
                        let name = self.cx.name(*target);
                        self.cx.report(
                            DiagnosticKind::ValReassignment,
                            format!("value parameter `{name}` cannot be reassigned"),
                        );
                        return Ok(Stmt::Expr(value));
                    }
                    None => match self.value_decl(*target) {
                        Some(decl) => {
                            let ty = self.cx.value_type(decl);
                            self.expect(&ty, &value.ty);
                            AssignTarget::Decl(decl)
                        }
                        None => return Ok(Stmt::Expr(value)),
                    },
                };
                Stmt::Assign { target, value }
            }
            RawStmt::Return(value) => {
                let value = match value {
                    Some(expr) => Some(self.expr(expr, locals, 0)?),
                    None => None,
                };
                let ty = value.as_ref().map(|v| v.ty.clone()).unwrap_or(Type::Unit);
                if let Some(expected) = expected_return {
                    self.expect(expected, &ty);
                }
                returns.push(ty);
                Stmt::Return(value)
            }
        })
    }

    fn expr(&mut self, raw: &RawExpr, locals: &mut Locals, depth: usize) -> Result<Expr, TransformError> {
        if depth > self.max_depth {
            return Err(TransformError::failed(format!(
                "expression nesting exceeds {} levels",
                self.max_depth
            )));
        }
        Ok(match raw {
            RawExpr::Int(value) => Expr::new(ExprKind::Int(*value), Type::Int),
            RawExpr::Bool(value) => Expr::new(ExprKind::Bool(*value), Type::Bool),
            RawExpr::Str(value) => Expr::new(ExprKind::Str(value.clone()), Type::String),
            RawExpr::Name(name) => match locals.lookup(*name) {
                Some(LocalBinding::Local(index, ty)) => Expr::new(ExprKind::Local(index), ty),
                Some(LocalBinding::Param(index, ty)) => Expr::new(ExprKind::Param(index), ty),
                None => match self.value_decl(*name) {
                    Some(decl) => {
                        let ty = self.cx.value_type(decl);
                        Expr::new(ExprKind::Decl(decl), ty)
                    }
                    None => Expr::error(),
                },
            },
            RawExpr::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg, locals, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(*callee, args)
            }
            RawExpr::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs, locals, depth + 1)?;
                let rhs = self.expr(rhs, locals, depth + 1)?;
                self.binary(*op, lhs, rhs)
            }
        })
    }

    /// Bind a name used as a value to a property or variable.
    fn value_decl(&mut self, name: Name) -> Option<DeclId> {
        let tree = self.cx.tree();
        let candidates = self.cx.tower().lookup(name);
        let found = candidates.iter().copied().find(|&decl| {
            matches!(tree.kind(decl), Some(DeclKind::Property | DeclKind::Variable))
        });
        match found {
            Some(decl) => {
                self.cx.check_access(decl);
                Some(decl)
            }
            None => {
                let rendered = self.cx.name(name);
                let message = if candidates.is_empty() {
                    format!("unresolved reference `{rendered}`")
                } else {
                    format!("`{rendered}` is not a value")
                };
                self.cx.report(DiagnosticKind::UnresolvedReference, message);
                None
            }
        }
    }

    fn call(&mut self, callee: Name, args: Vec<Expr>) -> Expr {
        let tree = self.cx.tree();
        let candidates = self.cx.tower().lookup(callee);
        let rendered = self.cx.name(callee);

        let functions: Vec<DeclId> = candidates
            .iter()
            .copied()
            .filter(|&d| tree.kind(d) == Some(DeclKind::Function))
            .collect();
        if !functions.is_empty() {
            let matching = functions.iter().copied().find(|&f| {
                self.cx
                    .parameter_types(f)
                    .is_some_and(|params| params.len() == args.len())
            });
            let Some(function) = matching else {
                self.cx.report(
                    DiagnosticKind::ArgumentCountMismatch,
                    format!("no `{rendered}` takes {} arguments", args.len()),
                );
                return Expr::error();
            };
            self.cx.check_access(function);
            self.check_arguments(function, &args);
            let ty = self.cx.value_type(function);
            return Expr::new(
                ExprKind::Call {
                    callee: Callee::Function(function),
                    args,
                },
                ty,
            );
        }

        let class = candidates
            .iter()
            .copied()
            .find(|&d| tree.kind(d) == Some(DeclKind::Class));
        if let Some(class) = class {
            self.cx.check_access(class);
            let constructor = self.pick_constructor(class, &args, None);
            let has_constructors = self.constructors(class).next().is_some();
            if has_constructors && constructor.is_none() {
                return Expr::error();
            }
            return Expr::new(
                ExprKind::Call {
                    callee: Callee::Constructor { class, constructor },
                    args,
                },
                Type::Class(class),
            );
        }

        let message = if candidates.is_empty() {
            format!("unresolved reference `{rendered}`")
        } else {
            format!("`{rendered}` is not callable")
        };
        self.cx.report(DiagnosticKind::UnresolvedReference, message);
        Expr::error()
    }

    fn constructors(&self, class: DeclId) -> impl Iterator<Item = DeclId> + '_ {
        let tree = self.cx.tree();
        tree.children(class)
            .iter()
            .copied()
            .filter(move |&d| tree.kind(d) == Some(DeclKind::Constructor))
    }

    /// The constructor of `class` matching `args`, skipping `exclude`.
    ///
    /// A class without constructors has an implicit one taking no
    /// arguments, which is represented as `None` without a diagnostic.
    fn pick_constructor(&mut self, class: DeclId, args: &[Expr], exclude: Option<DeclId>) -> Option<DeclId> {
        let candidates: Vec<DeclId> = self
            .constructors(class)
            .filter(|&c| Some(c) != exclude)
            .collect();
        if candidates.is_empty() {
            if !args.is_empty() {
                self.report_no_constructor(class, args.len());
            }
            return None;
        }
        let matching = candidates.into_iter().find(|&c| {
            self.cx
                .parameter_types(c)
                .is_some_and(|params| params.len() == args.len())
        });
        match matching {
            Some(constructor) => {
                self.cx.check_access(constructor);
                self.check_arguments(constructor, args);
                Some(constructor)
            }
            None => {
                self.report_no_constructor(class, args.len());
                None
            }
        }
    }

    fn report_no_constructor(&mut self, class: DeclId, arity: usize) {
        let name = self
            .cx
            .tree()
            .header(class)
            .map(|h| self.cx.name(h.name))
            .unwrap_or_default();
        self.cx.report(
            DiagnosticKind::NoConstructor,
            format!("`{name}` has no constructor taking {arity} arguments"),
        );
    }

    fn check_arguments(&mut self, callable: DeclId, args: &[Expr]) {
        let Some(params) = self.cx.parameter_types(callable) else {
            return;
        };
        for (param, arg) in params.iter().zip(args) {
            self.expect(param, &arg.ty);
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        if op == BinaryOp::Div && matches!(rhs.kind, ExprKind::Int(0)) {
            self.cx.report(DiagnosticKind::DivisionByZero, "division by zero");
        }
        let ty = if lhs.ty.is_error() || rhs.ty.is_error() {
            Type::Error
        } else {
            match (op, &lhs.ty, &rhs.ty) {
                (BinaryOp::Add, Type::String, Type::String) => Type::String,
                (BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div, Type::Int, Type::Int) => {
                    Type::Int
                }
                (BinaryOp::Lt, Type::Int, Type::Int) => Type::Bool,
                (BinaryOp::Eq, l, r) if l == r => Type::Bool,
                (_, l, r) => {
                    self.cx.report(
                        DiagnosticKind::TypeMismatch,
                        format!("operator {op:?} cannot be applied to {l} and {r}"),
                    );
                    Type::Error
                }
            }
        };
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    fn expect(&mut self, expected: &Type, found: &Type) {
        if !expected.accepts(found) {
            self.cx.report(
                DiagnosticKind::TypeMismatch,
                format!("type mismatch: expected {expected}, found {found}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::FileId;
    use crate::hir::{ClassData, RawBlock, TreeBuilder, ValueParameter};
    use crate::resolve::tower::ScopeCache;

    fn run(tree: &DeclTree, decl: DeclId) -> (DeclData, Vec<Diagnostic>) {
        let tower = ScopeCache::new().tower(tree, decl);
        let token = CancellationToken::new();
        let header = tree.header(decl).unwrap();
        let in_flight = [decl];
        let mut cx = TransformCx::new(tree, decl, header, &tower, &in_flight, &token);
        let mut data = tree.read(decl).unwrap().clone();
        ExpressionTransformer::new().transform(&mut cx, &mut data).unwrap();
        (data, cx.into_diagnostics())
    }

    #[test]
    fn test_function_body_typed_and_return_inferred() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let x = builder.name("x");
        let body = RawBlock::new(vec![
            RawStmt::Let {
                name: x,
                init: RawExpr::binary(BinaryOp::Add, RawExpr::Int(1), RawExpr::Int(2)),
            },
            RawStmt::Return(Some(RawExpr::Name(x))),
        ]);
        let f = builder.declare(
            file,
            "f",
            DeclData::Function(FunctionData::new(
                Vec::new(),
                TypeRef::Implicit,
                Some(LazyBlock::new(body)),
            )),
        );
        let tree = builder.build();

        let (data, diagnostics) = run(&tree, f);

        let function = data.as_function().unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(function.return_type, TypeRef::Resolved(Type::Int));
        let block = function.body.as_ref().unwrap().resolved.resolved().unwrap();
        assert_eq!(block.stmts.len(), 2);
        assert!(function.cfg.is_some());
    }

    #[test]
    fn test_unresolved_name_and_unreachable_code() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let body = RawBlock::new(vec![
            RawStmt::Return(None),
            RawStmt::Expr(builder.name_expr("missing")),
        ]);
        let f = builder.declare(
            file,
            "f",
            DeclData::Function(FunctionData::new(
                Vec::new(),
                TypeRef::Resolved(Type::Unit),
                Some(LazyBlock::new(body)),
            )),
        );
        let tree = builder.build();

        let (_, diagnostics) = run(&tree, f);

        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnresolvedReference, DiagnosticKind::UnreachableCode]
        );
    }

    #[test]
    fn test_parameter_reassignment_and_division_by_zero() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let n = builder.name("n");
        let body = RawBlock::new(vec![
            RawStmt::Assign {
                target: n,
                value: RawExpr::binary(BinaryOp::Div, RawExpr::Name(n), RawExpr::Int(0)),
            },
        ]);
        let f = builder.declare(
            file,
            "f",
            DeclData::Function(FunctionData::new(
                vec![ValueParameter {
                    name: n,
                    ty: TypeRef::Resolved(Type::Int),
                    default_value: None,
                }],
                TypeRef::Resolved(Type::Unit),
                Some(LazyBlock::new(body)),
            )),
        );
        let tree = builder.build();

        let (_, diagnostics) = run(&tree, f);

        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::DivisionByZero, DiagnosticKind::ValReassignment]
        );
    }

    #[test]
    fn test_class_member_not_in_file_scope() {
        let mut builder = TreeBuilder::new();
        let file = builder.file(FileId::new(0), "/a.st", "");
        let vault = builder.declare(file, "Vault", DeclData::Class(ClassData::default()));
        builder.declare(
            vault,
            "secret",
            DeclData::Property(PropertyData::new(TypeRef::Resolved(Type::Int), Some(RawExpr::Int(1)))),
        );
        let thief = builder.declare(
            file,
            "thief",
            DeclData::Variable(VariableData::new(TypeRef::Implicit, Some(builder.name_expr("secret")))),
        );
        let tree = builder.build();

        let (_, diagnostics) = run(&tree, thief);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnresolvedReference);
    }

    #[test]
    fn test_imported_private_declaration_is_invisible() {
        let mut builder = TreeBuilder::new();
        let lib = builder.file(FileId::new(0), "/lib.st", "lib");
        let hidden = builder.declare(
            lib,
            "hidden",
            DeclData::Variable(VariableData::new(TypeRef::Resolved(Type::Int), Some(RawExpr::Int(1)))),
        );
        builder.set_visibility(hidden, Visibility::Private);
        let main = builder.file(FileId::new(1), "/main.st", "app");
        let user = builder.declare(
            main,
            "user",
            DeclData::Variable(VariableData::new(TypeRef::Implicit, Some(builder.name_expr("hidden")))),
        );
        let tree = builder.build();
        if let Some(DeclData::File(data)) = tree.write(main).as_deref_mut() {
            data.imports.push(crate::hir::Import {
                path: tree.interner().intern_path("lib.hidden"),
                star: false,
                range: Default::default(),
                target: Lazy::Resolved(crate::hir::ImportTarget::Declaration(hidden)),
            });
        }

        let (_, diagnostics) = run(&tree, user);
        let kinds: Vec<_> = diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::InvisibleReference]);
    }
}
