//! Expression trees: raw parser output and the resolved form.
//!
//! The parser hands over [`RawExpr`]/[`RawBlock`] trees whose names are not
//! bound to anything. The body phase turns them into [`Expr`]/[`Block`]
//! trees where every name points at a declaration, parameter or local and
//! every node carries its [`Type`].

use smol_str::SmolStr;

use crate::base::Name;
use super::ids::DeclId;
use super::types::Type;

// ============================================================================
// LAZY PLACEHOLDERS
// ============================================================================

/// State of a lazily computed part of a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Lazy<T> {
    /// Not computed yet.
    #[default]
    Unresolved,
    /// A transformer is substituting the value right now. Only ever observed
    /// inside a locked section or after an interrupted attempt.
    InProgress,
    Resolved(T),
}

impl<T> Lazy<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Lazy::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Lazy::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// A lazily resolved expression together with the source it is computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct LazyExpr {
    pub source: RawExpr,
    pub resolved: Lazy<Expr>,
}

impl LazyExpr {
    pub fn new(source: RawExpr) -> Self {
        Self {
            source,
            resolved: Lazy::Unresolved,
        }
    }
}

/// A lazily resolved block together with the source it is computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct LazyBlock {
    pub source: RawBlock,
    pub resolved: Lazy<Block>,
}

impl LazyBlock {
    pub fn new(source: RawBlock) -> Self {
        Self {
            source,
            resolved: Lazy::Unresolved,
        }
    }
}

// ============================================================================
// RAW (PARSER) FORM
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
}

/// An expression as produced by the parser.
#[derive(Clone, Debug, PartialEq)]
pub enum RawExpr {
    Int(i64),
    Bool(bool),
    Str(SmolStr),
    Name(Name),
    Call { callee: Name, args: Vec<RawExpr> },
    Binary { op: BinaryOp, lhs: Box<RawExpr>, rhs: Box<RawExpr> },
}

impl RawExpr {
    pub fn binary(op: BinaryOp, lhs: RawExpr, rhs: RawExpr) -> Self {
        RawExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Every bare name this expression mentions, in source order.
    pub fn names(&self, out: &mut Vec<Name>) {
        match self {
            RawExpr::Int(_) | RawExpr::Bool(_) | RawExpr::Str(_) => {}
            RawExpr::Name(name) => out.push(*name),
            RawExpr::Call { callee, args } => {
                out.push(*callee);
                for arg in args {
                    arg.names(out);
                }
            }
            RawExpr::Binary { lhs, rhs, .. } => {
                lhs.names(out);
                rhs.names(out);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawStmt {
    Expr(RawExpr),
    Let { name: Name, init: RawExpr },
    Assign { target: Name, value: RawExpr },
    Return(Option<RawExpr>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawBlock {
    pub stmts: Vec<RawStmt>,
}

impl RawBlock {
    pub fn new(stmts: Vec<RawStmt>) -> Self {
        Self { stmts }
    }

    /// Every bare name the block mentions, including assignment targets.
    pub fn names(&self, out: &mut Vec<Name>) {
        for stmt in &self.stmts {
            match stmt {
                RawStmt::Expr(expr) | RawStmt::Let { init: expr, .. } => expr.names(out),
                RawStmt::Assign { target, value } => {
                    out.push(*target);
                    value.names(out);
                }
                RawStmt::Return(Some(expr)) => expr.names(out),
                RawStmt::Return(None) => {}
            }
        }
    }
}

// ============================================================================
// RESOLVED FORM
// ============================================================================

/// What a resolved call invokes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    Function(DeclId),
    /// Instantiation of `class`, through `constructor` when one matched.
    Constructor { class: DeclId, constructor: Option<DeclId> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    Str(SmolStr),
    Param(u32),
    Local(u32),
    /// Read of a property or variable declaration.
    Decl(DeclId),
    Call { callee: Callee, args: Vec<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// A reference that could not be bound; already reported.
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    pub fn error() -> Self {
        Self::new(ExprKind::Error, Type::Error)
    }

    /// Declarations read by this expression, in evaluation order.
    pub fn referenced_decls(&self, out: &mut Vec<DeclId>) {
        match &self.kind {
            ExprKind::Decl(id) => out.push(*id),
            ExprKind::Call { args, .. } => {
                for arg in args {
                    arg.referenced_decls(out);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                lhs.referenced_decls(out);
                rhs.referenced_decls(out);
            }
            _ => {}
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssignTarget {
    Decl(DeclId),
    Local(u32),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Let { local: u32, init: Expr },
    Assign { target: AssignTarget, value: Expr },
    Return(Option<Expr>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}
