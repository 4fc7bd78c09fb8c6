//! High-level IR: the declaration model the resolvers operate on.
//!
//! ```text
//! tree   → DeclTree arena + TreeBuilder
//!   ↓
//! decl   → headers and per-kind payloads
//!   ↓
//! expr, types, cfg → raw and resolved bodies, types, flow graphs
//!   ↓
//! ids, phase, input, diagnostics → identifiers and leaf data
//! ```

mod cfg;
mod decl;
mod diagnostics;
mod expr;
mod ids;
mod input;
mod phase;
mod tree;
mod types;

pub use cfg::{CfgNode, CfgNodeKind, ControlFlowGraph};
pub use decl::{
    ClassData, ConstructorData, DeclData, DeclHeader, DeclKind, DelegateExpr,
    DelegatedConstructorCall, DelegationTarget, Deprecation, FileData, FunctionData, Import,
    ImportTarget, InitializerData, PropertyBodyState, PropertyData, TypeAliasData,
    ValueParameter, VariableData, Visibility,
};
pub use diagnostics::{
    codes, is_blocking, Diagnostic, DiagnosticCollector, DiagnosticKind, Severity,
};
pub use expr::{
    AssignTarget, BinaryOp, Block, Callee, Expr, ExprKind, Lazy, LazyBlock, LazyExpr, RawBlock,
    RawExpr, RawStmt, Stmt,
};
pub use ids::DeclId;
pub use input::{FileEntry, ModuleGraph};
pub use phase::Phase;
pub use tree::{DeclTree, Published, TreeBuilder};
pub use types::{Type, TypeRef};
