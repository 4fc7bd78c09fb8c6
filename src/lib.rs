//! # stratum-base
//!
//! Lazy, phase-gated semantic resolution for a compiler middle-end.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project → compilation gate in front of code generation
//!   ↓
//! ide     → containing-declaration and visibility queries
//!   ↓
//! resolve → sessions, per-phase resolvers, locks, state keepers
//!   ↓
//! hir     → declaration tree, phases, payloads, diagnostics
//!   ↓
//! base    → primitives (FileId, Name interning, text ranges)
//! ```

/// Foundation types: FileId, Name interning, text ranges
pub mod base;

/// Declaration tree with phase markers and lazily resolved payloads
pub mod hir;

/// Lazy resolution engine
pub mod resolve;

/// Queries over the declaration tree for tooling
pub mod ide;

/// Compilation of resolved files
pub mod project;

pub use base::{FileId, Interner, Name, TextRange, TextSize};
pub use hir::{DeclId, DeclTree, Diagnostic, DiagnosticKind, Phase, TreeBuilder};
pub use project::{CompilationResult, CompilerFacility};
pub use resolve::{ResolutionSession, ResolveError, ResolveResult, ResolveTarget, SessionConfig};
