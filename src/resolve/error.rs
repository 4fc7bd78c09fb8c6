//! Errors raised by the resolution engine.
//!
//! Problems in the program being compiled are diagnostics, not errors. The
//! types here describe why a resolution *request* could not be carried out.

use thiserror::Error;

use crate::base::FileId;
use crate::hir::{DeclId, DiagnosticKind, Phase};

/// Why a resolution request failed.
///
/// A target that names something the file does not declare is
/// [`ResolveError::TargetNotFound`]. An id or designation that was never
/// handed out by the tree (an out-of-arena index, a path whose parent links
/// do not match) is a caller bug and is kept apart as
/// [`ResolveError::UnknownDeclaration`]. Neither touches any phase marker.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A requested nested declaration does not exist in its file.
    #[error("no declaration `{path}` in file {file}")]
    TargetNotFound { file: FileId, path: String },

    /// A declaration id that does not belong to the tree.
    #[error("unknown declaration {0}")]
    UnknownDeclaration(DeclId),

    /// A transform completed without producing the state its phase promises.
    ///
    /// The resolved tree can no longer be trusted; this is never turned into
    /// a diagnostic.
    #[error("{decl} is not resolved to {phase} after its transform: {reason}")]
    PhaseViolation {
        decl: DeclId,
        phase: Phase,
        reason: String,
    },

    /// Resolution was cancelled from outside. The declaration being
    /// transformed was rolled back.
    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Errors that signal a bug in the engine rather than a bad request.
    pub fn is_internal(&self) -> bool {
        matches!(self, ResolveError::PhaseViolation { .. })
    }

    pub(crate) fn violation(decl: DeclId, phase: Phase, reason: impl Into<String>) -> Self {
        ResolveError::PhaseViolation {
            decl,
            phase,
            reason: reason.into(),
        }
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Why a transformer gave up on a declaration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransformError {
    /// The declaration could not be transformed; it is rolled back and
    /// reported once as `kind`.
    #[error("{kind}: {message}")]
    Failed {
        kind: DiagnosticKind,
        message: String,
    },

    /// The cancellation token fired mid-transform.
    #[error("transform cancelled")]
    Cancelled,
}

impl TransformError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransformError::Failed {
            kind: DiagnosticKind::ResolutionFailed,
            message: message.into(),
        }
    }
}
