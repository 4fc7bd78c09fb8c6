//! Diagnostics: user-facing semantic problems found during resolution.
//!
//! Problems in the input program never abort resolution. Resolvers report
//! them here and keep going; the compilation gate decides afterwards whether
//! anything blocking was reported.

use std::fmt;
use std::sync::Arc;

use text_size::TextRange;

use crate::base::FileId;
use super::ids::DeclId;

// ============================================================================
// DIAGNOSTIC TYPES
// ============================================================================

/// Severity level of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    /// Convert to LSP severity number.
    pub fn to_lsp(&self) -> u32 {
        match self {
            Severity::Error => 1,
            Severity::Warning => 2,
            Severity::Info => 3,
            Severity::Hint => 4,
        }
    }
}

/// Machine-distinguishable kind of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagnosticKind {
    /// A transform failed and the declaration was rolled back.
    ResolutionFailed,
    UnresolvedImport,
    CyclicInheritance,
    InvalidSupertype,
    RecursiveTypeAlias,
    UnresolvedType,
    UnresolvedReference,
    TypeMismatch,
    /// A type depends on itself through inference.
    RecursiveType,
    UninitializedProperty,
    NoConstructor,
    ArgumentCountMismatch,
    /// Assignment to a value parameter.
    ValReassignment,
    UnreachableCode,
    DivisionByZero,
    DeprecationError,
    Deprecation,
    InvisibleReference,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::ResolutionFailed => codes::RESOLUTION_FAILED,
            DiagnosticKind::UnresolvedImport => codes::UNRESOLVED_IMPORT,
            DiagnosticKind::CyclicInheritance => codes::CYCLIC_INHERITANCE,
            DiagnosticKind::InvalidSupertype => codes::INVALID_SUPERTYPE,
            DiagnosticKind::RecursiveTypeAlias => codes::RECURSIVE_TYPE_ALIAS,
            DiagnosticKind::UnresolvedType => codes::UNRESOLVED_TYPE,
            DiagnosticKind::UnresolvedReference => codes::UNRESOLVED_REFERENCE,
            DiagnosticKind::TypeMismatch => codes::TYPE_MISMATCH,
            DiagnosticKind::RecursiveType => codes::RECURSIVE_TYPE,
            DiagnosticKind::UninitializedProperty => codes::UNINITIALIZED_PROPERTY,
            DiagnosticKind::NoConstructor => codes::NO_CONSTRUCTOR,
            DiagnosticKind::ArgumentCountMismatch => codes::ARGUMENT_COUNT_MISMATCH,
            DiagnosticKind::ValReassignment => codes::VAL_REASSIGNMENT,
            DiagnosticKind::UnreachableCode => codes::UNREACHABLE_CODE,
            DiagnosticKind::DivisionByZero => codes::DIVISION_BY_ZERO,
            DiagnosticKind::DeprecationError => codes::DEPRECATION_ERROR,
            DiagnosticKind::Deprecation => codes::DEPRECATION,
            DiagnosticKind::InvisibleReference => codes::INVISIBLE_REFERENCE,
        }
    }

    /// The severity this kind is reported with.
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::UnreachableCode | DiagnosticKind::Deprecation => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A diagnostic message with location.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// The file containing this diagnostic.
    pub file: FileId,
    /// The declaration being resolved when the problem was found.
    pub decl: Option<DeclId>,
    pub range: TextRange,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// The diagnostic message.
    pub message: Arc<str>,
}

impl Diagnostic {
    /// Create a diagnostic with the kind's default severity.
    pub fn new(file: FileId, range: TextRange, kind: DiagnosticKind, message: impl Into<Arc<str>>) -> Self {
        Self {
            file,
            decl: None,
            range,
            severity: kind.default_severity(),
            kind,
            message: message.into(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(file: FileId, range: TextRange, kind: DiagnosticKind, message: impl Into<Arc<str>>) -> Self {
        Self::new(file, range, kind, message).with_severity(Severity::Error)
    }

    /// Create a new warning diagnostic.
    pub fn warning(file: FileId, range: TextRange, kind: DiagnosticKind, message: impl Into<Arc<str>>) -> Self {
        Self::new(file, range, kind, message).with_severity(Severity::Warning)
    }

    /// Attach the declaration the diagnostic was reported for.
    pub fn for_decl(mut self, decl: DeclId) -> Self {
        self.decl = Some(decl);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// The diagnostic's code string.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        write!(f, "{severity}[{}]: {}", self.code(), self.message)
    }
}

// ============================================================================
// DIAGNOSTIC CODES
// ============================================================================

/// Diagnostic codes reported by the resolvers.
pub mod codes {
    use super::DiagnosticKind;

    /// A declaration's transform failed and was rolled back.
    pub const RESOLUTION_FAILED: &str = "RESOLUTION_FAILED";
    pub const UNRESOLVED_IMPORT: &str = "UNRESOLVED_IMPORT";
    pub const CYCLIC_INHERITANCE: &str = "CYCLIC_INHERITANCE";
    pub const INVALID_SUPERTYPE: &str = "INVALID_SUPERTYPE";
    pub const RECURSIVE_TYPE_ALIAS: &str = "RECURSIVE_TYPE_ALIAS";
    pub const UNRESOLVED_TYPE: &str = "UNRESOLVED_TYPE";
    pub const UNRESOLVED_REFERENCE: &str = "UNRESOLVED_REFERENCE";
    pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
    pub const RECURSIVE_TYPE: &str = "RECURSIVE_TYPE";
    pub const UNINITIALIZED_PROPERTY: &str = "UNINITIALIZED_PROPERTY";
    pub const NO_CONSTRUCTOR: &str = "NO_CONSTRUCTOR";
    pub const ARGUMENT_COUNT_MISMATCH: &str = "ARGUMENT_COUNT_MISMATCH";
    pub const VAL_REASSIGNMENT: &str = "VAL_REASSIGNMENT";
    /// Warning.
    pub const UNREACHABLE_CODE: &str = "UNREACHABLE_CODE";
    pub const DIVISION_BY_ZERO: &str = "DIVISION_BY_ZERO";
    pub const DEPRECATION_ERROR: &str = "DEPRECATION_ERROR";
    /// Warning.
    pub const DEPRECATION: &str = "DEPRECATION";
    /// Reference to a private declaration from outside its scope.
    pub const INVISIBLE_REFERENCE: &str = "INVISIBLE_REFERENCE";

    /// Error kinds that do not block code generation.
    ///
    /// They are still reported. Generation tolerates them because they are
    /// either raised to errors by unrelated configuration or describe code
    /// that still has well-defined semantics.
    pub const IGNORED_FOR_CODEGEN: &[DiagnosticKind] = &[
        DiagnosticKind::InvisibleReference,
        DiagnosticKind::DeprecationError,
        DiagnosticKind::DivisionByZero,
    ];
}

// ============================================================================
// DIAGNOSTIC COLLECTOR
// ============================================================================

/// Collects diagnostics during semantic analysis.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    /// Create a new empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add a diagnostic unless an identical one was already collected.
    /// Returns whether it was added.
    pub fn add_unique(&mut self, diagnostic: Diagnostic) -> bool {
        if self.diagnostics.contains(&diagnostic) {
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Get all diagnostics.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get diagnostics for a specific file.
    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.file == file).collect()
    }

    /// Get diagnostics reported for one declaration.
    pub fn diagnostics_for_decl(&self, decl: DeclId) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.decl == Some(decl)).collect()
    }

    /// Error diagnostics whose kind is not in `ignored`.
    pub fn blocking<'a>(
        &'a self,
        ignored: &'a [DiagnosticKind],
    ) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.diagnostics.iter().filter(move |d| is_blocking(d, ignored))
    }

    /// Get the number of errors.
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count()
    }

    /// Get the number of warnings.
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Take all diagnostics, leaving the collector empty.
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Clear all diagnostics.
    pub fn clear(&mut self) {
        self.diagnostics.clear();
    }
}

/// Whether `diagnostic` stops code generation.
pub fn is_blocking(diagnostic: &Diagnostic, ignored: &[DiagnosticKind]) -> bool {
    diagnostic.severity == Severity::Error && !ignored.contains(&diagnostic.kind)
}
