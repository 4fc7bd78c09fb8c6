//! The compilation gate in front of code generation.
//!
//! A file is compiled by resolving it and every file it depends on to
//! [`Phase::Body`], then deciding from the diagnostics whether code can be
//! generated for it.

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::base::FileId;
use crate::hir::{is_blocking, DeclData, DeclId, Diagnostic, ImportTarget, Phase};
use crate::resolve::{ResolutionSession, ResolveError, ResolveResult};

/// What code generation receives for a file that compiled.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationInput {
    pub file: FileId,
    /// Every declaration of the file, parents before children, in source
    /// order.
    pub declarations: Vec<DeclId>,
    /// Diagnostics that did not block generation.
    pub warnings: Vec<Diagnostic>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompilationResult {
    Success(GenerationInput),
    /// The blocking diagnostics, in report order.
    Failure(Vec<Diagnostic>),
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CompilationResult::Success(_))
    }
}

/// Compiles files of one resolution session.
#[derive(Debug)]
pub struct CompilerFacility<'s> {
    session: &'s ResolutionSession,
}

impl<'s> CompilerFacility<'s> {
    pub fn new(session: &'s ResolutionSession) -> Self {
        Self { session }
    }

    /// Resolve `file` and its dependencies and gate code generation on the
    /// result.
    ///
    /// Errors are reserved for requests that could not run (an unknown
    /// file, cancellation, an internal phase violation); problems in the
    /// program are returned as [`CompilationResult::Failure`].
    pub fn compile(&self, file: FileId) -> ResolveResult<CompilationResult> {
        let files = self.dependency_files(file)?;
        info!(%file, files = files.len(), "compiling");

        let (main, dependencies) = files
            .split_last()
            .ok_or(ResolveError::TargetNotFound {
                file,
                path: String::new(),
            })?;
        if self.session.config().parallel_files {
            dependencies
                .par_iter()
                .try_for_each(|&dependency| self.resolve_file(dependency))?;
        } else {
            for &dependency in dependencies {
                self.resolve_file(dependency)?;
            }
        }
        self.resolve_file(*main)?;

        let ignored = &self.session.config().ignored_diagnostics;
        let (blocking, warnings): (Vec<Diagnostic>, Vec<Diagnostic>) = files
            .iter()
            .flat_map(|&f| self.session.diagnostics_for_file(f))
            .partition(|d| is_blocking(d, ignored));

        if !blocking.is_empty() {
            debug!(%file, errors = blocking.len(), "compilation blocked");
            return Ok(CompilationResult::Failure(blocking));
        }
        Ok(CompilationResult::Success(GenerationInput {
            file,
            declarations: self.declarations_of(file),
            warnings,
        }))
    }

    fn resolve_file(&self, file: FileId) -> ResolveResult<()> {
        if self.session.cancellation_token().is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        self.session.resolve_file_to(file, Phase::Body)
    }

    /// Files `file` depends on through imports and its package, dependencies
    /// first and `file` itself last.
    pub fn dependency_files(&self, file: FileId) -> ResolveResult<Vec<FileId>> {
        let tree = self.session.tree();
        if tree.file_decl(file).is_none() {
            return Err(ResolveError::TargetNotFound {
                file,
                path: String::new(),
            });
        }

        let mut ordered = Vec::new();
        let mut seen = FxHashSet::default();
        // (file, dependencies pushed)
        let mut stack = vec![(file, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                ordered.push(current);
                continue;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.push((current, true));
            for dependency in self.direct_dependencies(current)?.into_iter().rev() {
                if !seen.contains(&dependency) {
                    stack.push((dependency, false));
                }
            }
        }
        Ok(ordered)
    }

    fn direct_dependencies(&self, file: FileId) -> ResolveResult<Vec<FileId>> {
        let tree = self.session.tree();
        let Some(file_decl) = tree.file_decl(file) else {
            return Ok(Vec::new());
        };
        self.session.resolve_to(file_decl, Phase::Imports)?;

        let mut dependencies = Vec::new();
        let mut push = |f: FileId| {
            if f != file && !dependencies.contains(&f) {
                dependencies.push(f);
            }
        };
        if let Some(DeclData::File(data)) = tree.read(file_decl).as_deref() {
            for import in &data.imports {
                match import.target.resolved() {
                    Some(ImportTarget::Declaration(decl)) => {
                        if let Some(header) = tree.header(*decl) {
                            push(header.file);
                        }
                    }
                    Some(ImportTarget::Package(package)) => {
                        for &other in tree.modules().files_in_package(package) {
                            push(other);
                        }
                    }
                    Some(ImportTarget::Missing) | None => {}
                }
            }
        }
        if let Some(entry) = tree.modules().get(file) {
            for &other in tree.modules().files_in_package(&entry.package) {
                push(other);
            }
        }
        Ok(dependencies)
    }

    fn declarations_of(&self, file: FileId) -> Vec<DeclId> {
        let tree = self.session.tree();
        let Some(root) = tree.file_decl(file) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack: Vec<DeclId> = tree.children(root).iter().rev().copied().collect();
        while let Some(decl) = stack.pop() {
            out.push(decl);
            stack.extend(tree.children(decl).iter().rev().copied());
        }
        out
    }
}
