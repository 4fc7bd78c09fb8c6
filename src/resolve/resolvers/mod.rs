//! Per-phase lazy resolvers.
//!
//! One resolver exists per phase above [`Phase::Raw`]. Raising a single
//! declaration one step runs the same generic flow for every phase:
//!
//! ```text
//! no work for this kind?     → move the marker, done
//! do_resolve_without_lock    → kind-wide coordination (class graph)
//!   ↓
//! tower + dependencies       → drive referenced declarations, no lock held
//!   ↓
//! container lock             → capture, transform, check, publish, advance
//! ```
//!
//! A failed transform is rolled back from its snapshot and reported once; a
//! transform that returns without producing its phase's state is a fatal
//! [`ResolveError::PhaseViolation`].

mod body;
mod imports;
mod signatures;
mod supertypes;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::hir::{DeclData, DeclId, DeclTree, Diagnostic, Phase};
use super::error::{ResolveError, ResolveResult, TransformError};
use super::keepers;
use super::phase_updater::{has_work, update_phase_for_internals};
use super::session::ResolutionSession;
use super::context::ResolveCx;
use super::tower::TowerContext;
use super::transformer::{BodyTransformer, TransformCx};

pub use body::BodyResolver;
pub use imports::ImportsResolver;
pub use signatures::SignaturesResolver;
pub use supertypes::SupertypesResolver;

// ============================================================================
// RESOLVER TRAIT
// ============================================================================

/// The work of one phase, split into the parts the generic flow sequences.
pub trait LazyResolver: Send + Sync {
    fn phase(&self) -> Phase;

    /// Handle `decl` completely outside the generic path, taking locks as
    /// needed. Returns whether it did.
    fn do_resolve_without_lock(
        &self,
        _session: &ResolutionSession,
        _cx: &mut ResolveCx,
        _decl: DeclId,
    ) -> ResolveResult<bool> {
        Ok(false)
    }

    /// Declarations the transform reads, with the phase each must reach
    /// first.
    fn dependencies(
        &self,
        _tree: &DeclTree,
        _tower: &TowerContext,
        _decl: DeclId,
        _data: &DeclData,
    ) -> Vec<(DeclId, Phase)> {
        Vec::new()
    }

    /// Rewrite the payload in place. Runs under the container lock.
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError>;

    /// Verify the payload is in the state this phase promises.
    fn check_is_resolved(&self, tree: &DeclTree, decl: DeclId, data: &DeclData) -> Result<(), String>;

    /// Publish the facts other declarations read after this phase.
    fn publish(&self, _tree: &DeclTree, _decl: DeclId, _data: &DeclData) {}
}

// ============================================================================
// REGISTRY
// ============================================================================

/// The resolver of every phase, fixed when the session is built.
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn LazyResolver>>,
}

impl ResolverRegistry {
    /// The standard resolvers, with `transformer` doing body work.
    pub fn new(transformer: Arc<dyn BodyTransformer>) -> Self {
        let resolvers: Vec<Box<dyn LazyResolver>> = vec![
            Box::new(ImportsResolver),
            Box::new(SupertypesResolver),
            Box::new(SignaturesResolver),
            Box::new(BodyResolver::new(transformer)),
        ];
        debug_assert!(
            resolvers
                .iter()
                .enumerate()
                .all(|(index, r)| r.phase().index() == index + 1)
        );
        Self { resolvers }
    }

    /// The resolver raising declarations to `phase`; none for [`Phase::Raw`].
    pub fn get(&self, phase: Phase) -> Option<&dyn LazyResolver> {
        phase
            .index()
            .checked_sub(1)
            .and_then(|index| self.resolvers.get(index))
            .map(Box::as_ref)
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.resolvers.iter().map(|r| r.phase()))
            .finish()
    }
}

// ============================================================================
// GENERIC FLOW
// ============================================================================

/// Raise `decl` from the phase below `resolver.phase()` to it.
///
/// Returns `Ok` also when the transform failed and was rolled back; the
/// marker then stays where it was and the failure is a diagnostic.
pub(crate) fn lazy_resolve(
    resolver: &dyn LazyResolver,
    session: &ResolutionSession,
    cx: &mut ResolveCx,
    decl: DeclId,
) -> ResolveResult<()> {
    let tree = session.tree();
    let phase = resolver.phase();
    let kind = tree.kind(decl).ok_or(ResolveError::UnknownDeclaration(decl))?;

    if !has_work(kind, phase) {
        tree.advance_phase(decl, phase);
        update_phase_for_internals(tree, decl, phase);
        return Ok(());
    }
    if resolver.do_resolve_without_lock(session, cx, decl)? {
        return Ok(());
    }
    resolve_under_lock(resolver, session, cx, decl)
}

/// The locked half of the flow: dependencies first, then the transform
/// under the container lock.
pub(crate) fn resolve_under_lock(
    resolver: &dyn LazyResolver,
    session: &ResolutionSession,
    cx: &mut ResolveCx,
    decl: DeclId,
) -> ResolveResult<()> {
    let tree = session.tree();
    let phase = resolver.phase();

    let tower = Arc::new(session.scope_cache().tower(tree, decl));
    if let Some(collector) = session.collector() {
        collector.add_declaration_context(decl, Arc::clone(&tower));
    }

    let dependencies = {
        let data = tree
            .read(decl)
            .ok_or(ResolveError::UnknownDeclaration(decl))?
            .clone();
        resolver.dependencies(tree, &tower, decl, &data)
    };
    for (dependency, dependency_phase) in dependencies {
        if dependency != decl {
            session.drive(cx, dependency, dependency_phase)?;
        }
    }

    let key = tree.lock_key(decl).ok_or(ResolveError::UnknownDeclaration(decl))?;
    let header = tree.header(decl).ok_or(ResolveError::UnknownDeclaration(decl))?;
    let token = cx.token().clone();
    let in_flight = cx.in_flight();

    session.lock_provider().with_lock_checked(key, &token, || {
        if tree.is_at_least(decl, phase) {
            return Ok(());
        }
        let mut data = tree.write(decl).ok_or(ResolveError::UnknownDeclaration(decl))?;
        let snapshot = keepers::capture(&data);
        let mut tcx = TransformCx::new(tree, decl, header, &tower, in_flight, &token);

        debug!(%decl, %phase, kind = %header.kind, "transform started");
        match resolver.transform(&mut tcx, &mut data) {
            Ok(()) => {
                if let Err(reason) = resolver.check_is_resolved(tree, decl, &data) {
                    snapshot.restore(&mut data);
                    return Err(ResolveError::violation(decl, phase, reason));
                }
                snapshot.discard();
                resolver.publish(tree, decl, &data);
                drop(data);
                tree.advance_phase(decl, phase);
                update_phase_for_internals(tree, decl, phase);
                debug!(%decl, %phase, "transform finished");
                session.report(tcx.into_diagnostics());
                Ok(())
            }
            Err(TransformError::Cancelled) => {
                snapshot.restore(&mut data);
                debug!(%decl, %phase, "transform cancelled, rolled back");
                Err(ResolveError::Cancelled)
            }
            Err(TransformError::Failed { kind, message }) => {
                snapshot.restore(&mut data);
                warn!(%decl, %phase, %kind, %message, "transform failed, rolled back");
                let failure = Diagnostic::new(header.file, header.range, kind, message).for_decl(decl);
                session.report([failure]);
                Ok(())
            }
        }
    })
}
