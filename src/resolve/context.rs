//! The logical call chain of one resolution request.

use tokio_util::sync::CancellationToken;

use crate::hir::DeclId;
use super::error::{ResolveError, ResolveResult};

/// State threaded through one `resolve_to` call and every nested
/// dependency resolution it triggers.
///
/// A chain runs on a single thread, which is what makes the re-entrant
/// container locks re-entrant "per call chain".
#[derive(Debug)]
pub struct ResolveCx {
    token: CancellationToken,
    in_flight: Vec<DeclId>,
}

impl ResolveCx {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            in_flight: Vec::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn check_cancelled(&self) -> ResolveResult<()> {
        if self.token.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether `decl` is being resolved further up this chain.
    pub fn is_in_flight(&self, decl: DeclId) -> bool {
        self.in_flight.contains(&decl)
    }

    /// Declarations being resolved, outermost first.
    pub fn in_flight(&self) -> &[DeclId] {
        &self.in_flight
    }

    pub(crate) fn enter(&mut self, decl: DeclId) {
        self.in_flight.push(decl);
    }

    pub(crate) fn exit(&mut self, decl: DeclId) {
        if let Some(pos) = self.in_flight.iter().rposition(|&d| d == decl) {
            self.in_flight.remove(pos);
        }
    }

    pub fn depth(&self) -> usize {
        self.in_flight.len()
    }
}
