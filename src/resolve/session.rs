//! The resolution session: the entry point for raising declarations.
//!
//! A session owns everything shared across resolution requests on one
//! tree: the resolver registry, the lock provider, the scope cache, the
//! optional tower collector and the published diagnostics. It is `Sync`;
//! independent requests may run on different threads at once.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span};

use crate::base::FileId;
use crate::hir::{DeclId, DeclKind, DeclTree, Diagnostic, DiagnosticCollector, Phase};
use super::config::{SessionConfig, SiblingPolicy};
use super::context::ResolveCx;
use super::error::{ResolveError, ResolveResult};
use super::lock::LockProvider;
use super::resolvers::{lazy_resolve, ResolverRegistry};
use super::target::ResolveTarget;
use super::tower::{ScopeCache, TowerContextMap, TowerDataContextCollector};
use super::transformer::{BodyTransformer, ExpressionTransformer};

pub struct ResolutionSession {
    tree: Arc<DeclTree>,
    config: SessionConfig,
    registry: ResolverRegistry,
    locks: LockProvider,
    scopes: ScopeCache,
    collector: Option<Arc<dyn TowerDataContextCollector>>,
    diagnostics: Mutex<DiagnosticCollector>,
    token: CancellationToken,
}

impl std::fmt::Debug for ResolutionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionSession")
            .field("declarations", &self.tree.len())
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics.lock().len())
            .finish_non_exhaustive()
    }
}

impl ResolutionSession {
    /// A session with the default configuration and body transformer.
    pub fn new(tree: Arc<DeclTree>) -> Self {
        Self::with_config(tree, SessionConfig::default())
    }

    pub fn with_config(tree: Arc<DeclTree>, config: SessionConfig) -> Self {
        let collector: Option<Arc<dyn TowerDataContextCollector>> = if config.collect_tower_contexts {
            Some(Arc::new(TowerContextMap::new()))
        } else {
            None
        };
        Self {
            tree,
            config,
            registry: ResolverRegistry::new(Arc::new(ExpressionTransformer::new())),
            locks: LockProvider::new(),
            scopes: ScopeCache::new(),
            collector,
            diagnostics: Mutex::new(DiagnosticCollector::new()),
            token: CancellationToken::new(),
        }
    }

    /// Replace the body transformer.
    pub fn with_transformer(mut self, transformer: Arc<dyn BodyTransformer>) -> Self {
        self.registry = ResolverRegistry::new(transformer);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Record towers in `collector`, regardless of the config flag.
    pub fn with_collector(mut self, collector: Arc<dyn TowerDataContextCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn tree(&self) -> &DeclTree {
        &self.tree
    }

    pub fn shared_tree(&self) -> Arc<DeclTree> {
        Arc::clone(&self.tree)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lock_provider(&self) -> &LockProvider {
        &self.locks
    }

    pub fn scope_cache(&self) -> &ScopeCache {
        &self.scopes
    }

    pub fn collector(&self) -> Option<&Arc<dyn TowerDataContextCollector>> {
        self.collector.as_ref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel every running and future request of this session.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Raise `target` to at least `phase` and return the phase it reached.
    ///
    /// The containers on its designation path are brought to the phase
    /// that fixes the names visible inside them, then the target climbs the
    /// ladder one step at a time. A step whose transform fails is reported
    /// as a diagnostic and stops the climb; the returned phase is then lower
    /// than `phase`. Requesting a phase the target already has is a no-op.
    pub fn resolve_to(&self, target: impl Into<ResolveTarget>, phase: Phase) -> ResolveResult<Phase> {
        let target = target.into();
        let decl = target.validate(&self.tree)?;
        let span = debug_span!("resolve_to", %decl, %phase);
        let _enter = span.enter();

        let mut cx = ResolveCx::new(self.token.clone());
        self.drive(&mut cx, decl, phase)?;
        self.tree
            .phase(decl)
            .ok_or(ResolveError::UnknownDeclaration(decl))
    }

    /// Raise a file and every declaration in it to `phase`, in declaration
    /// order.
    pub fn resolve_file_to(&self, file: FileId, phase: Phase) -> ResolveResult<()> {
        let file_decl = self.tree.file_decl(file).ok_or(ResolveError::TargetNotFound {
            file,
            path: String::new(),
        })?;
        let span = debug_span!("resolve_file_to", %file, %phase);
        let _enter = span.enter();

        let mut cx = ResolveCx::new(self.token.clone());
        let mut stack = vec![file_decl];
        while let Some(decl) = stack.pop() {
            cx.check_cancelled()?;
            self.drive(&mut cx, decl, phase)?;
            stack.extend(self.tree.children(decl).iter().rev().copied());
        }
        Ok(())
    }

    /// Raise every file of the module graph to `phase`.
    pub fn resolve_all(&self, phase: Phase) -> ResolveResult<()> {
        let files: Vec<FileId> = self.tree.modules().iter().map(|(file, _)| file).collect();
        for file in files {
            self.resolve_file_to(file, phase)?;
        }
        Ok(())
    }

    /// Drive `decl` to `phase` on the logical call chain `cx`.
    ///
    /// Returns early without error when `decl` is already in flight on this
    /// chain: the caller then reads its unpublished facts and reports the
    /// recursion.
    ///
    /// Containers (and preceding siblings) are driven before `decl` joins
    /// the chain. Only declarations whose own transforms are waiting are in
    /// flight, so a container reading a nested declaration does not see it
    /// as recursion.
    pub(crate) fn drive(&self, cx: &mut ResolveCx, decl: DeclId, phase: Phase) -> ResolveResult<()> {
        if self.tree.is_at_least(decl, phase) || cx.is_in_flight(decl) {
            return Ok(());
        }
        if !self.tree.contains(decl) {
            return Err(ResolveError::UnknownDeclaration(decl));
        }
        cx.check_cancelled()?;
        self.drive_containers(cx, decl, phase)?;
        if self.tree.is_at_least(decl, phase) || cx.is_in_flight(decl) {
            return Ok(());
        }
        cx.enter(decl);
        let result = self.climb(cx, decl, phase);
        cx.exit(decl);
        result
    }

    fn drive_containers(&self, cx: &mut ResolveCx, decl: DeclId, phase: Phase) -> ResolveResult<()> {
        let Some(parent) = self.tree.parent(decl) else {
            return Ok(());
        };
        let container_phase = match self.tree.kind(parent) {
            Some(DeclKind::File) => phase.min(Phase::Imports),
            _ => phase.min(Phase::Supertypes),
        };
        self.drive(cx, parent, container_phase)?;

        if self.config.sibling_policy == SiblingPolicy::PrecedingSiblings {
            let preceding: Vec<DeclId> = self
                .tree
                .children(parent)
                .iter()
                .copied()
                .take_while(|&sibling| sibling != decl)
                .collect();
            for sibling in preceding {
                self.drive(cx, sibling, phase)?;
            }
        }
        Ok(())
    }

    /// Run the missing phases of `decl` one at a time.
    fn climb(&self, cx: &mut ResolveCx, decl: DeclId, phase: Phase) -> ResolveResult<()> {
        while let Some(current) = self.tree.phase(decl) {
            if current >= phase {
                break;
            }
            cx.check_cancelled()?;
            let Some(next) = current.next() else {
                break;
            };
            let Some(resolver) = self.registry.get(next) else {
                break;
            };
            lazy_resolve(resolver, self, cx, decl)?;
            if !self.tree.is_at_least(decl, next) {
                debug!(%decl, phase = %next, "phase not reached, stopping");
                break;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------------

    /// Publish diagnostics; exact duplicates of published ones are dropped,
    /// so resolving the same declaration twice reports each problem once.
    pub(crate) fn report(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        let mut collector = self.diagnostics.lock();
        for diagnostic in diagnostics {
            collector.add_unique(diagnostic);
        }
    }

    /// Every diagnostic published so far, in report order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().diagnostics().to_vec()
    }

    pub fn diagnostics_for_file(&self, file: FileId) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .diagnostics_for_file(file)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn diagnostics_for_decl(&self, decl: DeclId) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .diagnostics_for_decl(decl)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Errors that block code generation under this session's ignore-list.
    pub fn blocking_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .blocking(&self.config.ignored_diagnostics)
            .cloned()
            .collect()
    }
}
