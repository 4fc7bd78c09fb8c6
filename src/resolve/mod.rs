//! Lazy, phase-gated resolution of declarations.
//!
//! Nothing is resolved up front. A caller asks a [`ResolutionSession`] to
//! raise one target to a [`Phase`]; the session walks the target's
//! designation, drives whatever the target's transforms read, and runs each
//! missing phase under the lock of the target's container.
//!
//! ```text
//! session      → resolve_to / resolve_file_to, diagnostics
//!   ↓
//! resolvers    → one LazyResolver per phase, generic locked flow
//!   ↓
//! transformer  → TransformCx + BodyTransformer (ExpressionTransformer)
//!   ↓
//! tower        → scopes visible from a declaration, collector
//!   ↓
//! keepers, state_keeper, lock, target, context, error
//! ```
//!
//! ## Guarantees
//!
//! - Phase markers only grow, and a declaration at phase `P` has every part
//!   phase `P` resolves in final form.
//! - A transform that fails leaves its declaration exactly as it found it,
//!   reported by one diagnostic.
//! - No call chain ever holds two container locks: dependencies are driven
//!   before the lock is taken.

mod config;
mod context;
mod error;
mod keepers;
mod lock;
mod phase_updater;
mod resolvers;
mod session;
mod state_keeper;
mod target;
mod tower;
mod transformer;

pub use crate::hir::Phase;
pub use config::{SessionConfig, SiblingPolicy};
pub use context::ResolveCx;
pub use error::{ResolveError, ResolveResult, TransformError};
pub use keepers::capture as capture_state;
pub use lock::LockProvider;
pub use phase_updater::has_work;
pub use resolvers::{
    BodyResolver, ImportsResolver, LazyResolver, ResolverRegistry, SignaturesResolver,
    SupertypesResolver,
};
pub use session::ResolutionSession;
pub use state_keeper::{StateKeeper, StateKeeperBuilder, StateSnapshot};
pub use target::ResolveTarget;
pub use tower::{
    lookup_type, Scope, ScopeCache, ScopeKind, TowerContext, TowerContextMap,
    TowerDataContextCollector, TypeLookup,
};
pub use transformer::{BodyTransformer, ExpressionTransformer, TransformCx};
