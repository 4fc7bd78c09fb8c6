//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use stratum::hir::{DeclData, DeclId, Lazy};
use stratum::resolve::{BodyTransformer, ExpressionTransformer, TransformCx, TransformError};

/// Records the order declarations are transformed in, then defers to the
/// default transformer.
#[derive(Default)]
pub struct RecordingTransformer {
    inner: ExpressionTransformer,
    pub order: Mutex<Vec<DeclId>>,
}

impl BodyTransformer for RecordingTransformer {
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        self.order.lock().push(cx.decl());
        self.inner.transform(cx, data)
    }
}

/// Succeeds without resolving anything.
pub struct NoopTransformer;

impl BodyTransformer for NoopTransformer {
    fn transform(&self, _: &mut TransformCx<'_>, _: &mut DeclData) -> Result<(), TransformError> {
        Ok(())
    }
}

/// Scribbles over function bodies, then gives up.
pub struct FailingTransformer;

impl BodyTransformer for FailingTransformer {
    fn transform(&self, _: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        if let DeclData::Function(function) = data {
            if let Some(body) = &mut function.body {
                body.resolved = Lazy::InProgress;
            }
        }
        Err(TransformError::failed("boom"))
    }
}

/// Cancels the session's token halfway through a transform.
pub struct CancellingTransformer {
    pub token: CancellationToken,
}

impl BodyTransformer for CancellingTransformer {
    fn transform(&self, cx: &mut TransformCx<'_>, data: &mut DeclData) -> Result<(), TransformError> {
        if let DeclData::Function(function) = data {
            if let Some(body) = &mut function.body {
                body.resolved = Lazy::InProgress;
            }
        }
        self.token.cancel();
        cx.check_cancelled()
    }
}

pub fn shared<T: BodyTransformer + 'static>(transformer: T) -> Arc<dyn BodyTransformer> {
    Arc::new(transformer)
}
