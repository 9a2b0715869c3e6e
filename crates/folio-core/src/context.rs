//! Per-request operation context.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{Span, info_span, warn};

use crate::batch::OperationToken;
use crate::error::Result;
use crate::models::FolioConfig;

type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Configuration, cancellation token and collected warnings for one
/// top-level request. Created once per call and passed down explicitly.
pub struct OperationContext {
    config: FolioConfig,
    token: OperationToken,
    warnings: Mutex<Vec<String>>,
    progress: Option<ProgressFn>,
    span: Span,
}

impl OperationContext {
    pub fn new(config: FolioConfig, token: OperationToken) -> Self {
        let span = info_span!("operation", id = token.id());
        Self {
            config,
            token,
            warnings: Mutex::new(Vec::new()),
            progress: None,
            span,
        }
    }

    /// Default configuration and a token that is never superseded.
    pub fn detached() -> Self {
        Self::detached_with(FolioConfig::default())
    }

    pub fn detached_with(config: FolioConfig) -> Self {
        Self::new(config, OperationToken::detached())
    }

    /// Receive progress fractions in `0.0..=1.0`.
    pub fn with_progress(mut self, progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn token(&self) -> &OperationToken {
        &self.token
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Fail with `Cancelled` when a newer operation has started.
    pub fn checkpoint(&self) -> Result<()> {
        self.token.ensure_current()
    }

    /// Record a non-fatal problem for the result.
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(parent: &self.span, "{}", message);
        self.lock_warnings().push(message);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock_warnings().clone()
    }

    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock_warnings())
    }

    pub fn report_progress(&self, fraction: f64) {
        if let Some(progress) = &self.progress {
            progress(fraction.clamp(0.0, 1.0));
        }
    }

    fn lock_warnings(&self) -> MutexGuard<'_, Vec<String>> {
        self.warnings.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("token", &self.token.id())
            .field("warnings", &self.warnings())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::OperationTracker;
    use crate::error::FolioError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_warnings_are_collected() {
        let ctx = OperationContext::detached();
        ctx.warn("first");
        ctx.warn(String::from("second"));
        assert_eq!(ctx.warnings(), vec!["first", "second"]);
        assert_eq!(ctx.take_warnings().len(), 2);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_checkpoint_follows_token() {
        let tracker = OperationTracker::new();
        let ctx = OperationContext::new(FolioConfig::default(), tracker.begin());
        assert!(ctx.checkpoint().is_ok());
        tracker.begin();
        assert!(matches!(ctx.checkpoint(), Err(FolioError::Cancelled)));
    }

    #[test]
    fn test_progress_is_clamped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let ctx = OperationContext::detached().with_progress(move |p| {
            assert!((0.0..=1.0).contains(&p));
            seen.fetch_add(1, Ordering::SeqCst);
        });
        ctx.report_progress(1.5);
        ctx.report_progress(0.5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
