//! Operation tokens.
//!
//! Each new top-level request takes a token from the tracker. Starting a
//! newer request makes every older token stale, and work holding a stale
//! token stops at its next checkpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{FolioError, Result};

/// Issues monotonically increasing operation tokens.
#[derive(Debug, Clone, Default)]
pub struct OperationTracker {
    latest: Arc<AtomicU64>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, superseding all earlier ones.
    pub fn begin(&self) -> OperationToken {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        OperationToken {
            id,
            latest: Some(Arc::clone(&self.latest)),
        }
    }

    /// Id of the most recently started operation.
    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

/// Identifies one operation.
#[derive(Debug, Clone)]
pub struct OperationToken {
    id: u64,
    latest: Option<Arc<AtomicU64>>,
}

impl OperationToken {
    /// A token no tracker can supersede.
    pub fn detached() -> Self {
        Self { id: 0, latest: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once a newer operation has begun.
    pub fn is_current(&self) -> bool {
        match &self.latest {
            Some(latest) => latest.load(Ordering::SeqCst) == self.id,
            None => true,
        }
    }

    /// Fail with [`FolioError::Cancelled`] when superseded.
    pub fn ensure_current(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(FolioError::Cancelled)
        }
    }
}
