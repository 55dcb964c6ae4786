use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

use crate::error::ErrorDetail;

/// User-facing messages emitted while a batch runs
///
/// Fire-and-forget: delivery is never awaited for its result and never part
/// of the control flow.
#[derive(Debug, Clone, Serialize)]
pub enum Notification {
    NothingToProcess {
        batch: String,
    },
    MissingAccount {
        batch: String,
    },
    RowFailed {
        batch: String,
        row: String,
        detail: ErrorDetail,
    },
    BatchCompleted {
        batch: String,
        created: usize,
    },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::NothingToProcess { batch } => {
                write!(f, "No cheques to process for batch {}", batch)
            }
            Notification::MissingAccount { batch } => write!(
                f,
                "No valid account was found for batch {}. Set a destination account, a bank account, or a payment mode with a default account",
                batch
            ),
            Notification::RowFailed { batch, row, detail } => {
                write!(f, "Batch {} row {}: {}", batch, row, detail.message)
            }
            Notification::BatchCompleted { batch, created } => {
                write!(f, "Batch {}: {} payment(s) created and finalized", batch, created)
            }
        }
    }
}

/// Notification channel the generator reports through
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Notifier that writes to the tracing log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) {
        match &notification {
            Notification::NothingToProcess { .. } => info!("{}", notification),
            Notification::MissingAccount { .. } => error!("{}", notification),
            Notification::RowFailed { .. } => warn!("{}", notification),
            Notification::BatchCompleted { .. } => info!("✓ {}", notification),
        }
    }
}

/// Notifier that buffers messages for later inspection
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return everything notified so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.messages.lock())
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn notify(&self, notification: Notification) {
        self.messages.lock().push(notification);
    }
}
