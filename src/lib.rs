pub mod batch;
pub mod cheques;
pub mod config;
pub mod error;
pub mod notify;
pub mod resolver;
pub mod store;

pub use batch::{BatchGenerator, BatchPolicy, RowFailurePolicy};
pub use cheques::{
    BatchSummary, ChequeBatch, ChequeRow, PartyKind, PaymentDirection, PaymentDraft,
    ResolvedAccounts, RowOutcome, RowState,
};
pub use config::Config;
pub use error::{BatchError, BatchResult, ResolveError, RowError, StoreError, ValidationError};
pub use notify::{LogNotifier, MemoryNotifier, Notification, Notifier};
pub use resolver::{lookup_party_name, AccountResolver};
pub use store::{DocumentStore, FieldMap, MemoryStore, RestDocumentStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging and tracing
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,cheque_batch=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
