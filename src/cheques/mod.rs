pub mod models;

pub use models::{
    BatchSummary, ChequeBatch, ChequeRow, PartyKind, PaymentDirection, PaymentDraft,
    ResolvedAccounts, RowOutcome, RowState,
};
