use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::cheques::models::{
    non_empty, BatchSummary, ChequeBatch, ChequeRow, PaymentDirection, PaymentDraft,
    ResolvedAccounts, RowOutcome,
};
use crate::error::{BatchResult, RowError, ValidationError};
use crate::notify::{Notification, Notifier};
use crate::resolver::AccountResolver;
use crate::store::traits::{doctype, DocumentStore};

/// What to do with the rest of the batch when a row's create or finalize
/// fails. Link write-back failures never halt regardless of policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowFailurePolicy {
    /// Record the failure and keep processing the remaining rows
    #[default]
    ContinueOnError,
    /// Stop after the failing row; rows after it stay untouched
    HaltOnError,
}

/// Batch generator configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchPolicy {
    pub on_row_failure: RowFailurePolicy,
}

/// Batch payment generator - turns unlinked cheque rows into finalized
/// payment documents in the external store
///
/// INVARIANTS:
/// - rows already linked to a payment are never processed again
/// - nothing is written before resolution and validation succeed
/// - rows are processed strictly sequentially; a mid-batch failure leaves
///   everything before the failing row finalized and everything after it
///   untouched
pub struct BatchGenerator {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    policy: BatchPolicy,
}

impl BatchGenerator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Generate one payment per unlinked row of the batch
    #[instrument(skip(self, batch), fields(batch_id = %batch.id, direction = %batch.direction))]
    pub async fn generate(&self, batch: &ChequeBatch) -> BatchResult<BatchSummary> {
        preflight(batch)?;

        let rows = batch.rows_for_direction();
        if rows.is_empty() {
            info!("Batch {} has no cheques to process", batch.id);
            self.notifier
                .notify(Notification::NothingToProcess {
                    batch: batch.id.clone(),
                })
                .await;
            return Ok(BatchSummary::default());
        }

        // One resolution per batch; rows with their own override merge it in
        let resolved = match AccountResolver::new(self.store.as_ref()).resolve(batch).await {
            Ok(resolved) => resolved,
            Err(e) if batch.has_row_account_override() => {
                // Row overrides can still carry the batch; the store rejects
                // any row that ends up without an account
                warn!("Batch-level resolution failed, relying on row overrides: {}", e);
                ResolvedAccounts::default()
            }
            Err(e) => {
                error!("No account resolved for batch {}, aborting before any write", batch.id);
                self.notifier
                    .notify(Notification::MissingAccount {
                        batch: batch.id.clone(),
                    })
                    .await;
                return Err(e.into());
            }
        };

        let mut summary = BatchSummary::default();
        for row in rows {
            if row.is_linked() {
                info!("Row {} already linked, skipping", row.id);
                summary.push(RowOutcome::skipped(row));
                continue;
            }

            let accounts = resolved.with_row_override(batch.direction, row.account_override.as_ref());
            let draft = PaymentDraft::assemble(batch, row, &accounts);

            match self.process_row(batch.direction, row, draft).await {
                Ok(payment_id) => {
                    info!("Row {} linked to payment {}", row.id, payment_id);
                    summary.push(RowOutcome::linked(row, payment_id));
                }
                Err(row_error) => {
                    self.notifier
                        .notify(Notification::RowFailed {
                            batch: batch.id.clone(),
                            row: row.id.clone(),
                            detail: (&row_error).into(),
                        })
                        .await;

                    let halt = !matches!(row_error, RowError::LinkWrite { .. })
                        && self.policy.on_row_failure == RowFailurePolicy::HaltOnError;
                    match &row_error {
                        RowError::LinkWrite { payment_id, .. } => warn!(
                            "Row {}: payment {} finalized but link write failed; repair the link, do not regenerate",
                            row.id, payment_id
                        ),
                        _ => error!("Row {} failed: {}", row.id, row_error),
                    }
                    summary.push(RowOutcome::failed(row, &row_error));

                    if halt {
                        warn!("Halting batch {} after row {}", batch.id, row.id);
                        break;
                    }
                }
            }
        }

        info!("Batch {} completed: {} payment(s) created", batch.id, summary.created);
        self.notifier
            .notify(Notification::BatchCompleted {
                batch: batch.id.clone(),
                created: summary.created,
            })
            .await;
        Ok(summary)
    }

    /// Three-step remote sequence for one row: create, finalize, link back
    async fn process_row(
        &self,
        direction: PaymentDirection,
        row: &ChequeRow,
        draft: PaymentDraft,
    ) -> Result<String, RowError> {
        let payment_id = self
            .store
            .create(doctype::PAYMENT_ENTRY, draft.to_field_map())
            .await
            .map_err(RowError::Create)?;

        let finalized = self
            .store
            .finalize(doctype::PAYMENT_ENTRY, &payment_id)
            .await
            .map_err(|source| RowError::Finalize {
                payment_id: payment_id.clone(),
                source,
            })?;

        self.store
            .set_field(
                row_doctype(direction),
                &row.id,
                "payment_entry",
                Value::String(finalized.clone()),
            )
            .await
            .map_err(|source| RowError::LinkWrite {
                payment_id: finalized.clone(),
                source,
            })?;

        Ok(finalized)
    }
}

/// Document kind holding the cheque rows of the given direction
fn row_doctype(direction: PaymentDirection) -> &'static str {
    match direction {
        PaymentDirection::Pay => doctype::CHEQUE_ROW_PAY,
        PaymentDirection::Receive | PaymentDirection::InternalTransfer => {
            doctype::CHEQUE_ROW_RECEIVE
        }
    }
}

/// Header validation, run before any remote call
fn preflight(batch: &ChequeBatch) -> Result<(), ValidationError> {
    batch.validate().map_err(|errors| {
        let wrong_mode = errors
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .any(|error| error.code == "wrong_payment_mode_type");
        if wrong_mode {
            ValidationError::WrongPaymentModeType {
                found: non_empty(&batch.mode_of_payment_type)
                    .unwrap_or_default()
                    .to_string(),
            }
        } else {
            ValidationError::from(errors)
        }
    })
}
