use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::Validate;

use crate::error::{ErrorDetail, RowError};

/// Payment direction - whether the batch moves cash out or in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentDirection {
    Pay,
    Receive,
    #[serde(rename = "Internal Transfer")]
    InternalTransfer,
}

impl fmt::Display for PaymentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::Pay => "Pay",
            PaymentDirection::Receive => "Receive",
            PaymentDirection::InternalTransfer => "Internal Transfer",
        }
    }

    /// Return all supported directions
    pub fn all() -> Vec<PaymentDirection> {
        vec![
            PaymentDirection::Pay,
            PaymentDirection::Receive,
            PaymentDirection::InternalTransfer,
        ]
    }

    /// The party kind this direction normally transacts with
    pub fn default_party_kind(&self) -> Option<PartyKind> {
        match self {
            PaymentDirection::Pay => Some(PartyKind::Supplier),
            PaymentDirection::Receive => Some(PartyKind::Customer),
            PaymentDirection::InternalTransfer => None,
        }
    }
}

/// Counter-party kind on the other side of the payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PartyKind {
    /// Document kind under which the party is stored
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Customer => "Customer",
            PartyKind::Supplier => "Supplier",
        }
    }

    /// Field carrying the party's display name in the external store
    pub fn display_name_field(&self) -> &'static str {
        match self {
            PartyKind::Customer => "customer_name",
            PartyKind::Supplier => "supplier_name",
        }
    }
}

/// One cheque row of a batch
///
/// INVARIANT: a row with `payment_entry` set has already produced a payment
/// and must never be processed again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChequeRow {
    pub id: String,

    #[serde(with = "rust_decimal::serde::float_option", default)]
    pub amount: Option<Decimal>,

    pub reference_no: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub cheque_type: Option<String>,

    pub first_beneficiary: Option<String>,
    pub person_name: Option<String>,
    pub issuer_name: Option<String>,
    pub cheque_image: Option<String>,

    /// Row-level account override; replaces the resolved party-side account
    pub account_override: Option<String>,

    /// Back-reference to the payment generated for this row
    pub payment_entry: Option<String>,
}

impl ChequeRow {
    pub fn is_linked(&self) -> bool {
        non_empty(&self.payment_entry).is_some()
    }

    /// Row amount; an absent amount is zero, never an error
    pub fn effective_amount(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

/// The cheque batch document (source record of the workflow)
///
/// Mutated by its owner until finalized; the workflow only reads it, except
/// for the owned-value helpers below.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChequeBatch {
    pub id: String,
    pub direction: PaymentDirection,
    pub company: Option<String>,

    pub posting_date: Option<NaiveDate>,
    pub transaction_date: Option<NaiveDate>,

    pub party_kind: Option<PartyKind>,
    pub party: Option<String>,
    pub party_name: Option<String>,

    pub cheque_bank: Option<String>,
    pub bank_account: Option<String>,
    pub mode_of_payment: Option<String>,
    #[validate(custom = "validate_cheque_mode")]
    pub mode_of_payment_type: Option<String>,

    // User-entered overrides; trusted completely over derived values
    pub account_paid_to: Option<String>,
    pub account_paid_from: Option<String>,
    pub account_currency: Option<String>,

    // Pre-existing account fields the resolver may scavenge
    pub paid_to: Option<String>,
    pub paid_from: Option<String>,
    pub account: Option<String>,
    pub payable_account: Option<String>,

    #[serde(default)]
    pub receive_rows: Vec<ChequeRow>,
    #[serde(default)]
    pub pay_rows: Vec<ChequeRow>,
}

fn validate_cheque_mode(value: &str) -> Result<(), validator::ValidationError> {
    if value != "Cheque" {
        let mut error = validator::ValidationError::new("wrong_payment_mode_type");
        error.message = Some("payment mode must be of type Cheque".into());
        return Err(error);
    }
    Ok(())
}

impl ChequeBatch {
    /// Row collection matching the batch direction
    ///
    /// Internal transfers carry their cheques on the receive side.
    pub fn rows_for_direction(&self) -> &[ChequeRow] {
        match self.direction {
            PaymentDirection::Pay => &self.pay_rows,
            PaymentDirection::Receive | PaymentDirection::InternalTransfer => &self.receive_rows,
        }
    }

    pub fn rows_for_direction_mut(&mut self) -> &mut Vec<ChequeRow> {
        match self.direction {
            PaymentDirection::Pay => &mut self.pay_rows,
            PaymentDirection::Receive | PaymentDirection::InternalTransfer => {
                &mut self.receive_rows
            }
        }
    }

    /// Posting date with fallback to transaction date, then today
    pub fn effective_posting_date(&self) -> NaiveDate {
        self.posting_date
            .or(self.transaction_date)
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Whether any unlinked row carries its own account override
    pub fn has_row_account_override(&self) -> bool {
        self.rows_for_direction()
            .iter()
            .any(|row| !row.is_linked() && non_empty(&row.account_override).is_some())
    }

    /// Fill the beneficiary name fields of every row from the batch header.
    ///
    /// Paying out, the person named on the cheque is the counter-party and
    /// the issuer is the company; receiving, the roles swap.
    pub fn autofill_beneficiaries(&mut self) {
        let (person, issuer) = match self.direction {
            PaymentDirection::Pay => (self.party_name.clone(), self.company.clone()),
            PaymentDirection::Receive | PaymentDirection::InternalTransfer => {
                (self.company.clone(), self.party_name.clone())
            }
        };
        for row in self.rows_for_direction_mut() {
            row.person_name = person.clone();
            row.issuer_name = issuer.clone();
        }
    }
}

/// Accounts and currency picked by the resolver; transient, never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAccounts {
    pub paid_from: Option<String>,
    pub paid_to: Option<String>,
    pub currency: Option<String>,
}

impl ResolvedAccounts {
    pub fn is_empty(&self) -> bool {
        non_empty(&self.paid_from).is_none() && non_empty(&self.paid_to).is_none()
    }

    /// Substitute a row-level override into the party-side slot.
    ///
    /// Paying out, the party side is `paid_to`; receiving, it is `paid_from`.
    pub fn with_row_override(
        &self,
        direction: PaymentDirection,
        account: Option<&String>,
    ) -> ResolvedAccounts {
        let mut resolved = self.clone();
        if let Some(account) = account.and_then(|a| non_empty_str(a)) {
            match direction {
                PaymentDirection::Pay | PaymentDirection::InternalTransfer => {
                    resolved.paid_to = Some(account.to_string());
                }
                PaymentDirection::Receive => {
                    resolved.paid_from = Some(account.to_string());
                }
            }
        }
        resolved
    }
}

/// Payment document draft assembled per row before creation.
///
/// One canonical field name per concept; absent values stay absent in the
/// serialized field map.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDraft {
    pub payment_type: PaymentDirection,
    pub posting_date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_of_payment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_of_payment_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub party_type: Option<PartyKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheque_bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheque_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,

    #[serde(with = "rust_decimal::serde::float")]
    pub paid_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub received_amount: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_beneficiary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cheque_image: Option<String>,

    /// Back-reference to the originating batch and row
    pub source_batch: String,
    pub source_row: String,
}

impl PaymentDraft {
    /// Assemble a draft from batch header, row, and resolved accounts
    pub fn assemble(batch: &ChequeBatch, row: &ChequeRow, resolved: &ResolvedAccounts) -> Self {
        let amount = row.effective_amount();
        PaymentDraft {
            payment_type: batch.direction,
            posting_date: batch.effective_posting_date(),
            mode_of_payment: batch.mode_of_payment.clone(),
            mode_of_payment_type: batch.mode_of_payment_type.clone(),
            party_type: batch.party_kind,
            party: batch.party.clone(),
            paid_from: resolved.paid_from.clone(),
            paid_to: resolved.paid_to.clone(),
            currency: resolved.currency.clone(),
            cheque_bank: batch.cheque_bank.clone(),
            bank_account: batch.bank_account.clone(),
            cheque_type: row.cheque_type.clone(),
            reference_no: row.reference_no.clone(),
            reference_date: row.reference_date,
            paid_amount: amount,
            received_amount: amount,
            first_beneficiary: row.first_beneficiary.clone(),
            person_name: row.person_name.clone(),
            issuer_name: row.issuer_name.clone(),
            cheque_image: row.cheque_image.clone(),
            source_batch: batch.id.clone(),
            source_row: row.id.clone(),
        }
    }

    /// Serialize into the store's field map
    pub fn to_field_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Terminal state of one row after a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowState {
    /// Create failed; nothing written, safely retryable
    Unprocessed,
    /// Created but finalize failed; orphaned draft needs manual reconciliation
    Created,
    /// Finalized but the row's back-reference write failed; repair link only
    FinalizedUnlinked,
    /// Finalized and linked back to the row
    FinalizedLinked,
    /// Row was already linked before the run and was not touched
    Skipped,
}

/// Per-row outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    pub row: String,
    pub state: RowState,
    pub payment_entry: Option<String>,
    pub error: Option<ErrorDetail>,
}

impl RowOutcome {
    pub fn linked(row: &ChequeRow, payment_id: String) -> Self {
        RowOutcome {
            row: row.id.clone(),
            state: RowState::FinalizedLinked,
            payment_entry: Some(payment_id),
            error: None,
        }
    }

    pub fn skipped(row: &ChequeRow) -> Self {
        RowOutcome {
            row: row.id.clone(),
            state: RowState::Skipped,
            payment_entry: row.payment_entry.clone(),
            error: None,
        }
    }

    pub fn failed(row: &ChequeRow, error: &RowError) -> Self {
        let state = match error {
            RowError::Create(_) => RowState::Unprocessed,
            RowError::Finalize { .. } => RowState::Created,
            RowError::LinkWrite { .. } => RowState::FinalizedUnlinked,
        };
        RowOutcome {
            row: row.id.clone(),
            state,
            payment_entry: error.payment_id().map(str::to_string),
            error: Some(ErrorDetail::from(error)),
        }
    }

    /// Whether a finalized payment exists for this row
    pub fn payment_finalized(&self) -> bool {
        matches!(
            self.state,
            RowState::FinalizedLinked | RowState::FinalizedUnlinked
        )
    }
}

/// Result of one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub outcomes: Vec<RowOutcome>,
    /// Number of payments finalized in this run
    pub created: usize,
}

impl BatchSummary {
    pub fn push(&mut self, outcome: RowOutcome) {
        if outcome.payment_finalized() {
            self.created += 1;
        }
        self.outcomes.push(outcome);
    }
}

/// Empty string and null are the same thing: absent
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().and_then(non_empty_str)
}

pub(crate) fn non_empty_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
