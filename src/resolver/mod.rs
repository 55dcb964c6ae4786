use tracing::{info, warn};

use crate::cheques::models::{non_empty, ChequeBatch, PartyKind, PaymentDirection, ResolvedAccounts};
use crate::error::{ResolveError, StoreError};
use crate::store::traits::{doctype, field_string, DocumentStore, FieldMap};

/// Ledger-account field names a payment mode may carry, in priority order
const MODE_ACCOUNT_FIELDS: [&str; 5] = [
    "account",
    "default_account",
    "bank_account",
    "default_bank_account",
    "account_head",
];

/// Ledger-account field names a counter-party may carry, in priority order
const PARTY_ACCOUNT_FIELDS: [&str; 6] = [
    "receivable_account",
    "payable_account",
    "default_bank_account",
    "default_account",
    "default_payment_account",
    "account",
];

/// Account resolver - picks the two ledger accounts and currency for a batch
///
/// Ordered fallback chain; the first non-empty value wins at each slot.
/// User-entered overrides short-circuit everything. A failed lookup against
/// the store degrades to "not found" and the chain continues; resolution
/// fails only when both accounts end up empty.
pub struct AccountResolver<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AccountResolver<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve accounts and currency for the batch; never mutates it
    pub async fn resolve(&self, batch: &ChequeBatch) -> Result<ResolvedAccounts, ResolveError> {
        // 1) Explicit user-entered fields win over everything, verbatim
        let explicit_paid_to = owned(&batch.account_paid_to);
        let explicit_paid_from = owned(&batch.account_paid_from);
        let explicit_currency = owned(&batch.account_currency);
        if explicit_paid_to.is_some() || explicit_paid_from.is_some() || explicit_currency.is_some()
        {
            info!("Using explicit account overrides for batch {}", batch.id);
            return Ok(ResolvedAccounts {
                paid_to: explicit_paid_to,
                paid_from: explicit_paid_from,
                currency: explicit_currency,
            });
        }

        // 2) Bank account carries the ledger account and its currency
        let bank = match non_empty(&batch.bank_account) {
            Some(name) => {
                self.fetch(
                    doctype::BANK_ACCOUNT,
                    name,
                    &["account", "account_name", "company", "currency"],
                )
                .await
            }
            None => None,
        };
        let bank_ledger_account = bank
            .as_ref()
            .and_then(|fields| first_non_empty(fields, &["account", "account_name"]));
        let bank_currency = bank.as_ref().and_then(|fields| field_string(fields, "currency"));

        // 3) Payment mode's default account, scanning its synonym fields
        let mode = match non_empty(&batch.mode_of_payment) {
            Some(name) => {
                self.fetch(
                    doctype::MODE_OF_PAYMENT,
                    name,
                    &[
                        "account",
                        "default_account",
                        "bank_account",
                        "default_bank_account",
                        "account_head",
                        "company",
                        "currency",
                    ],
                )
                .await
            }
            None => None,
        };
        let mode_account = mode
            .as_ref()
            .and_then(|fields| first_non_empty(fields, &MODE_ACCOUNT_FIELDS));
        let mode_currency = mode.as_ref().and_then(|fields| field_string(fields, "currency"));

        // 4) Counter-party defaults; needs both kind and party, no currency here
        let party = match (batch.party_kind, non_empty(&batch.party)) {
            (Some(kind), Some(name)) => {
                self.fetch(kind.as_str(), name, &PARTY_ACCOUNT_FIELDS).await
            }
            _ => None,
        };
        let party_account = party
            .as_ref()
            .and_then(|fields| first_non_empty(fields, &PARTY_ACCOUNT_FIELDS));

        // 5) Company default currency, fetched only when nothing else gave one
        let company_currency = if bank_currency.is_none() && mode_currency.is_none() {
            match non_empty(&batch.company) {
                Some(name) => self
                    .fetch(doctype::COMPANY, name, &["default_currency"])
                    .await
                    .as_ref()
                    .and_then(|fields| field_string(fields, "default_currency")),
                None => None,
            }
        } else {
            None
        };

        let bank_or_mode = bank_ledger_account.or(mode_account);

        let mut resolved = ResolvedAccounts {
            currency: bank_currency.or(mode_currency).or(company_currency),
            ..Default::default()
        };

        // 6) Direction decides which side the bank feeds and which the party
        match batch.direction {
            PaymentDirection::Pay => {
                resolved.paid_from = bank_or_mode
                    .clone()
                    .or_else(|| owned(&batch.paid_from))
                    .or_else(|| owned(&batch.account));
                resolved.paid_to = owned(&batch.payable_account)
                    .or_else(|| party_account.clone())
                    .or_else(|| owned(&batch.paid_to));
            }
            PaymentDirection::Receive => {
                resolved.paid_to = bank_or_mode.clone().or_else(|| owned(&batch.paid_to));
                resolved.paid_from = party_account.clone().or_else(|| owned(&batch.paid_from));
            }
            PaymentDirection::InternalTransfer => {
                resolved.paid_to = bank_or_mode
                    .clone()
                    .or_else(|| owned(&batch.paid_to))
                    .or_else(|| party_account.clone());
                resolved.paid_from = owned(&batch.paid_from).or_else(|| bank_or_mode.clone());
            }
        }

        // 7) Final scavenge over whatever account fields the batch already has
        if resolved.paid_to.is_none() {
            resolved.paid_to = owned(&batch.paid_to)
                .or_else(|| owned(&batch.account))
                .or_else(|| owned(&batch.payable_account));
        }
        if resolved.paid_from.is_none() {
            resolved.paid_from = owned(&batch.paid_from).or_else(|| owned(&batch.account));
        }

        if resolved.is_empty() {
            return Err(ResolveError::NoAccounts {
                batch: batch.id.clone(),
            });
        }

        info!(
            "Resolved accounts for batch {}: paid_from={:?} paid_to={:?} currency={:?}",
            batch.id, resolved.paid_from, resolved.paid_to, resolved.currency
        );
        Ok(resolved)
    }

    /// Read-only lookup; errors degrade to absence so the chain continues
    async fn fetch(&self, doctype: &str, name: &str, fields: &[&str]) -> Option<FieldMap> {
        match self.store.get_fields(doctype, name, fields).await {
            Ok(found) => found,
            Err(error) => {
                warn!("Lookup of {} {} failed, continuing: {}", doctype, name, error);
                None
            }
        }
    }
}

/// Fetch a counter-party's display name from the store
pub async fn lookup_party_name(
    store: &dyn DocumentStore,
    kind: PartyKind,
    party: &str,
) -> Result<Option<String>, StoreError> {
    let field = kind.display_name_field();
    let fields = store.get_fields(kind.as_str(), party, &[field]).await?;
    Ok(fields.as_ref().and_then(|fields| field_string(fields, field)))
}

/// First non-empty string among the given keys, in order
fn first_non_empty(fields: &FieldMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| field_string(fields, key))
}

fn owned(value: &Option<String>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cheques::models::ChequeRow;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn bare_batch(direction: PaymentDirection) -> ChequeBatch {
        ChequeBatch {
            id: "MCE-0001".to_string(),
            direction,
            company: None,
            posting_date: None,
            transaction_date: None,
            party_kind: None,
            party: None,
            party_name: None,
            cheque_bank: None,
            bank_account: None,
            mode_of_payment: None,
            mode_of_payment_type: None,
            account_paid_to: None,
            account_paid_from: None,
            account_currency: None,
            paid_to: None,
            paid_from: None,
            account: None,
            payable_account: None,
            receive_rows: vec![ChequeRow {
                id: "ROW-1".to_string(),
                ..Default::default()
            }],
            pay_rows: Vec::new(),
        }
    }

    fn store_with_bank_account() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(
            doctype::BANK_ACCOUNT,
            "B1",
            [
                ("account".to_string(), json!("Bank-001")),
                ("currency".to_string(), json!("USD")),
            ]
            .into_iter()
            .collect(),
        );
        store
    }

    #[tokio::test]
    async fn test_explicit_override_wins_over_bank_account() {
        let store = store_with_bank_account();
        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.bank_account = Some("B1".to_string());
        batch.account_paid_to = Some("Override-001".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Override-001"));
        // Short-circuit: the bank account's currency is not consulted
        assert_eq!(resolved.currency, None);
    }

    #[tokio::test]
    async fn test_bank_account_wins_over_mode_and_party() {
        let store = store_with_bank_account();
        store.insert(
            doctype::MODE_OF_PAYMENT,
            "Cheque Mode",
            [("default_account".to_string(), json!("Mode-001"))]
                .into_iter()
                .collect(),
        );
        store.insert(
            "Customer",
            "CUST-001",
            [("receivable_account".to_string(), json!("Recv-001"))]
                .into_iter()
                .collect(),
        );

        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.bank_account = Some("B1".to_string());
        batch.mode_of_payment = Some("Cheque Mode".to_string());
        batch.party_kind = Some(PartyKind::Customer);
        batch.party = Some("CUST-001".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Bank-001"));
        assert_eq!(resolved.paid_from.as_deref(), Some("Recv-001"));
        assert_eq!(resolved.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_mode_account_synonym_priority() {
        let store = MemoryStore::new();
        store.insert(
            doctype::MODE_OF_PAYMENT,
            "Cheque Mode",
            [
                ("default_account".to_string(), json!("Mode-Default")),
                ("account_head".to_string(), json!("Mode-Head")),
            ]
            .into_iter()
            .collect(),
        );

        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.mode_of_payment = Some("Cheque Mode".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        // "default_account" outranks "account_head"
        assert_eq!(resolved.paid_to.as_deref(), Some("Mode-Default"));
    }

    #[tokio::test]
    async fn test_direction_swaps_account_sides() {
        let store = store_with_bank_account();
        store.insert(
            "Supplier",
            "SUPP-001",
            [("payable_account".to_string(), json!("Payable-001"))]
                .into_iter()
                .collect(),
        );

        let mut batch = bare_batch(PaymentDirection::Pay);
        batch.bank_account = Some("B1".to_string());
        batch.party_kind = Some(PartyKind::Supplier);
        batch.party = Some("SUPP-001".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_from.as_deref(), Some("Bank-001"));
        assert_eq!(resolved.paid_to.as_deref(), Some("Payable-001"));

        batch.direction = PaymentDirection::Receive;
        batch.party_kind = Some(PartyKind::Customer);
        batch.party = Some("CUST-001".to_string());
        store.insert(
            "Customer",
            "CUST-001",
            [("receivable_account".to_string(), json!("Recv-001"))]
                .into_iter()
                .collect(),
        );

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Bank-001"));
        assert_eq!(resolved.paid_from.as_deref(), Some("Recv-001"));
    }

    #[tokio::test]
    async fn test_company_currency_backfills_only_when_missing() {
        let store = MemoryStore::new();
        store.insert(
            doctype::COMPANY,
            "Acme Trading",
            [("default_currency".to_string(), json!("EGP"))]
                .into_iter()
                .collect(),
        );
        store.insert(
            doctype::MODE_OF_PAYMENT,
            "Cheque Mode",
            [("account".to_string(), json!("Mode-001"))]
                .into_iter()
                .collect(),
        );

        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.company = Some("Acme Trading".to_string());
        batch.mode_of_payment = Some("Cheque Mode".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.currency.as_deref(), Some("EGP"));

        // A bank-account currency suppresses the company fallback
        let store = store_with_bank_account();
        store.insert(
            doctype::COMPANY,
            "Acme Trading",
            [("default_currency".to_string(), json!("EGP"))]
                .into_iter()
                .collect(),
        );
        batch.bank_account = Some("B1".to_string());
        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_next_source() {
        let store = store_with_bank_account();
        store.fail_lookups_for(doctype::BANK_ACCOUNT);
        store.insert(
            doctype::MODE_OF_PAYMENT,
            "Cheque Mode",
            [("account".to_string(), json!("Mode-001"))]
                .into_iter()
                .collect(),
        );

        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.bank_account = Some("B1".to_string());
        batch.mode_of_payment = Some("Cheque Mode".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Mode-001"));
    }

    #[tokio::test]
    async fn test_internal_transfer_prefers_bank_for_destination() {
        let store = store_with_bank_account();
        let mut batch = bare_batch(PaymentDirection::InternalTransfer);
        batch.bank_account = Some("B1".to_string());
        batch.paid_from = Some("Cash-001".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Bank-001"));
        assert_eq!(resolved.paid_from.as_deref(), Some("Cash-001"));

        // Without a pre-existing source field the bank account feeds both sides
        batch.paid_from = None;
        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_from.as_deref(), Some("Bank-001"));
    }

    #[tokio::test]
    async fn test_final_scavenge_uses_legacy_fields() {
        let store = MemoryStore::new();
        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.account = Some("Legacy-001".to_string());

        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Legacy-001"));
        assert_eq!(resolved.paid_from.as_deref(), Some("Legacy-001"));
    }

    #[tokio::test]
    async fn test_nothing_resolves_is_an_error() {
        let store = MemoryStore::new();
        let batch = bare_batch(PaymentDirection::Receive);

        let result = AccountResolver::new(&store).resolve(&batch).await;
        assert!(matches!(result, Err(ResolveError::NoAccounts { .. })));
    }

    #[tokio::test]
    async fn test_empty_strings_are_absent() {
        let store = MemoryStore::new();
        let mut batch = bare_batch(PaymentDirection::Receive);
        batch.account_paid_to = Some("   ".to_string());
        batch.paid_to = Some("Existing-001".to_string());

        // Blank override does not short-circuit; the scavenge still runs
        let resolved = AccountResolver::new(&store).resolve(&batch).await.unwrap();
        assert_eq!(resolved.paid_to.as_deref(), Some("Existing-001"));
    }

    #[tokio::test]
    async fn test_lookup_party_name() {
        let store = MemoryStore::new();
        store.insert(
            "Customer",
            "CUST-001",
            [("customer_name".to_string(), json!("Nile Imports"))]
                .into_iter()
                .collect(),
        );

        let name = lookup_party_name(&store, PartyKind::Customer, "CUST-001")
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("Nile Imports"));

        let missing = lookup_party_name(&store, PartyKind::Supplier, "SUPP-404")
            .await
            .unwrap();
        assert_eq!(missing, None);
    }
}
