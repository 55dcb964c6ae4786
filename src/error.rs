use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the entire workflow
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Account resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Document-store errors, one variant per remote operation
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Lookup failed for {doctype} {name}: {message}")]
    Lookup {
        doctype: String,
        name: String,
        message: String,
    },

    #[error("Store rejected creation of {doctype}: {message}")]
    Create { doctype: String, message: String },

    #[error("Finalize failed for {doctype} {name}: {message}")]
    Finalize {
        doctype: String,
        name: String,
        message: String,
    },

    #[error("Field write failed for {doctype} {name}.{field}: {message}")]
    FieldWrite {
        doctype: String,
        name: String,
        field: String,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Response decode error: {0}")]
    Decode(String),
}

/// Account resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No usable source or destination account found for batch {batch}")]
    NoAccounts { batch: String },
}

/// Pre-flight validation errors, detected before any remote call
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Selected payment mode is not a cheque mode: {found}")]
    WrongPaymentModeType { found: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Per-row errors during the create/finalize/link sequence
///
/// The three variants need different remediation:
/// - Create: nothing was written for the row, a later run may retry it
/// - Finalize: an unfinalized payment document exists and must be
///   reconciled manually
/// - LinkWrite: the payment exists and is finalized, only the row's
///   back-reference is missing; repair the link, never re-create
#[derive(Error, Debug)]
pub enum RowError {
    #[error("Payment creation failed: {0}")]
    Create(#[source] StoreError),

    #[error("Payment {payment_id} created but finalize failed: {source}")]
    Finalize {
        payment_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Payment {payment_id} finalized but link write-back failed: {source}")]
    LinkWrite {
        payment_id: String,
        #[source]
        source: StoreError,
    },
}

impl RowError {
    /// Whether re-running the batch may safely retry this row
    pub fn is_retryable(&self) -> bool {
        matches!(self, RowError::Create(_))
    }

    /// Id of the payment document left behind in the store, if any
    pub fn payment_id(&self) -> Option<&str> {
        match self {
            RowError::Create(_) => None,
            RowError::Finalize { payment_id, .. } | RowError::LinkWrite { payment_id, .. } => {
                Some(payment_id)
            }
        }
    }
}

/// Serializable error detail attached to row outcomes and notifications
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

impl From<&RowError> for ErrorDetail {
    fn from(error: &RowError) -> Self {
        let code = match error {
            RowError::Create(_) => "CREATE_FAILED",
            RowError::Finalize { .. } => "FINALIZE_FAILED",
            RowError::LinkWrite { .. } => "LINK_WRITE_FAILED",
        };
        ErrorDetail {
            code,
            message: error.to_string(),
        }
    }
}

impl From<anyhow::Error> for BatchError {
    fn from(error: anyhow::Error) -> Self {
        BatchError::Internal(format!("Error converting: {:?}", error))
    }
}

impl From<config::ConfigError> for BatchError {
    fn from(error: config::ConfigError) -> Self {
        BatchError::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let joined = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| e.message.as_ref().map(|s| s.to_string()).unwrap_or_default())
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");
        ValidationError::InvalidInput(joined)
    }
}

/// Result type alias for the workflow
pub type BatchResult<T> = Result<T, BatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn create_error() -> StoreError {
        StoreError::Create {
            doctype: "Payment Entry".to_string(),
            message: "rejected".to_string(),
        }
    }

    #[test]
    fn test_only_create_failures_are_retryable() {
        assert!(RowError::Create(create_error()).is_retryable());
        assert!(!RowError::Finalize {
            payment_id: "PE-0001".to_string(),
            source: create_error(),
        }
        .is_retryable());
        assert!(!RowError::LinkWrite {
            payment_id: "PE-0001".to_string(),
            source: create_error(),
        }
        .is_retryable());
    }

    #[test]
    fn test_payment_id_of_partial_failures() {
        assert_eq!(RowError::Create(create_error()).payment_id(), None);
        let finalize = RowError::Finalize {
            payment_id: "PE-0001".to_string(),
            source: create_error(),
        };
        assert_eq!(finalize.payment_id(), Some("PE-0001"));
    }

    #[test]
    fn test_error_detail_codes() {
        let detail = ErrorDetail::from(&RowError::Create(create_error()));
        assert_eq!(detail.code, "CREATE_FAILED");
        let detail = ErrorDetail::from(&RowError::LinkWrite {
            payment_id: "PE-0001".to_string(),
            source: create_error(),
        });
        assert_eq!(detail.code, "LINK_WRITE_FAILED");
        assert!(detail.message.contains("PE-0001"));
    }
}
