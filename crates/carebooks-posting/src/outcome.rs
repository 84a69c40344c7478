use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PostingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostingOutcome {
    Posted { entry_id: Uuid, reference: String },
    /// Idempotent no-op: the reference is already in the ledger.
    AlreadyPosted { reference: String },
    NothingToPost { reason: String },
}

impl PostingOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, Self::Posted { .. })
    }

    pub fn entry_id(&self) -> Option<Uuid> {
        match self {
            Self::Posted { entry_id, .. } => Some(*entry_id),
            _ => None,
        }
    }
}

/// Result of posting a sales invoice: the accrual plus one outcome per payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesInvoicePosting {
    pub accrual: PostingOutcome,
    pub payments: Vec<PostingOutcome>,
}

impl SalesInvoicePosting {
    pub fn accrual_posted(&self) -> bool {
        self.accrual.is_posted()
    }

    pub fn payments_posted(&self) -> usize {
        self.payments.iter().filter(|p| p.is_posted()).count()
    }
}

pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for PostingOutcome {
    fn summary(&self) -> String {
        match self {
            Self::Posted { reference, .. } => format!("posted journal {reference}"),
            Self::AlreadyPosted { reference } => format!("journal {reference} already posted"),
            Self::NothingToPost { reason } => reason.clone(),
        }
    }
}

impl Summary for SalesInvoicePosting {
    fn summary(&self) -> String {
        let accrual = if self.accrual_posted() {
            "accrual posted"
        } else {
            "accrual unchanged"
        };
        format!("{accrual}, {} payment(s) posted", self.payments_posted())
    }
}

/// `{success, message, error}` shape handed across the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Summary> From<Result<T, PostingError>> for PostingResponse<T> {
    fn from(result: Result<T, PostingError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                message: data.summary(),
                error: None,
                error_kind: None,
                data: Some(data),
            },
            Err(err) => Self {
                success: false,
                message: "posting failed".to_string(),
                error: Some(err.to_string()),
                error_kind: Some(err.kind().to_string()),
                data: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use carebooks_core::AccountRole;

    use super::*;

    #[test]
    fn failures_keep_their_kind_in_the_response() {
        let response: PostingResponse<PostingOutcome> =
            Err(PostingError::ConfigurationMissing(AccountRole::InputTax)).into();

        assert!(!response.success);
        assert_eq!(response.error_kind.as_deref(), Some("configuration_missing"));
        assert!(response.error.unwrap().contains("input tax"));
    }

    #[test]
    fn already_posted_is_a_success() {
        let response: PostingResponse<PostingOutcome> = Ok(PostingOutcome::AlreadyPosted {
            reference: "INV-7".to_string(),
        })
        .into();

        assert!(response.success);
        assert_eq!(response.message, "journal INV-7 already posted");
    }
}
