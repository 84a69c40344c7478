use carebooks_core::OpeningBalanceParty;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Document types that can be posted by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostingKind {
    SalesInvoices,
    Payments,
    PurchaseInvoices,
    PurchaseReceipts,
    PurchaseReturns,
    SalesReturns,
    StockAdjustments,
}

impl PostingKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sales-invoices" => Some(Self::SalesInvoices),
            "payments" => Some(Self::Payments),
            "purchase-invoices" => Some(Self::PurchaseInvoices),
            "purchase-receipts" => Some(Self::PurchaseReceipts),
            "purchase-returns" => Some(Self::PurchaseReturns),
            "sales-returns" => Some(Self::SalesReturns),
            "stock-adjustments" => Some(Self::StockAdjustments),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsureLedgerRequest {
    pub tenant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningBalanceRequest {
    pub entity_id: Uuid,
    pub entity_type: OpeningBalanceParty,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// `?date=YYYY-MM-DD`; today in the reporting offset when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

/// `?start=..&end=..`; defaults to the current month to date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

fn default_user_id() -> String {
    "system".to_string()
}
