use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::journal::to_ledger_scale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SalesInvoice,
    Payment,
    PurchaseInvoice,
    PurchaseReceipt,
    PurchaseReturn,
    SalesReturn,
    StockAdjustment,
    Supplier,
    JournalEntry,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesInvoice => "sales_invoice",
            Self::Payment => "payment",
            Self::PurchaseInvoice => "purchase_invoice",
            Self::PurchaseReceipt => "purchase_receipt",
            Self::PurchaseReturn => "purchase_return",
            Self::SalesReturn => "sales_return",
            Self::StockAdjustment => "stock_adjustment",
            Self::Supplier => "supplier",
            Self::JournalEntry => "journal_entry",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Draft,
    Posted,
    Received,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Received => "RECEIVED",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "POSTED" => Self::Posted,
            "RECEIVED" => Self::Received,
            _ => Self::Draft,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesInvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Line amount after line discounts, before tax.
    pub net_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub patient_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub currency_id: Option<String>,
    pub lines: Vec<SalesInvoiceLine>,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub status: DocumentStatus,
    /// Payments recorded against the invoice, in the order they arrived.
    #[serde(default)]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::BankTransfer => "bank_transfer",
            Self::Cheque => "cheque",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" => Self::Cash,
            "card" => Self::Card,
            "bank_transfer" | "bank" | "transfer" => Self::BankTransfer,
            "cheque" | "check" => Self::Cheque,
            _ => Self::Other,
        }
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, Self::Cash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    Inbound,
    Outbound,
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// `None` for anything other than inbound/outbound, so a mistyped row is
    /// never booked as money coming in.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Some(Self::Inbound),
            "outbound" | "out" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Split of a direct payment onto an expense account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub party_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub direction: PaymentDirection,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub allocations: Vec<PaymentAllocation>,
    /// Set once the payment has been posted to the ledger.
    pub journal_entry_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub supplier_id: Uuid,
    pub invoice_date: DateTime<Utc>,
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub status: DocumentStatus,
}

/// Per-line charges of a goods receipt in one canonical shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLineCharges {
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub scheme_discount: Decimal,
}

const TAX_KEYS: [&str; 2] = ["tax_amount", "taxAmount"];
const DISCOUNT_KEYS: [&str; 4] = [
    "discount_amt",
    "discountAmt",
    "discount_amount",
    "discountAmount",
];
const SCHEME_DISCOUNT_KEYS: [&str; 4] = [
    "scheme_discount",
    "schemeDiscount",
    "scheme_discount_amount",
    "schemeDiscountAmount",
];

impl ReceiptLineCharges {
    /// Normalizes receipt line metadata written under either the snake_case
    /// or the camelCase field names. The first key present wins; numbers
    /// may arrive as JSON numbers or strings.
    pub fn from_metadata(metadata: &Value) -> Self {
        Self {
            tax_amount: first_decimal(metadata, &TAX_KEYS),
            discount_amount: first_decimal(metadata, &DISCOUNT_KEYS),
            scheme_discount: first_decimal(metadata, &SCHEME_DISCOUNT_KEYS),
        }
    }
}

fn first_decimal(metadata: &Value, keys: &[&str]) -> Decimal {
    keys.iter()
        .filter_map(|key| metadata.get(*key))
        .find(|value| !value.is_null())
        .map(parse_decimal)
        .unwrap_or(Decimal::ZERO)
}

fn parse_decimal(value: &Value) -> Decimal {
    if let Some(text) = value.as_str() {
        text.trim().parse().unwrap_or(Decimal::ZERO)
    } else if let Some(number) = value.as_i64() {
        Decimal::from(number)
    } else if let Some(number) = value.as_f64() {
        Decimal::from_f64_retain(number)
            .map(|d| d.round_dp(6))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub charges: ReceiptLineCharges,
}

impl ReceiptLine {
    /// `max(0, qty * price - (discount + scheme discount))`
    pub fn taxable(&self) -> Decimal {
        let gross = self.quantity * self.unit_price;
        let discounts = self.charges.discount_amount + self.charges.scheme_discount;
        (gross - discounts).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptTotals {
    pub taxable: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub supplier_id: Uuid,
    pub received_at: DateTime<Utc>,
    pub lines: Vec<ReceiptLine>,
    pub status: DocumentStatus,
}

impl PurchaseReceipt {
    /// Totals at ledger scale, each line rounded before summing.
    pub fn totals(&self) -> ReceiptTotals {
        let (taxable, tax) = self
            .lines
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(taxable, tax), line| {
                (
                    taxable + to_ledger_scale(line.taxable()),
                    tax + to_ledger_scale(line.charges.tax_amount),
                )
            });
        ReceiptTotals {
            taxable,
            tax,
            total: taxable + tax,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReturn {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub supplier_id: Uuid,
    pub return_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReturn {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub patient_id: Option<Uuid>,
    pub return_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentLine {
    pub item_name: String,
    pub diff_qty: Decimal,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub adjusted_at: DateTime<Utc>,
    pub lines: Vec<StockAdjustmentLine>,
    pub status: DocumentStatus,
}

impl StockAdjustment {
    /// Signed inventory value change across all lines.
    pub fn net_value(&self) -> Decimal {
        self.lines
            .iter()
            .map(|line| line.diff_qty * line.unit_cost)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningBalanceParty {
    Supplier,
    Customer,
}

/// Opening balance references are `OB-{first five letters of the name}-{year}`.
pub fn opening_balance_reference(entity_name: &str, date: NaiveDate) -> String {
    use chrono::Datelike;

    let prefix: String = entity_name
        .chars()
        .filter(|c| !c.is_whitespace())
        .take(5)
        .collect::<String>()
        .to_uppercase();
    format!("OB-{}-{}", prefix, date.year())
}

pub fn payment_reference(payment_id: Uuid) -> String {
    format!("PMT-{payment_id}")
}
