use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::{Account, AccountingSettings, NewAccount};
use crate::documents::{
    DocumentKind, DocumentStatus, Payment, PurchaseInvoice, PurchaseReceipt, PurchaseReturn,
    SalesInvoice, SalesReturn, StockAdjustment, Supplier,
};
use crate::journal::JournalEntry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: DocumentKind, id: Uuid },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Source-document state change committed together with a journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTransition {
    SetStatus {
        kind: DocumentKind,
        id: Uuid,
        status: DocumentStatus,
    },
    /// Stamps the committed entry id onto the payment.
    LinkPayment { payment_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct PostingBatch {
    pub entry: JournalEntry,
    pub transitions: Vec<DocumentTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { entry_id: Uuid },
    /// Another entry already holds `(company_id, reference)`; nothing was written.
    Duplicate { reference: String },
}

/// Half-open `[from, until)` window over entry dates. `from: None` means
/// since the beginning of the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerWindow {
    pub from: Option<DateTime<Utc>>,
    pub until: DateTime<Utc>,
}

impl LedgerWindow {
    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until,
        }
    }

    pub fn before(until: DateTime<Utc>) -> Self {
        Self { from: None, until }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && at < self.until
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn accounts(&self, company_id: Uuid) -> Result<Vec<Account>, StoreError>;

    async fn find_account_by_code(
        &self,
        company_id: Uuid,
        code: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Creates the account, or returns the existing one holding `(company_id, code)`.
    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    async fn settings(&self, company_id: Uuid) -> Result<Option<AccountingSettings>, StoreError>;

    /// Creates the settings row, or returns the one already present for the company.
    async fn insert_settings(
        &self,
        settings: AccountingSettings,
    ) -> Result<AccountingSettings, StoreError>;

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<JournalEntry>, StoreError>;

    async fn find_entry_by_reference(
        &self,
        company_id: Uuid,
        reference: &str,
    ) -> Result<Option<JournalEntry>, StoreError>;

    /// Writes the entry, its lines and every transition atomically.
    async fn commit(&self, batch: PostingBatch) -> Result<CommitOutcome, StoreError>;

    /// Applies a status change that has no ledger effect.
    async fn apply_transition(&self, transition: DocumentTransition) -> Result<(), StoreError>;

    /// Posted entries, with lines, dated inside `window`, oldest first.
    async fn posted_entries(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<JournalEntry>, StoreError>;
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn sales_invoice(&self, id: Uuid) -> Result<Option<SalesInvoice>, StoreError>;
    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn purchase_invoice(&self, id: Uuid) -> Result<Option<PurchaseInvoice>, StoreError>;
    async fn purchase_receipt(&self, id: Uuid) -> Result<Option<PurchaseReceipt>, StoreError>;
    async fn purchase_return(&self, id: Uuid) -> Result<Option<PurchaseReturn>, StoreError>;
    async fn sales_return(&self, id: Uuid) -> Result<Option<SalesReturn>, StoreError>;
    async fn stock_adjustment(&self, id: Uuid) -> Result<Option<StockAdjustment>, StoreError>;
    async fn supplier(&self, id: Uuid) -> Result<Option<Supplier>, StoreError>;

    async fn sales_invoices_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<SalesInvoice>, StoreError>;

    async fn payments_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<Payment>, StoreError>;

    async fn purchase_receipts_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<PurchaseReceipt>, StoreError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
