use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use carebooks_core::{
    Account, AccountingSettings, CommitOutcome, DocumentKind, DocumentSource, DocumentStatus,
    DocumentTransition, JournalEntry, LedgerStore, LedgerWindow, NewAccount, Payment,
    PostingBatch, PurchaseInvoice, PurchaseReceipt, PurchaseReturn, SalesInvoice, SalesReturn,
    StockAdjustment, StoreError, Supplier,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Books {
    accounts: Vec<Account>,
    settings: HashMap<Uuid, AccountingSettings>,
    entries: Vec<JournalEntry>,
    references: HashMap<(Uuid, String), Uuid>,
    sales_invoices: HashMap<Uuid, SalesInvoice>,
    payments: HashMap<Uuid, Payment>,
    purchase_invoices: HashMap<Uuid, PurchaseInvoice>,
    purchase_receipts: HashMap<Uuid, PurchaseReceipt>,
    purchase_returns: HashMap<Uuid, PurchaseReturn>,
    sales_returns: HashMap<Uuid, SalesReturn>,
    stock_adjustments: HashMap<Uuid, StockAdjustment>,
    suppliers: HashMap<Uuid, Supplier>,
    failing_account_codes: HashSet<String>,
}

impl Books {
    fn has_document(&self, kind: DocumentKind, id: Uuid) -> bool {
        match kind {
            DocumentKind::SalesInvoice => self.sales_invoices.contains_key(&id),
            DocumentKind::Payment => self.payments.contains_key(&id),
            DocumentKind::PurchaseInvoice => self.purchase_invoices.contains_key(&id),
            DocumentKind::PurchaseReceipt => self.purchase_receipts.contains_key(&id),
            DocumentKind::PurchaseReturn => self.purchase_returns.contains_key(&id),
            DocumentKind::SalesReturn => self.sales_returns.contains_key(&id),
            DocumentKind::StockAdjustment => self.stock_adjustments.contains_key(&id),
            DocumentKind::Supplier => self.suppliers.contains_key(&id),
            DocumentKind::JournalEntry => self.entries.iter().any(|entry| entry.id == id),
        }
    }

    fn check_transition(&self, transition: &DocumentTransition) -> Result<(), StoreError> {
        let (kind, id) = match *transition {
            DocumentTransition::SetStatus { kind, id, .. } => (kind, id),
            DocumentTransition::LinkPayment { payment_id } => (DocumentKind::Payment, payment_id),
        };
        if self.has_document(kind, id) {
            Ok(())
        } else {
            Err(StoreError::NotFound { kind, id })
        }
    }

    /// Callers run `check_transition` first; unknown targets are ignored here.
    fn apply(&mut self, transition: &DocumentTransition, entry_id: Option<Uuid>) {
        match *transition {
            DocumentTransition::SetStatus { kind, id, status } => {
                self.set_status(kind, id, status)
            }
            DocumentTransition::LinkPayment { payment_id } => {
                if let Some(payment) = self.payments.get_mut(&payment_id) {
                    payment.journal_entry_id = entry_id;
                }
            }
        }
    }

    fn set_status(&mut self, kind: DocumentKind, id: Uuid, status: DocumentStatus) {
        let slot = match kind {
            DocumentKind::SalesInvoice => self.sales_invoices.get_mut(&id).map(|d| &mut d.status),
            DocumentKind::PurchaseInvoice => {
                self.purchase_invoices.get_mut(&id).map(|d| &mut d.status)
            }
            DocumentKind::PurchaseReceipt => {
                self.purchase_receipts.get_mut(&id).map(|d| &mut d.status)
            }
            DocumentKind::PurchaseReturn => {
                self.purchase_returns.get_mut(&id).map(|d| &mut d.status)
            }
            DocumentKind::SalesReturn => self.sales_returns.get_mut(&id).map(|d| &mut d.status),
            DocumentKind::StockAdjustment => {
                self.stock_adjustments.get_mut(&id).map(|d| &mut d.status)
            }
            DocumentKind::Payment | DocumentKind::Supplier | DocumentKind::JournalEntry => None,
        };
        if let Some(slot) = slot {
            *slot = status;
        }
    }

    fn invoice_with_payments(&self, invoice: &SalesInvoice) -> SalesInvoice {
        let mut invoice = invoice.clone();
        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|payment| payment.invoice_id == Some(invoice.id))
            .cloned()
            .collect();
        payments.sort_by_key(|payment| payment.paid_at);
        invoice.payments = payments;
        invoice
    }
}

/// Process-local books guarded by a single lock, so every commit is
/// observed whole or not at all.
#[derive(Default)]
pub struct InMemoryAccountingStore {
    books: RwLock<Books>,
}

impl InMemoryAccountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the invoice; any payments it carries are stored as payment records.
    pub async fn put_sales_invoice(&self, mut invoice: SalesInvoice) {
        let mut books = self.books.write().await;
        for mut payment in std::mem::take(&mut invoice.payments) {
            payment.invoice_id = Some(invoice.id);
            books.payments.insert(payment.id, payment);
        }
        books.sales_invoices.insert(invoice.id, invoice);
    }

    pub async fn put_payment(&self, payment: Payment) {
        self.books.write().await.payments.insert(payment.id, payment);
    }

    pub async fn put_purchase_invoice(&self, invoice: PurchaseInvoice) {
        self.books
            .write()
            .await
            .purchase_invoices
            .insert(invoice.id, invoice);
    }

    pub async fn put_purchase_receipt(&self, receipt: PurchaseReceipt) {
        self.books
            .write()
            .await
            .purchase_receipts
            .insert(receipt.id, receipt);
    }

    pub async fn put_purchase_return(&self, purchase_return: PurchaseReturn) {
        self.books
            .write()
            .await
            .purchase_returns
            .insert(purchase_return.id, purchase_return);
    }

    pub async fn put_sales_return(&self, sales_return: SalesReturn) {
        self.books
            .write()
            .await
            .sales_returns
            .insert(sales_return.id, sales_return);
    }

    pub async fn put_stock_adjustment(&self, adjustment: StockAdjustment) {
        self.books
            .write()
            .await
            .stock_adjustments
            .insert(adjustment.id, adjustment);
    }

    pub async fn put_supplier(&self, supplier: Supplier) {
        self.books.write().await.suppliers.insert(supplier.id, supplier);
    }

    /// Makes every later insert of an account with `code` fail.
    pub async fn fail_account_inserts_for(&self, code: &str) {
        self.books
            .write()
            .await
            .failing_account_codes
            .insert(code.to_string());
    }

    pub async fn entry_count(&self) -> usize {
        self.books.read().await.entries.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryAccountingStore {
    async fn accounts(&self, company_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .accounts
            .iter()
            .filter(|account| account.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn find_account_by_code(
        &self,
        company_id: Uuid,
        code: &str,
    ) -> Result<Option<Account>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .accounts
            .iter()
            .find(|account| account.company_id == company_id && account.code == code)
            .cloned())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut books = self.books.write().await;
        if books.failing_account_codes.contains(&account.code) {
            return Err(StoreError::Backend(format!(
                "account {} could not be written",
                account.code
            )));
        }

        if let Some(existing) = books
            .accounts
            .iter()
            .find(|existing| existing.company_id == account.company_id && existing.code == account.code)
        {
            return Ok(existing.clone());
        }

        let created = Account {
            id: Uuid::new_v4(),
            company_id: account.company_id,
            code: account.code,
            name: account.name,
            account_type: account.account_type,
            is_active: true,
        };
        books.accounts.push(created.clone());
        Ok(created)
    }

    async fn settings(&self, company_id: Uuid) -> Result<Option<AccountingSettings>, StoreError> {
        Ok(self.books.read().await.settings.get(&company_id).cloned())
    }

    async fn insert_settings(
        &self,
        settings: AccountingSettings,
    ) -> Result<AccountingSettings, StoreError> {
        let mut books = self.books.write().await;
        Ok(books
            .settings
            .entry(settings.company_id)
            .or_insert(settings)
            .clone())
    }

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        let books = self.books.read().await;
        Ok(books.entries.iter().find(|entry| entry.id == entry_id).cloned())
    }

    async fn find_entry_by_reference(
        &self,
        company_id: Uuid,
        reference: &str,
    ) -> Result<Option<JournalEntry>, StoreError> {
        let books = self.books.read().await;
        let Some(entry_id) = books.references.get(&(company_id, reference.to_string())) else {
            return Ok(None);
        };
        Ok(books.entries.iter().find(|entry| entry.id == *entry_id).cloned())
    }

    async fn commit(&self, batch: PostingBatch) -> Result<CommitOutcome, StoreError> {
        let mut books = self.books.write().await;
        let key = (batch.entry.company_id, batch.entry.reference.clone());
        if books.references.contains_key(&key) {
            return Ok(CommitOutcome::Duplicate {
                reference: batch.entry.reference,
            });
        }

        for transition in &batch.transitions {
            books.check_transition(transition)?;
        }

        let entry_id = batch.entry.id;
        for transition in &batch.transitions {
            books.apply(transition, Some(entry_id));
        }
        books.references.insert(key, entry_id);
        books.entries.push(batch.entry);

        Ok(CommitOutcome::Committed { entry_id })
    }

    async fn apply_transition(&self, transition: DocumentTransition) -> Result<(), StoreError> {
        if let DocumentTransition::LinkPayment { payment_id } = transition {
            return Err(StoreError::Conflict(format!(
                "payment {payment_id} can only be linked by a journal commit"
            )));
        }

        let mut books = self.books.write().await;
        books.check_transition(&transition)?;
        books.apply(&transition, None);
        Ok(())
    }

    async fn posted_entries(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<JournalEntry>, StoreError> {
        let books = self.books.read().await;
        let mut entries: Vec<JournalEntry> = books
            .entries
            .iter()
            .filter(|entry| {
                entry.company_id == company_id && entry.posted && window.contains(entry.date)
            })
            .cloned()
            .collect();
        entries.sort_by_key(|entry| entry.date);
        Ok(entries)
    }
}

#[async_trait]
impl DocumentSource for InMemoryAccountingStore {
    async fn sales_invoice(&self, id: Uuid) -> Result<Option<SalesInvoice>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .sales_invoices
            .get(&id)
            .map(|invoice| books.invoice_with_payments(invoice)))
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.books.read().await.payments.get(&id).cloned())
    }

    async fn purchase_invoice(&self, id: Uuid) -> Result<Option<PurchaseInvoice>, StoreError> {
        Ok(self.books.read().await.purchase_invoices.get(&id).cloned())
    }

    async fn purchase_receipt(&self, id: Uuid) -> Result<Option<PurchaseReceipt>, StoreError> {
        Ok(self.books.read().await.purchase_receipts.get(&id).cloned())
    }

    async fn purchase_return(&self, id: Uuid) -> Result<Option<PurchaseReturn>, StoreError> {
        Ok(self.books.read().await.purchase_returns.get(&id).cloned())
    }

    async fn sales_return(&self, id: Uuid) -> Result<Option<SalesReturn>, StoreError> {
        Ok(self.books.read().await.sales_returns.get(&id).cloned())
    }

    async fn stock_adjustment(&self, id: Uuid) -> Result<Option<StockAdjustment>, StoreError> {
        Ok(self.books.read().await.stock_adjustments.get(&id).cloned())
    }

    async fn supplier(&self, id: Uuid) -> Result<Option<Supplier>, StoreError> {
        Ok(self.books.read().await.suppliers.get(&id).cloned())
    }

    async fn sales_invoices_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<SalesInvoice>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .sales_invoices
            .values()
            .filter(|invoice| invoice.company_id == company_id && window.contains(invoice.issued_at))
            .map(|invoice| books.invoice_with_payments(invoice))
            .collect())
    }

    async fn payments_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<Payment>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .payments
            .values()
            .filter(|payment| payment.company_id == company_id && window.contains(payment.paid_at))
            .cloned()
            .collect())
    }

    async fn purchase_receipts_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<PurchaseReceipt>, StoreError> {
        let books = self.books.read().await;
        Ok(books
            .purchase_receipts
            .values()
            .filter(|receipt| receipt.company_id == company_id && window.contains(receipt.received_at))
            .cloned()
            .collect())
    }
}
