//! Postgres implementation of the ledger and document stores.
//!
//! A commit writes the journal header, its lines and every document
//! transition inside one transaction. The header insert is guarded by the
//! `(company_id, reference)` unique constraint; losing that race rolls the
//! transaction back and reports a duplicate instead of failing.

use std::collections::HashMap;

use async_trait::async_trait;
use carebooks_core::{
    Account, AccountType, AccountingSettings, CommitOutcome, DocumentKind, DocumentSource,
    DocumentStatus, DocumentTransition, JournalEntry, JournalEntryLine, LedgerStore, LedgerWindow,
    NewAccount, Payment, PaymentAllocation, PaymentDirection, PaymentMethod, PostingBatch,
    PurchaseInvoice, PurchaseReceipt, PurchaseReturn, ReceiptLine, ReceiptLineCharges,
    SalesInvoice, SalesInvoiceLine, SalesReturn, SourceLink, StockAdjustment,
    StockAdjustmentLine, StoreError, Supplier,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::warn;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const ACCOUNT_COLUMNS: &str = "id, company_id, code, name, account_type, is_active";

const SETTINGS_COLUMNS: &str = "company_id, tenant_id, ar_account_id, ap_account_id, \
     sales_account_id, purchase_account_id, output_tax_account_id, input_tax_account_id, \
     inventory_asset_account_id, currency_id, fiscal_year_start, fiscal_year_end";

const ENTRY_COLUMNS: &str = "id, company_id, tenant_id, entry_date, posted, posted_at, \
     created_by, currency_id, amount_in_company_currency, reference, source_kind, source_id, \
     reverses_entry_id";

const PAYMENT_COLUMNS: &str = "id, company_id, tenant_id, invoice_id, party_id, amount, method, \
     direction, paid_at, journal_entry_id";

#[derive(Clone)]
pub struct PgAccountingStore {
    pool: PgPool,
}

impl PgAccountingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn with_lines(&self, rows: Vec<PgRow>) -> Result<Vec<JournalEntry>, StoreError> {
        let mut entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if entries.is_empty() {
            return Ok(entries);
        }

        let ids: Vec<Uuid> = entries.iter().map(|entry| entry.id).collect();
        let line_rows = sqlx::query(
            r#"
            SELECT id, journal_entry_id, company_id, account_id, debit, credit, description, partner_id
            FROM journal_entry_lines
            WHERE journal_entry_id = ANY($1)
            ORDER BY journal_entry_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut lines: HashMap<Uuid, Vec<JournalEntryLine>> = HashMap::new();
        for row in &line_rows {
            let line = line_from_row(row)?;
            lines.entry(line.journal_entry_id).or_default().push(line);
        }
        for entry in &mut entries {
            entry.lines = lines.remove(&entry.id).unwrap_or_default();
        }
        Ok(entries)
    }

    async fn allocations_for(
        &self,
        payment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<PaymentAllocation>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payment_id, account_id, amount, description
            FROM payment_allocations
            WHERE payment_id = ANY($1)
            ORDER BY payment_id, line_no
            "#,
        )
        .bind(payment_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut allocations: HashMap<Uuid, Vec<PaymentAllocation>> = HashMap::new();
        for row in &rows {
            let payment_id: Uuid = row.try_get("payment_id").map_err(backend)?;
            allocations
                .entry(payment_id)
                .or_default()
                .push(PaymentAllocation {
                    account_id: row.try_get("account_id").map_err(backend)?,
                    amount: row.try_get("amount").map_err(backend)?,
                    description: row.try_get("description").map_err(backend)?,
                });
        }
        Ok(allocations)
    }

    async fn payments_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Payment>, StoreError> {
        let mut payments = rows
            .iter()
            .map(payment_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if payments.is_empty() {
            return Ok(payments);
        }

        let ids: Vec<Uuid> = payments.iter().map(|payment| payment.id).collect();
        let mut allocations = self.allocations_for(&ids).await?;
        for payment in &mut payments {
            payment.allocations = allocations.remove(&payment.id).unwrap_or_default();
        }
        Ok(payments)
    }

    async fn invoices_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<SalesInvoice>, StoreError> {
        let mut invoices = rows
            .iter()
            .map(invoice_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if invoices.is_empty() {
            return Ok(invoices);
        }
        let ids: Vec<Uuid> = invoices.iter().map(|invoice| invoice.id).collect();

        let line_rows = sqlx::query(
            r#"
            SELECT invoice_id, description, quantity, unit_price, net_amount
            FROM sales_invoice_lines
            WHERE invoice_id = ANY($1)
            ORDER BY invoice_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut lines: HashMap<Uuid, Vec<SalesInvoiceLine>> = HashMap::new();
        for row in &line_rows {
            let invoice_id: Uuid = row.try_get("invoice_id").map_err(backend)?;
            lines.entry(invoice_id).or_default().push(SalesInvoiceLine {
                description: row.try_get("description").map_err(backend)?,
                quantity: row.try_get("quantity").map_err(backend)?,
                unit_price: row.try_get("unit_price").map_err(backend)?,
                net_amount: row.try_get("net_amount").map_err(backend)?,
            });
        }

        let payment_rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ANY($1) ORDER BY paid_at"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let mut payments: HashMap<Uuid, Vec<Payment>> = HashMap::new();
        for payment in self.payments_from_rows(payment_rows).await? {
            if let Some(invoice_id) = payment.invoice_id {
                payments.entry(invoice_id).or_default().push(payment);
            }
        }

        for invoice in &mut invoices {
            invoice.lines = lines.remove(&invoice.id).unwrap_or_default();
            invoice.payments = payments.remove(&invoice.id).unwrap_or_default();
        }
        Ok(invoices)
    }

    async fn receipts_from_rows(&self, rows: Vec<PgRow>) -> Result<Vec<PurchaseReceipt>, StoreError> {
        let mut receipts = rows
            .iter()
            .map(receipt_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if receipts.is_empty() {
            return Ok(receipts);
        }
        let ids: Vec<Uuid> = receipts.iter().map(|receipt| receipt.id).collect();

        let line_rows = sqlx::query(
            r#"
            SELECT receipt_id, item_name, quantity, unit_price, metadata
            FROM purchase_receipt_lines
            WHERE receipt_id = ANY($1)
            ORDER BY receipt_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut lines: HashMap<Uuid, Vec<ReceiptLine>> = HashMap::new();
        for row in &line_rows {
            let receipt_id: Uuid = row.try_get("receipt_id").map_err(backend)?;
            let metadata: Value = row.try_get("metadata").map_err(backend)?;
            lines.entry(receipt_id).or_default().push(ReceiptLine {
                item_name: row.try_get("item_name").map_err(backend)?,
                quantity: row.try_get("quantity").map_err(backend)?,
                unit_price: row.try_get("unit_price").map_err(backend)?,
                charges: ReceiptLineCharges::from_metadata(&metadata),
            });
        }
        for receipt in &mut receipts {
            receipt.lines = lines.remove(&receipt.id).unwrap_or_default();
        }
        Ok(receipts)
    }
}

#[async_trait]
impl LedgerStore for PgAccountingStore {
    async fn accounts(&self, company_id: Uuid) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE company_id = $1 ORDER BY code"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        rows.iter().map(account_from_row).collect()
    }

    async fn find_account_by_code(
        &self,
        company_id: Uuid,
        code: &str,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE company_id = $1 AND code = $2"
        ))
        .bind(company_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, company_id, code, name, account_type, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (company_id, code) DO NOTHING
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(account.company_id)
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => account_from_row(&row),
            None => self
                .find_account_by_code(account.company_id, &account.code)
                .await?
                .ok_or_else(|| {
                    StoreError::Conflict(format!("account {} vanished after conflict", account.code))
                }),
        }
    }

    async fn settings(&self, company_id: Uuid) -> Result<Option<AccountingSettings>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SETTINGS_COLUMNS} FROM accounting_settings WHERE company_id = $1"
        ))
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        row.as_ref().map(settings_from_row).transpose()
    }

    async fn insert_settings(
        &self,
        settings: AccountingSettings,
    ) -> Result<AccountingSettings, StoreError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO accounting_settings ({SETTINGS_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (company_id) DO NOTHING
            "#
        ))
        .bind(settings.company_id)
        .bind(settings.tenant_id)
        .bind(settings.ar_account_id)
        .bind(settings.ap_account_id)
        .bind(settings.sales_account_id)
        .bind(settings.purchase_account_id)
        .bind(settings.output_tax_account_id)
        .bind(settings.input_tax_account_id)
        .bind(settings.inventory_asset_account_id)
        .bind(&settings.currency_id)
        .bind(settings.fiscal_year_start)
        .bind(settings.fiscal_year_end)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        self.settings(settings.company_id).await?.ok_or_else(|| {
            StoreError::Conflict(format!(
                "settings for company {} vanished after insert",
                settings.company_id
            ))
        })
    }

    async fn find_entry(&self, entry_id: Uuid) -> Result<Option<JournalEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1"
        ))
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(self.with_lines(rows).await?.into_iter().next())
    }

    async fn find_entry_by_reference(
        &self,
        company_id: Uuid,
        reference: &str,
    ) -> Result<Option<JournalEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE company_id = $1 AND reference = $2"
        ))
        .bind(company_id)
        .bind(reference)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(self.with_lines(rows).await?.into_iter().next())
    }

    async fn commit(&self, batch: PostingBatch) -> Result<CommitOutcome, StoreError> {
        let PostingBatch { entry, transitions } = batch;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (source_kind, source_id) = match &entry.source {
            Some(link) => (Some(link.kind()), Some(link.id())),
            None => (None, None),
        };
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO journal_entries ({ENTRY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (company_id, reference) DO NOTHING
            "#
        ))
        .bind(entry.id)
        .bind(entry.company_id)
        .bind(entry.tenant_id)
        .bind(entry.date)
        .bind(entry.posted)
        .bind(entry.posted_at)
        .bind(&entry.created_by)
        .bind(&entry.currency_id)
        .bind(entry.amount_in_company_currency)
        .bind(&entry.reference)
        .bind(source_kind)
        .bind(source_id)
        .bind(entry.reverses_entry_id)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Ok(CommitOutcome::Duplicate {
                reference: entry.reference,
            });
        }

        for (line_no, line) in entry.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO journal_entry_lines (
                    id, journal_entry_id, line_no, company_id, account_id, debit, credit,
                    description, partner_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(line.id)
            .bind(entry.id)
            .bind(line_no as i32)
            .bind(line.company_id)
            .bind(line.account_id)
            .bind(line.debit)
            .bind(line.credit)
            .bind(&line.description)
            .bind(line.partner_id)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        for transition in &transitions {
            apply_in(&mut tx, transition, Some(entry.id)).await?;
        }

        tx.commit().await.map_err(backend)?;
        Ok(CommitOutcome::Committed { entry_id: entry.id })
    }

    async fn apply_transition(&self, transition: DocumentTransition) -> Result<(), StoreError> {
        if let DocumentTransition::LinkPayment { payment_id } = transition {
            return Err(StoreError::Conflict(format!(
                "payment {payment_id} can only be linked by a journal commit"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;
        apply_in(&mut tx, &transition, None).await?;
        tx.commit().await.map_err(backend)
    }

    async fn posted_entries(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM journal_entries
            WHERE company_id = $1
              AND posted
              AND ($2::timestamptz IS NULL OR entry_date >= $2)
              AND entry_date < $3
            ORDER BY entry_date, reference
            "#
        ))
        .bind(company_id)
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.with_lines(rows).await
    }
}

#[async_trait]
impl DocumentSource for PgAccountingStore {
    async fn sales_invoice(&self, id: Uuid) -> Result<Option<SalesInvoice>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, patient_id, issued_at, currency_id,
                   tax_total, grand_total, status
            FROM sales_invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(self.invoices_from_rows(rows).await?.into_iter().next())
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"))
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        Ok(self.payments_from_rows(rows).await?.into_iter().next())
    }

    async fn purchase_invoice(&self, id: Uuid) -> Result<Option<PurchaseInvoice>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, supplier_id, invoice_date, subtotal,
                   tax_total, grand_total, status
            FROM purchase_invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> Result<_, StoreError> {
            Ok(PurchaseInvoice {
                id: row.try_get("id").map_err(backend)?,
                company_id: row.try_get("company_id").map_err(backend)?,
                tenant_id: row.try_get("tenant_id").map_err(backend)?,
                number: row.try_get("number").map_err(backend)?,
                supplier_id: row.try_get("supplier_id").map_err(backend)?,
                invoice_date: row.try_get("invoice_date").map_err(backend)?,
                subtotal: row.try_get("subtotal").map_err(backend)?,
                tax_total: row.try_get("tax_total").map_err(backend)?,
                grand_total: row.try_get("grand_total").map_err(backend)?,
                status: status_from_row(&row)?,
            })
        })
        .transpose()
    }

    async fn purchase_receipt(&self, id: Uuid) -> Result<Option<PurchaseReceipt>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, name, supplier_id, received_at, status
            FROM purchase_receipts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(self.receipts_from_rows(rows).await?.into_iter().next())
    }

    async fn purchase_return(&self, id: Uuid) -> Result<Option<PurchaseReturn>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, supplier_id, return_date, total_amount, status
            FROM purchase_returns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> Result<_, StoreError> {
            Ok(PurchaseReturn {
                id: row.try_get("id").map_err(backend)?,
                company_id: row.try_get("company_id").map_err(backend)?,
                tenant_id: row.try_get("tenant_id").map_err(backend)?,
                number: row.try_get("number").map_err(backend)?,
                supplier_id: row.try_get("supplier_id").map_err(backend)?,
                return_date: row.try_get("return_date").map_err(backend)?,
                total_amount: row.try_get("total_amount").map_err(backend)?,
                status: status_from_row(&row)?,
            })
        })
        .transpose()
    }

    async fn sales_return(&self, id: Uuid) -> Result<Option<SalesReturn>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, patient_id, return_date, total_amount, status
            FROM sales_returns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(|row| -> Result<_, StoreError> {
            Ok(SalesReturn {
                id: row.try_get("id").map_err(backend)?,
                company_id: row.try_get("company_id").map_err(backend)?,
                tenant_id: row.try_get("tenant_id").map_err(backend)?,
                number: row.try_get("number").map_err(backend)?,
                patient_id: row.try_get("patient_id").map_err(backend)?,
                return_date: row.try_get("return_date").map_err(backend)?,
                total_amount: row.try_get("total_amount").map_err(backend)?,
                status: status_from_row(&row)?,
            })
        })
        .transpose()
    }

    async fn stock_adjustment(&self, id: Uuid) -> Result<Option<StockAdjustment>, StoreError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, adjusted_at, status
            FROM stock_adjustments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            r#"
            SELECT item_name, diff_qty, unit_cost
            FROM stock_adjustment_lines
            WHERE adjustment_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        let lines = line_rows
            .iter()
            .map(|line| -> Result<_, StoreError> {
                Ok(StockAdjustmentLine {
                    item_name: line.try_get("item_name").map_err(backend)?,
                    diff_qty: line.try_get("diff_qty").map_err(backend)?,
                    unit_cost: line.try_get("unit_cost").map_err(backend)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(StockAdjustment {
            id: row.try_get("id").map_err(backend)?,
            company_id: row.try_get("company_id").map_err(backend)?,
            tenant_id: row.try_get("tenant_id").map_err(backend)?,
            number: row.try_get("number").map_err(backend)?,
            adjusted_at: row.try_get("adjusted_at").map_err(backend)?,
            lines,
            status: status_from_row(&row)?,
        }))
    }

    async fn supplier(&self, id: Uuid) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query("SELECT id, company_id, tenant_id, name FROM suppliers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|row| -> Result<_, StoreError> {
            Ok(Supplier {
                id: row.try_get("id").map_err(backend)?,
                company_id: row.try_get("company_id").map_err(backend)?,
                tenant_id: row.try_get("tenant_id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn sales_invoices_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<SalesInvoice>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, number, patient_id, issued_at, currency_id,
                   tax_total, grand_total, status
            FROM sales_invoices
            WHERE company_id = $1
              AND ($2::timestamptz IS NULL OR issued_at >= $2)
              AND issued_at < $3
            ORDER BY issued_at
            "#,
        )
        .bind(company_id)
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.invoices_from_rows(rows).await
    }

    async fn payments_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<Payment>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE company_id = $1
              AND ($2::timestamptz IS NULL OR paid_at >= $2)
              AND paid_at < $3
            ORDER BY paid_at
            "#
        ))
        .bind(company_id)
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.payments_from_rows(rows).await
    }

    async fn purchase_receipts_between(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> Result<Vec<PurchaseReceipt>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, company_id, tenant_id, name, supplier_id, received_at, status
            FROM purchase_receipts
            WHERE company_id = $1
              AND ($2::timestamptz IS NULL OR received_at >= $2)
              AND received_at < $3
            ORDER BY received_at
            "#,
        )
        .bind(company_id)
        .bind(window.from)
        .bind(window.until)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.receipts_from_rows(rows).await
    }
}

async fn apply_in(
    tx: &mut Transaction<'_, Postgres>,
    transition: &DocumentTransition,
    entry_id: Option<Uuid>,
) -> Result<(), StoreError> {
    let (kind, id, affected) = match *transition {
        DocumentTransition::SetStatus { kind, id, status } => {
            let table = status_table(kind).ok_or(StoreError::NotFound { kind, id })?;
            let sql = format!("UPDATE {table} SET status = $2 WHERE id = $1");
            let result = sqlx::query(&sql)
                .bind(id)
                .bind(status.as_str())
                .execute(&mut **tx)
                .await
                .map_err(backend)?;
            (kind, id, result.rows_affected())
        }
        DocumentTransition::LinkPayment { payment_id } => {
            let result = sqlx::query("UPDATE payments SET journal_entry_id = $2 WHERE id = $1")
                .bind(payment_id)
                .bind(entry_id)
                .execute(&mut **tx)
                .await
                .map_err(backend)?;
            (DocumentKind::Payment, payment_id, result.rows_affected())
        }
    };

    if affected == 0 {
        warn!(kind = %kind, id = %id, "transition target missing, rolling back");
        return Err(StoreError::NotFound { kind, id });
    }
    Ok(())
}

fn status_table(kind: DocumentKind) -> Option<&'static str> {
    match kind {
        DocumentKind::SalesInvoice => Some("sales_invoices"),
        DocumentKind::PurchaseInvoice => Some("purchase_invoices"),
        DocumentKind::PurchaseReceipt => Some("purchase_receipts"),
        DocumentKind::PurchaseReturn => Some("purchase_returns"),
        DocumentKind::SalesReturn => Some("sales_returns"),
        DocumentKind::StockAdjustment => Some("stock_adjustments"),
        DocumentKind::Payment | DocumentKind::Supplier | DocumentKind::JournalEntry => None,
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    let unique = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if unique {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn status_from_row(row: &PgRow) -> Result<DocumentStatus, StoreError> {
    let raw: String = row.try_get("status").map_err(backend)?;
    Ok(DocumentStatus::parse(&raw))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let raw_type: String = row.try_get("account_type").map_err(backend)?;
    Ok(Account {
        id: row.try_get("id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        code: row.try_get("code").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        account_type: raw_type
            .parse::<AccountType>()
            .map_err(|err| StoreError::Backend(err.to_string()))?,
        is_active: row.try_get("is_active").map_err(backend)?,
    })
}

fn settings_from_row(row: &PgRow) -> Result<AccountingSettings, StoreError> {
    Ok(AccountingSettings {
        company_id: row.try_get("company_id").map_err(backend)?,
        tenant_id: row.try_get("tenant_id").map_err(backend)?,
        ar_account_id: row.try_get("ar_account_id").map_err(backend)?,
        ap_account_id: row.try_get("ap_account_id").map_err(backend)?,
        sales_account_id: row.try_get("sales_account_id").map_err(backend)?,
        purchase_account_id: row.try_get("purchase_account_id").map_err(backend)?,
        output_tax_account_id: row.try_get("output_tax_account_id").map_err(backend)?,
        input_tax_account_id: row.try_get("input_tax_account_id").map_err(backend)?,
        inventory_asset_account_id: row
            .try_get("inventory_asset_account_id")
            .map_err(backend)?,
        currency_id: row.try_get("currency_id").map_err(backend)?,
        fiscal_year_start: row.try_get("fiscal_year_start").map_err(backend)?,
        fiscal_year_end: row.try_get("fiscal_year_end").map_err(backend)?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<JournalEntry, StoreError> {
    let source_kind: Option<String> = row.try_get("source_kind").map_err(backend)?;
    let source_id: Option<Uuid> = row.try_get("source_id").map_err(backend)?;
    let source = match (source_kind, source_id) {
        (Some(kind), Some(id)) => SourceLink::from_parts(&kind, id),
        _ => None,
    };

    Ok(JournalEntry {
        id: row.try_get("id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        tenant_id: row.try_get("tenant_id").map_err(backend)?,
        date: row.try_get::<DateTime<Utc>, _>("entry_date").map_err(backend)?,
        posted: row.try_get("posted").map_err(backend)?,
        posted_at: row.try_get("posted_at").map_err(backend)?,
        created_by: row.try_get("created_by").map_err(backend)?,
        currency_id: row.try_get("currency_id").map_err(backend)?,
        amount_in_company_currency: row
            .try_get("amount_in_company_currency")
            .map_err(backend)?,
        reference: row.try_get("reference").map_err(backend)?,
        source,
        reverses_entry_id: row.try_get("reverses_entry_id").map_err(backend)?,
        lines: Vec::new(),
    })
}

fn line_from_row(row: &PgRow) -> Result<JournalEntryLine, StoreError> {
    Ok(JournalEntryLine {
        id: row.try_get("id").map_err(backend)?,
        journal_entry_id: row.try_get("journal_entry_id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        account_id: row.try_get("account_id").map_err(backend)?,
        debit: row.try_get("debit").map_err(backend)?,
        credit: row.try_get("credit").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        partner_id: row.try_get("partner_id").map_err(backend)?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let method: String = row.try_get("method").map_err(backend)?;
    let direction: String = row.try_get("direction").map_err(backend)?;
    Ok(Payment {
        id: row.try_get("id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        tenant_id: row.try_get("tenant_id").map_err(backend)?,
        invoice_id: row.try_get("invoice_id").map_err(backend)?,
        party_id: row.try_get("party_id").map_err(backend)?,
        amount: row.try_get("amount").map_err(backend)?,
        method: PaymentMethod::parse(&method),
        direction: payment_direction(&direction)?,
        paid_at: row.try_get("paid_at").map_err(backend)?,
        allocations: Vec::new(),
        journal_entry_id: row.try_get("journal_entry_id").map_err(backend)?,
    })
}

fn payment_direction(raw: &str) -> Result<PaymentDirection, StoreError> {
    PaymentDirection::parse(raw)
        .ok_or_else(|| StoreError::Backend(format!("unknown payment direction {raw:?}")))
}

fn invoice_from_row(row: &PgRow) -> Result<SalesInvoice, StoreError> {
    Ok(SalesInvoice {
        id: row.try_get("id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        tenant_id: row.try_get("tenant_id").map_err(backend)?,
        number: row.try_get("number").map_err(backend)?,
        patient_id: row.try_get("patient_id").map_err(backend)?,
        issued_at: row.try_get("issued_at").map_err(backend)?,
        currency_id: row.try_get("currency_id").map_err(backend)?,
        lines: Vec::new(),
        tax_total: row.try_get("tax_total").map_err(backend)?,
        grand_total: row.try_get("grand_total").map_err(backend)?,
        status: status_from_row(row)?,
        payments: Vec::new(),
    })
}

fn receipt_from_row(row: &PgRow) -> Result<PurchaseReceipt, StoreError> {
    Ok(PurchaseReceipt {
        id: row.try_get("id").map_err(backend)?,
        company_id: row.try_get("company_id").map_err(backend)?,
        tenant_id: row.try_get("tenant_id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        supplier_id: row.try_get("supplier_id").map_err(backend)?,
        received_at: row.try_get("received_at").map_err(backend)?,
        lines: Vec::new(),
        status: status_from_row(row)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stateful_documents_have_a_status_table() {
        assert_eq!(status_table(DocumentKind::PurchaseReceipt), Some("purchase_receipts"));
        assert_eq!(status_table(DocumentKind::Payment), None);
        assert_eq!(status_table(DocumentKind::JournalEntry), None);
    }

    #[test]
    fn unknown_payment_directions_are_rejected() {
        assert_eq!(payment_direction("outbound ").unwrap(), PaymentDirection::Outbound);
        let err = payment_direction("refund").unwrap_err();
        assert!(matches!(err, StoreError::Backend(message) if message.contains("refund")));
    }

    #[test]
    fn non_database_errors_are_backend_failures() {
        let err = backend(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
