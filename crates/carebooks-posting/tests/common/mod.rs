//! Shared fixtures for posting tests: an in-memory store, an engine on the
//! clinic chart and a clock frozen at 2025-03-10 14:00 UTC.

#![allow(dead_code)]

use std::sync::Arc;

use carebooks_core::{
    ClinicChart, DocumentStatus, FixedClock, JournalEntry, LedgerStore, LedgerWindow, Payment,
    PaymentDirection, PaymentMethod, SalesInvoice, SalesInvoiceLine, Supplier,
};
use carebooks_posting::PostingEngine;
use carebooks_store::InMemoryAccountingStore;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

pub const USER: &str = "accountant@clinic.test";

pub struct Harness {
    pub store: Arc<InMemoryAccountingStore>,
    pub engine: PostingEngine,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap()
}

pub fn money(value: i64) -> Decimal {
    Decimal::from(value)
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryAccountingStore::new());
        let engine = PostingEngine::new(
            store.clone(),
            store.clone(),
            Arc::new(ClinicChart),
            Arc::new(FixedClock(now())),
        );
        Self {
            store,
            engine,
            company_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
        }
    }

    pub async fn provisioned() -> Self {
        let harness = Self::new();
        harness
            .engine
            .ensure_company_ledger_ready(harness.company_id, harness.tenant_id)
            .await
            .unwrap();
        harness
    }

    pub async fn account_id(&self, code: &str) -> Uuid {
        self.store
            .find_account_by_code(self.company_id, code)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("account {code} not provisioned"))
            .id
    }

    pub async fn entry(&self, reference: &str) -> JournalEntry {
        self.store
            .find_entry_by_reference(self.company_id, reference)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no journal with reference {reference}"))
    }

    pub async fn entries(&self) -> Vec<JournalEntry> {
        self.store
            .posted_entries(self.company_id, LedgerWindow::before(now() + chrono::Duration::days(365)))
            .await
            .unwrap()
    }

    /// (debits, credits) booked to the account with `code` within `entry`.
    pub async fn sides(&self, entry: &JournalEntry, code: &str) -> (Decimal, Decimal) {
        let account_id = self.account_id(code).await;
        entry
            .lines
            .iter()
            .filter(|line| line.account_id == account_id)
            .fold((Decimal::ZERO, Decimal::ZERO), |(dr, cr), line| {
                (dr + line.debit, cr + line.credit)
            })
    }

    pub fn invoice(&self, number: &str, lines: &[(&str, i64)], tax: i64, total: i64) -> SalesInvoice {
        SalesInvoice {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            tenant_id: self.tenant_id,
            number: number.to_string(),
            patient_id: Some(Uuid::new_v4()),
            issued_at: now() - chrono::Duration::hours(2),
            currency_id: Some("INR".to_string()),
            lines: lines
                .iter()
                .map(|(description, net)| SalesInvoiceLine {
                    description: description.to_string(),
                    quantity: Decimal::ONE,
                    unit_price: money(*net),
                    net_amount: money(*net),
                })
                .collect(),
            tax_total: money(tax),
            grand_total: money(total),
            status: DocumentStatus::Draft,
            payments: Vec::new(),
        }
    }

    pub fn payment(&self, amount: i64, method: PaymentMethod, direction: PaymentDirection) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            tenant_id: self.tenant_id,
            invoice_id: None,
            party_id: Some(Uuid::new_v4()),
            amount: money(amount),
            method,
            direction,
            paid_at: now() - chrono::Duration::minutes(30),
            allocations: Vec::new(),
            journal_entry_id: None,
        }
    }

    pub async fn supplier(&self, name: &str) -> Supplier {
        let supplier = Supplier {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            tenant_id: self.tenant_id,
            name: name.to_string(),
        };
        self.store.put_supplier(supplier.clone()).await;
        supplier
    }
}
