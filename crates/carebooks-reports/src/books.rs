use std::collections::HashSet;

use carebooks_core::{JournalEntry, LedgerWindow};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ReportEngine;
use crate::error::ReportResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookKind {
    Cash,
    Bank,
}

impl BookKind {
    /// Chart codes whose movements make up the book.
    pub fn account_codes(&self) -> &'static [&'static str] {
        match self {
            Self::Cash => &["1000", "1010"],
            Self::Bank => &["1100", "1050"],
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" | "cash-book" | "cash_book" => Some(Self::Cash),
            "bank" | "bank-book" | "bank_book" => Some(Self::Bank),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Daybook {
    pub date: NaiveDate,
    pub entries: Vec<JournalEntry>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBankBook {
    pub kind: BookKind,
    pub date: NaiveDate,
    /// Balance of the book accounts before the day opened.
    pub opening_balance: Decimal,
    /// Entries of the day touching a book account, with all their lines.
    pub entries: Vec<JournalEntry>,
    pub receipts: Decimal,
    pub disbursements: Decimal,
    pub closing_balance: Decimal,
}

impl ReportEngine {
    pub async fn daybook(&self, company_id: Uuid, date: NaiveDate) -> ReportResult<Daybook> {
        let entries = self.entries(company_id, self.day_window(date)).await?;
        Ok(Daybook {
            date,
            total_debit: entries.iter().map(JournalEntry::total_debit).sum(),
            total_credit: entries.iter().map(JournalEntry::total_credit).sum(),
            entries,
        })
    }

    pub async fn cash_bank_book(
        &self,
        company_id: Uuid,
        kind: BookKind,
        date: NaiveDate,
    ) -> ReportResult<CashBankBook> {
        let chart = self.chart(company_id).await?;
        let book_accounts: HashSet<Uuid> = chart
            .values()
            .filter(|account| kind.account_codes().contains(&account.code.as_str()))
            .map(|account| account.id)
            .collect();

        let prior = self
            .entries(company_id, LedgerWindow::before(self.start_of(date)))
            .await?;
        let (prior_in, prior_out) = book_movement(&prior, &book_accounts);
        let opening_balance = prior_in - prior_out;

        let entries: Vec<JournalEntry> = self
            .entries(company_id, self.day_window(date))
            .await?
            .into_iter()
            .filter(|entry| book_accounts.iter().any(|id| entry.touches(*id)))
            .collect();
        let (receipts, disbursements) = book_movement(&entries, &book_accounts);

        Ok(CashBankBook {
            kind,
            date,
            opening_balance,
            entries,
            receipts,
            disbursements,
            closing_balance: opening_balance + receipts - disbursements,
        })
    }
}

/// (debits, credits) on the book accounts across `entries`.
fn book_movement(entries: &[JournalEntry], accounts: &HashSet<Uuid>) -> (Decimal, Decimal) {
    entries
        .iter()
        .flat_map(|entry| &entry.lines)
        .filter(|line| accounts.contains(&line.account_id))
        .fold((Decimal::ZERO, Decimal::ZERO), |(debit, credit), line| {
            (debit + line.debit, credit + line.credit)
        })
}
