use std::collections::{BTreeMap, HashMap};

use carebooks_core::{Account, JournalEntry, PaymentDirection};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ReportEngine, percent_delta};
use crate::error::ReportResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub invoice_count: usize,
    /// Invoice grand totals issued on the day, posted or not.
    pub total_sales: Decimal,
    /// Money received from patients on the day.
    pub total_paid: Decimal,
    /// Goods receipts on the day, taxable value plus tax.
    pub total_purchases: Decimal,
    pub net_cash_flow: Decimal,
    /// Ledger revenue keyed by `"{code} {name}"`.
    pub revenue_by_account: BTreeMap<String, Decimal>,
    /// Ledger expense keyed by `"{code} {name}"`.
    pub expense_by_account: BTreeMap<String, Decimal>,
    pub sales_delta_pct: Decimal,
    pub paid_delta_pct: Decimal,
    pub purchases_delta_pct: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
struct DayTotals {
    invoice_count: usize,
    sales: Decimal,
    paid: Decimal,
    purchases: Decimal,
}

impl ReportEngine {
    /// Day summary compared against the immediately preceding calendar day.
    pub async fn daily_report(
        &self,
        company_id: Uuid,
        date: NaiveDate,
    ) -> ReportResult<DailyReport> {
        let today = self.day_totals(company_id, date).await?;
        let previous = self
            .day_totals(company_id, date - Duration::days(1))
            .await?;

        let chart = self.chart(company_id).await?;
        let entries = self.entries(company_id, self.day_window(date)).await?;
        let (revenue_by_account, expense_by_account) = classify(&entries, &chart);

        Ok(DailyReport {
            date,
            invoice_count: today.invoice_count,
            total_sales: today.sales,
            total_paid: today.paid,
            total_purchases: today.purchases,
            net_cash_flow: today.paid - today.purchases,
            revenue_by_account,
            expense_by_account,
            sales_delta_pct: percent_delta(today.sales, previous.sales),
            paid_delta_pct: percent_delta(today.paid, previous.paid),
            purchases_delta_pct: percent_delta(today.purchases, previous.purchases),
        })
    }

    async fn day_totals(&self, company_id: Uuid, date: NaiveDate) -> ReportResult<DayTotals> {
        let window = self.day_window(date);

        let invoices = self
            .documents
            .sales_invoices_between(company_id, window)
            .await?;
        let payments = self.documents.payments_between(company_id, window).await?;
        let receipts = self
            .documents
            .purchase_receipts_between(company_id, window)
            .await?;

        Ok(DayTotals {
            invoice_count: invoices.len(),
            sales: invoices.iter().map(|invoice| invoice.grand_total).sum(),
            paid: payments
                .iter()
                .filter(|payment| payment.direction == PaymentDirection::Inbound)
                .map(|payment| payment.amount)
                .sum(),
            purchases: receipts.iter().map(|receipt| receipt.totals().total).sum(),
        })
    }
}

fn classify(
    entries: &[JournalEntry],
    chart: &HashMap<Uuid, Account>,
) -> (BTreeMap<String, Decimal>, BTreeMap<String, Decimal>) {
    let mut revenue = BTreeMap::new();
    let mut expense = BTreeMap::new();

    for line in entries.iter().flat_map(|entry| &entry.lines) {
        let Some(account) = chart.get(&line.account_id) else {
            continue;
        };
        let key = format!("{} {}", account.code, account.name);
        if account.account_type.is_revenue() {
            *revenue.entry(key).or_insert(Decimal::ZERO) += line.net_debit();
        } else if account.account_type.is_expense() {
            *expense.entry(key).or_insert(Decimal::ZERO) += line.net_debit();
        }
    }

    // revenue carries a credit balance; report it as a positive figure
    for amount in revenue.values_mut() {
        *amount = amount.abs();
    }
    (revenue, expense)
}
