use std::collections::{BTreeMap, HashMap};

use carebooks_core::{Account, AccountType, JournalEntry, LedgerWindow};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ReportEngine;
use crate::error::ReportResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub revenue: Vec<AccountAmount>,
    pub cost_of_goods_sold: Vec<AccountAmount>,
    pub expenses: Vec<AccountAmount>,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_expenses: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
}

impl ProfitAndLoss {
    /// Net profit as a percentage of revenue, `None` without revenue.
    pub fn net_margin_pct(&self) -> Option<Decimal> {
        if self.total_revenue > Decimal::ZERO {
            Some((self.net_profit / self.total_revenue * Decimal::ONE_HUNDRED).round_dp(2))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of: NaiveDate,
    pub assets: Vec<AccountAmount>,
    pub liabilities: Vec<AccountAmount>,
    pub equity: Vec<AccountAmount>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    /// Cumulative revenue less expenses, folded into equity.
    pub retained_earnings: Decimal,
    /// Equity accounts plus retained earnings.
    pub total_equity: Decimal,
    pub is_balanced: bool,
}

impl ReportEngine {
    /// Income statement for the inclusive calendar range `start..=end`.
    pub async fn profit_and_loss(
        &self,
        company_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ReportResult<ProfitAndLoss> {
        let window = self.range_window(start, end)?;
        let chart = self.chart(company_id).await?;
        let entries = self.entries(company_id, window).await?;
        let balances = AccountBalances::collect(&entries, &chart);

        let revenue = balances.section(&chart, |t| t.is_revenue());
        let cost_of_goods_sold = balances.section(&chart, |t| t == AccountType::Cogs);
        let expenses = balances.section(&chart, |t| t == AccountType::Expense);

        let total_revenue = total(&revenue);
        let total_cogs = total(&cost_of_goods_sold);
        let total_expenses = total(&expenses);
        let gross_profit = total_revenue - total_cogs;

        Ok(ProfitAndLoss {
            start,
            end,
            revenue,
            cost_of_goods_sold,
            expenses,
            total_revenue,
            total_cogs,
            total_expenses,
            gross_profit,
            net_profit: gross_profit - total_expenses,
        })
    }

    /// Cumulative position at the end of `as_of`.
    pub async fn balance_sheet(
        &self,
        company_id: Uuid,
        as_of: NaiveDate,
    ) -> ReportResult<BalanceSheet> {
        let window = LedgerWindow::before(self.start_of(as_of) + Duration::days(1));
        let chart = self.chart(company_id).await?;
        let entries = self.entries(company_id, window).await?;
        let balances = AccountBalances::collect(&entries, &chart);

        let assets = balances.section(&chart, |t| t == AccountType::Asset);
        let liabilities = balances.section(&chart, |t| t == AccountType::Liability);
        let equity = balances.section(&chart, |t| t == AccountType::Equity);
        let revenue = total(&balances.section(&chart, |t| t.is_revenue()));
        let spent = total(&balances.section(&chart, |t| t.is_expense()));

        let total_assets = total(&assets);
        let total_liabilities = total(&liabilities);
        let retained_earnings = revenue - spent;
        let total_equity = total(&equity) + retained_earnings;

        Ok(BalanceSheet {
            as_of,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            retained_earnings,
            total_equity,
            is_balanced: total_assets == total_liabilities + total_equity,
        })
    }
}

/// Net movement per account in its natural direction: debit minus credit
/// for debit-normal types, credit minus debit otherwise.
pub(crate) struct AccountBalances(BTreeMap<Uuid, Decimal>);

impl AccountBalances {
    pub(crate) fn collect(entries: &[JournalEntry], chart: &HashMap<Uuid, Account>) -> Self {
        let mut balances = BTreeMap::new();
        for line in entries.iter().flat_map(|entry| &entry.lines) {
            let Some(account) = chart.get(&line.account_id) else {
                continue;
            };
            let signed = if account.account_type.is_debit_normal() {
                line.net_debit()
            } else {
                -line.net_debit()
            };
            *balances.entry(account.id).or_insert(Decimal::ZERO) += signed;
        }
        Self(balances)
    }

    /// Accounts whose type passes `include`, ordered by code.
    pub(crate) fn section(
        &self,
        chart: &HashMap<Uuid, Account>,
        include: impl Fn(AccountType) -> bool,
    ) -> Vec<AccountAmount> {
        let mut rows: Vec<AccountAmount> = self
            .0
            .iter()
            .filter_map(|(account_id, amount)| {
                let account = chart.get(account_id)?;
                include(account.account_type).then(|| AccountAmount {
                    account_id: account.id,
                    code: account.code.clone(),
                    name: account.name.clone(),
                    amount: *amount,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        rows
    }
}

fn total(rows: &[AccountAmount]) -> Decimal {
    rows.iter().map(|row| row.amount).sum()
}
