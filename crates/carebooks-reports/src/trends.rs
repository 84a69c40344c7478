use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::engine::ReportEngine;
use crate::error::ReportResult;
use crate::statements::AccountBalances;

pub const TREND_DAYS: i64 = 30;
const INSIGHT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialTrends {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// One point per calendar day, oldest first, zero-filled.
    pub days: Vec<TrendPoint>,
}

impl FinancialTrends {
    pub fn average_revenue(&self) -> Decimal {
        if self.days.is_empty() {
            return Decimal::ZERO;
        }
        let total: Decimal = self.days.iter().map(|day| day.revenue).sum();
        total / Decimal::from(self.days.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    LargestExpense,
    HighMargin,
    LowMargin,
    RevenueSpike,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ReportEngine {
    /// Revenue and expense per day over the last thirty days, today included.
    pub async fn financial_trends(&self, company_id: Uuid) -> ReportResult<FinancialTrends> {
        let end = self.today();
        let start = end - Duration::days(TREND_DAYS - 1);

        let mut days: BTreeMap<NaiveDate, TrendPoint> = (0..TREND_DAYS)
            .map(|offset| {
                let date = start + Duration::days(offset);
                (
                    date,
                    TrendPoint {
                        date,
                        revenue: Decimal::ZERO,
                        expense: Decimal::ZERO,
                    },
                )
            })
            .collect();

        let chart = self.chart(company_id).await?;
        let entries = self
            .entries(company_id, self.range_window(start, end)?)
            .await?;
        let offset = self.settings.utc_offset;

        for entry in &entries {
            let date = entry.date.with_timezone(&offset).date_naive();
            let Some(point) = days.get_mut(&date) else {
                continue;
            };
            for line in &entry.lines {
                match chart.get(&line.account_id).map(|a| a.account_type) {
                    Some(kind) if kind.is_revenue() => point.revenue -= line.net_debit(),
                    Some(kind) if kind.is_expense() => point.expense += line.net_debit(),
                    _ => {}
                }
            }
        }

        Ok(FinancialTrends {
            start,
            end,
            days: days.into_values().collect(),
        })
    }

    /// Heuristic observations. Best effort: each rule looks at a different
    /// window and none of them is authoritative.
    pub async fn executive_insights(&self, company_id: Uuid) -> ReportResult<Vec<Insight>> {
        let today = self.today();
        let mut insights = Vec::new();

        if let Some(insight) = self.largest_expense(company_id, today).await? {
            insights.push(insight);
        }

        let month_start = today.with_day(1).unwrap_or(today);
        let month = self.profit_and_loss(company_id, month_start, today).await?;
        if let Some(margin) = month.net_margin_pct() {
            if margin > Decimal::from(30) {
                insights.push(Insight::new(
                    InsightKind::HighMargin,
                    format!("Net margin this month is {margin}%, well above the usual range."),
                ));
            } else if margin < Decimal::from(5) {
                insights.push(Insight::new(
                    InsightKind::LowMargin,
                    format!("Net margin this month is only {margin}%; review costs against revenue."),
                ));
            }
        }

        let trends = self.financial_trends(company_id).await?;
        let average = trends.average_revenue();
        let spike_floor = average * Decimal::new(15, 1);
        let peak = trends
            .days
            .iter()
            .filter(|day| average > Decimal::ZERO && day.revenue > spike_floor)
            .max_by_key(|day| day.revenue);
        if let Some(peak) = peak {
            insights.push(Insight::new(
                InsightKind::RevenueSpike,
                format!(
                    "Revenue on {} reached {}, more than 1.5x the 30-day average of {}.",
                    peak.date,
                    peak.revenue,
                    average.round_dp(2)
                ),
            ));
        }

        if insights.is_empty() {
            debug!(company_id = %company_id, "no insight rule fired");
            insights.push(Insight::new(
                InsightKind::Stable,
                "Spending is steady with no unusual expense this week.",
            ));
            insights.push(Insight::new(
                InsightKind::Stable,
                "Revenue is tracking in line with recent days.",
            ));
        }
        Ok(insights)
    }

    async fn largest_expense(
        &self,
        company_id: Uuid,
        today: NaiveDate,
    ) -> ReportResult<Option<Insight>> {
        let start = today - Duration::days(INSIGHT_WINDOW_DAYS - 1);
        let chart = self.chart(company_id).await?;
        let entries = self
            .entries(company_id, self.range_window(start, today)?)
            .await?;

        let expenses = AccountBalances::collect(&entries, &chart)
            .section(&chart, |t| t.is_expense());
        let Some(top) = expenses.iter().max_by_key(|row| row.amount) else {
            return Ok(None);
        };
        if top.amount <= self.settings.insight_expense_threshold {
            return Ok(None);
        }

        Ok(Some(Insight::new(
            InsightKind::LargestExpense,
            format!(
                "{} is the largest expense of the last {} days at {}.",
                top.name, INSIGHT_WINDOW_DAYS, top.amount
            ),
        )))
    }
}
