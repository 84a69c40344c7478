use std::collections::HashMap;
use std::sync::Arc;

use carebooks_core::{Account, Clock, DocumentSource, JournalEntry, LedgerStore, LedgerWindow};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{ReportError, ReportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSettings {
    /// Offset whose calendar days the reports are cut on.
    pub utc_offset: FixedOffset,
    /// Trailing-week spend on one account above this is called out.
    pub insight_expense_threshold: Decimal,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            insight_expense_threshold: Decimal::from(5000),
        }
    }
}

/// Read-only aggregation over posted journal entries and, for the daily
/// summary, over the raw source documents.
#[derive(Clone)]
pub struct ReportEngine {
    pub(crate) ledger: Arc<dyn LedgerStore>,
    pub(crate) documents: Arc<dyn DocumentSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) settings: ReportSettings,
}

impl ReportEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentSource>,
        clock: Arc<dyn Clock>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            ledger,
            documents,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Current calendar day in the reporting offset.
    pub fn today(&self) -> NaiveDate {
        self.clock
            .now()
            .with_timezone(&self.settings.utc_offset)
            .date_naive()
    }

    pub(crate) fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        start_of_day(date, self.settings.utc_offset)
    }

    pub(crate) fn day_window(&self, date: NaiveDate) -> LedgerWindow {
        let start = self.start_of(date);
        LedgerWindow::between(start, start + Duration::days(1))
    }

    /// Inclusive `start..=end` calendar range as a half-open window.
    pub(crate) fn range_window(&self, start: NaiveDate, end: NaiveDate) -> ReportResult<LedgerWindow> {
        if end < start {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(LedgerWindow::between(
            self.start_of(start),
            self.start_of(end) + Duration::days(1),
        ))
    }

    pub(crate) async fn entries(
        &self,
        company_id: Uuid,
        window: LedgerWindow,
    ) -> ReportResult<Vec<JournalEntry>> {
        Ok(self.ledger.posted_entries(company_id, window).await?)
    }

    pub(crate) async fn chart(&self, company_id: Uuid) -> ReportResult<HashMap<Uuid, Account>> {
        let accounts = self.ledger.accounts(company_id).await?;
        Ok(accounts
            .into_iter()
            .map(|account| (account.id, account))
            .collect())
    }
}

pub(crate) fn start_of_day(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local_midnight = date.and_time(NaiveTime::MIN);
    (local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))).and_utc()
}

/// Change from `previous` to `current` in percent, two decimals. Growth
/// from nothing counts as +100%.
pub fn percent_delta(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(2)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn growth_from_zero_is_one_hundred_percent() {
        assert_eq!(percent_delta(Decimal::from(200), Decimal::ZERO), Decimal::ONE_HUNDRED);
        assert_eq!(percent_delta(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn delta_is_relative_to_the_previous_value() {
        assert_eq!(
            percent_delta(Decimal::from(150), Decimal::from(200)),
            Decimal::from(-25)
        );
        assert_eq!(
            percent_delta(Decimal::from(100), Decimal::from(3)),
            Decimal::new(323333, 2)
        );
    }

    #[test]
    fn local_midnight_shifts_by_the_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        assert_eq!(
            start_of_day(date, ist),
            Utc.with_ymd_and_hms(2025, 3, 9, 18, 30, 0).unwrap()
        );
        assert_eq!(
            start_of_day(date, Utc.fix()),
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
        );
    }
}
