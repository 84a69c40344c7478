//! Ledger-derived reports: daily summary, income statement, balance sheet,
//! trailing trends, heuristic insights, the daybook and cash/bank books.

pub mod books;
pub mod daily;
pub mod engine;
pub mod error;
pub mod statements;
pub mod trends;

pub use books::{BookKind, CashBankBook, Daybook};
pub use daily::DailyReport;
pub use engine::{ReportEngine, ReportSettings, percent_delta};
pub use error::{ReportError, ReportResult};
pub use statements::{AccountAmount, BalanceSheet, ProfitAndLoss};
pub use trends::{FinancialTrends, Insight, InsightKind, TREND_DAYS, TrendPoint};
