use anyhow::{Context, Result};
use carebooks_reports::ReportSettings;
use chrono::FixedOffset;
use rust_decimal::Decimal;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub http_addr: String,
    pub max_connections: u32,
    pub utc_offset: FixedOffset,
    pub insight_expense_threshold: Decimal,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
        let http_addr =
            std::env::var("HTTP_ADDR").unwrap_or_else(|_| default_http_addr.to_string());

        let max_connections = optional_env("DB_MAX_CONNECTIONS")
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .context("DB_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(10);

        let offset_minutes = optional_env("LEDGER_UTC_OFFSET_MINUTES")
            .map(|raw| raw.parse::<i32>())
            .transpose()
            .context("LEDGER_UTC_OFFSET_MINUTES must be an integer")?
            .unwrap_or(0);
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .context("LEDGER_UTC_OFFSET_MINUTES is out of range")?;

        let insight_expense_threshold = optional_env("INSIGHT_EXPENSE_THRESHOLD")
            .map(|raw| raw.parse::<Decimal>())
            .transpose()
            .context("INSIGHT_EXPENSE_THRESHOLD must be a decimal amount")?
            .unwrap_or_else(|| Decimal::from(5000));

        Ok(Self {
            database_url,
            http_addr,
            max_connections,
            utc_offset,
            insight_expense_threshold,
        })
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            utc_offset: self.utc_offset,
            insight_expense_threshold: self.insight_expense_threshold,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
