//! Company ledger provisioning.
//!
//! A company is ready to post once every account of its chart template
//! exists and a settings row maps each role to one of those accounts. The
//! settings row is only written after all accounts were found or created,
//! so it never references an account that does not exist.

use std::sync::Arc;

use carebooks_core::{
    AccountRole, AccountingSettings, ChartTemplate, Clock, LedgerStore, NewAccount,
};
use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PostingError, PostingResult};

#[derive(Clone)]
pub struct Bootstrapper {
    ledger: Arc<dyn LedgerStore>,
    chart: Arc<dyn ChartTemplate>,
    clock: Arc<dyn Clock>,
}

impl Bootstrapper {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        chart: Arc<dyn ChartTemplate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            chart,
            clock,
        }
    }

    pub fn chart(&self) -> &dyn ChartTemplate {
        self.chart.as_ref()
    }

    /// Returns the company's settings, creating the default chart and the
    /// settings row first when none exist. Safe to call any number of times.
    pub async fn ensure_company_ledger_ready(
        &self,
        company_id: Uuid,
        tenant_id: Uuid,
    ) -> PostingResult<AccountingSettings> {
        if let Some(settings) = self.ledger.settings(company_id).await? {
            return Ok(settings);
        }

        let mut settings = AccountingSettings::unmapped(company_id, tenant_id);
        for template in self.chart.accounts() {
            let existing = self
                .ledger
                .find_account_by_code(company_id, template.code)
                .await?;
            let account = match existing {
                Some(account) => account,
                None => self
                    .ledger
                    .insert_account(NewAccount {
                        company_id,
                        code: template.code.to_string(),
                        name: template.name.to_string(),
                        account_type: template.account_type,
                    })
                    .await
                    .map_err(|err| {
                        warn!(
                            company_id = %company_id,
                            code = template.code,
                            "default account could not be created: {err}"
                        );
                        PostingError::ConfigurationMissing(template.role)
                    })?,
            };
            settings.assign(template.role, account.id);
        }

        let (start, end) = fiscal_year_bounds(self.clock.now().date_naive());
        settings.fiscal_year_start = Some(start);
        settings.fiscal_year_end = Some(end);

        let settings = self.ledger.insert_settings(settings).await?;
        info!(
            company_id = %company_id,
            chart = self.chart.name(),
            "company ledger provisioned"
        );
        Ok(settings)
    }

    /// Account for `role`: the settings mapping for roles the settings row
    /// carries, otherwise the active chart account with the role's code.
    pub async fn resolve(
        &self,
        settings: &AccountingSettings,
        role: AccountRole,
    ) -> PostingResult<Uuid> {
        if role.is_settings_mapped() {
            return settings.account_for(role).ok_or_else(|| {
                warn!(
                    company_id = %settings.company_id,
                    role = %role,
                    "role unmapped in accounting settings"
                );
                PostingError::ConfigurationMissing(role)
            });
        }

        let Some(code) = self.chart.code_for(role) else {
            return Err(PostingError::ConfigurationMissing(role));
        };
        match self
            .ledger
            .find_account_by_code(settings.company_id, code)
            .await?
        {
            Some(account) if account.is_active => Ok(account.id),
            _ => {
                warn!(
                    company_id = %settings.company_id,
                    role = %role,
                    "no active account mapped"
                );
                Err(PostingError::ConfigurationMissing(role))
            }
        }
    }
}

fn fiscal_year_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_ordinal(1).unwrap_or(today);
    let end = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
    (start, end)
}

#[cfg(test)]
mod tests {
    use carebooks_core::{ClinicChart, FixedClock};
    use carebooks_store::InMemoryAccountingStore;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn bootstrapper(store: Arc<InMemoryAccountingStore>) -> Bootstrapper {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap());
        Bootstrapper::new(store, Arc::new(ClinicChart), Arc::new(clock))
    }

    #[tokio::test]
    async fn provisioning_twice_creates_one_chart() {
        let store = Arc::new(InMemoryAccountingStore::new());
        let bootstrapper = bootstrapper(store.clone());
        let company_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let first = bootstrapper
            .ensure_company_ledger_ready(company_id, tenant_id)
            .await
            .unwrap();
        let second = bootstrapper
            .ensure_company_ledger_ready(company_id, tenant_id)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.accounts(company_id).await.unwrap().len(), 10);
        assert_eq!(
            first.fiscal_year_start,
            NaiveDate::from_ymd_opt(2025, 1, 1)
        );

        let ar = store
            .find_account_by_code(company_id, "1200")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.ar_account_id, Some(ar.id));
    }

    #[tokio::test]
    async fn existing_accounts_are_reused() {
        let store = Arc::new(InMemoryAccountingStore::new());
        let company_id = Uuid::new_v4();
        let sales = store
            .insert_account(NewAccount {
                company_id,
                code: "4000".to_string(),
                name: "Consultation Revenue".to_string(),
                account_type: carebooks_core::AccountType::Revenue,
            })
            .await
            .unwrap();

        let settings = bootstrapper(store.clone())
            .ensure_company_ledger_ready(company_id, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(settings.sales_account_id, Some(sales.id));
        assert_eq!(store.accounts(company_id).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn failed_account_creation_leaves_no_settings() {
        let store = Arc::new(InMemoryAccountingStore::new());
        store.fail_account_inserts_for("2210").await;
        let company_id = Uuid::new_v4();

        let err = bootstrapper(store.clone())
            .ensure_company_ledger_ready(company_id, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PostingError::ConfigurationMissing(AccountRole::InputTax)
        ));
        assert!(store.settings(company_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cash_and_bank_resolve_by_chart_code() {
        let store = Arc::new(InMemoryAccountingStore::new());
        let bootstrapper = bootstrapper(store.clone());
        let company_id = Uuid::new_v4();
        let settings = bootstrapper
            .ensure_company_ledger_ready(company_id, Uuid::new_v4())
            .await
            .unwrap();

        let cash = bootstrapper.resolve(&settings, AccountRole::Cash).await.unwrap();
        let expected = store
            .find_account_by_code(company_id, "1000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cash, expected.id);

        let unmapped = AccountingSettings::unmapped(Uuid::new_v4(), Uuid::new_v4());
        let err = bootstrapper
            .resolve(&unmapped, AccountRole::Bank)
            .await
            .unwrap_err();
        assert!(matches!(err, PostingError::ConfigurationMissing(AccountRole::Bank)));
    }
}
