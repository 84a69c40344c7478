use std::sync::Arc;

use carebooks_core::{
    AccountRole, AccountingSettings, ChartTemplate, Clock, CommitOutcome, DocumentSource,
    DocumentTransition, JournalEntry, LedgerStore, PaymentMethod, PostingBatch,
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::bootstrap::Bootstrapper;
use crate::error::PostingResult;
use crate::outcome::PostingOutcome;

/// Turns source documents into balanced journal entries. One public method
/// per document type lives in the sibling modules.
#[derive(Clone)]
pub struct PostingEngine {
    pub(crate) ledger: Arc<dyn LedgerStore>,
    pub(crate) documents: Arc<dyn DocumentSource>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) bootstrapper: Bootstrapper,
    /// Offset whose midnight dates entries that only carry a calendar day.
    pub(crate) day_offset: FixedOffset,
}

impl PostingEngine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentSource>,
        chart: Arc<dyn ChartTemplate>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bootstrapper = Bootstrapper::new(ledger.clone(), chart, clock.clone());
        Self {
            ledger,
            documents,
            clock,
            bootstrapper,
            day_offset: Utc.fix(),
        }
    }

    /// Dates day-only documents at local midnight in `offset`. Should match
    /// the offset reports cut days in.
    pub fn with_day_offset(mut self, offset: FixedOffset) -> Self {
        self.day_offset = offset;
        self
    }

    pub(crate) fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        midnight
            .and_local_timezone(self.day_offset)
            .single()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc())
    }

    pub fn bootstrapper(&self) -> &Bootstrapper {
        &self.bootstrapper
    }

    pub async fn ensure_company_ledger_ready(
        &self,
        company_id: Uuid,
        tenant_id: Uuid,
    ) -> PostingResult<AccountingSettings> {
        self.bootstrapper
            .ensure_company_ledger_ready(company_id, tenant_id)
            .await
    }

    pub(crate) async fn settings_for(
        &self,
        company_id: Uuid,
        tenant_id: Uuid,
    ) -> PostingResult<AccountingSettings> {
        self.bootstrapper
            .ensure_company_ledger_ready(company_id, tenant_id)
            .await
    }

    pub(crate) async fn account(
        &self,
        settings: &AccountingSettings,
        role: AccountRole,
    ) -> PostingResult<Uuid> {
        self.bootstrapper.resolve(settings, role).await
    }

    pub(crate) async fn money_account(
        &self,
        settings: &AccountingSettings,
        method: PaymentMethod,
    ) -> PostingResult<Uuid> {
        let role = if method.is_cash() {
            AccountRole::Cash
        } else {
            AccountRole::Bank
        };
        self.account(settings, role).await
    }

    /// Short-circuits when the reference is already in the ledger. The
    /// commit still relies on the store's uniqueness guarantee; this only
    /// avoids building an entry that would be discarded.
    pub(crate) async fn existing(
        &self,
        company_id: Uuid,
        reference: &str,
    ) -> PostingResult<Option<PostingOutcome>> {
        let existing = self
            .ledger
            .find_entry_by_reference(company_id, reference)
            .await?;
        Ok(existing.map(|entry| {
            info!(
                company_id = %company_id,
                reference = %entry.reference,
                "journal already posted, skipping"
            );
            PostingOutcome::AlreadyPosted {
                reference: entry.reference,
            }
        }))
    }

    pub(crate) async fn commit(
        &self,
        entry: JournalEntry,
        transitions: Vec<DocumentTransition>,
    ) -> PostingResult<PostingOutcome> {
        let company_id = entry.company_id;
        let reference = entry.reference.clone();
        let amount = entry.amount_in_company_currency;

        let outcome = self
            .ledger
            .commit(PostingBatch { entry, transitions })
            .await
            .inspect_err(|err| {
                error!(
                    company_id = %company_id,
                    reference = %reference,
                    "journal commit failed: {err}"
                );
            })?;

        match outcome {
            CommitOutcome::Committed { entry_id } => {
                info!(
                    company_id = %company_id,
                    entry_id = %entry_id,
                    reference = %reference,
                    amount = %amount,
                    "journal posted"
                );
                Ok(PostingOutcome::Posted {
                    entry_id,
                    reference,
                })
            }
            CommitOutcome::Duplicate { reference } => {
                info!(
                    company_id = %company_id,
                    reference = %reference,
                    "journal reference taken by a concurrent post, treating as posted"
                );
                Ok(PostingOutcome::AlreadyPosted { reference })
            }
        }
    }
}
