use carebooks_core::{
    AccountRole, DocumentKind, JournalDraft, OpeningBalanceParty, SourceLink,
    opening_balance_reference,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::PostingOutcome;

impl PostingEngine {
    /// Opening payable carried over from a previous system. Only suppliers
    /// are supported.
    ///
    /// The reference is `OB-{name prefix}-{year}`, so two suppliers sharing
    /// the first five letters of their name collide within a year.
    pub async fn post_opening_balance(
        &self,
        entity_id: Uuid,
        entity_type: OpeningBalanceParty,
        amount: Decimal,
        date: NaiveDate,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        if entity_type == OpeningBalanceParty::Customer {
            return Err(PostingError::UnsupportedOperation(
                "customer opening balances are not supported".to_string(),
            ));
        }

        let supplier = self
            .documents
            .supplier(entity_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::Supplier, entity_id))?;

        if amount.is_zero() {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("opening balance for {} is zero", supplier.name),
            });
        }

        let reference = opening_balance_reference(&supplier.name, date);
        if let Some(done) = self.existing(supplier.company_id, &reference).await? {
            return Ok(done);
        }

        let settings = self
            .settings_for(supplier.company_id, supplier.tenant_id)
            .await?;
        let equity = self.account(&settings, AccountRole::OpeningEquity).await?;
        let payable = self.account(&settings, AccountRole::Payable).await?;

        let mut draft = JournalDraft::new(
            supplier.company_id,
            supplier.tenant_id,
            reference,
            self.start_of(date),
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::OpeningBalance(supplier.id));

        let description = format!("Opening balance {}", supplier.name);
        let value = amount.abs();
        if amount > Decimal::ZERO {
            draft.debit(equity, value, &description)?;
            draft.credit_partner(payable, value, &description, Some(supplier.id))?;
        } else {
            // supplier owes us: an advance carried over
            draft.debit_partner(payable, value, &description, Some(supplier.id))?;
            draft.credit(equity, value, &description)?;
        }

        let entry = draft.finish(self.clock.now())?;
        self.commit(entry, Vec::new()).await
    }
}
