use carebooks_core::{DocumentKind, JournalDraft, SourceLink};
use tracing::warn;
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::PostingOutcome;

pub fn reversal_reference(original: &str) -> String {
    format!("REV-{original}")
}

impl PostingEngine {
    /// Posts the exact negation of a posted entry, linked back to it. The
    /// original entry is left untouched.
    pub async fn reverse_entry(
        &self,
        entry_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let original = self
            .ledger
            .find_entry(entry_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::JournalEntry, entry_id))?;

        if original.reverses_entry_id.is_some() {
            warn!(
                entry_id = %entry_id,
                "attempt to reverse an entry that is itself a reversal"
            );
            return Err(PostingError::UnsupportedOperation(format!(
                "journal {} is a reversal and cannot be reversed",
                original.reference
            )));
        }

        let reference = reversal_reference(&original.reference);
        if let Some(done) = self.existing(original.company_id, &reference).await? {
            return Ok(done);
        }

        let now = self.clock.now();
        let mut draft = JournalDraft::new(original.company_id, original.tenant_id, reference, now)
            .created_by(user_id)
            .currency(original.currency_id.clone())
            .source(SourceLink::Reversal(original.id))
            .reverses(original.id);

        for line in &original.lines {
            let description = format!("Reversal: {}", line.description);
            // debit and credit swap sides
            draft.debit_partner(line.account_id, line.credit, description.clone(), line.partner_id)?;
            draft.credit_partner(line.account_id, line.debit, description, line.partner_id)?;
        }

        let entry = draft.finish(now)?;
        self.commit(entry, Vec::new()).await
    }
}
