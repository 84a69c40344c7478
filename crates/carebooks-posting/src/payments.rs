use carebooks_core::{
    AccountRole, DocumentKind, DocumentTransition, JournalDraft, PaymentDirection, SourceLink,
    payment_reference,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::PostingOutcome;

impl PostingEngine {
    /// Posts a standalone payment. Payments with account allocations are
    /// direct disbursements; otherwise the direction picks a customer
    /// receipt or a vendor payment.
    pub async fn post_payment_entry(
        &self,
        payment_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let payment = self
            .documents
            .payment(payment_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::Payment, payment_id))?;

        let reference = payment_reference(payment.id);
        if payment.journal_entry_id.is_some() {
            return Ok(PostingOutcome::AlreadyPosted { reference });
        }

        let settings = self
            .settings_for(payment.company_id, payment.tenant_id)
            .await?;
        let money = self.money_account(&settings, payment.method).await?;

        let mut draft = JournalDraft::new(
            payment.company_id,
            payment.tenant_id,
            reference,
            payment.paid_at,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::Payment(payment.id));

        if !payment.allocations.is_empty() {
            let mut disbursed = Decimal::ZERO;
            for allocation in payment.allocations.iter().filter(|a| a.amount > Decimal::ZERO) {
                let description = allocation
                    .description
                    .clone()
                    .unwrap_or_else(|| "Direct expense".to_string());
                draft.debit(allocation.account_id, allocation.amount, description)?;
                disbursed += allocation.amount;
            }
            draft.credit(money, disbursed, "Direct payment")?;
        } else if payment.amount > Decimal::ZERO {
            match payment.direction {
                PaymentDirection::Inbound => {
                    let receivable = self.account(&settings, AccountRole::Receivable).await?;
                    draft.debit(money, payment.amount, "Payment received")?;
                    draft.credit_partner(
                        receivable,
                        payment.amount,
                        "Customer receipt",
                        payment.party_id,
                    )?;
                }
                PaymentDirection::Outbound => {
                    let payable = self.account(&settings, AccountRole::Payable).await?;
                    draft.debit_partner(
                        payable,
                        payment.amount,
                        "Vendor payment",
                        payment.party_id,
                    )?;
                    draft.credit(money, payment.amount, "Payment made")?;
                }
            }
        }

        if draft.is_empty() {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("payment {} has no positive amount", payment.id),
            });
        }

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::LinkPayment {
                payment_id: payment.id,
            }],
        )
        .await
    }
}
