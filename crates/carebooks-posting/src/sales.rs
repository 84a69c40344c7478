use carebooks_core::{
    AccountRole, AccountingSettings, DocumentKind, DocumentStatus, DocumentTransition,
    JournalDraft, Payment, SalesInvoice, SourceLink, payment_reference,
};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::{PostingOutcome, SalesInvoicePosting};

impl PostingEngine {
    /// Posts the invoice accrual and every payment recorded against it.
    /// Each part is committed on its own and skipped when already in the
    /// ledger, so the call can be repeated as payments arrive.
    pub async fn post_sales_invoice(
        &self,
        invoice_id: Uuid,
        user_id: &str,
    ) -> PostingResult<SalesInvoicePosting> {
        let invoice = self
            .documents
            .sales_invoice(invoice_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::SalesInvoice, invoice_id))?;
        let settings = self
            .settings_for(invoice.company_id, invoice.tenant_id)
            .await?;

        let accrual = self.post_invoice_accrual(&invoice, &settings, user_id).await?;

        let mut payments = Vec::with_capacity(invoice.payments.len());
        for payment in &invoice.payments {
            payments.push(
                self.post_invoice_payment(&invoice, payment, &settings, user_id)
                    .await?,
            );
        }

        Ok(SalesInvoicePosting { accrual, payments })
    }

    async fn post_invoice_accrual(
        &self,
        invoice: &SalesInvoice,
        settings: &AccountingSettings,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        if let Some(done) = self.existing(invoice.company_id, &invoice.number).await? {
            return Ok(done);
        }

        let receivable = settings
            .account_for(AccountRole::Receivable)
            .ok_or(PostingError::ConfigurationMissing(AccountRole::Receivable))?;
        let sales = settings
            .account_for(AccountRole::Sales)
            .ok_or(PostingError::ConfigurationMissing(AccountRole::Sales))?;

        let mut draft = JournalDraft::new(
            invoice.company_id,
            invoice.tenant_id,
            &invoice.number,
            invoice.issued_at,
        )
        .created_by(user_id)
        .currency(invoice.currency_id.clone())
        .source(SourceLink::SalesInvoice(invoice.id));

        // all revenue lands on the default sales account regardless of line category
        for line in invoice.lines.iter().filter(|l| l.net_amount > Decimal::ZERO) {
            draft.credit(sales, line.net_amount, &line.description)?;
        }

        if invoice.tax_total > Decimal::ZERO {
            match settings.account_for(AccountRole::OutputTax) {
                Some(output_tax) => {
                    draft.credit(output_tax, invoice.tax_total, "Output tax")?;
                }
                None => warn!(
                    company_id = %invoice.company_id,
                    invoice = %invoice.number,
                    "output tax account unmapped, tax folded into sales"
                ),
            }
        }

        draft.debit_partner(
            receivable,
            invoice.grand_total,
            format!("Invoice {}", invoice.number),
            invoice.patient_id,
        )?;

        let residual = draft.settle_residual(sales, "Invoice-level adjustment")?;
        if !residual.is_zero() {
            warn!(
                company_id = %invoice.company_id,
                invoice = %invoice.number,
                residual = %residual,
                "invoice total differs from its lines, adjustment booked to sales"
            );
        }

        if draft.is_empty() {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("invoice {} has no value to post", invoice.number),
            });
        }

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::SetStatus {
                kind: DocumentKind::SalesInvoice,
                id: invoice.id,
                status: DocumentStatus::Posted,
            }],
        )
        .await
    }

    async fn post_invoice_payment(
        &self,
        invoice: &SalesInvoice,
        payment: &Payment,
        settings: &AccountingSettings,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let reference = payment_reference(payment.id);
        if payment.journal_entry_id.is_some() {
            return Ok(PostingOutcome::AlreadyPosted { reference });
        }
        if let Some(done) = self.existing(invoice.company_id, &reference).await? {
            return Ok(done);
        }
        if payment.amount <= Decimal::ZERO {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("payment {} has no positive amount", payment.id),
            });
        }

        let receivable = settings
            .account_for(AccountRole::Receivable)
            .ok_or(PostingError::ConfigurationMissing(AccountRole::Receivable))?;
        let money = self.money_account(settings, payment.method).await?;

        let now = self.clock.now();
        let mut draft = JournalDraft::new(invoice.company_id, invoice.tenant_id, reference, now)
            .created_by(user_id)
            .currency(invoice.currency_id.clone())
            .source(SourceLink::Payment(payment.id));
        draft.debit(
            money,
            payment.amount,
            format!("Payment received for {}", invoice.number),
        )?;
        draft.credit_partner(
            receivable,
            payment.amount,
            format!("Settlement of {}", invoice.number),
            invoice.patient_id,
        )?;

        let entry = draft.finish(now)?;
        self.commit(
            entry,
            vec![DocumentTransition::LinkPayment {
                payment_id: payment.id,
            }],
        )
        .await
    }
}
