use carebooks_core::{
    AccountRole, DocumentKind, DocumentStatus, DocumentTransition, JournalDraft, SourceLink,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::PostingOutcome;

impl PostingEngine {
    pub async fn post_purchase_invoice(
        &self,
        invoice_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let invoice = self
            .documents
            .purchase_invoice(invoice_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::PurchaseInvoice, invoice_id))?;

        if let Some(done) = self.existing(invoice.company_id, &invoice.number).await? {
            return Ok(done);
        }

        let settings = self
            .settings_for(invoice.company_id, invoice.tenant_id)
            .await?;
        let purchase = self.account(&settings, AccountRole::Purchase).await?;
        let payable = self.account(&settings, AccountRole::Payable).await?;

        let mut draft = JournalDraft::new(
            invoice.company_id,
            invoice.tenant_id,
            &invoice.number,
            invoice.invoice_date,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::PurchaseInvoice(invoice.id));

        draft.debit(purchase, invoice.subtotal, "Purchases")?;
        if invoice.tax_total > Decimal::ZERO {
            let input_tax = self.account(&settings, AccountRole::InputTax).await?;
            draft.debit(input_tax, invoice.tax_total, "Input tax")?;
        }
        draft.credit_partner(
            payable,
            invoice.grand_total,
            format!("Supplier bill {}", invoice.number),
            Some(invoice.supplier_id),
        )?;

        let residual = draft.settle_residual(purchase, "Bill-level adjustment")?;
        if !residual.is_zero() {
            warn!(
                company_id = %invoice.company_id,
                bill = %invoice.number,
                residual = %residual,
                "bill total differs from subtotal plus tax, adjustment booked to purchases"
            );
        }

        if draft.is_empty() {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("purchase invoice {} has no value to post", invoice.number),
            });
        }

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::SetStatus {
                kind: DocumentKind::PurchaseInvoice,
                id: invoice.id,
                status: DocumentStatus::Posted,
            }],
        )
        .await
    }

    /// Goods receipt: inventory and input tax against the supplier's payable.
    pub async fn post_purchase_receipt(
        &self,
        receipt_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let receipt = self
            .documents
            .purchase_receipt(receipt_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::PurchaseReceipt, receipt_id))?;

        if let Some(done) = self.existing(receipt.company_id, &receipt.name).await? {
            return Ok(done);
        }

        let totals = receipt.totals();
        if totals.total <= Decimal::ZERO {
            self.ledger
                .apply_transition(DocumentTransition::SetStatus {
                    kind: DocumentKind::PurchaseReceipt,
                    id: receipt.id,
                    status: DocumentStatus::Received,
                })
                .await?;
            info!(
                company_id = %receipt.company_id,
                receipt = %receipt.name,
                "zero-value receipt marked received without a journal"
            );
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("receipt {} has no value to post", receipt.name),
            });
        }

        let settings = self
            .settings_for(receipt.company_id, receipt.tenant_id)
            .await?;
        let inventory = self.account(&settings, AccountRole::InventoryAsset).await?;
        let payable = self.account(&settings, AccountRole::Payable).await?;

        let mut draft = JournalDraft::new(
            receipt.company_id,
            receipt.tenant_id,
            &receipt.name,
            receipt.received_at,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::PurchaseReceipt(receipt.id));

        draft.debit(inventory, totals.taxable, "Stock received")?;
        if totals.tax > Decimal::ZERO {
            let input_tax = self.account(&settings, AccountRole::InputTax).await?;
            draft.debit(input_tax, totals.tax, "Input tax")?;
        }
        draft.credit_partner(
            payable,
            totals.total,
            format!("Goods receipt {}", receipt.name),
            Some(receipt.supplier_id),
        )?;

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::SetStatus {
                kind: DocumentKind::PurchaseReceipt,
                id: receipt.id,
                status: DocumentStatus::Received,
            }],
        )
        .await
    }
}
