use carebooks_core::{
    AccountRole, AccountingSettings, DocumentKind, DocumentStatus, DocumentTransition,
    JournalDraft, SourceLink,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::engine::PostingEngine;
use crate::error::{PostingError, PostingResult};
use crate::outcome::PostingOutcome;

impl PostingEngine {
    /// Debit note to a supplier: reduces the payable and the stock it covered.
    pub async fn post_purchase_return(
        &self,
        return_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let purchase_return = self
            .documents
            .purchase_return(return_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::PurchaseReturn, return_id))?;

        if let Some(done) = self
            .existing(purchase_return.company_id, &purchase_return.number)
            .await?
        {
            return Ok(done);
        }
        if purchase_return.total_amount <= Decimal::ZERO {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("purchase return {} has no value", purchase_return.number),
            });
        }

        let settings = self
            .settings_for(purchase_return.company_id, purchase_return.tenant_id)
            .await?;
        let payable = self.account(&settings, AccountRole::Payable).await?;
        let stock = self.stock_or_purchase_account(&settings).await?;

        let mut draft = JournalDraft::new(
            purchase_return.company_id,
            purchase_return.tenant_id,
            &purchase_return.number,
            purchase_return.return_date,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::PurchaseReturn(purchase_return.id));
        draft.debit_partner(
            payable,
            purchase_return.total_amount,
            format!("Debit note {}", purchase_return.number),
            Some(purchase_return.supplier_id),
        )?;
        draft.credit(stock, purchase_return.total_amount, "Goods returned to supplier")?;

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::SetStatus {
                kind: DocumentKind::PurchaseReturn,
                id: purchase_return.id,
                status: DocumentStatus::Posted,
            }],
        )
        .await
    }

    /// Credit note to a patient: reverses revenue against the receivable.
    pub async fn post_sales_return(
        &self,
        return_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let sales_return = self
            .documents
            .sales_return(return_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::SalesReturn, return_id))?;

        if let Some(done) = self
            .existing(sales_return.company_id, &sales_return.number)
            .await?
        {
            return Ok(done);
        }
        if sales_return.total_amount <= Decimal::ZERO {
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("sales return {} has no value", sales_return.number),
            });
        }

        let settings = self
            .settings_for(sales_return.company_id, sales_return.tenant_id)
            .await?;
        let sales = self.account(&settings, AccountRole::Sales).await?;
        let receivable = self.account(&settings, AccountRole::Receivable).await?;

        let mut draft = JournalDraft::new(
            sales_return.company_id,
            sales_return.tenant_id,
            &sales_return.number,
            sales_return.return_date,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::SalesReturn(sales_return.id));
        draft.debit(sales, sales_return.total_amount, "Sales returned")?;
        draft.credit_partner(
            receivable,
            sales_return.total_amount,
            format!("Credit note {}", sales_return.number),
            sales_return.patient_id,
        )?;

        let entry = draft.finish(self.clock.now())?;
        self.commit(
            entry,
            vec![DocumentTransition::SetStatus {
                kind: DocumentKind::SalesReturn,
                id: sales_return.id,
                status: DocumentStatus::Posted,
            }],
        )
        .await
    }

    /// Books the net value change of a stock count. Gains debit inventory,
    /// losses and wastage credit it; a zero net change posts nothing.
    pub async fn post_stock_adjustment(
        &self,
        adjustment_id: Uuid,
        user_id: &str,
    ) -> PostingResult<PostingOutcome> {
        let adjustment = self
            .documents
            .stock_adjustment(adjustment_id)
            .await?
            .ok_or_else(|| PostingError::not_found(DocumentKind::StockAdjustment, adjustment_id))?;

        if let Some(done) = self
            .existing(adjustment.company_id, &adjustment.number)
            .await?
        {
            return Ok(done);
        }

        let posted = DocumentTransition::SetStatus {
            kind: DocumentKind::StockAdjustment,
            id: adjustment.id,
            status: DocumentStatus::Posted,
        };

        let net_value = adjustment.net_value();
        if net_value.is_zero() {
            self.ledger.apply_transition(posted).await?;
            info!(
                company_id = %adjustment.company_id,
                adjustment = %adjustment.number,
                "stock adjustment nets to zero, no journal posted"
            );
            return Ok(PostingOutcome::NothingToPost {
                reason: format!("stock adjustment {} nets to zero", adjustment.number),
            });
        }

        let settings = self
            .settings_for(adjustment.company_id, adjustment.tenant_id)
            .await?;
        let inventory = self.account(&settings, AccountRole::InventoryAsset).await?;
        let purchase = self.account(&settings, AccountRole::Purchase).await?;

        let mut draft = JournalDraft::new(
            adjustment.company_id,
            adjustment.tenant_id,
            &adjustment.number,
            adjustment.adjusted_at,
        )
        .created_by(user_id)
        .currency(settings.currency_id.clone())
        .source(SourceLink::StockAdjustment(adjustment.id));

        let value = net_value.abs();
        if net_value > Decimal::ZERO {
            draft.debit(inventory, value, "Stock gain")?;
            draft.credit(purchase, value, "Stock gain")?;
        } else {
            draft.debit(purchase, value, "Stock loss")?;
            draft.credit(inventory, value, "Stock loss")?;
        }

        let entry = draft.finish(self.clock.now())?;
        self.commit(entry, vec![posted]).await
    }

    async fn stock_or_purchase_account(
        &self,
        settings: &AccountingSettings,
    ) -> PostingResult<Uuid> {
        match settings.account_for(AccountRole::InventoryAsset) {
            Some(inventory) => Ok(inventory),
            None => self.account(settings, AccountRole::Purchase).await,
        }
    }
}
