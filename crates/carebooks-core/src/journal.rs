use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Decimal places every ledger amount is stored with.
pub const LEDGER_SCALE: u32 = 4;

/// Rounds `amount` to the ledger scale, halves away from zero.
pub fn to_ledger_scale(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Source document a journal entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceLink {
    SalesInvoice(Uuid),
    Payment(Uuid),
    PurchaseInvoice(Uuid),
    PurchaseReceipt(Uuid),
    PurchaseReturn(Uuid),
    SalesReturn(Uuid),
    StockAdjustment(Uuid),
    OpeningBalance(Uuid),
    Reversal(Uuid),
}

impl SourceLink {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SalesInvoice(_) => "sales_invoice",
            Self::Payment(_) => "payment",
            Self::PurchaseInvoice(_) => "purchase_invoice",
            Self::PurchaseReceipt(_) => "purchase_receipt",
            Self::PurchaseReturn(_) => "purchase_return",
            Self::SalesReturn(_) => "sales_return",
            Self::StockAdjustment(_) => "stock_adjustment",
            Self::OpeningBalance(_) => "opening_balance",
            Self::Reversal(_) => "reversal",
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            Self::SalesInvoice(id)
            | Self::Payment(id)
            | Self::PurchaseInvoice(id)
            | Self::PurchaseReceipt(id)
            | Self::PurchaseReturn(id)
            | Self::SalesReturn(id)
            | Self::StockAdjustment(id)
            | Self::OpeningBalance(id)
            | Self::Reversal(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        let link = match kind {
            "sales_invoice" => Self::SalesInvoice(id),
            "payment" => Self::Payment(id),
            "purchase_invoice" => Self::PurchaseInvoice(id),
            "purchase_receipt" => Self::PurchaseReceipt(id),
            "purchase_return" => Self::PurchaseReturn(id),
            "sales_return" => Self::SalesReturn(id),
            "stock_adjustment" => Self::StockAdjustment(id),
            "opening_balance" => Self::OpeningBalance(id),
            "reversal" => Self::Reversal(id),
            _ => return None,
        };
        Some(link)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub id: Uuid,
    pub journal_entry_id: Uuid,
    pub company_id: Uuid,
    pub account_id: Uuid,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,
    pub partner_id: Option<Uuid>,
}

impl JournalEntryLine {
    /// Signed movement, debit minus credit.
    pub fn net_debit(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// A posted, balanced journal entry. Entries are only ever produced by
/// [`JournalDraft::finish`] and are never edited once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub tenant_id: Uuid,
    pub date: DateTime<Utc>,
    pub posted: bool,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub currency_id: Option<String>,
    pub amount_in_company_currency: Decimal,
    pub reference: String,
    pub source: Option<SourceLink>,
    pub reverses_entry_id: Option<Uuid>,
    pub lines: Vec<JournalEntryLine>,
}

impl JournalEntry {
    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|line| line.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|line| line.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }

    pub fn touches(&self, account_id: Uuid) -> bool {
        self.lines.iter().any(|line| line.account_id == account_id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("journal {reference} is unbalanced: debits {debits} != credits {credits}")]
    Unbalanced {
        reference: String,
        debits: Decimal,
        credits: Decimal,
    },

    #[error("journal {0} has no lines")]
    EmptyEntry(String),

    #[error("journal {reference}: negative amount {amount} for {description}")]
    NegativeAmount {
        reference: String,
        amount: Decimal,
        description: String,
    },
}

#[derive(Debug, Clone)]
struct DraftLine {
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
    description: String,
    partner_id: Option<Uuid>,
}

/// Accumulates lines for one journal entry and refuses to produce an
/// unbalanced result.
#[derive(Debug, Clone)]
pub struct JournalDraft {
    company_id: Uuid,
    tenant_id: Uuid,
    reference: String,
    date: DateTime<Utc>,
    created_by: String,
    currency_id: Option<String>,
    source: Option<SourceLink>,
    reverses_entry_id: Option<Uuid>,
    lines: Vec<DraftLine>,
}

impl JournalDraft {
    pub fn new(
        company_id: Uuid,
        tenant_id: Uuid,
        reference: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            company_id,
            tenant_id,
            reference: reference.into(),
            date,
            created_by: String::new(),
            currency_id: None,
            source: None,
            reverses_entry_id: None,
            lines: Vec::new(),
        }
    }

    pub fn created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = user_id.into();
        self
    }

    pub fn currency(mut self, currency_id: Option<String>) -> Self {
        self.currency_id = currency_id;
        self
    }

    pub fn source(mut self, source: SourceLink) -> Self {
        self.source = Some(source);
        self
    }

    pub fn reverses(mut self, entry_id: Uuid) -> Self {
        self.reverses_entry_id = Some(entry_id);
        self
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn debit(
        &mut self,
        account_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<&mut Self, LedgerError> {
        self.push(account_id, amount, Decimal::ZERO, description.into(), None)
    }

    pub fn credit(
        &mut self,
        account_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<&mut Self, LedgerError> {
        self.push(account_id, Decimal::ZERO, amount, description.into(), None)
    }

    pub fn debit_partner(
        &mut self,
        account_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        partner_id: Option<Uuid>,
    ) -> Result<&mut Self, LedgerError> {
        self.push(account_id, amount, Decimal::ZERO, description.into(), partner_id)
    }

    pub fn credit_partner(
        &mut self,
        account_id: Uuid,
        amount: Decimal,
        description: impl Into<String>,
        partner_id: Option<Uuid>,
    ) -> Result<&mut Self, LedgerError> {
        self.push(account_id, Decimal::ZERO, amount, description.into(), partner_id)
    }

    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|line| line.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|line| line.credit).sum()
    }

    /// Books whatever keeps the draft from balancing against `account_id`
    /// and returns the signed residual (positive when a credit was added).
    pub fn settle_residual(
        &mut self,
        account_id: Uuid,
        description: impl Into<String>,
    ) -> Result<Decimal, LedgerError> {
        let residual = self.total_debit() - self.total_credit();
        if residual > Decimal::ZERO {
            self.credit(account_id, residual, description)?;
        } else if residual < Decimal::ZERO {
            self.debit(account_id, -residual, description)?;
        }
        Ok(residual)
    }

    pub fn finish(self, posted_at: DateTime<Utc>) -> Result<JournalEntry, LedgerError> {
        if self.lines.is_empty() {
            return Err(LedgerError::EmptyEntry(self.reference));
        }

        let debits = self.total_debit();
        let credits = self.total_credit();
        if debits != credits {
            return Err(LedgerError::Unbalanced {
                reference: self.reference,
                debits,
                credits,
            });
        }

        let entry_id = Uuid::new_v4();
        let lines = self
            .lines
            .into_iter()
            .map(|line| JournalEntryLine {
                id: Uuid::new_v4(),
                journal_entry_id: entry_id,
                company_id: self.company_id,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                description: line.description,
                partner_id: line.partner_id,
            })
            .collect();

        Ok(JournalEntry {
            id: entry_id,
            company_id: self.company_id,
            tenant_id: self.tenant_id,
            date: self.date,
            posted: true,
            posted_at: Some(posted_at),
            created_by: self.created_by,
            currency_id: self.currency_id,
            amount_in_company_currency: debits,
            reference: self.reference,
            source: self.source,
            reverses_entry_id: self.reverses_entry_id,
            lines,
        })
    }

    fn push(
        &mut self,
        account_id: Uuid,
        debit: Decimal,
        credit: Decimal,
        description: String,
        partner_id: Option<Uuid>,
    ) -> Result<&mut Self, LedgerError> {
        let (debit, credit) = (to_ledger_scale(debit), to_ledger_scale(credit));
        let amount = debit + credit;
        if debit < Decimal::ZERO || credit < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount {
                reference: self.reference.clone(),
                amount: if debit < Decimal::ZERO { debit } else { credit },
                description,
            });
        }
        // zero lines carry no information and would break the one-sided convention
        if amount.is_zero() {
            return Ok(self);
        }

        self.lines.push(DraftLine {
            account_id,
            debit,
            credit,
            description,
            partner_id,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> JournalDraft {
        JournalDraft::new(Uuid::new_v4(), Uuid::new_v4(), "INV-1", Utc::now()).created_by("tester")
    }

    #[test]
    fn finish_rejects_unbalanced_lines() {
        let mut draft = draft();
        draft.debit(Uuid::new_v4(), Decimal::from(100), "receivable").unwrap();
        draft.credit(Uuid::new_v4(), Decimal::from(90), "sales").unwrap();

        let err = draft.finish(Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Unbalanced { .. }));
    }

    #[test]
    fn finish_rejects_empty_draft() {
        let err = draft().finish(Utc::now()).unwrap_err();
        assert_eq!(err, LedgerError::EmptyEntry("INV-1".to_string()));
    }

    #[test]
    fn zero_lines_are_dropped_and_negative_lines_rejected() {
        let mut draft = draft();
        draft.debit(Uuid::new_v4(), Decimal::ZERO, "nothing").unwrap();
        assert!(draft.is_empty());

        let err = draft.credit(Uuid::new_v4(), Decimal::from(-5), "bad").unwrap_err();
        assert!(matches!(err, LedgerError::NegativeAmount { .. }));
    }

    #[test]
    fn settle_residual_books_the_difference() {
        let sales = Uuid::new_v4();
        let mut draft = draft();
        draft.debit(Uuid::new_v4(), Decimal::from(300), "receivable").unwrap();
        draft.credit(sales, Decimal::from(319), "sales").unwrap();

        let residual = draft.settle_residual(sales, "adjustment").unwrap();
        assert_eq!(residual, Decimal::from(-19));

        let entry = draft.finish(Utc::now()).unwrap();
        assert!(entry.is_balanced());
        assert_eq!(entry.amount_in_company_currency, Decimal::from(319));
        assert!(entry.lines.iter().all(|line| line.journal_entry_id == entry.id));
        assert!(
            entry
                .lines
                .iter()
                .all(|line| line.debit.is_zero() != line.credit.is_zero())
        );
    }

    #[test]
    fn amounts_are_rounded_to_the_ledger_scale_before_balancing() {
        let purchase = Uuid::new_v4();
        let mut draft = draft();
        draft
            .debit(Uuid::new_v4(), Decimal::new(2500025, 5), "taxable")
            .unwrap();
        draft
            .debit(Uuid::new_v4(), Decimal::new(450005, 5), "input tax")
            .unwrap();
        draft
            .credit(Uuid::new_v4(), Decimal::new(2950030, 5), "payable")
            .unwrap();

        let residual = draft.settle_residual(purchase, "adjustment").unwrap();
        assert_eq!(residual, Decimal::new(1, 4));

        let entry = draft.finish(Utc::now()).unwrap();
        assert!(entry.is_balanced());
        assert!(
            entry
                .lines
                .iter()
                .all(|line| line.debit.scale() <= LEDGER_SCALE && line.credit.scale() <= LEDGER_SCALE)
        );
        let stored: Decimal = entry
            .lines
            .iter()
            .map(|line| line.debit.round_dp(LEDGER_SCALE) - line.credit.round_dp(LEDGER_SCALE))
            .sum();
        assert!(stored.is_zero());
    }

    #[test]
    fn source_link_round_trips_through_parts() {
        let id = Uuid::new_v4();
        let link = SourceLink::PurchaseReceipt(id);
        assert_eq!(SourceLink::from_parts(link.kind(), link.id()), Some(link));
        assert_eq!(SourceLink::from_parts("unknown", id), None);
    }
}
