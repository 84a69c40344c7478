pub mod accounts;
pub mod documents;
pub mod journal;
pub mod storage;

pub use accounts::{
    Account, AccountRole, AccountTemplate, AccountType, AccountingSettings, ChartTemplate,
    ClinicChart, NewAccount,
};
pub use documents::{
    DocumentKind, DocumentStatus, OpeningBalanceParty, Payment, PaymentAllocation,
    PaymentDirection, PaymentMethod, PurchaseInvoice, PurchaseReceipt, PurchaseReturn,
    ReceiptLine, ReceiptLineCharges, ReceiptTotals, SalesInvoice, SalesInvoiceLine, SalesReturn,
    StockAdjustment, StockAdjustmentLine, Supplier, opening_balance_reference, payment_reference,
};
pub use journal::{
    JournalDraft, JournalEntry, JournalEntryLine, LEDGER_SCALE, LedgerError, SourceLink,
    to_ledger_scale,
};
pub use storage::{
    Clock, CommitOutcome, DocumentSource, DocumentTransition, FixedClock, LedgerStore,
    LedgerWindow, PostingBatch, StoreError, SystemClock,
};
