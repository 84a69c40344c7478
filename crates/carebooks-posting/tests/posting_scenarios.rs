mod common;

use carebooks_core::{
    AccountRole, AccountingSettings, DocumentKind, DocumentSource, DocumentStatus, LEDGER_SCALE,
    LedgerStore, PaymentDirection, PaymentMethod, PurchaseInvoice, PurchaseReceipt, ReceiptLine,
    ReceiptLineCharges, StockAdjustment, StockAdjustmentLine, payment_reference,
};
use carebooks_posting::{PostingError, PostingOutcome};
use common::{Harness, USER, money, now};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

fn receipt(harness: &Harness, name: &str, lines: Vec<ReceiptLine>) -> PurchaseReceipt {
    PurchaseReceipt {
        id: Uuid::new_v4(),
        company_id: harness.company_id,
        tenant_id: harness.tenant_id,
        name: name.to_string(),
        supplier_id: Uuid::new_v4(),
        received_at: now(),
        lines,
        status: DocumentStatus::Draft,
    }
}

fn receipt_line(quantity: i64, price: i64, metadata: serde_json::Value) -> ReceiptLine {
    ReceiptLine {
        item_name: "Amoxicillin 250mg".to_string(),
        quantity: money(quantity),
        unit_price: money(price),
        charges: ReceiptLineCharges::from_metadata(&metadata),
    }
}

fn bill(harness: &Harness, number: &str, subtotal: i64, tax: i64) -> PurchaseInvoice {
    PurchaseInvoice {
        id: Uuid::new_v4(),
        company_id: harness.company_id,
        tenant_id: harness.tenant_id,
        number: number.to_string(),
        supplier_id: Uuid::new_v4(),
        invoice_date: now(),
        subtotal: money(subtotal),
        tax_total: money(tax),
        grand_total: money(subtotal + tax),
        status: DocumentStatus::Draft,
    }
}

fn adjustment(harness: &Harness, number: &str, lines: &[(i64, i64)]) -> StockAdjustment {
    StockAdjustment {
        id: Uuid::new_v4(),
        company_id: harness.company_id,
        tenant_id: harness.tenant_id,
        number: number.to_string(),
        adjusted_at: now(),
        lines: lines
            .iter()
            .map(|(diff_qty, unit_cost)| StockAdjustmentLine {
                item_name: "Gauze roll".to_string(),
                diff_qty: money(*diff_qty),
                unit_cost: money(*unit_cost),
            })
            .collect(),
        status: DocumentStatus::Draft,
    }
}

#[tokio::test]
async fn sales_invoice_with_cash_payment_posts_accrual_and_receipt() {
    let harness = Harness::new();
    let mut invoice = harness.invoice("INV-0001", &[("Consultation", 90), ("X-ray", 200)], 29, 300);
    let payment = harness.payment(300, PaymentMethod::Cash, PaymentDirection::Inbound);
    let payment_id = payment.id;
    invoice.payments.push(payment);
    let invoice_id = invoice.id;
    harness.store.put_sales_invoice(invoice).await;

    let result = harness
        .engine
        .post_sales_invoice(invoice_id, USER)
        .await
        .unwrap();
    assert!(result.accrual_posted());
    assert_eq!(result.payments_posted(), 1);

    let accrual = harness.entry("INV-0001").await;
    assert!(accrual.is_balanced());
    assert_eq!(harness.sides(&accrual, "1200").await, (money(300), Decimal::ZERO));
    assert_eq!(harness.sides(&accrual, "2200").await, (Decimal::ZERO, money(29)));
    // line revenue of 290 plus an adjustment debit absorbing the 19 the header total lacks
    assert_eq!(harness.sides(&accrual, "4000").await, (money(19), money(290)));
    assert!(
        accrual
            .lines
            .iter()
            .any(|line| line.description == "Invoice-level adjustment" && line.debit == money(19))
    );

    let receipt = harness.entry(&payment_reference(payment_id)).await;
    assert_eq!(harness.sides(&receipt, "1000").await, (money(300), Decimal::ZERO));
    assert_eq!(harness.sides(&receipt, "1200").await, (Decimal::ZERO, money(300)));
    assert_eq!(receipt.date, now());

    let stored = harness.store.sales_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Posted);
    assert_eq!(stored.payments[0].journal_entry_id, Some(receipt.id));
}

#[tokio::test]
async fn reposting_a_sales_invoice_changes_nothing() {
    let harness = Harness::new();
    let mut invoice = harness.invoice("INV-0002", &[("Consultation", 90), ("X-ray", 200)], 29, 300);
    invoice
        .payments
        .push(harness.payment(300, PaymentMethod::Cash, PaymentDirection::Inbound));
    let invoice_id = invoice.id;
    harness.store.put_sales_invoice(invoice).await;

    harness.engine.post_sales_invoice(invoice_id, USER).await.unwrap();
    let before = harness.entries().await;

    let again = harness
        .engine
        .post_sales_invoice(invoice_id, USER)
        .await
        .unwrap();
    assert!(matches!(again.accrual, PostingOutcome::AlreadyPosted { .. }));
    assert!(matches!(again.payments[0], PostingOutcome::AlreadyPosted { .. }));
    assert_eq!(harness.entries().await, before);
}

#[tokio::test]
async fn payments_arriving_later_are_picked_up_on_repost() {
    let harness = Harness::new();
    let invoice = harness.invoice("INV-0003", &[("Lab panel", 500)], 0, 500);
    let invoice_id = invoice.id;
    harness.store.put_sales_invoice(invoice).await;
    harness.engine.post_sales_invoice(invoice_id, USER).await.unwrap();

    let mut card = harness.payment(200, PaymentMethod::Card, PaymentDirection::Inbound);
    card.invoice_id = Some(invoice_id);
    let card_ref = payment_reference(card.id);
    harness.store.put_payment(card).await;

    let result = harness
        .engine
        .post_sales_invoice(invoice_id, USER)
        .await
        .unwrap();
    assert!(!result.accrual_posted());
    assert_eq!(result.payments_posted(), 1);

    let entry = harness.entry(&card_ref).await;
    assert_eq!(harness.sides(&entry, "1100").await, (money(200), Decimal::ZERO));
}

#[tokio::test]
async fn unmapped_output_tax_folds_tax_into_sales() {
    let harness = Harness::new();
    let sales = Uuid::new_v4();
    let receivable = Uuid::new_v4();
    let mut settings = AccountingSettings::unmapped(harness.company_id, harness.tenant_id);
    settings.assign(AccountRole::Sales, sales);
    settings.assign(AccountRole::Receivable, receivable);
    harness.store.insert_settings(settings).await.unwrap();

    let invoice = harness.invoice("INV-0004", &[("Dressing", 100)], 18, 118);
    let invoice_id = invoice.id;
    harness.store.put_sales_invoice(invoice).await;

    harness.engine.post_sales_invoice(invoice_id, USER).await.unwrap();

    let entry = harness.entry("INV-0004").await;
    assert!(entry.is_balanced());
    let sales_credit: Decimal = entry
        .lines
        .iter()
        .filter(|line| line.account_id == sales)
        .map(|line| line.credit - line.debit)
        .sum();
    assert_eq!(sales_credit, money(118));
}

#[tokio::test]
async fn purchase_receipt_books_inventory_and_input_tax() {
    let harness = Harness::new();
    let doc = receipt(
        &harness,
        "GRN-0001",
        vec![receipt_line(10, 5, json!({"taxAmount": 5, "discountAmt": 0}))],
    );
    let receipt_id = doc.id;
    assert_eq!(doc.totals().taxable, money(50));
    assert_eq!(doc.totals().total, money(55));
    harness.store.put_purchase_receipt(doc).await;

    let outcome = harness
        .engine
        .post_purchase_receipt(receipt_id, USER)
        .await
        .unwrap();
    assert!(outcome.is_posted());

    let entry = harness.entry("GRN-0001").await;
    assert_eq!(harness.sides(&entry, "1400").await, (money(50), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "2210").await, (money(5), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "2000").await, (Decimal::ZERO, money(55)));

    let stored = harness.store.purchase_receipt(receipt_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Received);
}

#[tokio::test]
async fn purchase_receipt_reads_snake_case_discounts() {
    let harness = Harness::new();
    let doc = receipt(
        &harness,
        "GRN-0002",
        vec![receipt_line(
            4,
            25,
            json!({"tax_amount": "9", "discount_amount": "10", "scheme_discount": 0}),
        )],
    );
    let receipt_id = doc.id;
    harness.store.put_purchase_receipt(doc).await;

    harness.engine.post_purchase_receipt(receipt_id, USER).await.unwrap();

    let entry = harness.entry("GRN-0002").await;
    assert_eq!(harness.sides(&entry, "1400").await, (money(90), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "2000").await, (Decimal::ZERO, money(99)));
}

#[tokio::test]
async fn zero_value_receipt_is_marked_received_without_a_journal() {
    let harness = Harness::new();
    let doc = receipt(
        &harness,
        "GRN-0003",
        vec![receipt_line(3, 10, json!({"discountAmount": 30}))],
    );
    let receipt_id = doc.id;
    harness.store.put_purchase_receipt(doc).await;

    let outcome = harness
        .engine
        .post_purchase_receipt(receipt_id, USER)
        .await
        .unwrap();

    assert!(matches!(outcome, PostingOutcome::NothingToPost { .. }));
    assert_eq!(harness.store.entry_count().await, 0);
    let stored = harness.store.purchase_receipt(receipt_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Received);
}

#[tokio::test]
async fn receipt_with_tax_fails_when_input_tax_is_unmapped() {
    let harness = Harness::new();
    let mut settings = AccountingSettings::unmapped(harness.company_id, harness.tenant_id);
    settings.assign(AccountRole::InventoryAsset, Uuid::new_v4());
    settings.assign(AccountRole::Payable, Uuid::new_v4());
    harness.store.insert_settings(settings).await.unwrap();

    let doc = receipt(
        &harness,
        "GRN-0004",
        vec![receipt_line(2, 40, json!({"taxAmount": 4}))],
    );
    let receipt_id = doc.id;
    harness.store.put_purchase_receipt(doc).await;

    let err = harness
        .engine
        .post_purchase_receipt(receipt_id, USER)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PostingError::ConfigurationMissing(AccountRole::InputTax)
    ));
    assert_eq!(harness.store.entry_count().await, 0);
    let stored = harness.store.purchase_receipt(receipt_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Draft);
}

#[tokio::test]
async fn purchase_invoice_credits_supplier_payable() {
    let harness = Harness::new();
    let doc = bill(&harness, "PINV-0001", 1000, 120);
    let (bill_id, supplier_id) = (doc.id, doc.supplier_id);
    harness.store.put_purchase_invoice(doc).await;

    harness.engine.post_purchase_invoice(bill_id, USER).await.unwrap();

    let entry = harness.entry("PINV-0001").await;
    assert_eq!(harness.sides(&entry, "5000").await, (money(1000), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "2210").await, (money(120), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "2000").await, (Decimal::ZERO, money(1120)));
    let payable_line = entry.lines.iter().find(|line| line.credit > Decimal::ZERO).unwrap();
    assert_eq!(payable_line.partner_id, Some(supplier_id));

    let stored = harness.store.purchase_invoice(bill_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Posted);
}

#[tokio::test]
async fn reposting_a_purchase_invoice_changes_nothing() {
    let harness = Harness::new();
    let doc = bill(&harness, "PINV-0002", 400, 48);
    let bill_id = doc.id;
    harness.store.put_purchase_invoice(doc).await;

    let first = harness.engine.post_purchase_invoice(bill_id, USER).await.unwrap();
    let second = harness.engine.post_purchase_invoice(bill_id, USER).await.unwrap();

    assert!(first.is_posted());
    assert_eq!(
        second,
        PostingOutcome::AlreadyPosted {
            reference: "PINV-0002".to_string()
        }
    );
    assert_eq!(harness.store.entry_count().await, 1);
}

#[tokio::test]
async fn purchase_invoice_with_tax_fails_when_input_tax_is_unmapped() {
    let harness = Harness::new();
    let mut settings = AccountingSettings::unmapped(harness.company_id, harness.tenant_id);
    settings.assign(AccountRole::Purchase, Uuid::new_v4());
    settings.assign(AccountRole::Payable, Uuid::new_v4());
    harness.store.insert_settings(settings).await.unwrap();

    let doc = bill(&harness, "PINV-0003", 250, 30);
    let bill_id = doc.id;
    harness.store.put_purchase_invoice(doc).await;

    let err = harness
        .engine
        .post_purchase_invoice(bill_id, USER)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PostingError::ConfigurationMissing(AccountRole::InputTax)
    ));
    assert_eq!(harness.store.entry_count().await, 0);
    let stored = harness.store.purchase_invoice(bill_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Draft);
}

#[tokio::test]
async fn fractional_receipt_amounts_balance_at_ledger_scale() {
    let harness = Harness::new();
    let doc = receipt(
        &harness,
        "GRN-0005",
        vec![ReceiptLine {
            item_name: "Suture kit".to_string(),
            quantity: Decimal::new(25, 1),
            unit_price: Decimal::new(100001, 4),
            charges: ReceiptLineCharges::from_metadata(&json!({"taxAmount": "4.50005"})),
        }],
    );
    let receipt_id = doc.id;
    harness.store.put_purchase_receipt(doc).await;

    harness.engine.post_purchase_receipt(receipt_id, USER).await.unwrap();

    let entry = harness.entry("GRN-0005").await;
    assert_eq!(
        harness.sides(&entry, "1400").await,
        (Decimal::new(250003, 4), Decimal::ZERO)
    );
    assert_eq!(
        harness.sides(&entry, "2210").await,
        (Decimal::new(45001, 4), Decimal::ZERO)
    );
    assert_eq!(
        harness.sides(&entry, "2000").await,
        (Decimal::ZERO, Decimal::new(295004, 4))
    );
    let stored_net: Decimal = entry
        .lines
        .iter()
        .map(|line| line.debit.round_dp(LEDGER_SCALE) - line.credit.round_dp(LEDGER_SCALE))
        .sum();
    assert!(stored_net.is_zero());
}

#[tokio::test]
async fn stock_loss_moves_value_from_inventory_to_purchases() {
    let harness = Harness::new();
    let doc = adjustment(&harness, "ADJ-0001", &[(-3, 20)]);
    let doc_id = doc.id;
    assert_eq!(doc.net_value(), money(-60));
    harness.store.put_stock_adjustment(doc).await;

    harness.engine.post_stock_adjustment(doc_id, USER).await.unwrap();

    let entry = harness.entry("ADJ-0001").await;
    assert_eq!(harness.sides(&entry, "5000").await, (money(60), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "1400").await, (Decimal::ZERO, money(60)));
}

#[tokio::test]
async fn stock_gain_debits_inventory() {
    let harness = Harness::new();
    let doc = adjustment(&harness, "ADJ-0002", &[(5, 12), (-1, 10)]);
    let doc_id = doc.id;
    harness.store.put_stock_adjustment(doc).await;

    harness.engine.post_stock_adjustment(doc_id, USER).await.unwrap();

    let entry = harness.entry("ADJ-0002").await;
    assert_eq!(harness.sides(&entry, "1400").await, (money(50), Decimal::ZERO));
    assert_eq!(harness.sides(&entry, "5000").await, (Decimal::ZERO, money(50)));
}

#[tokio::test]
async fn zero_net_adjustment_is_posted_without_a_journal() {
    let harness = Harness::new();
    let doc = adjustment(&harness, "ADJ-0003", &[(2, 10), (-4, 5)]);
    let doc_id = doc.id;
    harness.store.put_stock_adjustment(doc).await;

    let outcome = harness
        .engine
        .post_stock_adjustment(doc_id, USER)
        .await
        .unwrap();

    assert!(matches!(outcome, PostingOutcome::NothingToPost { .. }));
    assert_eq!(harness.store.entry_count().await, 0);
    let stored = harness.store.stock_adjustment(doc_id).await.unwrap().unwrap();
    assert_eq!(stored.status, DocumentStatus::Posted);
}

#[tokio::test]
async fn unknown_documents_are_reported_not_found() {
    let harness = Harness::new();
    let missing = Uuid::new_v4();

    let err = harness
        .engine
        .post_purchase_receipt(missing, USER)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PostingError::EntityNotFound {
            kind: DocumentKind::PurchaseReceipt,
            ..
        }
    ));

    let err = harness
        .engine
        .post_sales_invoice(missing, USER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "entity_not_found");
}

#[tokio::test]
async fn concurrent_posts_of_one_document_create_one_entry() {
    let harness = Harness::provisioned().await;
    let doc = adjustment(&harness, "ADJ-0004", &[(-1, 75)]);
    let doc_id = doc.id;
    harness.store.put_stock_adjustment(doc).await;

    let (first, second) = tokio::join!(
        harness.engine.post_stock_adjustment(doc_id, USER),
        harness.engine.post_stock_adjustment(doc_id, USER),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_posted()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, PostingOutcome::AlreadyPosted { .. }))
    );
    assert_eq!(harness.store.entry_count().await, 1);
}

#[tokio::test]
async fn every_posted_entry_balances() {
    let harness = Harness::new();

    let mut invoice = harness.invoice("INV-0100", &[("Consultation", 450), ("Injection", 75)], 25, 550);
    invoice
        .payments
        .push(harness.payment(250, PaymentMethod::Cash, PaymentDirection::Inbound));
    invoice
        .payments
        .push(harness.payment(300, PaymentMethod::BankTransfer, PaymentDirection::Inbound));
    let invoice_id = invoice.id;
    harness.store.put_sales_invoice(invoice).await;
    harness.engine.post_sales_invoice(invoice_id, USER).await.unwrap();

    let grn = receipt(
        &harness,
        "GRN-0100",
        vec![
            receipt_line(20, 7, json!({"taxAmount": "7.5", "discountAmt": "4"})),
            receipt_line(1, 99, json!({"schemeDiscountAmount": 9})),
        ],
    );
    let grn_id = grn.id;
    harness.store.put_purchase_receipt(grn).await;
    harness.engine.post_purchase_receipt(grn_id, USER).await.unwrap();

    let adj = adjustment(&harness, "ADJ-0100", &[(-2, 33)]);
    let adj_id = adj.id;
    harness.store.put_stock_adjustment(adj).await;
    harness.engine.post_stock_adjustment(adj_id, USER).await.unwrap();

    let entries = harness.entries().await;
    assert_eq!(entries.len(), 5);
    for entry in entries {
        assert!(entry.is_balanced(), "{} is unbalanced", entry.reference);
        assert_eq!(entry.amount_in_company_currency, entry.total_debit());
        assert!(entry.lines.iter().all(|line| line.debit >= Decimal::ZERO && line.credit >= Decimal::ZERO));
        assert_eq!(entry.created_by, USER);
    }
}
