//! End-to-end tests for the sale transaction engine against a real SQLite
//! file (WAL needs a file; `:memory:` cannot serve concurrent writers).

use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use caja_core::{
    CoreError, CreateSaleRequest, MovementKind, PaymentMethod, Product, ReturnLineRequest,
    SaleLineRequest, SaleStatus,
};
use caja_db::ledger::MovementFilter;
use caja_db::{repository, sequence, AuditEvent, AuditSink, Database, DbConfig, LedgerError, SaleEngine};

// =============================================================================
// Harness
// =============================================================================

async fn test_db() -> Database {
    let path = std::env::temp_dir().join(format!("caja-test-{}.db", Uuid::new_v4()));
    Database::new(DbConfig::new(path)).await.unwrap()
}

async fn seed_product(db: &Database, sku: &str, price_cents: i64, tax_bps: i64, stock: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        sale_price_cents: price_cents,
        cost_price_cents: Some(price_cents / 2),
        tax_rate_bps: tax_bps,
        is_active: true,
        current_stock: stock,
        min_stock: 0,
        created_at: now,
        updated_at: now,
    };
    repository::product::insert(db.pool(), &product).await.unwrap();
    product
}

async fn stock_of(db: &Database, product_id: &str) -> i64 {
    repository::product::fetch(db.pool(), product_id)
        .await
        .unwrap()
        .unwrap()
        .current_stock
}

fn cash_sale(product_id: &str, quantity: i64, paid_cents: i64) -> CreateSaleRequest {
    CreateSaleRequest {
        items: vec![SaleLineRequest {
            product_id: product_id.to_string(),
            quantity,
            discount_percent: 0.0,
        }],
        payment_method: PaymentMethod::Cash,
        amount_paid_cents: paid_cents,
        discount_percent: 0.0,
        notes: None,
    }
}

#[derive(Default)]
struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    fn actions(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.action.clone()).collect()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// =============================================================================
// Sale creation
// =============================================================================

#[tokio::test]
async fn sale_prices_cart_and_deducts_stock() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 10_000, 1900, 10).await;

    let mut request = cash_sale(&product.id, 2, 30_000);
    request.items[0].discount_percent = 10.0;

    let result = engine.create_sale("cashier-1", &request).await.unwrap();

    // 2 × 100.00, 10% item discount → net 180.00, tax 34.20, total 214.20
    assert_eq!(result.sale.subtotal_cents, 18_000);
    assert_eq!(result.sale.discount_cents, 2_000);
    assert_eq!(result.sale.tax_cents, 3_420);
    assert_eq!(result.sale.total_cents, 21_420);
    assert_eq!(result.sale.change_cents, 30_000 - 21_420);
    assert_eq!(result.sale.status, SaleStatus::Completed);
    assert_eq!(result.sale.receipt_number, 1);

    // Line snapshot froze the catalog values.
    let item = &result.items[0];
    assert_eq!(item.product_sku, "WIDGET");
    assert_eq!(item.unit_price_cents, 10_000);
    assert_eq!(item.tax_rate_bps, 1900);
    assert_eq!(item.returned_qty, 0);

    assert_eq!(stock_of(&db, &product.id).await, 8);

    let movements = engine
        .movements(&product.id, &MovementFilter::default())
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::Sale);
    assert_eq!(movements[0].quantity, -2);
    assert_eq!(movements[0].stock_before, 10);
    assert_eq!(movements[0].stock_after, 8);
}

#[tokio::test]
async fn insufficient_payment_is_rejected_for_every_method() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 10_000, 1900, 10).await;

    // Total is 11900; paying 11899 must fail, cash or card alike.
    for method in [PaymentMethod::Cash, PaymentMethod::Card] {
        let mut request = cash_sale(&product.id, 1, 11_899);
        request.payment_method = method;

        let err = engine.create_sale("cashier-1", &request).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Business(CoreError::InsufficientPayment {
                total_cents: 11_900,
                paid_cents: 11_899,
            })
        ));
    }

    // Nothing was deducted or numbered.
    assert_eq!(stock_of(&db, &product.id).await, 10);
    assert_eq!(
        sequence::current_value(db.pool(), sequence::RECEIPT_SEQUENCE).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn inactive_and_unknown_products_are_rejected() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());

    let now = Utc::now();
    let inactive = Product {
        id: Uuid::new_v4().to_string(),
        sku: "GONE".to_string(),
        name: "Discontinued".to_string(),
        sale_price_cents: 500,
        cost_price_cents: None,
        tax_rate_bps: 0,
        is_active: false,
        current_stock: 5,
        min_stock: 0,
        created_at: now,
        updated_at: now,
    };
    repository::product::insert(db.pool(), &inactive).await.unwrap();

    let err = engine
        .create_sale("cashier-1", &cash_sale(&inactive.id, 1, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::ProductInactive { .. })));

    let err = engine
        .create_sale("cashier-1", &cash_sale("no-such-id", 1, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::ProductNotFound(_))));
}

#[tokio::test]
async fn failed_multi_line_sale_leaves_no_trace() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let plenty = seed_product(&db, "PLENTY", 1_000, 0, 100).await;
    let scarce = seed_product(&db, "SCARCE", 1_000, 0, 1).await;

    let request = CreateSaleRequest {
        items: vec![
            SaleLineRequest {
                product_id: plenty.id.clone(),
                quantity: 3,
                discount_percent: 0.0,
            },
            SaleLineRequest {
                product_id: scarce.id.clone(),
                quantity: 2,
                discount_percent: 0.0,
            },
        ],
        payment_method: PaymentMethod::Cash,
        amount_paid_cents: 100_000,
        discount_percent: 0.0,
        notes: None,
    };

    let err = engine.create_sale("cashier-1", &request).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Business(CoreError::InsufficientStock { available: 1, requested: 2, .. })
    ));

    // The first line's movement rolled back with everything else.
    assert_eq!(stock_of(&db, &plenty.id).await, 100);
    assert_eq!(stock_of(&db, &scarce.id).await, 1);
    assert!(engine
        .movements(&plenty.id, &MovementFilter::default())
        .await
        .unwrap()
        .is_empty());

    // A subsequent sale still gets receipt number 1.
    let sale = engine
        .create_sale("cashier-1", &cash_sale(&plenty.id, 1, 1_000))
        .await
        .unwrap();
    assert_eq!(sale.sale.receipt_number, 1);
}

#[tokio::test]
async fn negative_stock_policy_permits_oversell() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "BACKORDER", 1_000, 0, 1).await;

    repository::store::set_allow_negative_stock(db.pool(), true)
        .await
        .unwrap();

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 3, 3_000))
        .await
        .unwrap();
    assert_eq!(sale.sale.total_cents, 3_000);
    assert_eq!(stock_of(&db, &product.id).await, -2);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_never_oversell() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "HOT", 1_000, 0, 5).await;

    // Six buyers, five units: exactly one must lose.
    let mut handles = Vec::new();
    for i in 0..6 {
        let engine = engine.clone();
        let product_id = product.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_sale(&format!("cashier-{i}"), &cash_sale(&product_id, 1, 1_000))
                .await
        }));
    }

    let mut ok = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(LedgerError::Business(CoreError::InsufficientStock { .. })) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(out_of_stock, 1);
    assert_eq!(stock_of(&db, &product.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sales_draw_distinct_receipt_numbers() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "TICKET", 500, 0, 100).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = engine.clone();
        let product_id = product.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create_sale(&format!("cashier-{i}"), &cash_sale(&product_id, 1, 500))
                .await
                .map(|s| s.sale.receipt_number)
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap().unwrap());
    }
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 10, "receipt numbers must be unique");
    assert_eq!(*numbers.last().unwrap(), 10);
}

// =============================================================================
// Void
// =============================================================================

#[tokio::test]
async fn void_restores_stock_and_is_not_repeatable() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 4, 4_000))
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product.id).await, 6);

    let voided = engine
        .void_sale("manager-1", &sale.sale.id, "customer walked out")
        .await
        .unwrap();
    assert_eq!(voided.status, SaleStatus::Voided);
    assert_eq!(voided.void_reason.as_deref(), Some("customer walked out"));
    assert_eq!(voided.voided_by_id.as_deref(), Some("manager-1"));
    assert_eq!(stock_of(&db, &product.id).await, 10);

    // A second void must fail without recording another restock.
    let err = engine
        .void_sale("manager-1", &sale.sale.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::AlreadyVoided(_))));

    let voids = engine
        .movements(
            &product.id,
            &MovementFilter {
                kind: Some(MovementKind::Void),
                ..MovementFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(voids.len(), 1);
    assert_eq!(stock_of(&db, &product.id).await, 10);
}

#[tokio::test]
async fn void_after_partial_return_restores_full_sold_quantity() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 5, 5_000))
        .await
        .unwrap();
    engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "damaged",
            &[ReturnLineRequest {
                product_id: product.id.clone(),
                quantity: 2,
            }],
        )
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product.id).await, 7);

    // The VOID movement documents cancellation of the whole sale and
    // carries the full sold quantity.
    engine
        .void_sale("manager-1", &sale.sale.id, "billing error")
        .await
        .unwrap();
    assert_eq!(stock_of(&db, &product.id).await, 12);
}

#[tokio::test]
async fn voiding_unknown_sale_fails() {
    let db = test_db().await;
    let engine = SaleEngine::new(db);

    let err = engine
        .void_sale("manager-1", "no-such-sale", "why not")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::SaleNotFound(_))));
}

// =============================================================================
// Returns
// =============================================================================

#[tokio::test]
async fn partial_return_refunds_original_price_and_restocks() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 2_500, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 4, 10_000))
        .await
        .unwrap();

    // Catalog price changes never affect refunds.
    sqlx::query("UPDATE products SET sale_price_cents = 9999 WHERE id = ?1")
        .bind(&product.id)
        .execute(db.pool())
        .await
        .unwrap();

    let result = engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "wrong size",
            &[ReturnLineRequest {
                product_id: product.id.clone(),
                quantity: 3,
            }],
        )
        .await
        .unwrap();

    assert_eq!(result.return_record.return_number, 1);
    assert_eq!(result.return_record.total_refund_cents, 7_500);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].unit_price_cents, 2_500);
    assert_eq!(stock_of(&db, &product.id).await, 9);

    let refreshed = engine.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(refreshed.sale.status, SaleStatus::PartialReturn);
    assert_eq!(refreshed.items[0].returned_qty, 3);
}

#[tokio::test]
async fn fully_returned_sale_becomes_voided() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 2, 2_000))
        .await
        .unwrap();

    engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "changed mind",
            &[ReturnLineRequest {
                product_id: product.id.clone(),
                quantity: 2,
            }],
        )
        .await
        .unwrap();

    let refreshed = engine.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(refreshed.sale.status, SaleStatus::Voided);
    assert_eq!(stock_of(&db, &product.id).await, 10);
}

#[tokio::test]
async fn return_quantity_is_bounded_across_multiple_returns() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 3, 3_000))
        .await
        .unwrap();

    let line = |qty| {
        vec![ReturnLineRequest {
            product_id: product.id.clone(),
            quantity: qty,
        }]
    };

    engine
        .create_return("cashier-1", &sale.sale.id, "one back", &line(2))
        .await
        .unwrap();

    // Only 1 of 3 remains returnable.
    let err = engine
        .create_return("cashier-1", &sale.sale.id, "rest back", &line(2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Business(CoreError::ExcessiveReturnQuantity {
            requested: 2,
            available: 1,
            ..
        })
    ));

    engine
        .create_return("cashier-1", &sale.sale.id, "rest back", &line(1))
        .await
        .unwrap();
    let refreshed = engine.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(refreshed.sale.status, SaleStatus::Voided);
}

#[tokio::test]
async fn returning_a_product_not_in_the_sale_fails() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let sold = seed_product(&db, "SOLD", 1_000, 0, 10).await;
    let other = seed_product(&db, "OTHER", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&sold.id, 1, 1_000))
        .await
        .unwrap();

    let err = engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "mixup",
            &[ReturnLineRequest {
                product_id: other.id.clone(),
                quantity: 1,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::ItemNotInSale { .. })));

    // The sale and both stock levels are untouched.
    let refreshed = engine.get_sale(&sale.sale.id).await.unwrap();
    assert_eq!(refreshed.sale.status, SaleStatus::Completed);
    assert_eq!(stock_of(&db, &other.id).await, 10);
}

#[tokio::test]
async fn returning_against_a_voided_sale_fails() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 1, 1_000))
        .await
        .unwrap();
    engine
        .void_sale("manager-1", &sale.sale.id, "mistake")
        .await
        .unwrap();

    let err = engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "too late",
            &[ReturnLineRequest {
                product_id: product.id.clone(),
                quantity: 1,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Business(CoreError::AlreadyVoided(_))));
}

// =============================================================================
// Manual stock operations
// =============================================================================

#[tokio::test]
async fn entry_and_adjustment_form_a_conserving_ledger() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 0).await;

    engine
        .add_entry("clerk-1", &product.id, 20, Some(400), None)
        .await
        .unwrap();
    engine
        .create_sale("cashier-1", &cash_sale(&product.id, 6, 6_000))
        .await
        .unwrap();
    let adjustment = engine
        .adjust_stock("manager-1", &product.id, 12, "cycle count found breakage")
        .await
        .unwrap();
    assert_eq!(adjustment.quantity, -2);

    let movements = engine
        .movements(&product.id, &MovementFilter::default())
        .await
        .unwrap();
    assert_eq!(movements.len(), 3);

    // Every movement chains exactly onto the previous stock level, and the
    // deltas sum to the live stock.
    for movement in &movements {
        assert_eq!(movement.stock_after, movement.stock_before + movement.quantity);
    }
    let delta_sum: i64 = movements.iter().map(|m| m.quantity).sum();
    assert_eq!(delta_sum, stock_of(&db, &product.id).await);
    assert_eq!(stock_of(&db, &product.id).await, 12);

    // Entry reason defaulted; adjustment kept its mandatory reason.
    let entry = movements.iter().find(|m| m.kind == MovementKind::Entry).unwrap();
    assert_eq!(entry.reason.as_deref(), Some("merchandise entry"));
    assert_eq!(entry.unit_cost_cents, Some(400));
}

#[tokio::test]
async fn adjustment_requires_a_reason_and_entry_a_positive_quantity() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 5).await;

    assert!(engine
        .adjust_stock("manager-1", &product.id, 3, "   ")
        .await
        .is_err());
    assert!(engine
        .add_entry("clerk-1", &product.id, 0, None, None)
        .await
        .is_err());
    assert_eq!(stock_of(&db, &product.id).await, 5);
}

#[tokio::test]
async fn movement_history_filters_by_kind_and_pages() {
    let db = test_db().await;
    let engine = SaleEngine::new(db.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 0).await;

    for _ in 0..3 {
        engine
            .add_entry("clerk-1", &product.id, 5, None, None)
            .await
            .unwrap();
    }
    engine
        .create_sale("cashier-1", &cash_sale(&product.id, 1, 1_000))
        .await
        .unwrap();

    let entries = engine
        .movements(
            &product.id,
            &MovementFilter {
                kind: Some(MovementKind::Entry),
                ..MovementFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);

    let page = engine
        .movements(
            &product.id,
            &MovementFilter {
                limit: 2,
                ..MovementFilter::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    // Newest first.
    assert_eq!(page[0].kind, MovementKind::Sale);
}

// =============================================================================
// Sequences
// =============================================================================

#[tokio::test]
async fn sequences_are_monotonic_and_resettable() {
    let db = test_db().await;

    let mut conn = db.pool().acquire().await.unwrap();
    assert_eq!(sequence::next_value(&mut conn, "test_seq").await.unwrap(), 1);
    assert_eq!(sequence::next_value(&mut conn, "test_seq").await.unwrap(), 2);
    drop(conn);

    assert_eq!(sequence::current_value(db.pool(), "test_seq").await.unwrap(), 2);
    assert_eq!(sequence::current_value(db.pool(), "never_used").await.unwrap(), 0);

    sequence::reset_value(db.pool(), "test_seq", 100).await.unwrap();
    let mut conn = db.pool().acquire().await.unwrap();
    assert_eq!(sequence::next_value(&mut conn, "test_seq").await.unwrap(), 101);
}

#[tokio::test]
async fn aborted_unit_of_work_rolls_the_sequence_back() {
    let db = test_db().await;

    {
        let mut tx = db.begin_unit_of_work().await.unwrap();
        assert_eq!(sequence::next_value(&mut tx, "test_seq").await.unwrap(), 1);
        // dropped without commit
    }

    let mut conn = db.pool().acquire().await.unwrap();
    assert_eq!(sequence::next_value(&mut conn, "test_seq").await.unwrap(), 1);
}

// =============================================================================
// Audit
// =============================================================================

#[tokio::test]
async fn committed_operations_emit_one_audit_event_each() {
    let db = test_db().await;
    let sink = Arc::new(RecordingAuditSink::default());
    let engine = SaleEngine::with_audit_sink(db.clone(), sink.clone());
    let product = seed_product(&db, "WIDGET", 1_000, 0, 10).await;

    let sale = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 2, 2_000))
        .await
        .unwrap();
    engine
        .create_return(
            "cashier-1",
            &sale.sale.id,
            "one back",
            &[ReturnLineRequest {
                product_id: product.id.clone(),
                quantity: 1,
            }],
        )
        .await
        .unwrap();
    engine
        .void_sale("manager-1", &sale.sale.id, "mistake")
        .await
        .unwrap();

    assert_eq!(sink.actions(), vec!["CREATE", "RETURN", "VOID"]);

    // A rejected operation emits nothing.
    let _ = engine
        .create_sale("cashier-1", &cash_sale(&product.id, 1, 0))
        .await
        .unwrap_err();
    assert_eq!(sink.actions().len(), 3);
}
