//! # Sale Transaction Engine
//!
//! The transactional façade over sales, voids, returns and manual stock
//! operations.
//!
//! ## Transaction discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Every operation:                                               │
//! │                                                                 │
//! │  validate inputs (pure, no I/O)                                 │
//! │       │                                                         │
//! │  begin unit of work  ── first statement is a write, so the     │
//! │       │                 transaction owns the writer slot and    │
//! │       │                 every read below is current             │
//! │  read / price / check business rules                            │
//! │       │                                                         │
//! │  write sale + items + movements + sequence, or nothing          │
//! │       │                                                         │
//! │  commit ──► emit audit event (post-commit, fire-and-forget)     │
//! │                                                                 │
//! │  Conflict? roll back, retry the whole unit of work (bounded).   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business-rule failures and storage failures both roll the unit of work
//! back completely; a half-applied sale is never observable.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::error::{DbError, LedgerError, LedgerResult};
use crate::ledger::{self, MovementFilter, MovementRequest};
use crate::pool::Database;
use crate::repository::{product, sale, store};
use crate::sequence::{self, RECEIPT_SEQUENCE, RETURN_SEQUENCE};
use caja_core::{
    format_document_number, price_cart, validation, CoreError, CreateSaleRequest, DiscountRate,
    InventoryMovement, LineInput, Money, MovementKind, Product, ReferenceKind, Return, ReturnItem,
    ReturnLineRequest, ReturnWithItems, Sale, SaleItem, SaleStatus, SaleWithItems, RECEIPT_PREFIX,
};

/// How many times a conflicted unit of work is re-run before the conflict
/// is surfaced to the caller.
const MAX_CONFLICT_RETRIES: u32 = 3;

/// Default reason stamped on ENTRY movements when the caller gives none.
const DEFAULT_ENTRY_REASON: &str = "merchandise entry";

/// Transactional engine for sale, void, return and stock operations.
///
/// Cheap to clone; clones share the pool and the audit sink.
#[derive(Clone)]
pub struct SaleEngine {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl SaleEngine {
    pub fn new(db: Database) -> Self {
        SaleEngine {
            db,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        SaleEngine { db, audit }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Sale creation
    // =========================================================================

    /// Creates a sale: prices the cart, checks payment, draws a receipt
    /// number, freezes line snapshots and deducts stock, all in one unit
    /// of work.
    pub async fn create_sale(
        &self,
        user_id: &str,
        request: &CreateSaleRequest,
    ) -> LedgerResult<SaleWithItems> {
        validation::validate_sale_request(request)?;
        let paid = Money::non_negative("amount_paid", request.amount_paid_cents)
            .map_err(LedgerError::Business)?;

        let result = self
            .run_with_retry("create_sale", || self.try_create_sale(user_id, request, paid))
            .await?;

        info!(
            receipt_number = result.sale.receipt_number,
            total_cents = result.sale.total_cents,
            items = result.items.len(),
            "Sale created"
        );
        self.audit.emit(
            AuditEvent::new(
                user_id,
                "CREATE",
                "sale",
                &result.sale.id,
                format!(
                    "sale {} for {} cents",
                    format_document_number(RECEIPT_PREFIX, result.sale.receipt_number),
                    result.sale.total_cents
                ),
            )
            .with_new_values(json!({
                "receipt_number": result.sale.receipt_number,
                "status": result.sale.status,
                "subtotal_cents": result.sale.subtotal_cents,
                "tax_cents": result.sale.tax_cents,
                "total_cents": result.sale.total_cents,
            })),
        );

        Ok(result)
    }

    async fn try_create_sale(
        &self,
        user_id: &str,
        request: &CreateSaleRequest,
        paid: Money,
    ) -> LedgerResult<SaleWithItems> {
        let mut tx = self.db.begin_unit_of_work().await?;

        let policy = store::policy(&mut *tx).await?;

        // Resolve products and build pricing inputs, in request order.
        let mut products: Vec<Product> = Vec::with_capacity(request.items.len());
        let mut inputs: Vec<LineInput> = Vec::with_capacity(request.items.len());

        for line in &request.items {
            let product = product::fetch(&mut *tx, &line.product_id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            if !product.is_active {
                return Err(CoreError::ProductInactive {
                    id: product.id,
                    sku: product.sku,
                }
                .into());
            }

            // Fast pre-check; the ledger re-validates authoritatively when
            // it applies each movement below.
            if !policy.allow_negative_stock && product.current_stock < line.quantity {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id,
                    available: product.current_stock,
                    requested: line.quantity,
                }
                .into());
            }

            inputs.push(LineInput {
                product_id: product.id.clone(),
                quantity: line.quantity,
                unit_price: product.sale_price(),
                tax_rate: product.tax_rate(),
                discount: line.discount(),
            });
            products.push(product);
        }

        let global_discount = DiscountRate::from_percent_clamped(request.discount_percent);
        let totals = price_cart(&inputs, global_discount);

        if paid < totals.total {
            return Err(CoreError::InsufficientPayment {
                total_cents: totals.total.cents(),
                paid_cents: paid.cents(),
            }
            .into());
        }
        let change = Money::change_due(totals.total, paid);

        let receipt_number = sequence::next_value(&mut tx, RECEIPT_SEQUENCE).await?;

        let now = Utc::now();
        let sale_record = Sale {
            id: Uuid::new_v4().to_string(),
            receipt_number,
            user_id: user_id.to_string(),
            status: SaleStatus::Completed,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount_total().cents(),
            discount_bps: global_discount.bps(),
            tax_cents: totals.tax.cents(),
            total_cents: totals.total.cents(),
            payment_method: request.payment_method,
            amount_paid_cents: paid.cents(),
            change_cents: change.cents(),
            notes: request.notes.clone(),
            void_reason: None,
            voided_at: None,
            voided_by_id: None,
            created_at: now,
            updated_at: now,
        };
        sale::insert_sale(&mut *tx, &sale_record).await?;

        let mut items = Vec::with_capacity(totals.lines.len());
        for (line, product) in totals.lines.iter().zip(&products) {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_record.id.clone(),
                product_id: product.id.clone(),
                product_sku: product.sku.clone(),
                product_name: product.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                cost_price_cents: product.cost_price_cents,
                tax_rate_bps: line.tax_rate.bps(),
                quantity: line.quantity,
                discount_bps: line.discount.bps(),
                discount_cents: line.item_discount.cents(),
                subtotal_cents: line.gross.cents(),
                tax_cents: line.tax.cents(),
                total_cents: line.total.cents(),
                returned_qty: 0,
                created_at: now,
            };
            sale::insert_item(&mut *tx, &item).await?;

            ledger::record_movement(
                &mut tx,
                MovementRequest {
                    product_id: product.id.clone(),
                    user_id: user_id.to_string(),
                    kind: MovementKind::Sale,
                    quantity: line.quantity,
                    unit_cost_cents: product.cost_price_cents,
                    reason: None,
                    reference: Some((sale_record.id.clone(), ReferenceKind::Sale)),
                },
                policy.allow_negative_stock,
            )
            .await?;

            items.push(item);
        }

        tx.commit().await.map_err(DbError::from)?;

        Ok(SaleWithItems {
            sale: sale_record,
            items,
        })
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Voids a completed sale: marks it VOIDED and restores the full sold
    /// quantity of every line, prior partial returns included (restock
    /// movements always carry the full `quantity`; the returned portion was
    /// already restocked and the VOID entry documents the cancellation of
    /// the whole sale).
    pub async fn void_sale(
        &self,
        user_id: &str,
        sale_id: &str,
        reason: &str,
    ) -> LedgerResult<Sale> {
        validation::validate_reason(reason).map_err(LedgerError::from)?;

        let (voided, previous_status) = self
            .run_with_retry("void_sale", || self.try_void_sale(user_id, sale_id, reason))
            .await?;

        info!(sale_id = %voided.id, receipt_number = voided.receipt_number, "Sale voided");
        self.audit.emit(
            AuditEvent::new(
                user_id,
                "VOID",
                "sale",
                &voided.id,
                format!("void: {reason}"),
            )
            .with_old_values(json!({ "status": previous_status }))
            .with_new_values(json!({ "status": voided.status })),
        );

        Ok(voided)
    }

    async fn try_void_sale(
        &self,
        user_id: &str,
        sale_id: &str,
        reason: &str,
    ) -> LedgerResult<(Sale, SaleStatus)> {
        let mut tx = self.db.begin_unit_of_work().await?;

        let mut sale_record = sale::fetch_sale(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale_record.status == SaleStatus::Voided {
            return Err(CoreError::AlreadyVoided(sale_id.to_string()).into());
        }
        let previous_status = sale_record.status;

        let items = sale::fetch_items(&mut *tx, sale_id).await?;

        let now = Utc::now();
        sale::mark_voided(&mut *tx, sale_id, reason, user_id, now).await?;

        for item in &items {
            // Restock is additive; the negative-stock policy cannot apply.
            ledger::record_movement(
                &mut tx,
                MovementRequest {
                    product_id: item.product_id.clone(),
                    user_id: user_id.to_string(),
                    kind: MovementKind::Void,
                    quantity: item.quantity,
                    unit_cost_cents: item.cost_price_cents,
                    reason: Some(reason.to_string()),
                    reference: Some((sale_record.id.clone(), ReferenceKind::Sale)),
                },
                true,
            )
            .await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        sale_record.status = SaleStatus::Voided;
        sale_record.void_reason = Some(reason.to_string());
        sale_record.voided_at = Some(now);
        sale_record.voided_by_id = Some(user_id.to_string());
        sale_record.updated_at = now;

        Ok((sale_record, previous_status))
    }

    // =========================================================================
    // Returns
    // =========================================================================

    /// Returns specific quantities from a sale. Lines are keyed by product;
    /// refunds use the frozen sale-time unit price. A sale with everything
    /// returned becomes VOIDED, otherwise PARTIAL_RETURN.
    pub async fn create_return(
        &self,
        user_id: &str,
        sale_id: &str,
        reason: &str,
        lines: &[ReturnLineRequest],
    ) -> LedgerResult<ReturnWithItems> {
        validation::validate_reason(reason).map_err(LedgerError::from)?;
        validation::validate_return_request(lines).map_err(LedgerError::from)?;

        let result = self
            .run_with_retry("create_return", || {
                self.try_create_return(user_id, sale_id, reason, lines)
            })
            .await?;

        info!(
            return_number = result.return_record.return_number,
            sale_id,
            refund_cents = result.return_record.total_refund_cents,
            "Return created"
        );
        self.audit.emit(
            AuditEvent::new(
                user_id,
                "RETURN",
                "return",
                &result.return_record.id,
                format!("return against sale {sale_id}: {reason}"),
            )
            .with_new_values(json!({
                "return_number": result.return_record.return_number,
                "sale_id": sale_id,
                "total_refund_cents": result.return_record.total_refund_cents,
            })),
        );

        Ok(result)
    }

    async fn try_create_return(
        &self,
        user_id: &str,
        sale_id: &str,
        reason: &str,
        lines: &[ReturnLineRequest],
    ) -> LedgerResult<ReturnWithItems> {
        let mut tx = self.db.begin_unit_of_work().await?;

        let sale_record = sale::fetch_sale(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale_record.status == SaleStatus::Voided {
            return Err(CoreError::AlreadyVoided(sale_id.to_string()).into());
        }

        let sale_items = sale::fetch_items(&mut *tx, sale_id).await?;

        // Remaining returnable quantity per sale item, consumed in
        // insertion order when a product appears on several lines.
        let mut remaining: Vec<i64> = sale_items.iter().map(|i| i.returnable_qty()).collect();

        let return_number = sequence::next_value(&mut tx, RETURN_SEQUENCE).await?;
        let now = Utc::now();
        let return_id = Uuid::new_v4().to_string();

        let mut return_items: Vec<ReturnItem> = Vec::new();
        let mut total_refund = Money::zero();

        for line in lines {
            let matching: Vec<usize> = sale_items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.product_id == line.product_id)
                .map(|(idx, _)| idx)
                .collect();

            if matching.is_empty() {
                return Err(CoreError::ItemNotInSale {
                    sale_id: sale_id.to_string(),
                    product_id: line.product_id.clone(),
                }
                .into());
            }

            let available: i64 = matching.iter().map(|&idx| remaining[idx]).sum();
            if line.quantity > available {
                return Err(CoreError::ExcessiveReturnQuantity {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                    available,
                }
                .into());
            }

            let mut outstanding = line.quantity;
            for idx in matching {
                if outstanding == 0 {
                    break;
                }
                let take = outstanding.min(remaining[idx]);
                if take == 0 {
                    continue;
                }
                remaining[idx] -= take;
                outstanding -= take;

                let item = &sale_items[idx];
                let refund = item.unit_price().multiply_quantity(take);
                total_refund += refund;

                return_items.push(ReturnItem {
                    id: Uuid::new_v4().to_string(),
                    return_id: return_id.clone(),
                    sale_item_id: item.id.clone(),
                    product_id: item.product_id.clone(),
                    quantity: take,
                    unit_price_cents: item.unit_price_cents,
                    refund_cents: refund.cents(),
                    created_at: now,
                });
            }
        }

        let return_record = Return {
            id: return_id,
            return_number,
            sale_id: sale_id.to_string(),
            user_id: user_id.to_string(),
            reason: reason.to_string(),
            total_refund_cents: total_refund.cents(),
            created_at: now,
        };
        sale::insert_return(&mut *tx, &return_record).await?;

        for item in &return_items {
            sale::insert_return_item(&mut *tx, item).await?;
            sale::add_returned_qty(&mut *tx, &item.sale_item_id, item.quantity).await?;

            ledger::record_movement(
                &mut tx,
                MovementRequest {
                    product_id: item.product_id.clone(),
                    user_id: user_id.to_string(),
                    kind: MovementKind::Return,
                    quantity: item.quantity,
                    unit_cost_cents: None,
                    reason: Some(reason.to_string()),
                    reference: Some((return_record.id.clone(), ReferenceKind::Return)),
                },
                true,
            )
            .await?;
        }

        let fully_returned = remaining.iter().all(|&qty| qty == 0);
        let new_status = if fully_returned {
            SaleStatus::Voided
        } else {
            SaleStatus::PartialReturn
        };
        sale::set_status(&mut *tx, sale_id, new_status, now).await?;

        tx.commit().await.map_err(DbError::from)?;

        Ok(ReturnWithItems {
            return_record,
            items: return_items,
        })
    }

    // =========================================================================
    // Manual stock operations
    // =========================================================================

    /// Records a merchandise entry (restock). Quantity must be positive.
    pub async fn add_entry(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        unit_cost_cents: Option<i64>,
        reason: Option<String>,
    ) -> LedgerResult<InventoryMovement> {
        validation::validate_entry_quantity(quantity).map_err(LedgerError::from)?;
        if let Some(cents) = unit_cost_cents {
            Money::non_negative("unit_cost", cents).map_err(LedgerError::Business)?;
        }

        let reason = reason.unwrap_or_else(|| DEFAULT_ENTRY_REASON.to_string());
        let movement = self
            .run_with_retry("add_entry", || {
                self.try_add_entry(user_id, product_id, quantity, unit_cost_cents, &reason)
            })
            .await?;

        info!(product_id, quantity, "Merchandise entry recorded");
        self.audit.emit(
            AuditEvent::new(
                user_id,
                "INVENTORY_ENTRY",
                "inventory_movement",
                &movement.id,
                format!("entry of {quantity} units"),
            )
            .with_new_values(json!({
                "product_id": product_id,
                "quantity": quantity,
                "stock_after": movement.stock_after,
            })),
        );

        Ok(movement)
    }

    async fn try_add_entry(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        unit_cost_cents: Option<i64>,
        reason: &str,
    ) -> LedgerResult<InventoryMovement> {
        let mut tx = self.db.begin_unit_of_work().await?;
        let movement = ledger::record_movement(
            &mut tx,
            MovementRequest {
                product_id: product_id.to_string(),
                user_id: user_id.to_string(),
                kind: MovementKind::Entry,
                quantity,
                unit_cost_cents,
                reason: Some(reason.to_string()),
                reference: None,
            },
            true,
        )
        .await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(movement)
    }

    /// Sets a product's stock to an absolute value, recording the signed
    /// difference as an ADJUSTMENT movement. A reason is mandatory.
    pub async fn adjust_stock(
        &self,
        user_id: &str,
        product_id: &str,
        new_stock: i64,
        reason: &str,
    ) -> LedgerResult<InventoryMovement> {
        validation::validate_reason(reason).map_err(LedgerError::from)?;

        let movement = self
            .run_with_retry("adjust_stock", || {
                self.try_adjust_stock(user_id, product_id, new_stock, reason)
            })
            .await?;

        info!(
            product_id,
            stock_before = movement.stock_before,
            stock_after = movement.stock_after,
            "Stock adjusted"
        );
        self.audit.emit(
            AuditEvent::new(
                user_id,
                "INVENTORY_ADJUST",
                "inventory_movement",
                &movement.id,
                format!("adjustment: {reason}"),
            )
            .with_old_values(json!({ "current_stock": movement.stock_before }))
            .with_new_values(json!({ "current_stock": movement.stock_after })),
        );

        Ok(movement)
    }

    async fn try_adjust_stock(
        &self,
        user_id: &str,
        product_id: &str,
        new_stock: i64,
        reason: &str,
    ) -> LedgerResult<InventoryMovement> {
        let mut tx = self.db.begin_unit_of_work().await?;
        let policy = store::policy(&mut *tx).await?;

        let current = product::fetch(&mut *tx, product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?
            .current_stock;

        let movement = ledger::record_movement(
            &mut tx,
            MovementRequest {
                product_id: product_id.to_string(),
                user_id: user_id.to_string(),
                kind: MovementKind::Adjustment,
                quantity: new_stock - current,
                unit_cost_cents: None,
                reason: Some(reason.to_string()),
                reference: None,
            },
            policy.allow_negative_stock,
        )
        .await?;
        tx.commit().await.map_err(DbError::from)?;
        Ok(movement)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A sale with its items, by id.
    pub async fn get_sale(&self, sale_id: &str) -> LedgerResult<SaleWithItems> {
        let pool = self.db.pool();
        let sale_record = sale::fetch_sale(pool, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        let items = sale::fetch_items(pool, sale_id).await?;
        Ok(SaleWithItems {
            sale: sale_record,
            items,
        })
    }

    /// A product's movement history, newest first.
    pub async fn movements(
        &self,
        product_id: &str,
        filter: &MovementFilter,
    ) -> LedgerResult<Vec<InventoryMovement>> {
        ledger::movements(self.db.pool(), product_id, filter).await
    }

    // =========================================================================
    // Retry plumbing
    // =========================================================================

    /// Runs a unit of work, re-running it on write conflicts up to
    /// [`MAX_CONFLICT_RETRIES`] times. Business errors and unavailability
    /// surface immediately.
    async fn run_with_retry<T, F, Fut>(&self, operation: &str, mut unit: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = LedgerResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match unit().await {
                Err(err) if err.is_retryable() && attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "Write conflict, retrying");
                }
                other => return other,
            }
        }
    }
}

impl std::fmt::Debug for SaleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleEngine").finish_non_exhaustive()
    }
}
