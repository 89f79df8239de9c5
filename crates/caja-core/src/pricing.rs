//! # Cart Pricing
//!
//! Pure pricing pipeline for a cart of line items.
//!
//! ## Order of Operations (load-bearing)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Per line:                                                      │
//! │    gross          = unit_price × quantity                       │
//! │    item_discount  = gross × item_discount%                      │
//! │    after_discount = gross − item_discount                       │
//! │    global_share   = after_discount × global_discount%           │
//! │    net            = after_discount − global_share               │
//! │    tax            = net × tax_rate         ◄── tax is ALWAYS    │
//! │    total          = net + tax                  computed on the  │
//! │                                                post-discount    │
//! │  Cart:                                         value            │
//! │    subtotal = Σ net      tax = Σ tax      total = subtotal+tax  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Applying the global discount per line (re-deriving each line's
//! proportional share) and then re-taxing is what keeps mixed-rate carts
//! correct: scaling a pre-computed tax total would tax money the customer
//! never paid.

use crate::money::{DiscountRate, Money, TaxRate};

/// One line of a cart, ready for pricing.
#[derive(Debug, Clone)]
pub struct LineInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    pub discount: DiscountRate,
}

/// A fully priced line.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    pub discount: DiscountRate,
    /// `unit_price × quantity`.
    pub gross: Money,
    /// Item-level discount taken off `gross`.
    pub item_discount: Money,
    /// This line's proportional share of the global discount.
    pub global_discount: Money,
    /// Line value after both discounts; the tax base.
    pub net: Money,
    pub tax: Money,
    /// `net + tax`.
    pub total: Money,
}

/// Totals for a priced cart.
#[derive(Debug, Clone)]
pub struct CartTotals {
    pub lines: Vec<PricedLine>,
    /// Σ net, already net of item and global discounts.
    pub subtotal: Money,
    /// Σ item-level discounts.
    pub item_discount: Money,
    /// Σ global discount shares.
    pub global_discount: Money,
    pub tax: Money,
    /// `subtotal + tax`.
    pub total: Money,
}

impl CartTotals {
    /// Total discount granted, item-level plus global.
    pub fn discount_total(&self) -> Money {
        self.item_discount + self.global_discount
    }
}

/// Prices a cart. Deterministic; rounds each derived amount to cents.
pub fn price_cart(inputs: &[LineInput], global_discount: DiscountRate) -> CartTotals {
    let mut lines = Vec::with_capacity(inputs.len());
    let mut subtotal = Money::zero();
    let mut item_discount_total = Money::zero();
    let mut global_discount_total = Money::zero();
    let mut tax_total = Money::zero();

    for input in inputs {
        let gross = input.unit_price.multiply_quantity(input.quantity);
        let item_discount = input.discount.amount_off(gross);
        let after_discount = gross - item_discount;
        let global_share = global_discount.amount_off(after_discount);
        let net = after_discount - global_share;
        let tax = net.calculate_tax(input.tax_rate);
        let total = net + tax;

        subtotal += net;
        item_discount_total += item_discount;
        global_discount_total += global_share;
        tax_total += tax;

        lines.push(PricedLine {
            product_id: input.product_id.clone(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            tax_rate: input.tax_rate,
            discount: input.discount,
            gross,
            item_discount,
            global_discount: global_share,
            net,
            tax,
            total,
        });
    }

    CartTotals {
        lines,
        subtotal,
        item_discount: item_discount_total,
        global_discount: global_discount_total,
        tax: tax_total,
        total: subtotal + tax_total,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
