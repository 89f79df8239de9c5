//! # Input Validation
//!
//! Precondition checks for engine operations. These run before any unit of
//! work opens, so malformed requests never touch the database.

use crate::error::ValidationError;
use crate::money::DiscountRate;
use crate::types::{CreateSaleRequest, ReturnLineRequest};

/// Validates a create-sale request: at least one item, positive quantities,
/// discount percentages within [0, 100], non-negative payment.
pub fn validate_sale_request(req: &CreateSaleRequest) -> Result<(), ValidationError> {
    if req.items.is_empty() {
        return Err(ValidationError::Required { field: "items" });
    }

    for item in &req.items {
        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive { field: "quantity" });
        }
        if !DiscountRate::percent_in_range(item.discount_percent) {
            return Err(ValidationError::OutOfRange {
                field: "discount_percent",
                min: 0,
                max: 100,
            });
        }
    }

    if !DiscountRate::percent_in_range(req.discount_percent) {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent",
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a free-text reason (void, return, adjustment).
pub fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required { field: "reason" });
    }
    Ok(())
}

/// Validates a return request: at least one line, positive quantities.
/// Per-line eligibility (product in sale, returnable quantity) is checked
/// against the sale inside the unit of work.
pub fn validate_return_request(items: &[ReturnLineRequest]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::Required { field: "items" });
    }
    for item in items {
        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive { field: "quantity" });
        }
    }
    Ok(())
}

/// Validates a manual inventory entry quantity.
pub fn validate_entry_quantity(quantity: i64) -> Result<(), ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentMethod, SaleLineRequest};

    fn sale_request() -> CreateSaleRequest {
        CreateSaleRequest {
            items: vec![SaleLineRequest {
                product_id: "p-1".to_string(),
                quantity: 1,
                discount_percent: 0.0,
            }],
            payment_method: PaymentMethod::Cash,
            amount_paid_cents: 1000,
            discount_percent: 0.0,
            notes: None,
        }
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate_sale_request(&sale_request()).is_ok());
    }

    #[test]
    fn rejects_empty_cart() {
        let mut req = sale_request();
        req.items.clear();
        assert!(matches!(
            validate_sale_request(&req),
            Err(ValidationError::Required { field: "items" })
        ));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let mut req = sale_request();
        req.items[0].quantity = 0;
        assert!(matches!(
            validate_sale_request(&req),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_discounts() {
        let mut req = sale_request();
        req.items[0].discount_percent = 101.0;
        assert!(matches!(
            validate_sale_request(&req),
            Err(ValidationError::OutOfRange { .. })
        ));

        let mut req = sale_request();
        req.discount_percent = -1.0;
        assert!(matches!(
            validate_sale_request(&req),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn reason_must_be_non_empty() {
        assert!(validate_reason("damaged box").is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason("").is_err());
    }

    #[test]
    fn return_request_rules() {
        assert!(validate_return_request(&[]).is_err());
        assert!(validate_return_request(&[ReturnLineRequest {
            product_id: "p-1".to_string(),
            quantity: 0,
        }])
        .is_err());
        assert!(validate_return_request(&[ReturnLineRequest {
            product_id: "p-1".to_string(),
            quantity: 2,
        }])
        .is_ok());
    }
}
