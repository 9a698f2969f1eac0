use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Per-line cap on units of a single variant.
pub const MAX_QUANTITY: i32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartRuleError {
    #[error("This product is currently unavailable.")]
    ProductUnavailable,
    #[error("This product category is currently unavailable.")]
    CategoryUnavailable,
    #[error("This product variant is not available.")]
    VariantUnavailable,
    #[error("This product is out of stock.")]
    OutOfStock,
    #[error("Invalid quantity.")]
    InvalidQuantity,
    #[error("Quantity must be at least 1.")]
    BelowMinimum,
    #[error("Only {0} items available in stock.")]
    InsufficientStock(i32),
    #[error("Cannot add more than {} items of this product.", MAX_QUANTITY)]
    AboveMaximum,
}

/// The state a cart line is judged against.
#[derive(Debug, Clone, Copy)]
pub struct LineState {
    pub product_live: bool,
    pub category_live: bool,
    pub variant_live: bool,
    pub stock: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LineFlags {
    pub is_available: bool,
    pub is_out_of_stock: bool,
    pub has_low_stock: bool,
    pub can_increment: bool,
    pub can_decrement: bool,
    pub max_allowed_quantity: i32,
}

impl LineState {
    pub fn is_available(&self) -> bool {
        self.product_live
            && self.category_live
            && self.variant_live
            && self.stock >= self.quantity
            && self.quantity <= MAX_QUANTITY
    }

    pub fn flags(&self) -> LineFlags {
        let is_available = self.is_available();
        LineFlags {
            is_available,
            is_out_of_stock: self.stock == 0,
            has_low_stock: self.stock > 0 && self.stock < self.quantity,
            can_increment: self.quantity < MAX_QUANTITY
                && self.stock > self.quantity
                && is_available,
            can_decrement: self.quantity > 1,
            max_allowed_quantity: self.stock.min(MAX_QUANTITY),
        }
    }

    /// Gate for putting `requested` units of this variant into a cart.
    /// Checks run in the order the storefront reports them.
    pub fn check_add(&self, requested: i32) -> Result<(), CartRuleError> {
        if !self.product_live {
            return Err(CartRuleError::ProductUnavailable);
        }
        if !self.category_live {
            return Err(CartRuleError::CategoryUnavailable);
        }
        if !self.variant_live {
            return Err(CartRuleError::VariantUnavailable);
        }
        if self.stock <= 0 {
            return Err(CartRuleError::OutOfStock);
        }
        if requested <= 0 {
            return Err(CartRuleError::InvalidQuantity);
        }
        if requested > self.stock {
            return Err(CartRuleError::InsufficientStock(self.stock));
        }
        if requested > MAX_QUANTITY {
            return Err(CartRuleError::AboveMaximum);
        }
        Ok(())
    }

    pub fn check_increment(&self) -> Result<i32, CartRuleError> {
        if self.flags().can_increment {
            return Ok(self.quantity + 1);
        }
        if self.quantity >= MAX_QUANTITY {
            Err(CartRuleError::AboveMaximum)
        } else {
            Err(CartRuleError::InsufficientStock(self.stock))
        }
    }
}

pub fn check_set_quantity(quantity: i32, stock: i32) -> Result<i32, CartRuleError> {
    if quantity < 1 {
        return Err(CartRuleError::BelowMinimum);
    }
    if quantity > MAX_QUANTITY {
        return Err(CartRuleError::AboveMaximum);
    }
    if quantity > stock {
        return Err(CartRuleError::InsufficientStock(stock));
    }
    Ok(quantity)
}

/// Combine an existing line with newly requested units, clamped to `min(MAX_QUANTITY, stock)`.
/// The message names whichever limit applied.
pub fn merge_quantity(existing: i32, requested: i32, stock: i32) -> (i32, String) {
    let wanted = existing.saturating_add(requested);
    let cap = stock.min(MAX_QUANTITY);
    if wanted <= cap {
        (wanted, "Product quantity updated in cart!".to_string())
    } else if stock < MAX_QUANTITY {
        (stock, format!("Updated to maximum available stock: {stock}"))
    } else {
        (
            MAX_QUANTITY,
            format!("Updated to maximum allowed quantity: {MAX_QUANTITY}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(stock: i32, quantity: i32) -> LineState {
        LineState {
            product_live: true,
            category_live: true,
            variant_live: true,
            stock,
            quantity,
        }
    }

    #[test]
    fn available_line_flags() {
        let flags = line(5, 2).flags();
        assert!(flags.is_available);
        assert!(flags.can_increment);
        assert!(flags.can_decrement);
        assert!(!flags.has_low_stock);
        assert_eq!(flags.max_allowed_quantity, 5);
    }

    #[test]
    fn low_stock_line_is_unavailable() {
        let flags = line(2, 3).flags();
        assert!(!flags.is_available);
        assert!(flags.has_low_stock);
        assert!(!flags.can_increment);
    }

    #[test]
    fn out_of_stock_is_flagged() {
        let flags = line(0, 1).flags();
        assert!(flags.is_out_of_stock);
        assert!(!flags.has_low_stock);
        assert!(!flags.is_available);
    }

    #[test]
    fn soft_deleted_category_makes_line_unavailable() {
        let mut state = line(50, 1);
        state.category_live = false;
        assert!(!state.is_available());
        assert_eq!(state.check_add(1), Err(CartRuleError::CategoryUnavailable));
    }

    #[test]
    fn max_allowed_is_capped() {
        assert_eq!(line(50, 1).flags().max_allowed_quantity, MAX_QUANTITY);
    }

    #[test]
    fn add_checks_in_order() {
        assert_eq!(line(0, 0).check_add(1), Err(CartRuleError::OutOfStock));
        assert_eq!(line(5, 0).check_add(0), Err(CartRuleError::InvalidQuantity));
        assert_eq!(
            line(5, 0).check_add(6),
            Err(CartRuleError::InsufficientStock(5))
        );
        assert_eq!(line(50, 0).check_add(11), Err(CartRuleError::AboveMaximum));
        assert_eq!(line(50, 0).check_add(10), Ok(()));
    }

    #[test]
    fn increment_explains_refusal() {
        assert_eq!(line(50, 10).check_increment(), Err(CartRuleError::AboveMaximum));
        assert_eq!(
            line(3, 3).check_increment(),
            Err(CartRuleError::InsufficientStock(3))
        );
        assert_eq!(line(3, 2).check_increment(), Ok(3));
    }

    #[test]
    fn merge_clamps_to_cap_then_stock() {
        assert_eq!(merge_quantity(8, 5, 50).0, MAX_QUANTITY);
        let (qty, msg) = merge_quantity(3, 3, 4);
        assert_eq!(qty, 4);
        assert_eq!(msg, "Updated to maximum available stock: 4");
        assert_eq!(merge_quantity(1, 1, 4).0, 2);
    }

    #[test]
    fn merge_never_exceeds_stock_below_the_cap() {
        let (qty, msg) = merge_quantity(3, 8, 9);
        assert_eq!(qty, 9);
        assert_eq!(msg, "Updated to maximum available stock: 9");
        assert!(line(9, qty).is_available());

        let (qty, msg) = merge_quantity(6, 6, 10);
        assert_eq!(qty, 10);
        assert_eq!(msg, "Updated to maximum allowed quantity: 10");
    }

    #[test]
    fn set_quantity_bounds() {
        assert_eq!(check_set_quantity(0, 5), Err(CartRuleError::BelowMinimum));
        assert_eq!(check_set_quantity(11, 50), Err(CartRuleError::AboveMaximum));
        assert_eq!(
            check_set_quantity(6, 5),
            Err(CartRuleError::InsufficientStock(5))
        );
        assert_eq!(check_set_quantity(5, 5), Ok(5));
    }

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            CartRuleError::AboveMaximum.to_string(),
            "Cannot add more than 10 items of this product."
        );
        assert_eq!(
            CartRuleError::InsufficientStock(3).to_string(),
            "Only 3 items available in stock."
        );
    }
}
