use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::availability::LineFlags;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub variant_id: Uuid,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CartAction {
    Increment,
    Decrement,
    SetQuantity,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub action: CartAction,
    /// Required for `set_quantity`.
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_slug: Option<String>,
    pub image_url: Option<String>,
    pub volume_ml: i32,
    pub gender: String,
    pub sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub total_price: Decimal,
    pub stock: i32,
    #[serde(flatten)]
    pub flags: LineFlags,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_items: i64,
    pub subtotal: Decimal,
    pub can_checkout: bool,
    pub available_item_ids: Vec<Uuid>,
    pub unavailable_item_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartMutation {
    pub item: Option<CartLine>,
    pub item_removed: bool,
    pub cart_total_items: i64,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearedCart {
    pub units_removed: i64,
    pub variant_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCount {
    pub total_items: i64,
    pub subtotal: Decimal,
    pub wishlist_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantInCart {
    pub in_cart: bool,
    pub item_id: Option<Uuid>,
    pub quantity: i32,
}
