use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::catalog::ProductCard;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToWishlistRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistEntry {
    pub id: Uuid,
    pub added_at: DateTime<Utc>,
    pub product: ProductCard,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistView {
    pub items: Vec<WishlistEntry>,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistChange {
    pub item_id: Option<Uuid>,
    pub count: i64,
}
