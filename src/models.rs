use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{
    addresses, categories, order_items, orders, product_images, product_variants, products, users,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub status: String,
    pub wallet_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            gender: model.gender,
            address: model.address,
            role: model.role,
            status: model.status,
            wallet_balance: model.wallet_balance,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub address_type: String,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub landmark: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<addresses::Model> for Address {
    fn from(model: addresses::Model) -> Self {
        Self {
            id: model.id,
            address_type: model.address_type,
            full_name: model.full_name,
            phone: model.phone,
            address_line1: model.address_line1,
            address_line2: model.address_line2,
            city: model.city,
            state: model.state,
            postal_code: model.postal_code,
            country: model.country,
            landmark: model.landmark,
            is_default: model.is_default,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<categories::Model> for Category {
    fn from(model: categories::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            slug: model.slug,
            description: model.description,
            thumbnail_url: model.thumbnail_url,
            is_active: model.is_active,
            is_featured: model.is_featured,
            sort_order: model.sort_order,
            is_deleted: model.is_deleted,
            deleted_at: model.deleted_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub sku: String,
    pub description: String,
    pub main_image_url: Option<String>,
    pub brand: Option<String>,
    pub fragrance_type: Option<String>,
    pub occasion: Option<String>,
    pub is_featured: bool,
    pub is_best_selling: bool,
    pub is_new_arrival: bool,
    pub is_active: bool,
    pub avg_rating: Decimal,
    pub rating_count: i32,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<products::Model> for Product {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            category_id: model.category_id,
            name: model.name,
            slug: model.slug,
            sku: model.sku,
            description: model.description,
            main_image_url: model.main_image_url,
            brand: model.brand,
            fragrance_type: model.fragrance_type,
            occasion: model.occasion,
            is_featured: model.is_featured,
            is_best_selling: model.is_best_selling,
            is_new_arrival: model.is_new_arrival,
            is_active: model.is_active,
            avg_rating: model.avg_rating,
            rating_count: model.rating_count,
            is_deleted: model.is_deleted,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub volume_ml: i32,
    pub gender: String,
    pub sku: String,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    pub display_price: Decimal,
    pub stock: i32,
    pub variant_image_url: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl From<product_variants::Model> for Variant {
    fn from(model: product_variants::Model) -> Self {
        let display_price = model.display_price();
        Self {
            id: model.id,
            product_id: model.product_id,
            volume_ml: model.volume_ml,
            gender: model.gender,
            sku: model.sku,
            price: model.price,
            discount_price: model.discount_price,
            display_price,
            stock: model.stock,
            variant_image_url: model.variant_image_url,
            is_active: model.is_active,
            is_deleted: model.is_deleted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductImage {
    pub id: Uuid,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub is_default: bool,
}

impl From<product_images::Model> for ProductImage {
    fn from(model: product_images::Model) -> Self {
        Self {
            id: model.id,
            image_url: model.image_url,
            alt_text: model.alt_text,
            is_default: model.is_default,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub shipping_address_id: Option<Uuid>,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub subtotal: Decimal,
    pub shipping_charge: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub cancellation_reason: Option<String>,
    pub return_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for Order {
    fn from(model: orders::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            order_number: model.order_number,
            shipping_address_id: model.shipping_address_id,
            status: model.status,
            payment_method: model.payment_method,
            payment_status: model.payment_status,
            subtotal: model.subtotal,
            shipping_charge: model.shipping_charge,
            tax_amount: model.tax_amount,
            discount_amount: model.discount_amount,
            total_amount: model.total_amount,
            cancellation_reason: model.cancellation_reason,
            return_reason: model.return_reason,
            cancelled_at: model.cancelled_at.map(|dt| dt.with_timezone(&Utc)),
            returned_at: model.returned_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: model.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            notes: model.notes,
            tracking_number: model.tracking_number,
            gateway_order_id: model.gateway_order_id,
            gateway_payment_id: model.gateway_payment_id,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub variant_details: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub product_image: Option<String>,
}

impl From<order_items::Model> for OrderItem {
    fn from(model: order_items::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            variant_id: model.variant_id,
            product_name: model.product_name,
            variant_details: model.variant_details,
            quantity: model.quantity,
            unit_price: model.unit_price,
            total_price: model.total_price,
            is_cancelled: model.is_cancelled,
            cancellation_reason: model.cancellation_reason,
            product_image: model.product_image,
        }
    }
}
