use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    models::{Category, Product, ProductImage, Variant},
    routes::params::Pagination,
};

/// Product summary used by listings, the home page, related products and the wishlist.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductCard {
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub brand: Option<String>,
    pub category_id: Uuid,
    pub main_image_url: Option<String>,
    pub fragrance_type: Option<String>,
    pub occasion: Option<String>,
    pub is_featured: bool,
    pub is_best_selling: bool,
    pub is_new_arrival: bool,
    pub avg_rating: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub total_stock: i64,
    pub available_volumes: Vec<i32>,
    pub available_genders: Vec<String>,
    pub discount_percentage: i32,
    pub default_variant_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HomeData {
    pub featured: Vec<ProductCard>,
    pub best_selling: Vec<ProductCard>,
    pub new_arrivals: Vec<ProductCard>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub category_id: Option<Uuid>,
    pub gender: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub fragrance_type: Option<String>,
    pub occasion: Option<String>,
    pub volume_ml: Option<i32>,
    /// featured (default), best-selling, price-low-high, price-high-low, newest,
    /// customer-rating, alphabetical-az, alphabetical-za
    pub sort: Option<String>,
}

impl ProductListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListData {
    pub items: Vec<ProductCard>,
    pub available_volumes: Vec<i32>,
    pub fragrance_types: Vec<String>,
    pub occasions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub category: Category,
    pub variants: Vec<Variant>,
    pub images: Vec<ProductImage>,
    pub related: Vec<ProductCard>,
    pub discount_percentage: i32,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub items: Vec<Category>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminCategoryQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    /// all, name, product_name, product_sku
    pub search_by: Option<String>,
    /// active, inactive
    pub status: Option<String>,
    /// yes, no
    pub featured: Option<String>,
    /// newest, oldest, name_asc, name_desc, sort_order
    pub sort: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

impl AdminCategoryQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CategoryUpdateRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    /// all, name, sku, category, brand
    pub search_by: Option<String>,
    pub category_id: Option<Uuid>,
    /// active, inactive
    pub status: Option<String>,
    pub gender: Option<String>,
    /// yes, no
    pub featured: Option<String>,
    pub best_selling: Option<String>,
    pub new_arrival: Option<String>,
    /// in_stock, low_stock, out_of_stock
    pub stock: Option<String>,
    /// newest, oldest, name_asc, name_desc, price_high, price_low, stock_high, stock_low
    pub sort: Option<String>,
}

impl AdminProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrashQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
}

impl TrashQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminProductRow {
    pub product: Product,
    pub category_name: String,
    pub variant_count: i64,
    pub total_stock: i64,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminProductList {
    pub items: Vec<AdminProductRow>,
    pub deleted_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminProductDetail {
    pub product: Product,
    pub category: Category,
    pub variants: Vec<Variant>,
    pub images: Vec<ProductImage>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VariantRequest {
    pub volume_ml: i32,
    pub gender: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    pub variant_image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VariantUpdateRequest {
    pub volume_ml: Option<i32>,
    pub gender: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    /// Drop any discount price.
    #[serde(default)]
    pub clear_discount: bool,
    pub stock: Option<i32>,
    pub variant_image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ImageRequest {
    pub image_url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductCreateRequest {
    pub category_id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub description: String,
    pub main_image_url: Option<String>,
    pub brand: Option<String>,
    pub fragrance_type: Option<String>,
    pub occasion: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub is_best_selling: bool,
    #[serde(default)]
    pub is_new_arrival: bool,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub variants: Vec<VariantRequest>,
    #[serde(default)]
    pub images: Vec<ImageRequest>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductUpdateRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub main_image_url: Option<String>,
    pub brand: Option<String>,
    pub fragrance_type: Option<String>,
    pub occasion: Option<String>,
    pub is_featured: Option<bool>,
    pub is_best_selling: Option<bool>,
    pub is_new_arrival: Option<bool>,
    pub is_active: Option<bool>,
}
