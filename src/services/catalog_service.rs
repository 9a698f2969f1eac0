use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait,
    sea_query::{Expr, IntoColumnRef, SimpleExpr, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    domain::pricing,
    dto::catalog::{
        CategoryList, HomeData, ProductCard, ProductDetail, ProductListData, ProductListQuery,
    },
    entity::{
        categories::{self, Column as CategoryCol, Entity as Categories},
        product_images::{Column as ImageCol, Entity as ProductImages},
        product_variants::{self, Column as VariantCol, Entity as ProductVariants},
        products::{self, Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    models::{Category, Product, ProductImage, Variant},
    response::{ApiResponse, Meta},
    routes::params::non_empty,
    state::AppState,
};

const HOME_SECTION_SIZE: u64 = 8;
const RELATED_SIZE: u64 = 4;

/// Case-insensitive substring match.
pub(crate) fn ilike<T: IntoColumnRef>(col: T, needle: &str) -> SimpleExpr {
    Expr::col(col).ilike(format!("%{needle}%"))
}

fn live_category_ids() -> sea_orm::sea_query::SelectStatement {
    Categories::find()
        .select_only()
        .column(CategoryCol::Id)
        .filter(CategoryCol::IsActive.eq(true))
        .filter(CategoryCol::IsDeleted.eq(false))
        .into_query()
}

fn live_variant_product_ids() -> sea_orm::sea_query::SelectStatement {
    ProductVariants::find()
        .select_only()
        .column(VariantCol::ProductId)
        .filter(VariantCol::IsActive.eq(true))
        .filter(VariantCol::IsDeleted.eq(false))
        .into_query()
}

/// Storefront base filter: live product, live category, at least one live variant.
fn storefront_products() -> sea_orm::Select<Products> {
    Products::find()
        .filter(ProductCol::IsActive.eq(true))
        .filter(ProductCol::IsDeleted.eq(false))
        .filter(ProductCol::CategoryId.in_subquery(live_category_ids()))
        .filter(ProductCol::Id.in_subquery(live_variant_product_ids()))
}

/// Live variants grouped by product, ordered by volume then gender.
pub(crate) async fn live_variants_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<product_variants::Model>>> {
    let mut grouped: HashMap<Uuid, Vec<product_variants::Model>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }
    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.is_in(product_ids))
        .filter(VariantCol::IsActive.eq(true))
        .filter(VariantCol::IsDeleted.eq(false))
        .order_by_asc(VariantCol::VolumeMl)
        .order_by_asc(VariantCol::Gender)
        .all(conn)
        .await?;
    for variant in variants {
        grouped.entry(variant.product_id).or_default().push(variant);
    }
    Ok(grouped)
}

pub(crate) fn price_range(
    variants: &[product_variants::Model],
) -> (Option<Decimal>, Option<Decimal>) {
    let prices = variants.iter().map(|v| v.display_price());
    (prices.clone().min(), prices.max())
}

pub(crate) fn card(product: &products::Model, variants: &[product_variants::Model]) -> ProductCard {
    let (min_price, max_price) = price_range(variants);
    let volumes: BTreeSet<i32> = variants.iter().map(|v| v.volume_ml).collect();
    let mut genders: Vec<String> = Vec::new();
    for variant in variants {
        if !genders.contains(&variant.gender) {
            genders.push(variant.gender.clone());
        }
    }
    let first = variants.first();
    ProductCard {
        id: product.id,
        name: product.name.clone(),
        slug: product.slug.clone(),
        brand: product.brand.clone(),
        category_id: product.category_id,
        main_image_url: product.main_image_url.clone(),
        fragrance_type: product.fragrance_type.clone(),
        occasion: product.occasion.clone(),
        is_featured: product.is_featured,
        is_best_selling: product.is_best_selling,
        is_new_arrival: product.is_new_arrival,
        avg_rating: product.avg_rating,
        min_price,
        max_price,
        total_stock: variants.iter().map(|v| i64::from(v.stock)).sum(),
        available_volumes: volumes.into_iter().collect(),
        available_genders: genders,
        discount_percentage: first
            .map(|v| pricing::discount_percentage(v.price, v.discount_price))
            .unwrap_or(0),
        default_variant_id: first.map(|v| v.id),
    }
}

pub(crate) async fn build_cards<C: ConnectionTrait>(
    conn: &C,
    products: &[products::Model],
) -> AppResult<Vec<ProductCard>> {
    let grouped = live_variants_by_product(conn, products.iter().map(|p| p.id).collect()).await?;
    Ok(products
        .iter()
        .map(|p| card(p, grouped.get(&p.id).map(Vec::as_slice).unwrap_or(&[])))
        .collect())
}

async fn home_section<C: ConnectionTrait>(
    conn: &C,
    flag: ProductCol,
) -> AppResult<Vec<ProductCard>> {
    let products = storefront_products()
        .filter(flag.eq(true))
        .order_by_desc(ProductCol::CreatedAt)
        .limit(HOME_SECTION_SIZE)
        .all(conn)
        .await?;
    build_cards(conn, &products).await
}

async fn live_categories<C: ConnectionTrait>(conn: &C) -> AppResult<Vec<categories::Model>> {
    Ok(Categories::find()
        .filter(CategoryCol::IsActive.eq(true))
        .filter(CategoryCol::IsDeleted.eq(false))
        .order_by_asc(CategoryCol::SortOrder)
        .order_by_asc(CategoryCol::Name)
        .all(conn)
        .await?)
}

pub async fn home(state: &AppState) -> AppResult<ApiResponse<HomeData>> {
    let conn = &state.orm;
    let data = HomeData {
        featured: home_section(conn, ProductCol::IsFeatured).await?,
        best_selling: home_section(conn, ProductCol::IsBestSelling).await?,
        new_arrivals: home_section(conn, ProductCol::IsNewArrival).await?,
        categories: live_categories(conn)
            .await?
            .into_iter()
            .map(Category::from)
            .collect(),
    };
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items: Vec<Category> = live_categories(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        CategoryList { items },
        Some(Meta::new(1, total, total)),
    ))
}

/// Whether one live variant satisfies every variant-level filter together.
fn variant_matches(variant: &product_variants::Model, query: &ProductListQuery) -> bool {
    if let Some(gender) = non_empty(&query.gender) {
        if !variant.gender.eq_ignore_ascii_case(gender) {
            return false;
        }
    }
    if let Some(volume) = query.volume_ml {
        if variant.volume_ml != volume {
            return false;
        }
    }
    let price = variant.display_price();
    if query.price_min.is_some_and(|min| price < min) {
        return false;
    }
    if query.price_max.is_some_and(|max| price > max) {
        return false;
    }
    true
}

pub async fn list_products(
    state: &AppState,
    query: ProductListQuery,
) -> AppResult<ApiResponse<ProductListData>> {
    let conn = &state.orm;
    let (page, per_page, offset) = query.pagination().normalize();

    let mut select = storefront_products();
    if let Some(q) = non_empty(&query.q) {
        let sku_match = ProductVariants::find()
            .select_only()
            .column(VariantCol::ProductId)
            .filter(ilike((ProductVariants, VariantCol::Sku), q))
            .into_query();
        select = select.filter(
            Condition::any()
                .add(ilike((Products, ProductCol::Name), q))
                .add(ilike((Products, ProductCol::Description), q))
                .add(ilike((Products, ProductCol::Brand), q))
                .add(ilike((Products, ProductCol::FragranceType), q))
                .add(ProductCol::Id.in_subquery(sku_match)),
        );
    }
    if let Some(category_id) = query.category_id {
        select = select.filter(ProductCol::CategoryId.eq(category_id));
    }
    if let Some(fragrance_type) = non_empty(&query.fragrance_type) {
        select = select.filter(ProductCol::FragranceType.eq(fragrance_type));
    }
    if let Some(occasion) = non_empty(&query.occasion) {
        select = select.filter(ProductCol::Occasion.eq(occasion));
    }

    let sort = non_empty(&query.sort).unwrap_or("featured");
    select = match sort {
        "best-selling" => select.filter(ProductCol::IsBestSelling.eq(true)),
        "price-low-high" | "price-high-low" | "newest" | "customer-rating"
        | "alphabetical-az" | "alphabetical-za" => select,
        _ => select.filter(ProductCol::IsFeatured.eq(true)),
    };

    let candidates = select.order_by_desc(ProductCol::CreatedAt).all(conn).await?;
    let grouped =
        live_variants_by_product(conn, candidates.iter().map(|p| p.id).collect()).await?;

    let mut matched: Vec<(products::Model, Vec<product_variants::Model>)> = candidates
        .into_iter()
        .filter_map(|product| {
            let variants = grouped.get(&product.id).cloned().unwrap_or_default();
            variants
                .iter()
                .any(|v| variant_matches(v, &query))
                .then_some((product, variants))
        })
        .collect();

    match sort {
        "price-low-high" => matched.sort_by_key(|(_, v)| price_range(v).0),
        "price-high-low" => {
            matched.sort_by(|(_, a), (_, b)| price_range(b).1.cmp(&price_range(a).1))
        }
        "customer-rating" => matched.sort_by(|(a, _), (b, _)| b.avg_rating.cmp(&a.avg_rating)),
        "alphabetical-az" => matched.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name)),
        "alphabetical-za" => matched.sort_by(|(a, _), (b, _)| b.name.cmp(&a.name)),
        _ => {}
    }

    let mut volumes = BTreeSet::new();
    let mut fragrance_types = BTreeSet::new();
    let mut occasions = BTreeSet::new();
    for (product, variants) in &matched {
        volumes.extend(variants.iter().map(|v| v.volume_ml));
        if let Some(ft) = product.fragrance_type.as_deref().filter(|s| !s.is_empty()) {
            fragrance_types.insert(ft.to_string());
        }
        if let Some(oc) = product.occasion.as_deref().filter(|s| !s.is_empty()) {
            occasions.insert(oc.to_string());
        }
    }

    let total = matched.len() as i64;
    let items = matched
        .iter()
        .skip(offset as usize)
        .take(per_page as usize)
        .map(|(p, v)| card(p, v))
        .collect();

    Ok(ApiResponse::success(
        "OK",
        ProductListData {
            items,
            available_volumes: volumes.into_iter().collect(),
            fragrance_types: fragrance_types.into_iter().collect(),
            occasions: occasions.into_iter().collect(),
        },
        Some(Meta::new(page, per_page, total)),
    ))
}

/// `key` is a product id or a slug.
pub async fn product_detail(state: &AppState, key: &str) -> AppResult<ApiResponse<ProductDetail>> {
    let conn = &state.orm;
    let by_key = match Uuid::parse_str(key) {
        Ok(id) => ProductCol::Id.eq(id),
        Err(_) => ProductCol::Slug.eq(key),
    };
    let product = storefront_products()
        .filter(by_key)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let category = Categories::find_by_id(product.category_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let variants = live_variants_by_product(conn, vec![product.id])
        .await?
        .remove(&product.id)
        .unwrap_or_default();

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .order_by_desc(ImageCol::IsDefault)
        .order_by_asc(ImageCol::CreatedAt)
        .all(conn)
        .await?;

    let related_products = storefront_products()
        .filter(ProductCol::CategoryId.eq(product.category_id))
        .filter(ProductCol::Id.ne(product.id))
        .order_by_desc(ProductCol::CreatedAt)
        .limit(RELATED_SIZE)
        .all(conn)
        .await?;
    let related = build_cards(conn, &related_products).await?;

    let (min_price, max_price) = price_range(&variants);
    let discount_percentage = variants
        .first()
        .map(|v| pricing::discount_percentage(v.price, v.discount_price))
        .unwrap_or(0);

    Ok(ApiResponse::success(
        "OK",
        ProductDetail {
            product: Product::from(product),
            category: Category::from(category),
            variants: variants.into_iter().map(Variant::from).collect(),
            images: images.into_iter().map(ProductImage::from).collect(),
            related,
            discount_percentage,
            min_price,
            max_price,
        },
        Some(Meta::empty()),
    ))
}
