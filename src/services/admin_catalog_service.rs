use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait, Set, TransactionTrait,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{slug, validation},
    dto::catalog::{
        AdminCategoryQuery, AdminProductDetail, AdminProductList, AdminProductQuery,
        AdminProductRow, CategoryList, CategoryRequest, CategoryUpdateRequest, ImageRequest,
        ProductCreateRequest, ProductUpdateRequest, TrashQuery, VariantRequest,
        VariantUpdateRequest,
    },
    entity::{
        categories::{
            self, ActiveModel as CategoryActive, Column as CategoryCol, Entity as Categories,
        },
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_images::{
            self, ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
        },
        product_variants::{
            self, ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
        },
        products::{self, ActiveModel as ProductActive, Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, Product, ProductImage, Variant},
    response::{ApiResponse, Meta},
    routes::params::non_empty,
    services::catalog_service::{ilike, price_range},
    state::AppState,
};

/// Variants at or below this stock count as low stock.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn yes_no(value: &Option<String>) -> Option<bool> {
    match non_empty(value) {
        Some("yes") => Some(true),
        Some("no") => Some(false),
        _ => None,
    }
}

fn active_inactive(value: &Option<String>) -> Option<bool> {
    match non_empty(value) {
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        _ => None,
    }
}

async fn audit(state: &AppState, user: &AuthUser, action: &str, resource: &str, id: Uuid) {
    audit::record(
        &state.pool,
        user.user_id,
        action,
        resource,
        serde_json::json!({ "id": id }),
    )
    .await;
}

// Categories

pub async fn list_categories(
    state: &AppState,
    user: &AuthUser,
    query: AdminCategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if !query.include_deleted {
        condition = condition.add(CategoryCol::IsDeleted.eq(false));
    }

    if let Some(q) = non_empty(&query.q) {
        let by_product = |col: ProductCol| {
            Products::find()
                .select_only()
                .column(ProductCol::CategoryId)
                .filter(ProductCol::IsDeleted.eq(false))
                .filter(ilike((Products, col), q))
                .into_query()
        };
        condition = condition.add(match non_empty(&query.search_by).unwrap_or("all") {
            "name" => Condition::all().add(ilike((Categories, CategoryCol::Name), q)),
            "product_name" => {
                Condition::all().add(CategoryCol::Id.in_subquery(by_product(ProductCol::Name)))
            }
            "product_sku" => {
                Condition::all().add(CategoryCol::Id.in_subquery(by_product(ProductCol::Sku)))
            }
            _ => Condition::any()
                .add(ilike((Categories, CategoryCol::Name), q))
                .add(CategoryCol::Id.in_subquery(by_product(ProductCol::Name)))
                .add(CategoryCol::Id.in_subquery(by_product(ProductCol::Sku))),
        });
    }
    if let Some(active) = active_inactive(&query.status) {
        condition = condition.add(CategoryCol::IsActive.eq(active));
    }
    if let Some(featured) = yes_no(&query.featured) {
        condition = condition.add(CategoryCol::IsFeatured.eq(featured));
    }

    let finder = Categories::find().filter(condition);
    let finder = match non_empty(&query.sort).unwrap_or("newest") {
        "oldest" => finder.order_by_asc(CategoryCol::CreatedAt),
        "name_asc" => finder.order_by_asc(CategoryCol::Name),
        "name_desc" => finder.order_by_desc(CategoryCol::Name),
        "sort_order" => finder
            .order_by_asc(CategoryCol::SortOrder)
            .order_by_asc(CategoryCol::Name),
        _ => finder.order_by_desc(CategoryCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

fn category_slug(name: &str, slug_in: Option<String>) -> Option<String> {
    let slug = optional_text(slug_in)
        .map(|s| slug::slugify(&s))
        .unwrap_or_else(|| slug::slugify(name));
    (!slug.is_empty()).then_some(slug)
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = validation::require(&payload.name, "Category name")?;
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        slug: Set(category_slug(&name, payload.slug)),
        name: Set(name),
        description: Set(optional_text(payload.description)),
        thumbnail_url: Set(optional_text(payload.thumbnail_url)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        is_featured: Set(payload.is_featured.unwrap_or(false)),
        sort_order: Set(payload.sort_order.unwrap_or(0)),
        is_deleted: Set(false),
        deleted_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit(state, user, "category_create", "categories", category.id).await;
    Ok(ApiResponse::success(
        format!("Category '{}' added successfully!", category.name),
        Category::from(category),
        Some(Meta::empty()),
    ))
}

async fn find_category(state: &AppState, id: Uuid) -> AppResult<categories::Model> {
    Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CategoryUpdateRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let existing = find_category(state, id).await?;
    let mut name = existing.name.clone();
    let mut active: CategoryActive = existing.into();
    if let Some(new_name) = payload.name {
        name = validation::require(&new_name, "Category name")?;
        active.name = Set(name.clone());
    }
    if let Some(slug_in) = payload.slug {
        active.slug = Set(category_slug(&name, Some(slug_in)));
    }
    if let Some(description) = payload.description {
        active.description = Set(optional_text(Some(description)));
    }
    if let Some(thumbnail_url) = payload.thumbnail_url {
        active.thumbnail_url = Set(optional_text(Some(thumbnail_url)));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_featured) = payload.is_featured {
        active.is_featured = Set(is_featured);
    }
    if let Some(sort_order) = payload.sort_order {
        active.sort_order = Set(sort_order);
    }
    let category = active.update(&state.orm).await?;

    audit(state, user, "category_update", "categories", category.id).await;
    Ok(ApiResponse::success(
        format!("Category '{}' updated successfully!", category.name),
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub async fn soft_delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let existing = find_category(state, id).await?;
    if existing.is_deleted {
        return Err(AppError::bad_request("Category is already deleted."));
    }
    let mut active: CategoryActive = existing.into();
    active.is_deleted = Set(true);
    active.is_active = Set(false);
    active.deleted_at = Set(Some(Utc::now().into()));
    let category = active.update(&state.orm).await?;

    audit(state, user, "category_delete", "categories", category.id).await;
    Ok(ApiResponse::success(
        "Category deleted successfully!",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

pub async fn restore_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let existing = find_category(state, id).await?;
    if !existing.is_deleted {
        return Err(AppError::bad_request("Category is not deleted."));
    }
    let mut active: CategoryActive = existing.into();
    active.is_deleted = Set(false);
    active.is_active = Set(true);
    active.deleted_at = Set(None);
    let category = active.update(&state.orm).await?;

    audit(state, user, "category_restore", "categories", category.id).await;
    Ok(ApiResponse::success(
        format!("Category '{}' has been restored.", category.name),
        Category::from(category),
        Some(Meta::empty()),
    ))
}

// Products

/// Non-deleted variants (active or not) per product, ordered by volume then gender.
async fn variants_by_product<C: ConnectionTrait>(
    conn: &C,
    product_ids: Vec<Uuid>,
) -> AppResult<HashMap<Uuid, Vec<product_variants::Model>>> {
    let mut grouped: HashMap<Uuid, Vec<product_variants::Model>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(grouped);
    }
    for variant in ProductVariants::find()
        .filter(VariantCol::ProductId.is_in(product_ids))
        .filter(VariantCol::IsDeleted.eq(false))
        .order_by_asc(VariantCol::VolumeMl)
        .order_by_asc(VariantCol::Gender)
        .all(conn)
        .await?
    {
        grouped.entry(variant.product_id).or_default().push(variant);
    }
    Ok(grouped)
}

async fn product_rows<C: ConnectionTrait>(
    conn: &C,
    products: Vec<products::Model>,
) -> AppResult<Vec<AdminProductRow>> {
    let category_ids: Vec<Uuid> = products.iter().map(|p| p.category_id).collect();
    let category_names: HashMap<Uuid, String> = Categories::find()
        .filter(CategoryCol::Id.is_in(category_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let grouped = variants_by_product(conn, products.iter().map(|p| p.id).collect()).await?;

    Ok(products
        .into_iter()
        .map(|product| {
            let variants = grouped.get(&product.id).map(Vec::as_slice).unwrap_or(&[]);
            let live: Vec<product_variants::Model> =
                variants.iter().filter(|v| v.is_active).cloned().collect();
            let (min_price, max_price) = price_range(&live);
            AdminProductRow {
                category_name: category_names
                    .get(&product.category_id)
                    .cloned()
                    .unwrap_or_default(),
                variant_count: variants.len() as i64,
                total_stock: variants.iter().map(|v| i64::from(v.stock)).sum(),
                min_price,
                max_price,
                product: Product::from(product),
            }
        })
        .collect())
}

fn stock_subquery(filter: &str) -> Option<sea_orm::sea_query::SelectStatement> {
    let base = ProductVariants::find()
        .select_only()
        .column(VariantCol::ProductId)
        .filter(VariantCol::IsActive.eq(true))
        .filter(VariantCol::IsDeleted.eq(false));
    let scoped = match filter {
        "in_stock" => base.filter(VariantCol::Stock.gt(0)),
        "low_stock" => base
            .filter(VariantCol::Stock.gt(0))
            .filter(VariantCol::Stock.lte(LOW_STOCK_THRESHOLD)),
        "out_of_stock" => base.filter(VariantCol::Stock.eq(0)),
        _ => return None,
    };
    Some(scoped.into_query())
}

pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    query: AdminProductQuery,
) -> AppResult<ApiResponse<AdminProductList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(ProductCol::IsDeleted.eq(false));

    if let Some(q) = non_empty(&query.q) {
        let category_match = Categories::find()
            .select_only()
            .column(CategoryCol::Id)
            .filter(ilike((Categories, CategoryCol::Name), q))
            .into_query();
        condition = condition.add(match non_empty(&query.search_by).unwrap_or("all") {
            "name" => Condition::all().add(ilike((Products, ProductCol::Name), q)),
            "sku" => Condition::all().add(ilike((Products, ProductCol::Sku), q)),
            "brand" => Condition::all().add(ilike((Products, ProductCol::Brand), q)),
            "category" => Condition::all().add(ProductCol::CategoryId.in_subquery(category_match)),
            _ => Condition::any()
                .add(ilike((Products, ProductCol::Name), q))
                .add(ilike((Products, ProductCol::Sku), q))
                .add(ilike((Products, ProductCol::Brand), q))
                .add(ProductCol::CategoryId.in_subquery(category_match)),
        });
    }
    if let Some(category_id) = query.category_id {
        condition = condition.add(ProductCol::CategoryId.eq(category_id));
    }
    if let Some(active) = active_inactive(&query.status) {
        condition = condition.add(ProductCol::IsActive.eq(active));
    }
    if let Some(gender) = non_empty(&query.gender) {
        let gender_match = ProductVariants::find()
            .select_only()
            .column(VariantCol::ProductId)
            .filter(VariantCol::Gender.eq(gender))
            .filter(VariantCol::IsActive.eq(true))
            .filter(VariantCol::IsDeleted.eq(false))
            .into_query();
        condition = condition.add(ProductCol::Id.in_subquery(gender_match));
    }
    if let Some(flag) = yes_no(&query.featured) {
        condition = condition.add(ProductCol::IsFeatured.eq(flag));
    }
    if let Some(flag) = yes_no(&query.best_selling) {
        condition = condition.add(ProductCol::IsBestSelling.eq(flag));
    }
    if let Some(flag) = yes_no(&query.new_arrival) {
        condition = condition.add(ProductCol::IsNewArrival.eq(flag));
    }
    if let Some(stock) = non_empty(&query.stock).and_then(stock_subquery) {
        condition = condition.add(ProductCol::Id.in_subquery(stock));
    }

    let sort = non_empty(&query.sort).unwrap_or("newest");
    let finder = Products::find().filter(condition);
    let finder = match sort {
        "oldest" => finder.order_by_asc(ProductCol::CreatedAt),
        "name_asc" => finder.order_by_asc(ProductCol::Name),
        "name_desc" => finder.order_by_desc(ProductCol::Name),
        _ => finder.order_by_desc(ProductCol::CreatedAt),
    };

    let deleted_count = Products::find()
        .filter(ProductCol::IsDeleted.eq(true))
        .count(&state.orm)
        .await? as i64;

    // Aggregate sorts need every row's variants before paging.
    let aggregate_sort = matches!(sort, "price_high" | "price_low" | "stock_high" | "stock_low");
    let (items, total) = if aggregate_sort {
        let mut rows = product_rows(&state.orm, finder.all(&state.orm).await?).await?;
        match sort {
            "price_high" => rows.sort_by(|a, b| b.max_price.cmp(&a.max_price)),
            "price_low" => rows.sort_by_key(|r| r.min_price.unwrap_or(Decimal::MAX)),
            "stock_high" => rows.sort_by(|a, b| b.total_stock.cmp(&a.total_stock)),
            _ => rows.sort_by_key(|r| r.total_stock),
        }
        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(offset as usize)
            .take(per_page as usize)
            .collect();
        (items, total)
    } else {
        let total = finder.clone().count(&state.orm).await? as i64;
        let page_rows = finder
            .limit(per_page as u64)
            .offset(offset as u64)
            .all(&state.orm)
            .await?;
        (product_rows(&state.orm, page_rows).await?, total)
    };

    Ok(ApiResponse::success(
        "Products",
        AdminProductList {
            items,
            deleted_count,
        },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn trash(
    state: &AppState,
    user: &AuthUser,
    query: TrashQuery,
) -> AppResult<ApiResponse<AdminProductList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize();
    let mut finder = Products::find().filter(ProductCol::IsDeleted.eq(true));
    if let Some(q) = non_empty(&query.q) {
        finder = finder.filter(
            Condition::any()
                .add(ilike((Products, ProductCol::Name), q))
                .add(ilike((Products, ProductCol::Sku), q))
                .add(ilike((Products, ProductCol::Brand), q)),
        );
    }
    let finder = finder.order_by_desc(ProductCol::UpdatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let page_rows = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = product_rows(&state.orm, page_rows).await?;

    Ok(ApiResponse::success(
        "Trash",
        AdminProductList {
            items,
            deleted_count: total,
        },
        Some(Meta::new(page, per_page, total)),
    ))
}

/// First free slug among non-deleted products, skipping `except`.
pub async fn unique_product_slug<C: ConnectionTrait>(
    conn: &C,
    base: &str,
    except: Option<Uuid>,
) -> AppResult<String> {
    for candidate in slug::candidates(base) {
        let mut finder = Products::find()
            .filter(ProductCol::Slug.eq(candidate.as_str()))
            .filter(ProductCol::IsDeleted.eq(false));
        if let Some(id) = except {
            finder = finder.filter(ProductCol::Id.ne(id));
        }
        if finder.count(conn).await? == 0 {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(anyhow::anyhow!("no free slug for {base}")))
}

fn slug_base(name: &str, requested: Option<&str>) -> AppResult<String> {
    let base = slug::slugify(requested.unwrap_or(name));
    if base.is_empty() {
        return Err(AppError::bad_request(
            "Could not derive a slug from the product name.",
        ));
    }
    Ok(base)
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<()> {
    let exists = Categories::find_by_id(id)
        .filter(CategoryCol::IsDeleted.eq(false))
        .count(conn)
        .await?;
    if exists == 0 {
        return Err(AppError::bad_request("Category not found."));
    }
    Ok(())
}

struct VariantFields {
    volume_ml: i32,
    gender: String,
    price: Decimal,
    discount_price: Option<Decimal>,
    stock: i32,
}

fn check_variant(fields: &VariantFields) -> AppResult<()> {
    if fields.volume_ml <= 0 {
        return Err(AppError::bad_request("Volume must be greater than 0."));
    }
    if fields.price < Decimal::ZERO {
        return Err(AppError::bad_request("Price cannot be negative."));
    }
    if let Some(discount) = fields.discount_price {
        if discount < Decimal::ZERO {
            return Err(AppError::bad_request("Discount price cannot be negative."));
        }
        if discount >= fields.price {
            return Err(AppError::bad_request(
                "Discount price must be less than the regular price.",
            ));
        }
    }
    if fields.stock < 0 {
        return Err(AppError::bad_request("Stock cannot be negative."));
    }
    Ok(())
}

async fn ensure_unique_combination<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    fields: &VariantFields,
    except: Option<Uuid>,
) -> AppResult<()> {
    let mut finder = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(product_id))
        .filter(VariantCol::VolumeMl.eq(fields.volume_ml))
        .filter(VariantCol::Gender.eq(fields.gender.as_str()))
        .filter(VariantCol::IsDeleted.eq(false));
    if let Some(id) = except {
        finder = finder.filter(VariantCol::Id.ne(id));
    }
    if finder.count(conn).await? > 0 {
        return Err(AppError::Conflict(
            "A variant with this volume and gender already exists for this product.".into(),
        ));
    }
    Ok(())
}

async fn sku_taken<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    except: Option<Uuid>,
) -> AppResult<bool> {
    let mut finder = ProductVariants::find().filter(VariantCol::Sku.eq(sku));
    if let Some(id) = except {
        finder = finder.filter(VariantCol::Id.ne(id));
    }
    Ok(finder.count(conn).await? > 0)
}

async fn resolve_sku<C: ConnectionTrait>(
    conn: &C,
    requested: Option<String>,
    product: &products::Model,
    fields: &VariantFields,
    except: Option<Uuid>,
) -> AppResult<String> {
    if let Some(sku) = optional_text(requested) {
        if sku_taken(conn, &sku, except).await? {
            return Err(AppError::Conflict("SKU already exists.".into()));
        }
        return Ok(sku);
    }
    let base = slug::variant_sku_base(&product.sku, fields.volume_ml, &fields.gender);
    for candidate in slug::candidates(&base) {
        if !sku_taken(conn, &candidate, except).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(anyhow::anyhow!("no free sku for {base}")))
}

async fn insert_variant<C: ConnectionTrait>(
    conn: &C,
    product: &products::Model,
    payload: VariantRequest,
) -> AppResult<product_variants::Model> {
    let fields = VariantFields {
        volume_ml: payload.volume_ml,
        gender: validation::one_of(payload.gender.trim(), &validation::VARIANT_GENDERS, "gender")?,
        price: payload.price,
        discount_price: payload.discount_price,
        stock: payload.stock,
    };
    check_variant(&fields)?;
    ensure_unique_combination(conn, product.id, &fields, None).await?;
    let sku = resolve_sku(conn, payload.sku, product, &fields, None).await?;

    let now = Utc::now();
    Ok(VariantActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        volume_ml: Set(fields.volume_ml),
        gender: Set(fields.gender),
        sku: Set(sku),
        price: Set(fields.price),
        discount_price: Set(fields.discount_price),
        stock: Set(fields.stock),
        variant_image_url: Set(optional_text(payload.variant_image_url)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        is_deleted: Set(false),
        created_at: NotSet,
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await?)
}

async fn insert_image<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    payload: ImageRequest,
) -> AppResult<product_images::Model> {
    let image_url = validation::require(&payload.image_url, "Image URL")?;
    let existing = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product_id))
        .count(conn)
        .await?;
    Ok(ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        image_url: Set(image_url),
        alt_text: Set(optional_text(payload.alt_text)),
        is_default: Set(existing == 0),
        created_at: NotSet,
    }
    .insert(conn)
    .await?)
}

async fn product_detail<C: ConnectionTrait>(
    conn: &C,
    product: products::Model,
) -> AppResult<AdminProductDetail> {
    let category = Categories::find_by_id(product.category_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(product.id))
        .order_by_asc(VariantCol::VolumeMl)
        .order_by_asc(VariantCol::Gender)
        .all(conn)
        .await?;
    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .order_by_desc(ImageCol::IsDefault)
        .order_by_asc(ImageCol::CreatedAt)
        .all(conn)
        .await?;
    Ok(AdminProductDetail {
        product: Product::from(product),
        category: Category::from(category),
        variants: variants.into_iter().map(Variant::from).collect(),
        images: images.into_iter().map(ProductImage::from).collect(),
    })
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: ProductCreateRequest,
) -> AppResult<ApiResponse<AdminProductDetail>> {
    ensure_admin(user)?;
    let name = validation::require(&payload.name, "Product name")?;
    let sku = validation::require(&payload.sku, "SKU")?;

    let txn = state.orm.begin().await?;
    ensure_category(&txn, payload.category_id).await?;
    let base = slug_base(&name, payload.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()))?;
    let slug = unique_product_slug(&txn, &base, None).await?;

    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(payload.category_id),
        name: Set(name),
        slug: Set(Some(slug)),
        sku: Set(sku),
        description: Set(payload.description.trim().to_string()),
        main_image_url: Set(optional_text(payload.main_image_url)),
        brand: Set(optional_text(payload.brand)),
        fragrance_type: Set(optional_text(payload.fragrance_type)),
        occasion: Set(optional_text(payload.occasion)),
        is_featured: Set(payload.is_featured),
        is_best_selling: Set(payload.is_best_selling),
        is_new_arrival: Set(payload.is_new_arrival),
        is_active: Set(payload.is_active.unwrap_or(true)),
        avg_rating: Set(Decimal::ZERO),
        rating_count: Set(0),
        is_deleted: Set(false),
        created_at: NotSet,
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    for variant in payload.variants {
        insert_variant(&txn, &product, variant).await?;
    }
    for image in payload.images {
        insert_image(&txn, product.id, image).await?;
    }
    let detail = product_detail(&txn, product).await?;
    txn.commit().await?;

    audit(state, user, "product_create", "products", detail.product.id).await;
    Ok(ApiResponse::success(
        "Product added successfully!",
        detail,
        Some(Meta::empty()),
    ))
}

async fn find_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<products::Model> {
    Products::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

async fn find_live_product<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<products::Model> {
    let product = find_product(conn, id).await?;
    if product.is_deleted {
        return Err(AppError::NotFound);
    }
    Ok(product)
}

pub async fn get_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<AdminProductDetail>> {
    ensure_admin(user)?;
    let product = find_product(&state.orm, id).await?;
    let detail = product_detail(&state.orm, product).await?;
    Ok(ApiResponse::success("Product", detail, Some(Meta::empty())))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ProductUpdateRequest,
) -> AppResult<ApiResponse<AdminProductDetail>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = find_live_product(&txn, id).await?;
    let current_name = existing.name.clone();
    let mut active: ProductActive = existing.into();

    if let Some(category_id) = payload.category_id {
        ensure_category(&txn, category_id).await?;
        active.category_id = Set(category_id);
    }
    let name = match payload.name {
        Some(name) => {
            let name = validation::require(&name, "Product name")?;
            active.name = Set(name.clone());
            name
        }
        None => current_name,
    };
    if let Some(requested) = payload.slug {
        let requested = requested.trim();
        let base = slug_base(&name, (!requested.is_empty()).then_some(requested))?;
        active.slug = Set(Some(unique_product_slug(&txn, &base, Some(id)).await?));
    }
    if let Some(sku) = payload.sku {
        active.sku = Set(validation::require(&sku, "SKU")?);
    }
    if let Some(description) = payload.description {
        active.description = Set(description.trim().to_string());
    }
    if let Some(url) = payload.main_image_url {
        active.main_image_url = Set(optional_text(Some(url)));
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(optional_text(Some(brand)));
    }
    if let Some(fragrance_type) = payload.fragrance_type {
        active.fragrance_type = Set(optional_text(Some(fragrance_type)));
    }
    if let Some(occasion) = payload.occasion {
        active.occasion = Set(optional_text(Some(occasion)));
    }
    if let Some(flag) = payload.is_featured {
        active.is_featured = Set(flag);
    }
    if let Some(flag) = payload.is_best_selling {
        active.is_best_selling = Set(flag);
    }
    if let Some(flag) = payload.is_new_arrival {
        active.is_new_arrival = Set(flag);
    }
    if let Some(flag) = payload.is_active {
        active.is_active = Set(flag);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;
    let detail = product_detail(&txn, product).await?;
    txn.commit().await?;

    audit(state, user, "product_update", "products", id).await;
    Ok(ApiResponse::success(
        "Product updated successfully!",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn soft_delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = find_live_product(&txn, id).await?;
    let mut active: ProductActive = existing.into();
    active.is_deleted = Set(true);
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    ProductVariants::update_many()
        .col_expr(VariantCol::IsDeleted, Expr::value(true))
        .col_expr(VariantCol::IsActive, Expr::value(false))
        .filter(VariantCol::ProductId.eq(id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    audit(state, user, "product_delete", "products", id).await;
    Ok(ApiResponse::success(
        format!("Product '{}' has been moved to trash.", product.name),
        Product::from(product),
        Some(Meta::empty()),
    ))
}

/// Restoring gives the product back its slug if still free, otherwise the next free one.
pub async fn restore_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let existing = find_product(&txn, id).await?;
    if !existing.is_deleted {
        return Err(AppError::bad_request("Product is not in trash."));
    }
    let base = slug_base(&existing.name, existing.slug.as_deref())?;
    let slug = unique_product_slug(&txn, &base, Some(id)).await?;

    let mut active: ProductActive = existing.into();
    active.is_deleted = Set(false);
    active.is_active = Set(true);
    active.slug = Set(Some(slug));
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    // Variants come back one by one so a clashing combination stays in trash.
    let trashed = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(id))
        .filter(VariantCol::IsDeleted.eq(true))
        .order_by_asc(VariantCol::CreatedAt)
        .all(&txn)
        .await?;
    for variant in trashed {
        let fields = VariantFields {
            volume_ml: variant.volume_ml,
            gender: variant.gender.clone(),
            price: variant.price,
            discount_price: variant.discount_price,
            stock: variant.stock,
        };
        if ensure_unique_combination(&txn, id, &fields, Some(variant.id))
            .await
            .is_err()
        {
            continue;
        }
        let mut active: VariantActive = variant.into();
        active.is_deleted = Set(false);
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }
    txn.commit().await?;

    audit(state, user, "product_restore", "products", id).await;
    Ok(ApiResponse::success(
        format!("Product '{}' has been restored.", product.name),
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn permanent_delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let existing = find_product(&state.orm, id).await?;
    if !existing.is_deleted {
        return Err(AppError::bad_request(
            "Only products in trash can be permanently deleted.",
        ));
    }
    let ordered = OrderItems::find()
        .filter(
            OrderItemCol::VariantId.in_subquery(
                ProductVariants::find()
                    .select_only()
                    .column(VariantCol::Id)
                    .filter(VariantCol::ProductId.eq(id))
                    .into_query(),
            ),
        )
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "This product appears in customer orders and cannot be permanently deleted.".into(),
        ));
    }
    Products::delete_by_id(id).exec(&state.orm).await?;

    audit(state, user, "product_purge", "products", id).await;
    Ok(ApiResponse::success(
        format!("Product '{}' has been permanently deleted.", existing.name),
        serde_json::json!({ "id": id }),
        Some(Meta::empty()),
    ))
}

// Variants

async fn find_variant<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<product_variants::Model> {
    ProductVariants::find_by_id(variant_id)
        .filter(VariantCol::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn add_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: VariantRequest,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let product = find_live_product(&txn, product_id).await?;
    let variant = insert_variant(&txn, &product, payload).await?;
    txn.commit().await?;

    audit(state, user, "variant_create", "product_variants", variant.id).await;
    Ok(ApiResponse::success(
        "Variant added successfully!",
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

pub async fn update_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    variant_id: Uuid,
    payload: VariantUpdateRequest,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let product = find_live_product(&txn, product_id).await?;
    let existing = find_variant(&txn, product_id, variant_id).await?;
    if existing.is_deleted {
        return Err(AppError::NotFound);
    }

    let gender = match payload.gender {
        Some(g) => validation::one_of(g.trim(), &validation::VARIANT_GENDERS, "gender")?,
        None => existing.gender.clone(),
    };
    let discount_price = if payload.clear_discount {
        None
    } else {
        payload.discount_price.or(existing.discount_price)
    };
    let fields = VariantFields {
        volume_ml: payload.volume_ml.unwrap_or(existing.volume_ml),
        gender,
        price: payload.price.unwrap_or(existing.price),
        discount_price,
        stock: payload.stock.unwrap_or(existing.stock),
    };
    check_variant(&fields)?;
    ensure_unique_combination(&txn, product_id, &fields, Some(variant_id)).await?;
    let sku = match payload.sku {
        Some(sku) => resolve_sku(&txn, Some(sku), &product, &fields, Some(variant_id)).await?,
        None => existing.sku.clone(),
    };

    let mut active: VariantActive = existing.into();
    active.volume_ml = Set(fields.volume_ml);
    active.gender = Set(fields.gender);
    active.price = Set(fields.price);
    active.discount_price = Set(fields.discount_price);
    active.stock = Set(fields.stock);
    active.sku = Set(sku);
    if let Some(url) = payload.variant_image_url {
        active.variant_image_url = Set(optional_text(Some(url)));
    }
    if let Some(flag) = payload.is_active {
        active.is_active = Set(flag);
    }
    active.updated_at = Set(Utc::now().into());
    let variant = active.update(&txn).await?;
    txn.commit().await?;

    audit(state, user, "variant_update", "product_variants", variant.id).await;
    Ok(ApiResponse::success(
        "Variant updated successfully!",
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

pub async fn soft_delete_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    let existing = find_variant(&state.orm, product_id, variant_id).await?;
    if existing.is_deleted {
        return Err(AppError::NotFound);
    }
    let mut active: VariantActive = existing.into();
    active.is_deleted = Set(true);
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    let variant = active.update(&state.orm).await?;

    audit(state, user, "variant_delete", "product_variants", variant.id).await;
    Ok(ApiResponse::success(
        format!("Variant {} has been moved to trash.", variant.sku),
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

pub async fn restore_variant(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    variant_id: Uuid,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    let existing = find_variant(&state.orm, product_id, variant_id).await?;
    if !existing.is_deleted {
        return Err(AppError::bad_request("Variant is not deleted."));
    }
    let fields = VariantFields {
        volume_ml: existing.volume_ml,
        gender: existing.gender.clone(),
        price: existing.price,
        discount_price: existing.discount_price,
        stock: existing.stock,
    };
    ensure_unique_combination(&state.orm, product_id, &fields, Some(variant_id)).await?;

    let mut active: VariantActive = existing.into();
    active.is_deleted = Set(false);
    active.is_active = Set(true);
    active.updated_at = Set(Utc::now().into());
    let variant = active.update(&state.orm).await?;

    audit(state, user, "variant_restore", "product_variants", variant.id).await;
    Ok(ApiResponse::success(
        format!("Variant {} has been restored.", variant.sku),
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

// Images

pub async fn add_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: ImageRequest,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    find_live_product(&txn, product_id).await?;
    let image = insert_image(&txn, product_id, payload).await?;
    txn.commit().await?;

    audit(state, user, "image_create", "product_images", image.id).await;
    Ok(ApiResponse::success(
        "Image added successfully!",
        ProductImage::from(image),
        Some(Meta::empty()),
    ))
}

async fn find_image<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    image_id: Uuid,
) -> AppResult<product_images::Model> {
    ProductImages::find_by_id(image_id)
        .filter(ImageCol::ProductId.eq(product_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn delete_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    image_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let image = find_image(&txn, product_id, image_id).await?;
    ProductImages::delete_by_id(image.id).exec(&txn).await?;

    let mut new_default = None;
    if image.is_default {
        if let Some(next) = ProductImages::find()
            .filter(ImageCol::ProductId.eq(product_id))
            .order_by_asc(ImageCol::CreatedAt)
            .one(&txn)
            .await?
        {
            new_default = Some(next.id);
            let mut active: ImageActive = next.into();
            active.is_default = Set(true);
            active.update(&txn).await?;
        }
    }
    txn.commit().await?;

    audit(state, user, "image_delete", "product_images", image_id).await;
    Ok(ApiResponse::success(
        "Image deleted successfully!",
        serde_json::json!({ "deleted_id": image_id, "new_default_id": new_default }),
        Some(Meta::empty()),
    ))
}

pub async fn set_default_image(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    image_id: Uuid,
) -> AppResult<ApiResponse<ProductImage>> {
    ensure_admin(user)?;
    let txn = state.orm.begin().await?;
    let image = find_image(&txn, product_id, image_id).await?;
    ProductImages::update_many()
        .col_expr(ImageCol::IsDefault, Expr::value(false))
        .filter(ImageCol::ProductId.eq(product_id))
        .filter(ImageCol::Id.ne(image_id))
        .exec(&txn)
        .await?;
    let mut active: ImageActive = image.into();
    active.is_default = Set(true);
    let image = active.update(&txn).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Default image updated.",
        ProductImage::from(image),
        Some(Meta::empty()),
    ))
}
