use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::catalog::{
        AdminCategoryQuery, AdminProductDetail, AdminProductList, AdminProductQuery,
        CategoryList, CategoryRequest, CategoryUpdateRequest, ImageRequest, ProductCreateRequest,
        ProductUpdateRequest, TrashQuery, VariantRequest, VariantUpdateRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Category, Product, ProductImage, Variant},
    response::ApiResponse,
    services::admin_catalog_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            patch(update_category).delete(delete_category),
        )
        .route("/categories/{id}/restore", post(restore_category))
        .route("/products", get(list_products).post(create_product))
        .route("/products/trash", get(trash))
        .route(
            "/products/{id}",
            get(get_product).patch(update_product).delete(delete_product),
        )
        .route("/products/{id}/restore", post(restore_product))
        .route("/products/{id}/permanent", delete(permanent_delete_product))
        .route("/products/{id}/variants", post(add_variant))
        .route(
            "/products/{id}/variants/{variant_id}",
            patch(update_variant).delete(delete_variant),
        )
        .route(
            "/products/{id}/variants/{variant_id}/restore",
            post(restore_variant),
        )
        .route("/products/{id}/images", post(add_image))
        .route("/products/{id}/images/{image_id}", delete(delete_image))
        .route(
            "/products/{id}/images/{image_id}/default",
            post(set_default_image),
        )
}

#[utoipa::path(
    get,
    path = "/api/admin/categories",
    params(AdminCategoryQuery),
    responses(
        (status = 200, description = "Categories (admin view)", body = ApiResponse<CategoryList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminCategoryQuery>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    let resp = admin_catalog_service::list_categories(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<Category>),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Category>>)> {
    let resp = admin_catalog_service::create_category(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryUpdateRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<Category>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryUpdateRequest>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = admin_catalog_service::update_category(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category soft-deleted", body = ApiResponse<Category>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = admin_catalog_service::soft_delete_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/restore",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category restored", body = ApiResponse<Category>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn restore_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Category>>> {
    let resp = admin_catalog_service::restore_category(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(AdminProductQuery),
    responses(
        (status = 200, description = "Products with stock and price aggregates", body = ApiResponse<AdminProductList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminProductQuery>,
) -> AppResult<Json<ApiResponse<AdminProductList>>> {
    let resp = admin_catalog_service::list_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/trash",
    params(TrashQuery),
    responses(
        (status = 200, description = "Soft-deleted products", body = ApiResponse<AdminProductList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn trash(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TrashQuery>,
) -> AppResult<Json<ApiResponse<AdminProductList>>> {
    let resp = admin_catalog_service::trash(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products",
    request_body = ProductCreateRequest,
    responses(
        (status = 201, description = "Product created with variants and images", body = ApiResponse<AdminProductDetail>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Duplicate variant combination")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProductCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdminProductDetail>>)> {
    let resp = admin_catalog_service::create_product(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product with all variants and images", body = ApiResponse<AdminProductDetail>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AdminProductDetail>>> {
    let resp = admin_catalog_service::get_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductUpdateRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<AdminProductDetail>),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductUpdateRequest>,
) -> AppResult<Json<ApiResponse<AdminProductDetail>>> {
    let resp = admin_catalog_service::update_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product moved to trash", body = ApiResponse<Product>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = admin_catalog_service::soft_delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/restore",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product restored from trash", body = ApiResponse<Product>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn restore_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = admin_catalog_service::restore_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}/permanent",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product removed for good", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Product is not in the trash"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn permanent_delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = admin_catalog_service::permanent_delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/variants",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = VariantRequest,
    responses(
        (status = 201, description = "Variant added", body = ApiResponse<Variant>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Duplicate volume/gender combination")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn add_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VariantRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Variant>>)> {
    let resp = admin_catalog_service::add_variant(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    patch,
    path = "/api/admin/products/{id}/variants/{variant_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("variant_id" = Uuid, Path, description = "Variant ID")
    ),
    request_body = VariantUpdateRequest,
    responses(
        (status = 200, description = "Variant updated", body = ApiResponse<Variant>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Duplicate volume/gender combination")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<VariantUpdateRequest>,
) -> AppResult<Json<ApiResponse<Variant>>> {
    let resp =
        admin_catalog_service::update_variant(&state, &user, id, variant_id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}/variants/{variant_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("variant_id" = Uuid, Path, description = "Variant ID")
    ),
    responses(
        (status = 200, description = "Variant soft-deleted", body = ApiResponse<Variant>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn delete_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Variant>>> {
    let resp = admin_catalog_service::soft_delete_variant(&state, &user, id, variant_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/variants/{variant_id}/restore",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("variant_id" = Uuid, Path, description = "Variant ID")
    ),
    responses(
        (status = 200, description = "Variant restored", body = ApiResponse<Variant>),
        (status = 409, description = "A live variant already uses this combination")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn restore_variant(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, variant_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<Variant>>> {
    let resp = admin_catalog_service::restore_variant(&state, &user, id, variant_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/images",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ImageRequest,
    responses(
        (status = 201, description = "Image added", body = ApiResponse<ProductImage>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn add_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ImageRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductImage>>)> {
    let resp = admin_catalog_service::add_image(&state, &user, id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/{id}/images/{image_id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("image_id" = Uuid, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Image deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = admin_catalog_service::delete_image(&state, &user, id, image_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/images/{image_id}/default",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        ("image_id" = Uuid, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Default image set", body = ApiResponse<ProductImage>),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin Catalog"
)]
pub async fn set_default_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, image_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<ApiResponse<ProductImage>>> {
    let resp = admin_catalog_service::set_default_image(&state, &user, id, image_id).await?;
    Ok(Json(resp))
}
