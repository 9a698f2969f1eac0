use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{LockType, OnConflict},
};
use uuid::Uuid;

use crate::{
    audit,
    domain::availability::{self, LineState},
    dto::cart::{
        AddToCartRequest, CartAction, CartCount, CartLine, CartMutation, CartView, ClearedCart,
        UpdateCartItemRequest, VariantInCart,
    },
    entity::{
        cart_items::{self, ActiveModel as ItemActive, Column as ItemCol, Entity as CartItems},
        carts::{self, ActiveModel as CartActive, Column as CartCol, Entity as Carts},
        categories::{Column as CategoryCol, Entity as Categories},
        product_variants::{self, Column as VariantCol, Entity as ProductVariants},
        products::{self, Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::wishlist_service,
    state::AppState,
};

/// A cart item joined with everything its availability depends on.
#[derive(Debug, Clone)]
pub(crate) struct LoadedLine {
    pub item: cart_items::Model,
    pub variant: product_variants::Model,
    pub product: products::Model,
    pub category_live: bool,
}

impl LoadedLine {
    pub fn state(&self) -> LineState {
        LineState {
            product_live: self.product.is_live(),
            category_live: self.category_live,
            variant_live: self.variant.is_live(),
            stock: self.variant.stock,
            quantity: self.item.quantity,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        self.variant.display_price()
    }

    pub fn total_price(&self) -> Decimal {
        self.unit_price() * Decimal::from(self.item.quantity)
    }

    pub fn image_url(&self) -> Option<String> {
        self.variant
            .variant_image_url
            .clone()
            .or_else(|| self.product.main_image_url.clone())
    }

    pub fn to_line(&self) -> CartLine {
        CartLine {
            id: self.item.id,
            variant_id: self.variant.id,
            product_id: self.product.id,
            product_name: self.product.name.clone(),
            product_slug: self.product.slug.clone(),
            image_url: self.image_url(),
            volume_ml: self.variant.volume_ml,
            gender: self.variant.gender.clone(),
            sku: self.variant.sku.clone(),
            unit_price: self.unit_price(),
            quantity: self.item.quantity,
            total_price: self.total_price(),
            stock: self.variant.stock,
            flags: self.state().flags(),
        }
    }
}

pub(crate) async fn find_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<carts::Model>> {
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn cart_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<carts::Model> {
    if let Some(cart) = find_cart(conn, user_id).await? {
        return Ok(cart);
    }
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: NotSet,
        updated_at: Set(Utc::now().into()),
    })
    .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;
    find_cart(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cart missing after insert")))
}

/// Cart items newest first. With `lock`, the variant rows are held `FOR UPDATE`.
pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    lock: bool,
) -> AppResult<Vec<LoadedLine>> {
    let items = CartItems::find()
        .filter(ItemCol::CartId.eq(cart_id))
        .order_by_desc(ItemCol::AddedAt)
        .all(conn)
        .await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut variant_query = ProductVariants::find()
        .filter(VariantCol::Id.is_in(items.iter().map(|i| i.variant_id)))
        .order_by_asc(VariantCol::Id);
    if lock {
        variant_query = variant_query.lock(LockType::Update);
    }
    let variants: HashMap<Uuid, product_variants::Model> = variant_query
        .all(conn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    let products: HashMap<Uuid, products::Model> = Products::find()
        .filter(ProductCol::Id.is_in(variants.values().map(|v| v.product_id)))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let live_categories: Vec<Uuid> = Categories::find()
        .filter(CategoryCol::Id.is_in(products.values().map(|p| p.category_id)))
        .filter(CategoryCol::IsActive.eq(true))
        .filter(CategoryCol::IsDeleted.eq(false))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let variant = variants.get(&item.variant_id)?.clone();
            let product = products.get(&variant.product_id)?.clone();
            let category_live = live_categories.contains(&product.category_id);
            Some(LoadedLine {
                item,
                variant,
                product,
                category_live,
            })
        })
        .collect())
}

pub(crate) fn totals(lines: &[LoadedLine]) -> (i64, Decimal) {
    let total_items = lines.iter().map(|l| i64::from(l.item.quantity)).sum();
    let subtotal = lines.iter().map(LoadedLine::total_price).sum();
    (total_items, subtotal)
}

pub(crate) fn cart_view(lines: &[LoadedLine]) -> CartView {
    let (total_items, subtotal) = totals(lines);
    let items: Vec<CartLine> = lines.iter().map(LoadedLine::to_line).collect();
    let (available, unavailable): (Vec<&CartLine>, Vec<&CartLine>) =
        items.iter().partition(|l| l.flags.is_available);
    CartView {
        can_checkout: total_items > 0 && unavailable.is_empty(),
        available_item_ids: available.iter().map(|l| l.id).collect(),
        unavailable_item_ids: unavailable.iter().map(|l| l.id).collect(),
        total_items,
        subtotal,
        items,
    }
}

async fn lines_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<LoadedLine>> {
    match find_cart(conn, user_id).await? {
        Some(cart) => load_lines(conn, cart.id, false).await,
        None => Ok(Vec::new()),
    }
}

async fn mutation<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    item_id: Uuid,
) -> AppResult<CartMutation> {
    let lines = load_lines(conn, cart_id, false).await?;
    let (cart_total_items, subtotal) = totals(&lines);
    let item = lines
        .iter()
        .find(|l| l.item.id == item_id)
        .map(LoadedLine::to_line);
    Ok(CartMutation {
        item_removed: item.is_none(),
        item,
        cart_total_items,
        subtotal,
    })
}

pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let lines = lines_for_user(&state.orm, user.user_id).await?;
    let view = cart_view(&lines);
    let count = view.items.len() as i64;
    Ok(ApiResponse::success("OK", view, Some(Meta::new(1, count, count))))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartMutation>> {
    let requested = payload.quantity.unwrap_or(1);
    let txn = state.orm.begin().await?;

    let variant = ProductVariants::find_by_id(payload.variant_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = Products::find_by_id(variant.product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let category_live = Categories::find_by_id(product.category_id)
        .one(&txn)
        .await?
        .is_some_and(|c| c.is_active && !c.is_deleted);

    let cart = cart_for_user(&txn, user.user_id).await?;
    let existing = CartItems::find()
        .filter(ItemCol::CartId.eq(cart.id))
        .filter(ItemCol::VariantId.eq(variant.id))
        .one(&txn)
        .await?;

    LineState {
        product_live: product.is_live(),
        category_live,
        variant_live: variant.is_live(),
        stock: variant.stock,
        quantity: existing.as_ref().map(|i| i.quantity).unwrap_or(0),
    }
    .check_add(requested)?;

    let (item_id, message) = match existing {
        Some(item) => {
            let (quantity, message) =
                availability::merge_quantity(item.quantity, requested, variant.stock);
            let id = item.id;
            let mut active: ItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
            (id, message)
        }
        None => {
            let item = ItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                variant_id: Set(variant.id),
                quantity: Set(requested),
                added_at: NotSet,
            }
            .insert(&txn)
            .await?;
            (item.id, "Product added to cart successfully!".to_string())
        }
    };

    wishlist_service::remove_product(&txn, user.user_id, product.id).await?;
    let result = mutation(&txn, cart.id, item_id).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "variant_id": variant.id, "quantity": requested }),
    )
    .await;

    Ok(ApiResponse::success(message, result, Some(Meta::empty())))
}

async fn owned_line<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
    lock: bool,
) -> AppResult<(carts::Model, LoadedLine)> {
    let cart = find_cart(conn, user_id).await?.ok_or(AppError::NotFound)?;
    let line = load_lines(conn, cart.id, lock)
        .await?
        .into_iter()
        .find(|l| l.item.id == item_id)
        .ok_or(AppError::NotFound)?;
    Ok((cart, line))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartMutation>> {
    let txn = state.orm.begin().await?;
    let (cart, line) = owned_line(&txn, user.user_id, item_id, true).await?;
    let product_name = line.product.name.clone();

    let message = match payload.action {
        CartAction::Increment => {
            let quantity = line.state().check_increment()?;
            let mut active: ItemActive = line.item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
            "Cart updated successfully!".to_string()
        }
        CartAction::Decrement => {
            if line.item.quantity <= 1 {
                CartItems::delete_by_id(line.item.id).exec(&txn).await?;
                format!("'{product_name}' removed from cart.")
            } else {
                let quantity = line.item.quantity - 1;
                let mut active: ItemActive = line.item.into();
                active.quantity = Set(quantity);
                active.update(&txn).await?;
                "Cart updated successfully!".to_string()
            }
        }
        CartAction::SetQuantity => {
            let requested = payload
                .quantity
                .ok_or_else(|| AppError::bad_request("Quantity is required."))?;
            let quantity = availability::check_set_quantity(requested, line.variant.stock)?;
            let mut active: ItemActive = line.item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
            "Cart updated successfully!".to_string()
        }
    };

    let result = mutation(&txn, cart.id, item_id).await?;
    txn.commit().await?;
    Ok(ApiResponse::success(message, result, Some(Meta::empty())))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartMutation>> {
    let conn = &state.orm;
    let (cart, line) = owned_line(conn, user.user_id, item_id, false).await?;
    CartItems::delete_by_id(line.item.id).exec(conn).await?;
    let result = mutation(conn, cart.id, item_id).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("'{}' removed from cart.", line.product.name),
        result,
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ClearedCart>> {
    let txn = state.orm.begin().await?;
    let Some(cart) = find_cart(&txn, user.user_id).await? else {
        return Ok(ApiResponse::success(
            "Your cart is already empty.",
            ClearedCart {
                units_removed: 0,
                variant_ids: Vec::new(),
            },
            Some(Meta::empty()),
        ));
    };
    let items = CartItems::find()
        .filter(ItemCol::CartId.eq(cart.id))
        .all(&txn)
        .await?;
    CartItems::delete_many()
        .filter(ItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    let units_removed: i64 = items.iter().map(|i| i64::from(i.quantity)).sum();
    Ok(ApiResponse::success(
        format!("Cart cleared successfully! {units_removed} items removed."),
        ClearedCart {
            units_removed,
            variant_ids: items.into_iter().map(|i| i.variant_id).collect(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn cart_count(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartCount>> {
    let lines = lines_for_user(&state.orm, user.user_id).await?;
    let (total_items, subtotal) = totals(&lines);
    let wishlist_count = wishlist_service::count_for_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "OK",
        CartCount {
            total_items,
            subtotal,
            wishlist_count,
        },
        Some(Meta::empty()),
    ))
}

pub async fn variant_in_cart(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
) -> AppResult<ApiResponse<VariantInCart>> {
    let item = match find_cart(&state.orm, user.user_id).await? {
        Some(cart) => {
            CartItems::find()
                .filter(ItemCol::CartId.eq(cart.id))
                .filter(ItemCol::VariantId.eq(variant_id))
                .one(&state.orm)
                .await?
        }
        None => None,
    };
    Ok(ApiResponse::success(
        "OK",
        VariantInCart {
            in_cart: item.is_some(),
            item_id: item.as_ref().map(|i| i.id),
            quantity: item.map(|i| i.quantity).unwrap_or(0),
        },
        Some(Meta::empty()),
    ))
}
