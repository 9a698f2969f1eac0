use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::wishlist::{AddToWishlistRequest, WishlistChange, WishlistEntry, WishlistView},
    entity::{
        products::Entity as Products,
        wishlist_items::{
            self, ActiveModel as ItemActive, Column as ItemCol, Entity as WishlistItems,
        },
        wishlists::{
            self, ActiveModel as WishlistActive, Column as WishlistCol, Entity as Wishlists,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::catalog_service::build_cards,
    state::AppState,
};

pub(crate) async fn find_wishlist<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<wishlists::Model>> {
    Ok(Wishlists::find()
        .filter(WishlistCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn wishlist_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<wishlists::Model> {
    if let Some(wishlist) = find_wishlist(conn, user_id).await? {
        return Ok(wishlist);
    }
    let now = Utc::now();
    Wishlists::insert(WishlistActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        created_at: NotSet,
        updated_at: Set(now.into()),
    })
    .on_conflict(OnConflict::column(WishlistCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;
    find_wishlist(conn, user_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("wishlist missing after insert")))
}

pub(crate) async fn count_for_user<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<i64> {
    let Some(wishlist) = find_wishlist(conn, user_id).await? else {
        return Ok(0);
    };
    Ok(WishlistItems::find()
        .filter(ItemCol::WishlistId.eq(wishlist.id))
        .count(conn)
        .await? as i64)
}

/// Drop `product_id` from the user's wishlist; returns whether a row was removed.
pub(crate) async fn remove_product<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let Some(wishlist) = find_wishlist(conn, user_id).await? else {
        return Ok(false);
    };
    let result = WishlistItems::delete_many()
        .filter(ItemCol::WishlistId.eq(wishlist.id))
        .filter(ItemCol::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

pub async fn view_wishlist(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<WishlistView>> {
    let conn = &state.orm;
    let Some(wishlist) = find_wishlist(conn, user.user_id).await? else {
        return Ok(ApiResponse::success(
            "OK",
            WishlistView {
                items: Vec::new(),
                count: 0,
            },
            Some(Meta::new(1, 0, 0)),
        ));
    };

    let rows: Vec<(wishlist_items::Model, Option<crate::entity::products::Model>)> =
        WishlistItems::find()
            .filter(ItemCol::WishlistId.eq(wishlist.id))
            .order_by_desc(ItemCol::AddedAt)
            .find_also_related(Products)
            .all(conn)
            .await?;

    let products: Vec<_> = rows.iter().filter_map(|(_, p)| p.clone()).collect();
    let cards = build_cards(conn, &products).await?;
    let items: Vec<WishlistEntry> = rows
        .into_iter()
        .filter_map(|(item, product)| {
            let product = product?;
            let card = cards.iter().find(|c| c.id == product.id)?.clone();
            Some(WishlistEntry {
                id: item.id,
                added_at: item.added_at.with_timezone(&Utc),
                product: card,
            })
        })
        .collect();
    let count = items.len() as i64;

    Ok(ApiResponse::success(
        "OK",
        WishlistView { items, count },
        Some(Meta::new(1, count, count)),
    ))
}

pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddToWishlistRequest,
) -> AppResult<ApiResponse<WishlistChange>> {
    let conn = &state.orm;
    let product = Products::find_by_id(payload.product_id)
        .one(conn)
        .await?
        .filter(|p| p.is_live())
        .ok_or(AppError::NotFound)?;

    let wishlist = wishlist_for_user(conn, user.user_id).await?;
    let existing = WishlistItems::find()
        .filter(ItemCol::WishlistId.eq(wishlist.id))
        .filter(ItemCol::ProductId.eq(product.id))
        .one(conn)
        .await?;
    if let Some(item) = existing {
        let count = count_for_user(conn, user.user_id).await?;
        return Ok(ApiResponse::success(
            "Product is already in your wishlist.",
            WishlistChange {
                item_id: Some(item.id),
                count,
            },
            Some(Meta::empty()),
        ));
    }

    let item = ItemActive {
        id: Set(Uuid::new_v4()),
        wishlist_id: Set(wishlist.id),
        product_id: Set(product.id),
        added_at: NotSet,
    }
    .insert(conn)
    .await?;
    let count = count_for_user(conn, user.user_id).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "wishlist_add",
        "wishlist_items",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added to wishlist successfully!",
        WishlistChange {
            item_id: Some(item.id),
            count,
        },
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<WishlistChange>> {
    let conn = &state.orm;
    let wishlist = find_wishlist(conn, user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let result = WishlistItems::delete_many()
        .filter(ItemCol::Id.eq(item_id))
        .filter(ItemCol::WishlistId.eq(wishlist.id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    let count = count_for_user(conn, user.user_id).await?;

    Ok(ApiResponse::success(
        "Item removed from wishlist",
        WishlistChange {
            item_id: None,
            count,
        },
        Some(Meta::empty()),
    ))
}
