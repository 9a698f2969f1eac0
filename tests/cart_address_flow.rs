mod common;

use std::sync::Arc;

use common::{address_request, create_admin, create_category, create_product, rejection, variant};
use rust_decimal::Decimal;
use sanjeri_api::{
    dto::{
        cart::{AddToCartRequest, CartAction, UpdateCartItemRequest},
        wishlist::AddToWishlistRequest,
    },
    error::AppError,
    middleware::auth::{AuthUser, ROLE_USER},
    notify::MemoryMailer,
    services::{address_service, cart_service, wishlist_service},
    state::AppState,
};
use uuid::Uuid;

async fn default_address(state: &AppState, user: &AuthUser) -> anyhow::Result<Option<Uuid>> {
    let list = address_service::list_addresses(state, user).await?.data.unwrap();
    Ok(list.items.iter().find(|a| a.is_default).map(|a| a.id))
}

async fn update(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    action: CartAction,
    quantity: Option<i32>,
) -> Result<(String, Option<i32>), AppError> {
    let response =
        cart_service::update_item(state, user, item_id, UpdateCartItemRequest { action, quantity })
            .await?;
    let quantity = response
        .data
        .and_then(|m| m.item)
        .map(|line| line.quantity);
    Ok((response.message, quantity))
}

fn add(variant_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        variant_id,
        quantity: Some(quantity),
    }
}

// Address book defaults, then every cart mutation against live stock.
#[tokio::test]
async fn address_book_and_cart_mutations() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        common::skip_notice();
        return Ok(());
    };
    let state = common::db_state(&database_url, Arc::new(MemoryMailer::new()), None).await?;
    let admin = create_admin(&state).await?;
    let user =
        common::create_user(&state, "kavya", "kavya@example.com", "kavya-pass", ROLE_USER).await?;

    // Addresses
    let home = address_service::create_address(
        &state,
        &user,
        address_request("Kavya Home", "9876543210"),
    )
    .await?
    .data
    .unwrap();
    assert!(home.is_default);

    let office = address_service::create_address(
        &state,
        &user,
        address_request("Kavya Office", "9876543211"),
    )
    .await?
    .data
    .unwrap();
    assert!(!office.is_default);

    let mut flagged = address_request("Kavya Parents", "9876543212");
    flagged.is_default = true;
    let parents = address_service::create_address(&state, &user, flagged)
        .await?
        .data
        .unwrap();
    assert!(parents.is_default);
    assert_eq!(default_address(&state, &user).await?, Some(parents.id));

    address_service::set_default_address(&state, &user, office.id).await?;
    assert_eq!(default_address(&state, &user).await?, Some(office.id));

    let stranger =
        common::create_user(&state, "arun", "arun@example.com", "arun-pass", ROLE_USER).await?;
    let foreign = address_service::set_default_address(&state, &stranger, office.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    // Dropping the default promotes the newest remaining address.
    let deleted = address_service::delete_address(&state, &user, office.id)
        .await?
        .data
        .unwrap();
    assert_eq!(deleted["new_default_id"], parents.id.to_string());
    assert_eq!(default_address(&state, &user).await?, Some(parents.id));

    let deleted = address_service::delete_address(&state, &user, home.id)
        .await?
        .data
        .unwrap();
    assert!(deleted["new_default_id"].is_null());
    assert_eq!(default_address(&state, &user).await?, Some(parents.id));

    // Catalog
    let category = create_category(&state, &admin, "Attar").await?;
    let rose = create_product(
        &state,
        &admin,
        category.id,
        "Rose Attar",
        "SJ-ROSE",
        vec![variant(50, "Unisex", 1000, None, 9)],
    )
    .await?;
    let musk = create_product(
        &state,
        &admin,
        category.id,
        "White Musk",
        "SJ-MUSK",
        vec![variant(100, "Female", 800, Some(700), 3)],
    )
    .await?;
    let amber = create_product(
        &state,
        &admin,
        category.id,
        "Amber Night",
        "SJ-AMBR",
        vec![variant(100, "Male", 1500, None, 40)],
    )
    .await?;
    let rose_variant = rose.variants[0].id;
    let musk_variant = musk.variants[0].id;

    // Merging never passes the stock on hand.
    cart_service::add_to_cart(&state, &user, add(rose_variant, 3)).await?;
    let merged = cart_service::add_to_cart(&state, &user, add(rose_variant, 8)).await?;
    assert_eq!(merged.message, "Updated to maximum available stock: 9");
    let line = merged.data.unwrap().item.unwrap();
    assert_eq!(line.quantity, 9);
    assert!(line.flags.is_available);
    let rose_item = line.id;

    let full = update(&state, &user, rose_item, CartAction::Increment, None).await;
    assert_eq!(rejection(full), "Only 9 items available in stock.");

    let (_, quantity) = update(&state, &user, rose_item, CartAction::SetQuantity, Some(2)).await?;
    assert_eq!(quantity, Some(2));
    let (message, quantity) =
        update(&state, &user, rose_item, CartAction::Increment, None).await?;
    assert_eq!(message, "Cart updated successfully!");
    assert_eq!(quantity, Some(3));

    let too_many = update(&state, &user, rose_item, CartAction::SetQuantity, Some(11)).await;
    assert_eq!(rejection(too_many), "Cannot add more than 10 items of this product.");
    let over_stock = update(&state, &user, rose_item, CartAction::SetQuantity, Some(10)).await;
    assert_eq!(rejection(over_stock), "Only 9 items available in stock.");
    let zero = update(&state, &user, rose_item, CartAction::SetQuantity, Some(0)).await;
    assert_eq!(rejection(zero), "Quantity must be at least 1.");
    let missing = update(&state, &user, rose_item, CartAction::SetQuantity, None).await;
    assert_eq!(rejection(missing), "Quantity is required.");

    let musk_line = cart_service::add_to_cart(&state, &user, add(musk_variant, 2))
        .await?
        .data
        .unwrap();
    let musk_item = musk_line.item.unwrap().id;
    assert_eq!(musk_line.cart_total_items, 5);
    assert_eq!(musk_line.subtotal, Decimal::from(3 * 1000 + 2 * 700));

    // Decrementing the last unit drops the line.
    let (_, quantity) = update(&state, &user, musk_item, CartAction::Decrement, None).await?;
    assert_eq!(quantity, Some(1));
    let (message, quantity) =
        update(&state, &user, musk_item, CartAction::Decrement, None).await?;
    assert_eq!(message, "'White Musk' removed from cart.");
    assert_eq!(quantity, None);
    let gone = update(&state, &user, musk_item, CartAction::Increment, None).await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    // Someone else's line is invisible.
    let foreign = update(&state, &stranger, rose_item, CartAction::Increment, None).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    wishlist_service::add_to_wishlist(
        &state,
        &user,
        AddToWishlistRequest {
            product_id: amber.product.id,
        },
    )
    .await?;
    let count = cart_service::cart_count(&state, &user).await?.data.unwrap();
    assert_eq!(count.total_items, 3);
    assert_eq!(count.subtotal, Decimal::from(3000));
    assert_eq!(count.wishlist_count, 1);

    cart_service::add_to_cart(&state, &user, add(musk_variant, 1)).await?;
    let cleared = cart_service::clear_cart(&state, &user).await?;
    assert_eq!(cleared.message, "Cart cleared successfully! 4 items removed.");
    let cleared = cleared.data.unwrap();
    assert_eq!(cleared.units_removed, 4);
    assert_eq!(cleared.variant_ids.len(), 2);

    let count = cart_service::cart_count(&state, &user).await?.data.unwrap();
    assert_eq!(count.total_items, 0);
    assert_eq!(count.wishlist_count, 1);

    let empty = cart_service::clear_cart(&state, &stranger).await?;
    assert_eq!(empty.message, "Your cart is already empty.");

    Ok(())
}
