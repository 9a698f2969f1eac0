mod common;

use std::sync::Arc;

use common::{
    address_request, cod_order, create_admin, create_category, create_product, rejection, variant,
};
use sanjeri_api::{
    domain::order_rules::ALL_ITEMS_CANCELLED_REASON,
    dto::{admin::AdminOrderQuery, cart::AddToCartRequest, orders::CancelRequest},
    error::AppError,
    middleware::auth::{AuthUser, ROLE_USER},
    notify::MemoryMailer,
    services::{
        address_service, admin_catalog_service, admin_service, cart_service, order_service,
    },
    state::AppState,
};
use uuid::Uuid;

async fn stock_of(
    state: &AppState,
    admin: &AuthUser,
    product_id: Uuid,
    variant_id: Uuid,
) -> anyhow::Result<i32> {
    let detail = admin_catalog_service::get_product(state, admin, product_id)
        .await?
        .data
        .unwrap();
    Ok(detail
        .variants
        .iter()
        .find(|v| v.id == variant_id)
        .map(|v| v.stock)
        .unwrap_or_default())
}

async fn order_of(
    state: &AppState,
    user: &AuthUser,
    lines: &[(Uuid, i32)],
    address_id: Uuid,
) -> anyhow::Result<Uuid> {
    for &(variant_id, quantity) in lines {
        cart_service::add_to_cart(
            state,
            user,
            AddToCartRequest {
                variant_id,
                quantity: Some(quantity),
            },
        )
        .await?;
    }
    let placed = order_service::place_order(state, user, cod_order(Some(address_id)))
        .await?
        .data
        .unwrap();
    Ok(placed.order.id)
}

async fn search(
    state: &AppState,
    admin: &AuthUser,
    search: Option<&str>,
    status: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let list = admin_service::list_orders(
        state,
        admin,
        AdminOrderQuery {
            search: search.map(str::to_string),
            status: status.map(str::to_string),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    Ok(list.items.into_iter().map(|row| row.order.order_number).collect())
}

fn cancel(reason: &str) -> CancelRequest {
    CancelRequest {
        reason: Some(reason.into()),
    }
}

// Trash and restore, item-level cancellation, purge guards and the admin order search.
#[tokio::test]
async fn catalog_lifecycle_and_order_admin() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        common::skip_notice();
        return Ok(());
    };
    let state = common::db_state(&database_url, Arc::new(MemoryMailer::new()), None).await?;
    let admin = create_admin(&state).await?;
    let category = create_category(&state, &admin, "Oud").await?;

    // Restoring re-uniques the slug a newer product took in the meantime.
    let royale = create_product(
        &state,
        &admin,
        category.id,
        "Oud Royale",
        "SJ-ROY",
        vec![
            variant(50, "Male", 2000, None, 10),
            variant(100, "Male", 3000, None, 10),
        ],
    )
    .await?;
    assert_eq!(royale.product.slug.as_deref(), Some("oud-royale"));
    let royale_id = royale.product.id;

    admin_catalog_service::soft_delete_product(&state, &admin, royale_id).await?;
    let gone = admin_catalog_service::add_variant(
        &state,
        &admin,
        royale_id,
        variant(30, "Male", 900, None, 5),
    )
    .await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    let successor = create_product(
        &state,
        &admin,
        category.id,
        "Oud Royale",
        "SJ-ROY2",
        vec![variant(50, "Unisex", 2200, None, 10)],
    )
    .await?;
    assert_eq!(successor.product.slug.as_deref(), Some("oud-royale"));

    let restored = admin_catalog_service::restore_product(&state, &admin, royale_id)
        .await?
        .data
        .unwrap();
    assert_eq!(restored.slug.as_deref(), Some("oud-royale-1"));
    let twice = admin_catalog_service::restore_product(&state, &admin, royale_id).await;
    assert_eq!(rejection(twice), "Product is not in trash.");

    let detail = admin_catalog_service::get_product(&state, &admin, royale_id)
        .await?
        .data
        .unwrap();
    assert!(detail.variants.iter().all(|v| !v.is_deleted && v.is_active));
    let small = detail.variants.iter().find(|v| v.volume_ml == 50).unwrap().id;
    let large = detail.variants.iter().find(|v| v.volume_ml == 100).unwrap().id;

    // A trashed variant cannot come back over a newer one with the same combination.
    admin_catalog_service::soft_delete_variant(&state, &admin, royale_id, small).await?;
    let again = admin_catalog_service::soft_delete_variant(&state, &admin, royale_id, small).await;
    assert!(matches!(again, Err(AppError::NotFound)));
    let replacement = admin_catalog_service::add_variant(
        &state,
        &admin,
        royale_id,
        variant(50, "Male", 2100, None, 4),
    )
    .await?
    .data
    .unwrap();
    assert_ne!(replacement.sku, "SJ-ROY-50-MAL");
    let clash = admin_catalog_service::restore_variant(&state, &admin, royale_id, small).await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));
    let live = admin_catalog_service::restore_variant(&state, &admin, royale_id, large).await;
    assert_eq!(rejection(live), "Variant is not deleted.");

    // Item-level cancellation
    let kavya =
        common::create_user(&state, "kavya", "kavya@example.com", "kavya-pass", ROLE_USER).await?;
    let ravi =
        common::create_user(&state, "ravi", "ravi@example.com", "ravi-pass", ROLE_USER).await?;
    let kavya_home = address_service::create_address(
        &state,
        &kavya,
        address_request("Kavya Menon", "9876543210"),
    )
    .await?
    .data
    .unwrap();
    let ravi_home = address_service::create_address(
        &state,
        &ravi,
        address_request("Ravi Kumar", "9123456780"),
    )
    .await?
    .data
    .unwrap();

    let successor_variant = successor.variants[0].id;
    let first = order_of(
        &state,
        &kavya,
        &[(large, 2), (successor_variant, 1)],
        kavya_home.id,
    )
    .await?;
    assert_eq!(stock_of(&state, &admin, royale_id, large).await?, 8);

    let detail = order_service::order_detail(&state, &kavya, first)
        .await?
        .data
        .unwrap();
    let large_item = detail.items.iter().find(|i| i.variant_id == large).unwrap().id;
    let other_item = detail
        .items
        .iter()
        .find(|i| i.variant_id == successor_variant)
        .unwrap()
        .id;

    let foreign =
        order_service::cancel_order_item(&state, &ravi, large_item, cancel("not mine")).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    let partial =
        order_service::cancel_order_item(&state, &kavya, large_item, cancel("Changed my mind"))
            .await?;
    assert_eq!(partial.message, "Oud Royale has been cancelled.");
    let partial = partial.data.unwrap();
    assert_eq!(partial.order.status, "pending");
    assert!(partial.can_cancel);
    let cancelled_item = partial.items.iter().find(|i| i.id == large_item).unwrap();
    assert!(cancelled_item.is_cancelled);
    assert_eq!(cancelled_item.cancellation_reason.as_deref(), Some("Changed my mind"));
    assert_eq!(stock_of(&state, &admin, royale_id, large).await?, 10);

    let repeat =
        order_service::cancel_order_item(&state, &kavya, large_item, cancel("again")).await;
    assert_eq!(rejection(repeat), "This item is already cancelled.");

    let last = order_service::cancel_order_item(&state, &kavya, other_item, cancel("")).await?;
    assert!(last.message.ends_with("Order marked as cancelled."));
    let last = last.data.unwrap();
    assert_eq!(last.order.status, "cancelled");
    assert_eq!(
        last.order.cancellation_reason.as_deref(),
        Some(ALL_ITEMS_CANCELLED_REASON)
    );
    assert!(last.order.cancelled_at.is_some());
    assert!(last.items.iter().all(|i| i.is_cancelled));
    assert_eq!(
        stock_of(&state, &admin, successor.product.id, successor_variant).await?,
        10
    );

    // Purging is refused while any order references the product.
    let live = admin_catalog_service::permanent_delete_product(&state, &admin, royale_id).await;
    assert_eq!(
        rejection(live),
        "Only products in trash can be permanently deleted."
    );
    admin_catalog_service::soft_delete_product(&state, &admin, royale_id).await?;
    let ordered = admin_catalog_service::permanent_delete_product(&state, &admin, royale_id).await;
    assert!(matches!(ordered, Err(AppError::Conflict(_))));
    let kept = order_service::order_detail(&state, &kavya, first)
        .await?
        .data
        .unwrap();
    assert_eq!(kept.items.len(), 2);

    let unsold = create_product(
        &state,
        &admin,
        category.id,
        "Saffron Mist",
        "SJ-SAF",
        vec![variant(50, "Female", 1800, None, 6)],
    )
    .await?;
    admin_catalog_service::soft_delete_product(&state, &admin, unsold.product.id).await?;
    admin_catalog_service::permanent_delete_product(&state, &admin, unsold.product.id).await?;
    let purged = admin_catalog_service::get_product(&state, &admin, unsold.product.id).await;
    assert!(matches!(purged, Err(AppError::NotFound)));

    // Admin order search
    let second = order_of(&state, &ravi, &[(successor_variant, 1)], ravi_home.id).await?;
    let first_number = order_service::order_detail(&state, &kavya, first)
        .await?
        .data
        .unwrap()
        .order
        .order_number;
    let second_number = order_service::order_detail(&state, &ravi, second)
        .await?
        .data
        .unwrap()
        .order
        .order_number;
    assert_ne!(first_number, second_number);

    let all = search(&state, &admin, None, None).await?;
    assert_eq!(all, vec![second_number.clone(), first_number.clone()]);
    assert_eq!(
        search(&state, &admin, Some(first_number.as_str()), None).await?,
        vec![first_number.clone()]
    );
    assert_eq!(
        search(&state, &admin, Some("RAVI@example"), None).await?,
        vec![second_number.clone()]
    );
    assert_eq!(
        search(&state, &admin, Some("98765"), None).await?,
        vec![first_number.clone()]
    );
    assert_eq!(
        search(&state, &admin, None, Some("cancelled")).await?,
        vec![first_number.clone()]
    );
    assert_eq!(
        search(&state, &admin, Some("kavya"), Some("pending")).await?,
        Vec::<String>::new()
    );

    let counts = admin_service::list_orders(&state, &admin, AdminOrderQuery::default())
        .await?
        .data
        .unwrap();
    assert_eq!(counts.total_orders, 2);
    assert_eq!(counts.pending_orders, 1);
    let row = counts
        .items
        .iter()
        .find(|r| r.order.order_number == second_number)
        .unwrap();
    assert_eq!(row.customer_email, "ravi@example.com");

    Ok(())
}
