mod common;

use std::sync::Arc;

use common::{address_request, cod_order, create_admin, variant};
use rust_decimal::Decimal;
use sanjeri_api::{
    domain::{order_rules::PaymentMethod, pricing},
    dto::{
        admin::{AdjustStockRequest, InventoryQuery, SetStockRequest, UpdateOrderStatusRequest},
        auth::{LoginRequest, SignupRequest, VerifyOtpRequest},
        cart::AddToCartRequest,
        catalog::{CategoryRequest, ImageRequest, ProductCreateRequest, ProductListQuery},
        orders::{CancelRequest, ReturnRequest},
        payments::VerifyPaymentRequest,
        wishlist::AddToWishlistRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    notify::MemoryMailer,
    payments::{FakeGateway, PaymentGateway},
    services::{
        address_service, admin_catalog_service, admin_service, auth_service, cart_service,
        catalog_service, order_service, payment_service, wishlist_service,
    },
    state::AppState,
};

// Signup -> browse -> wishlist -> cart -> COD order -> cancel -> online order -> pay
// -> admin delivers -> return; stock is tracked through every step.
#[tokio::test]
async fn storefront_order_lifecycle() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        common::skip_notice();
        return Ok(());
    };

    let mailer = MemoryMailer::new();
    let gateway = Arc::new(FakeGateway::new("gateway-secret"));
    let state = common::db_state(
        &database_url,
        Arc::new(mailer.clone()),
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
    )
    .await?;

    let customer = signup_and_login(&state, &mailer).await?;
    let admin = create_admin(&state).await?;

    // Catalog
    let category = admin_catalog_service::create_category(
        &state,
        &admin,
        CategoryRequest {
            name: "Eau de Parfum".into(),
            slug: None,
            description: None,
            thumbnail_url: None,
            is_active: Some(true),
            is_featured: Some(true),
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();

    let created = admin_catalog_service::create_product(
        &state,
        &admin,
        ProductCreateRequest {
            category_id: category.id,
            name: "Midnight Oud".into(),
            slug: None,
            sku: "SJ-OUD".into(),
            description: "Smoky oud".into(),
            main_image_url: None,
            brand: Some("Sanjeri".into()),
            fragrance_type: Some("woody".into()),
            occasion: None,
            is_featured: true,
            is_best_selling: false,
            is_new_arrival: false,
            is_active: None,
            variants: vec![
                variant(50, "Male", 2499, Some(1999), 5),
                variant(100, "Male", 3999, None, 12),
            ],
            images: vec![ImageRequest {
                image_url: "/media/oud.jpg".into(),
                alt_text: None,
            }],
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.product.slug.as_deref(), Some("midnight-oud"));
    assert_eq!(created.variants.len(), 2);
    assert!(created.images[0].is_default);
    let small = created
        .variants
        .iter()
        .find(|v| v.volume_ml == 50)
        .unwrap()
        .clone();
    assert_eq!(small.sku, "SJ-OUD-50-MAL");

    let listing = catalog_service::list_products(
        &state,
        ProductListQuery {
            q: Some("oud".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(listing.items.len(), 1);
    assert_eq!(listing.items[0].min_price, Some(Decimal::from(1999)));

    let detail = catalog_service::product_detail(&state, "midnight-oud").await?.data.unwrap();
    assert_eq!(detail.product.id, created.product.id);

    // Wishlist entry is dropped once the product goes into the cart
    wishlist_service::add_to_wishlist(
        &state,
        &customer,
        AddToWishlistRequest {
            product_id: created.product.id,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            variant_id: small.id,
            quantity: Some(2),
        },
    )
    .await?;
    let wishlist = wishlist_service::view_wishlist(&state, &customer).await?.data.unwrap();
    assert_eq!(wishlist.count, 0);

    let over = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            variant_id: small.id,
            quantity: Some(10),
        },
    )
    .await;
    assert!(matches!(over, Err(AppError::BadRequest(_))));

    // COD order then cancel
    let no_address = order_service::place_order(&state, &customer, cod_order(None)).await;
    assert!(matches!(no_address, Err(AppError::BadRequest(_))));

    let address = address_service::create_address(
        &state,
        &customer,
        address_request("Priya Nair", "9876543210"),
    )
        .await?
        .data
        .unwrap();
    assert!(address.is_default);

    let placed = order_service::place_order(&state, &customer, cod_order(None))
        .await?
        .data
        .unwrap();
    assert!(!placed.requires_online_payment);
    assert_eq!(placed.order.shipping_address_id, Some(address.id));
    let expected = pricing::price_breakdown(Decimal::from(2 * 1999));
    assert_eq!(placed.order.total_amount, expected.total_amount);
    assert_eq!(stock_of(&state, &admin, "SJ-OUD-50-MAL").await?, 3);

    let cart = cart_service::view_cart(&state, &customer).await?.data.unwrap();
    assert!(cart.items.is_empty());

    let cancelled = order_service::cancel_order(
        &state,
        &customer,
        placed.order.id,
        CancelRequest {
            reason: Some("Changed my mind".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(stock_of(&state, &admin, "SJ-OUD-50-MAL").await?, 5);

    // Online order paid through the gateway
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            variant_id: small.id,
            quantity: Some(1),
        },
    )
    .await?;
    let mut online = cod_order(Some(address.id));
    online.payment_method = PaymentMethod::Online;
    let placed = order_service::place_order(&state, &customer, online)
        .await?
        .data
        .unwrap();
    assert!(placed.requires_online_payment);

    let session = payment_service::initiate_payment(&state, &customer, placed.order.id)
        .await?
        .data
        .unwrap();
    let bad = payment_service::verify_payment(
        &state,
        &customer,
        VerifyPaymentRequest {
            gateway_order_id: session.gateway_order_id.clone(),
            gateway_payment_id: "pay_1".into(),
            signature: "forged".into(),
        },
    )
    .await;
    assert!(matches!(bad, Err(AppError::BadRequest(_))));
    let failed = order_service::order_detail(&state, &customer, placed.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(failed.order.payment_status, "failed");

    let session = payment_service::retry_payment(&state, &customer, placed.order.id)
        .await?
        .data
        .unwrap();
    let paid = payment_service::verify_payment(
        &state,
        &customer,
        VerifyPaymentRequest {
            signature: gateway.sign(&session.gateway_order_id, "pay_2"),
            gateway_order_id: session.gateway_order_id,
            gateway_payment_id: "pay_2".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.order.payment_status, "completed");
    assert_eq!(paid.order.status, "confirmed");

    // Admin delivers, customer returns
    let invalid = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "teleported".into(),
            tracking_number: None,
        },
    )
    .await;
    assert!(matches!(invalid, Err(AppError::BadRequest(_))));

    let delivered = admin_service::update_order_status(
        &state,
        &admin,
        placed.order.id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
            tracking_number: Some("TRK123".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert!(delivered.order.delivered_at.is_some());
    assert_eq!(stock_of(&state, &admin, "SJ-OUD-50-MAL").await?, 4);

    let returned = order_service::return_order(
        &state,
        &customer,
        placed.order.id,
        ReturnRequest {
            reason: "Wrong scent".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(returned.order.status, "refunded");
    assert_eq!(returned.order.payment_status, "refunded");
    assert_eq!(stock_of(&state, &admin, "SJ-OUD-50-MAL").await?, 5);

    let (file_name, invoice) = order_service::invoice(&state, &customer, placed.order.id).await?;
    assert!(file_name.contains(&placed.order.order_number));
    assert!(invoice.contains("Midnight Oud"));

    // Inventory controls
    let low = admin_service::inventory(
        &state,
        &admin,
        InventoryQuery {
            stock: Some("low_stock".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert!(low.items.iter().any(|row| row.variant.id == small.id));

    admin_service::set_stock(&state, &admin, small.id, SetStockRequest { stock: 0 }).await?;
    let negative =
        admin_service::adjust_stock(&state, &admin, small.id, AdjustStockRequest { delta: -1 })
            .await;
    assert!(matches!(negative, Err(AppError::BadRequest(_))));

    // Trashed products disappear from the storefront
    admin_catalog_service::soft_delete_product(&state, &admin, created.product.id).await?;
    let gone = catalog_service::product_detail(&state, "midnight-oud").await;
    assert!(matches!(gone, Err(AppError::NotFound)));

    let dashboard = admin_service::dashboard(&state, &admin).await?.data.unwrap();
    assert_eq!(dashboard.total_users, 1);
    assert_eq!(dashboard.total_orders, 2);
    assert_eq!(dashboard.total_products, 0);

    Ok(())
}

async fn signup_and_login(state: &AppState, mailer: &MemoryMailer) -> anyhow::Result<AuthUser> {
    auth_service::signup_start(
        state,
        SignupRequest {
            username: "priya".into(),
            email: "Priya@Example.com".into(),
            password: "scentsational".into(),
            confirm_password: "scentsational".into(),
            phone: Some("9876543210".into()),
            agree: true,
        },
    )
    .await?;

    let otp = common::otp_for(mailer, "priya@example.com").await;
    assert_eq!(otp.len(), 6);

    let wrong = auth_service::signup_verify(
        state,
        VerifyOtpRequest {
            email: "priya@example.com".into(),
            otp: "000000x".into(),
        },
    )
    .await;
    assert!(wrong.is_err());

    auth_service::signup_verify(
        state,
        VerifyOtpRequest {
            email: "priya@example.com".into(),
            otp,
        },
    )
    .await?;

    let login = auth_service::login(
        state,
        LoginRequest {
            login: "priya".into(),
            password: "scentsational".into(),
        },
    )
    .await?
    .data
    .unwrap();
    Ok(common::bearer_user(state, &login.token)?)
}

async fn stock_of(state: &AppState, admin: &AuthUser, sku: &str) -> anyhow::Result<i32> {
    let rows = admin_service::inventory(
        state,
        admin,
        InventoryQuery {
            q: Some(sku.into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .unwrap();
    Ok(rows
        .items
        .iter()
        .find(|row| row.variant.sku == sku)
        .map(|row| row.variant.stock)
        .unwrap_or(-1))
}
