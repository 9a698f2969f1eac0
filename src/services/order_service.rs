use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, DbBackend,
    EntityTrait, Order as SortOrder, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    QueryTrait, Set, Statement, TransactionTrait,
    sea_query::{Expr, LockType, extension::postgres::PgExpr},
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        availability::CartRuleError,
        invoice,
        order_rules::{self, OrderStatus, PaymentMethod, PaymentStatus},
        pricing,
    },
    dto::orders::{
        CancelRequest, CheckoutSummary, OrderList, OrderListQuery, OrderWithItems,
        PlaceOrderRequest, PlacedOrder, ReturnRequest,
    },
    entity::{
        addresses::{self, Column as AddressCol, Entity as Addresses},
        cart_items::{Column as CartItemCol, Entity as CartItems},
        order_items::{
            self, ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Address, Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::non_empty,
    services::{address_service, cart_service},
    state::AppState,
};

const EMPTY_CART: &str = "Your cart is empty.";
const UNAVAILABLE_ITEMS: &str =
    "Some items in your cart are unavailable. Please remove them to proceed.";

fn order_status(order: &orders::Model) -> AppResult<OrderStatus> {
    order
        .status
        .parse()
        .map_err(|err| AppError::Internal(anyhow::Error::new(err)))
}

fn payment_status(order: &orders::Model) -> AppResult<PaymentStatus> {
    order
        .payment_status
        .parse()
        .map_err(|err| AppError::Internal(anyhow::Error::new(err)))
}

pub(crate) fn returnable(order: &orders::Model) -> bool {
    order_status(order).is_ok_and(|status| {
        order_rules::can_be_returned(
            status,
            order.delivered_at.map(|d| d.with_timezone(&Utc)),
            order.created_at.with_timezone(&Utc),
            Utc::now(),
        )
    })
}

pub(crate) fn cancellable(order: &orders::Model) -> bool {
    order_status(order).is_ok_and(|s| s.can_be_cancelled())
}

/// Give `quantity` units back to a variant.
pub(crate) async fn restore_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    ProductVariants::update_many()
        .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).add(quantity))
        .filter(VariantCol::Id.eq(variant_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Take `quantity` units from a variant; refuses when that would go negative.
async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    variant_id: Uuid,
    quantity: i32,
    stock_seen: i32,
) -> AppResult<()> {
    let result = ProductVariants::update_many()
        .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).sub(quantity))
        .filter(VariantCol::Id.eq(variant_id))
        .filter(VariantCol::Stock.gte(quantity))
        .exec(conn)
        .await?;
    if result.rows_affected != 1 {
        return Err(CartRuleError::InsufficientStock(stock_seen).into());
    }
    Ok(())
}

async fn items_for<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<order_items::Model>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?)
}

async fn owned_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    order_id: Uuid,
    lock: bool,
) -> AppResult<orders::Model> {
    let mut finder = Orders::find().filter(
        Condition::all()
            .add(OrderCol::UserId.eq(user_id))
            .add(OrderCol::Id.eq(order_id)),
    );
    if lock {
        finder = finder.lock(LockType::Update);
    }
    finder.one(conn).await?.ok_or(AppError::NotFound)
}

pub(crate) async fn shipping_address<C: ConnectionTrait>(
    conn: &C,
    order: &orders::Model,
) -> AppResult<Option<addresses::Model>> {
    match order.shipping_address_id {
        Some(id) => Ok(Addresses::find_by_id(id).one(conn).await?),
        None => Ok(None),
    }
}

async fn with_items<C: ConnectionTrait>(
    conn: &C,
    order: orders::Model,
) -> AppResult<OrderWithItems> {
    let items = items_for(conn, order.id).await?;
    let address = shipping_address(conn, &order).await?;
    Ok(OrderWithItems {
        can_cancel: cancellable(&order),
        can_return: returnable(&order),
        order: Order::from(order),
        items: items.into_iter().map(OrderItem::from).collect(),
        shipping_address: address.map(Address::from),
    })
}

pub async fn checkout_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CheckoutSummary>> {
    let conn = &state.orm;
    let lines = match cart_service::find_cart(conn, user.user_id).await? {
        Some(cart) => cart_service::load_lines(conn, cart.id, false).await?,
        None => Vec::new(),
    };
    if lines.is_empty() {
        return Err(AppError::bad_request(EMPTY_CART));
    }
    if lines.iter().any(|l| !l.state().is_available()) {
        return Err(AppError::bad_request(UNAVAILABLE_ITEMS));
    }

    let (_, subtotal) = cart_service::totals(&lines);
    let addresses = address_service::list_for_user(conn, user.user_id).await?;
    let default_address_id = addresses.iter().find(|a| a.is_default).map(|a| a.id);

    Ok(ApiResponse::success(
        "OK",
        CheckoutSummary {
            lines: lines.iter().map(cart_service::LoadedLine::to_line).collect(),
            addresses: addresses.into_iter().map(Address::from).collect(),
            default_address_id,
            pricing: pricing::price_breakdown(subtotal),
        },
        Some(Meta::empty()),
    ))
}

/// Serialises order-number allocation across concurrent checkouts.
async fn next_order_number<C: ConnectionTrait>(conn: &C) -> AppResult<String> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext('orders.order_number'))",
    ))
    .await?;
    let today = Utc::now().date_naive();
    let prefix = order_rules::order_number_prefix(today);
    let last = Orders::find()
        .filter(OrderCol::OrderNumber.starts_with(prefix.as_str()))
        // Longer sequences sort first once a day passes 9999 orders.
        .order_by(Expr::cust("char_length(order_number)"), SortOrder::Desc)
        .order_by_desc(OrderCol::OrderNumber)
        .one(conn)
        .await?;
    Ok(order_rules::next_order_number(
        today,
        last.as_ref().map(|o| o.order_number.as_str()),
    ))
}

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<PlacedOrder>> {
    let txn = state.orm.begin().await?;

    let cart = cart_service::find_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::bad_request(EMPTY_CART))?;
    let lines = cart_service::load_lines(&txn, cart.id, true).await?;
    if lines.is_empty() {
        return Err(AppError::bad_request(EMPTY_CART));
    }
    if lines.iter().any(|l| !l.state().is_available()) {
        return Err(AppError::bad_request(UNAVAILABLE_ITEMS));
    }

    let address = match payload.address_id {
        Some(id) => address_service::find_owned(&txn, user.user_id, id).await?,
        None => Addresses::find()
            .filter(AddressCol::UserId.eq(user.user_id))
            .filter(AddressCol::IsDefault.eq(true))
            .one(&txn)
            .await?,
    }
    .ok_or_else(|| AppError::bad_request("Please select a delivery address."))?;

    let (_, subtotal) = cart_service::totals(&lines);
    let breakdown = pricing::price_breakdown(subtotal);
    let order_number = next_order_number(&txn).await?;
    let now = Utc::now();

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        order_number: Set(order_number),
        shipping_address_id: Set(Some(address.id)),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_method: Set(payload.payment_method.as_str().into()),
        payment_status: Set(PaymentStatus::Pending.as_str().into()),
        subtotal: Set(breakdown.subtotal),
        shipping_charge: Set(breakdown.shipping_charge),
        tax_amount: Set(breakdown.tax_amount),
        discount_amount: Set(breakdown.discount_amount),
        total_amount: Set(breakdown.total_amount),
        cancellation_reason: Set(None),
        return_reason: Set(None),
        cancelled_at: Set(None),
        returned_at: Set(None),
        delivered_at: Set(None),
        notes: Set(payload
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())),
        tracking_number: Set(None),
        gateway_order_id: Set(None),
        gateway_payment_id: Set(None),
        gateway_signature: Set(None),
        created_at: NotSet,
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            variant_id: Set(line.variant.id),
            product_name: Set(line.product.name.clone()),
            variant_details: Set(line.variant.details()),
            quantity: Set(line.item.quantity),
            unit_price: Set(line.unit_price()),
            total_price: Set(line.total_price()),
            is_cancelled: Set(false),
            cancellation_reason: Set(None),
            product_image: Set(line.image_url()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        take_stock(&txn, line.variant.id, line.item.quantity, line.variant.stock).await?;
        items.push(OrderItem::from(item));
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(order_number = %order.order_number, total = %order.total_amount, "order placed");
    audit::record(
        &state.pool,
        user.user_id,
        "order_place",
        "orders",
        serde_json::json!({ "order_id": order.id, "order_number": order.order_number }),
    )
    .await;

    let requires_online_payment = payload.payment_method == PaymentMethod::Online;
    Ok(ApiResponse::success(
        format!("Order #{} placed successfully!", order.order_number),
        PlacedOrder {
            order: Order::from(order),
            items,
            requires_online_payment,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, per_page, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(search) = non_empty(&query.search) {
        let pattern = format!("%{search}%");
        let by_name = Addresses::find()
            .select_only()
            .column(AddressCol::Id)
            .filter(Expr::col((Addresses, AddressCol::FullName)).ilike(pattern.clone()))
            .into_query();
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Orders, OrderCol::OrderNumber)).ilike(pattern.clone()))
                .add(Expr::col((Orders, OrderCol::Status)).ilike(pattern))
                .add(OrderCol::ShippingAddressId.in_subquery(by_name)),
        );
    }
    if let Some(status) = non_empty(&query.status) {
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn order_detail(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = owned_order(&state.orm, user.user_id, order_id, false).await?;
    let detail = with_items(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", detail, Some(Meta::empty())))
}

fn reason(value: Option<String>) -> Option<String> {
    value.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: CancelRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = owned_order(&txn, user.user_id, order_id, true).await?;
    if !order_status(&order)?.can_be_cancelled() {
        return Err(AppError::bad_request("This order cannot be cancelled."));
    }

    for item in items_for(&txn, order.id).await? {
        if !item.is_cancelled {
            restore_stock(&txn, item.variant_id, item.quantity).await?;
        }
    }

    let refund = order.payment_method == PaymentMethod::Online.as_str()
        && payment_status(&order)? == PaymentStatus::Completed;
    let order_number = order.order_number.clone();
    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().into());
    active.cancellation_reason = Set(reason(payload.reason));
    active.cancelled_at = Set(Some(now.into()));
    if refund {
        active.payment_status = Set(PaymentStatus::Refunded.as_str().into());
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    let detail = with_items(&txn, order).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order_id, "refunded": refund }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("Order #{order_number} has been cancelled successfully."),
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: CancelRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let item = OrderItems::find_by_id(item_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = owned_order(&txn, user.user_id, item.order_id, true).await?;
    if item.is_cancelled {
        return Err(AppError::bad_request("This item is already cancelled."));
    }
    if !order_status(&order)?.can_be_cancelled() {
        return Err(AppError::bad_request("This order cannot be cancelled."));
    }

    restore_stock(&txn, item.variant_id, item.quantity).await?;
    let product_name = item.product_name.clone();
    let mut active: OrderItemActive = item.into();
    active.is_cancelled = Set(true);
    active.cancellation_reason = Set(reason(payload.reason));
    active.update(&txn).await?;

    let remaining = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .filter(OrderItemCol::IsCancelled.eq(false))
        .count(&txn)
        .await?;
    let mut message = format!("{product_name} has been cancelled.");
    let order = if remaining == 0 {
        message.push_str(" All items in the order have been cancelled. Order marked as cancelled.");
        let now = Utc::now();
        let mut active: OrderActive = order.into();
        active.status = Set(OrderStatus::Cancelled.as_str().into());
        active.cancellation_reason = Set(Some(order_rules::ALL_ITEMS_CANCELLED_REASON.into()));
        active.cancelled_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(&txn).await?
    } else {
        order
    };
    let detail = with_items(&txn, order).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_item_cancel",
        "order_items",
        serde_json::json!({ "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::success(message, detail, Some(Meta::empty())))
}

pub async fn return_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: ReturnRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = owned_order(&txn, user.user_id, order_id, true).await?;
    if !returnable(&order) {
        return Err(AppError::bad_request("This order cannot be returned."));
    }
    let reason = payload.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::bad_request("Please provide a reason for return."));
    }

    for item in items_for(&txn, order.id).await? {
        if !item.is_cancelled {
            restore_stock(&txn, item.variant_id, item.quantity).await?;
        }
    }

    let refund = payment_status(&order)? == PaymentStatus::Completed;
    let order_number = order.order_number.clone();
    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Refunded.as_str().into());
    active.return_reason = Set(Some(reason));
    active.returned_at = Set(Some(now.into()));
    if refund {
        active.payment_status = Set(PaymentStatus::Refunded.as_str().into());
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    let detail = with_items(&txn, order).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_return",
        "orders",
        serde_json::json!({ "order_id": order_id }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("Order #{order_number} return request submitted successfully."),
        detail,
        Some(Meta::empty()),
    ))
}

/// `(file name, body)` of the plain-text invoice.
pub async fn invoice(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<(String, String)> {
    let order = owned_order(&state.orm, user.user_id, order_id, false).await?;
    let items = items_for(&state.orm, order.id).await?;
    let address = shipping_address(&state.orm, &order).await?;
    Ok((
        invoice::file_name(&order.order_number),
        invoice::render(&order, &items, address.as_ref()),
    ))
}

