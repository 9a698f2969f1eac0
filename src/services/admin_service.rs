use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set, TransactionTrait,
    sea_query::{Expr, LockType, SimpleExpr, extension::postgres::PgExpr},
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    domain::order_rules::OrderStatus,
    dto::admin::{
        AdjustStockRequest, AdminOrderDetail, AdminOrderList, AdminOrderQuery, AdminOrderRow,
        AdminUserDetail, AdminUserQuery, Dashboard, InventoryList, InventoryQuery, InventoryRow,
        SetStockRequest, UpdateOrderStatusRequest, UserList,
    },
    entity::{
        addresses::{Column as AddressCol, Entity as Addresses},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        product_variants::{
            self, ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
        },
        products::{Column as ProductCol, Entity as Products},
        users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_ADMIN, ensure_admin},
    models::{Address, Order, OrderItem, User, Variant},
    response::{ApiResponse, Meta},
    routes::params::non_empty,
    services::{admin_catalog_service::LOW_STOCK_THRESHOLD, order_service},
    state::AppState,
};

const USERS_PER_PAGE: i64 = 10;
const ORDERS_PER_PAGE: i64 = 20;
const INVENTORY_PER_PAGE: i64 = 25;

fn pattern(q: &str) -> String {
    format!("%{q}%")
}

fn start_of(date: NaiveDate) -> chrono::DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Exclusive upper bound covering all of `date`.
fn end_of(date: NaiveDate) -> chrono::DateTime<Utc> {
    start_of(date.checked_add_days(Days::new(1)).unwrap_or(date))
}

#[derive(Debug, FromRow)]
struct DashboardRow {
    total_users: i64,
    total_products: i64,
    total_categories: i64,
    total_orders: i64,
    pending_orders: i64,
    delivered_orders: i64,
    total_revenue: Decimal,
}

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Dashboard>> {
    ensure_admin(user)?;
    let row = sqlx::query_as::<_, DashboardRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users WHERE role <> 'admin' AND is_deleted = FALSE) AS total_users,
            (SELECT COUNT(*) FROM products WHERE is_deleted = FALSE) AS total_products,
            (SELECT COUNT(*) FROM categories WHERE is_deleted = FALSE) AS total_categories,
            (SELECT COUNT(*) FROM orders) AS total_orders,
            (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
            (SELECT COUNT(*) FROM orders WHERE status = 'delivered') AS delivered_orders,
            COALESCE((SELECT SUM(total_amount) FROM orders WHERE payment_status = 'completed'), 0)
                AS total_revenue
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Dashboard",
        Dashboard {
            total_users: row.total_users,
            total_products: row.total_products,
            total_categories: row.total_categories,
            total_orders: row.total_orders,
            pending_orders: row.pending_orders,
            delivered_orders: row.delivered_orders,
            total_revenue: row.total_revenue,
        },
        Some(Meta::empty()),
    ))
}

// Users

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    query: AdminUserQuery,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize_with(USERS_PER_PAGE);
    let mut condition = Condition::all()
        .add(UserCol::Role.ne(ROLE_ADMIN))
        .add(UserCol::IsDeleted.eq(false));

    if let Some(q) = non_empty(&query.q) {
        let p = pattern(q);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(UserCol::FirstName).ilike(p.clone()))
                .add(Expr::col(UserCol::LastName).ilike(p.clone()))
                .add(Expr::col(UserCol::Email).ilike(p.clone()))
                .add(Expr::col(UserCol::Phone).ilike(p.clone()))
                .add(Expr::col(UserCol::Username).ilike(p)),
        );
    }
    if let Some(status) = non_empty(&query.status) {
        condition = condition.add(UserCol::Status.eq(status));
    }
    if let Some(from) = query.joined_from {
        condition = condition.add(UserCol::CreatedAt.gte(start_of(from)));
    }
    if let Some(to) = query.joined_to {
        condition = condition.add(UserCol::CreatedAt.lt(end_of(to)));
    }

    let finder = Users::find()
        .filter(condition)
        .order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

async fn find_customer(state: &AppState, id: Uuid) -> AppResult<users::Model> {
    Users::find_by_id(id)
        .filter(UserCol::Role.ne(ROLE_ADMIN))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

#[derive(Debug, FromRow)]
struct SpendRow {
    total_orders: i64,
    total_spent: Decimal,
}

pub async fn user_detail(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<AdminUserDetail>> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;
    let spend = sqlx::query_as::<_, SpendRow>(
        r#"
        SELECT
            COUNT(*) AS total_orders,
            COALESCE(SUM(total_amount) FILTER (WHERE payment_status = 'completed'), 0) AS total_spent
        FROM orders
        WHERE user_id = $1
        "#,
    )
    .bind(customer.id)
    .fetch_one(&state.pool)
    .await?;

    let last_order = Orders::find()
        .filter(OrderCol::UserId.eq(customer.id))
        .order_by_desc(OrderCol::CreatedAt)
        .one(&state.orm)
        .await?;
    let average_order_amount = if spend.total_orders > 0 {
        (spend.total_spent / Decimal::from(spend.total_orders)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    Ok(ApiResponse::success(
        "User",
        AdminUserDetail {
            user: User::from(customer),
            total_orders: spend.total_orders,
            total_spent: spend.total_spent,
            average_order_amount,
            last_order: last_order.map(Order::from),
        },
        Some(Meta::empty()),
    ))
}

pub async fn toggle_user_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;
    if customer.is_deleted {
        return Err(AppError::NotFound);
    }
    let next = if customer.is_blocked() { "active" } else { "blocked" };
    let mut active: UserActive = customer.into();
    active.status = Set(next.to_string());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_status",
        "users",
        serde_json::json!({ "user_id": id, "status": next }),
    )
    .await;

    let verb = if next == "blocked" { "blocked" } else { "unblocked" };
    Ok(ApiResponse::success(
        format!("User {} has been {verb}.", updated.username),
        User::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn soft_delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let customer = find_customer(state, id).await?;
    if customer.is_deleted {
        return Err(AppError::NotFound);
    }
    let original_email = customer.email.clone();
    let short_id: String = id.simple().to_string().chars().take(8).collect();
    let mut active: UserActive = customer.into();
    active.status = Set("blocked".into());
    active.is_deleted = Set(true);
    active.email = Set(format!("deleted_{id}_{original_email}"));
    active.phone = Set(Some(format!("del{short_id}")));
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_delete",
        "users",
        serde_json::json!({ "user_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        format!("User {original_email} deleted successfully"),
        User::from(updated),
        Some(Meta::empty()),
    ))
}

// Orders

#[derive(Debug, FromRow)]
struct OrderCounts {
    total_orders: i64,
    pending_orders: i64,
    delivered_orders: i64,
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: AdminOrderQuery,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize_with(ORDERS_PER_PAGE);
    let mut condition = Condition::all();

    if let Some(search) = non_empty(&query.search) {
        let p = pattern(search);
        let by_customer = Users::find()
            .select_only()
            .column(UserCol::Id)
            .filter(
                Condition::any()
                    .add(Expr::col((Users, UserCol::Email)).ilike(p.clone()))
                    .add(Expr::col((Users, UserCol::FirstName)).ilike(p.clone()))
                    .add(Expr::col((Users, UserCol::LastName)).ilike(p.clone())),
            )
            .into_query();
        let by_phone = Addresses::find()
            .select_only()
            .column(AddressCol::Id)
            .filter(Expr::col((Addresses, AddressCol::Phone)).ilike(p.clone()))
            .into_query();
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Orders, OrderCol::OrderNumber)).ilike(p))
                .add(OrderCol::UserId.in_subquery(by_customer))
                .add(OrderCol::ShippingAddressId.in_subquery(by_phone)),
        );
    }
    if let Some(status) = non_empty(&query.status) {
        condition = condition.add(OrderCol::Status.eq(status));
    }
    if let Some(from) = query.date_from {
        condition = condition.add(OrderCol::CreatedAt.gte(start_of(from)));
    }
    if let Some(to) = query.date_to {
        condition = condition.add(OrderCol::CreatedAt.lt(end_of(to)));
    }

    let finder = Orders::find().filter(condition);
    let finder = match non_empty(&query.sort).unwrap_or("-created_at") {
        "created_at" => finder.order_by_asc(OrderCol::CreatedAt),
        "total_amount" => finder.order_by_asc(OrderCol::TotalAmount),
        "-total_amount" => finder.order_by_desc(OrderCol::TotalAmount),
        _ => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let customers: HashMap<Uuid, users::Model> = Users::find()
        .filter(UserCol::Id.is_in(orders.iter().map(|o| o.user_id)))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let items = orders
        .into_iter()
        .map(|order| {
            let customer = customers.get(&order.user_id);
            AdminOrderRow {
                customer_name: customer.map(|c| c.full_name()).unwrap_or_default(),
                customer_email: customer.map(|c| c.email.clone()).unwrap_or_default(),
                order: Order::from(order),
            }
        })
        .collect();

    let counts = sqlx::query_as::<_, OrderCounts>(
        r#"
        SELECT
            COUNT(*) AS total_orders,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
            COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders
        FROM orders
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Orders",
        AdminOrderList {
            items,
            total_orders: counts.total_orders,
            pending_orders: counts.pending_orders,
            delivered_orders: counts.delivered_orders,
        },
        Some(Meta::new(page, per_page, total)),
    ))
}

async fn order_detail_of(state: &AppState, order: orders::Model) -> AppResult<AdminOrderDetail> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?;
    let customer = Users::find_by_id(order.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let address = order_service::shipping_address(&state.orm, &order).await?;
    Ok(AdminOrderDetail {
        order: Order::from(order),
        items: items.into_iter().map(OrderItem::from).collect(),
        customer: User::from(customer),
        shipping_address: address.map(Address::from),
    })
}

pub async fn order_detail(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<AdminOrderDetail>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let detail = order_detail_of(state, order).await?;
    Ok(ApiResponse::success("Order found", detail, Some(Meta::empty())))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<AdminOrderDetail>> {
    ensure_admin(user)?;
    let status: OrderStatus = payload
        .status
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request("Invalid status"))?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = existing.status.clone();
    let now = Utc::now();
    let mut active: OrderActive = existing.into();
    active.status = Set(status.as_str().into());
    if previous != status.as_str() {
        match status {
            OrderStatus::Cancelled => active.cancelled_at = Set(Some(now.into())),
            OrderStatus::Delivered => active.delivered_at = Set(Some(now.into())),
            _ => {}
        }
    }
    if let Some(tracking) = payload.tracking_number {
        let tracking = tracking.trim().to_string();
        active.tracking_number = Set((!tracking.is_empty()).then_some(tracking));
    }
    active.updated_at = Set(now.into());
    let order = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": order.status }),
    )
    .await;

    let detail = order_detail_of(state, order).await?;
    Ok(ApiResponse::success(
        format!("Order status updated to {}", status.label()),
        detail,
        Some(Meta::empty()),
    ))
}

// Inventory

pub async fn inventory(
    state: &AppState,
    user: &AuthUser,
    query: InventoryQuery,
) -> AppResult<ApiResponse<InventoryList>> {
    ensure_admin(user)?;
    let (page, per_page, offset) = query.pagination().normalize_with(INVENTORY_PER_PAGE);

    let mut finder = ProductVariants::find()
        .find_also_related(Products)
        .filter(VariantCol::IsDeleted.eq(false));
    if let Some(q) = non_empty(&query.q) {
        let p = pattern(q);
        finder = finder.filter(
            Condition::any()
                .add(Expr::col((Products, ProductCol::Name)).ilike(p.clone()))
                .add(Expr::col((Products, ProductCol::Brand)).ilike(p.clone()))
                .add(Expr::col((ProductVariants, VariantCol::Sku)).ilike(p)),
        );
    }
    match non_empty(&query.stock) {
        Some("low_stock") => finder = finder.filter(VariantCol::Stock.lte(LOW_STOCK_THRESHOLD)),
        Some("out_of_stock") => finder = finder.filter(VariantCol::Stock.eq(0)),
        _ => {}
    }

    let total_variants = finder.clone().count(&state.orm).await? as i64;
    let low_stock = finder
        .clone()
        .filter(VariantCol::Stock.gt(0))
        .filter(VariantCol::Stock.lte(LOW_STOCK_THRESHOLD))
        .count(&state.orm)
        .await? as i64;
    let out_of_stock = finder
        .clone()
        .filter(VariantCol::Stock.eq(0))
        .count(&state.orm)
        .await? as i64;

    let rows = finder
        .order_by_asc(SimpleExpr::from(Expr::col((Products, ProductCol::Name))))
        .order_by_asc(VariantCol::VolumeMl)
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = rows
        .into_iter()
        .map(|(variant, product)| InventoryRow {
            product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            brand: product.and_then(|p| p.brand),
            variant: Variant::from(variant),
        })
        .collect();

    Ok(ApiResponse::success(
        "Inventory",
        InventoryList {
            items,
            total_variants,
            low_stock,
            out_of_stock,
        },
        Some(Meta::new(page, per_page, total_variants)),
    ))
}

fn adjusted_stock(current: i32, delta: i32) -> AppResult<i32> {
    match current.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        Some(_) => Err(AppError::bad_request("Stock cannot be negative")),
        None => Err(AppError::bad_request("Adjustment is out of range")),
    }
}

async fn write_stock(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
    next_stock: impl FnOnce(&product_variants::Model) -> AppResult<i32>,
) -> AppResult<product_variants::Model> {
    let txn = state.orm.begin().await?;
    let variant = ProductVariants::find_by_id(variant_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    let previous = variant.stock;
    let stock = next_stock(&variant)?;
    let mut active: VariantActive = variant.into();
    active.stock = Set(stock);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "inventory_update",
        "product_variants",
        serde_json::json!({ "variant_id": variant_id, "from": previous, "to": stock }),
    )
    .await;
    Ok(updated)
}

pub async fn set_stock(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
    payload: SetStockRequest,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    if payload.stock < 0 {
        return Err(AppError::bad_request("Stock cannot be negative"));
    }
    let variant = write_stock(state, user, variant_id, |_| Ok(payload.stock)).await?;
    Ok(ApiResponse::success(
        format!("Stock updated to {}", variant.stock),
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    variant_id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<Variant>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::bad_request("Adjustment must not be zero"));
    }
    let variant =
        write_stock(state, user, variant_id, |v| adjusted_stock(v.stock, payload.delta)).await?;
    Ok(ApiResponse::success(
        format!("Stock updated to {}", variant.stock),
        Variant::from(variant),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjustment_stays_within_bounds() {
        assert_eq!(adjusted_stock(5, -2).unwrap(), 3);
        assert!(matches!(
            adjusted_stock(1, -2),
            Err(AppError::BadRequest(msg)) if msg == "Stock cannot be negative"
        ));
        assert!(matches!(
            adjusted_stock(5, i32::MAX),
            Err(AppError::BadRequest(msg)) if msg == "Adjustment is out of range"
        ));
    }
}
