use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::{
        order_rules::{OrderStatus, PaymentMethod, PaymentStatus},
        pricing,
    },
    dto::payments::{PaymentResult, PaymentSession, VerifyPaymentRequest},
    entity::orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    payments::{GatewayOrderRequest, PaymentGateway},
    response::{ApiResponse, Meta},
    services::load_user,
    state::AppState,
};

const VERIFICATION_FAILED: &str = "Payment verification failed. Please contact support.";

fn gateway(state: &AppState) -> AppResult<Arc<dyn PaymentGateway>> {
    state
        .payments
        .clone()
        .ok_or_else(|| AppError::bad_request("Online payments are not configured"))
}

fn payable(order: &orders::Model) -> bool {
    let status_ok = order
        .status
        .parse::<OrderStatus>()
        .is_ok_and(|s| s.accepts_payment());
    let payment_ok = order
        .payment_status
        .parse::<PaymentStatus>()
        .is_ok_and(|s| s.is_payable());
    status_ok && payment_ok
}

/// Opens a gateway order for the user's order; shared by initiate and retry.
async fn open_session(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    action: &str,
) -> AppResult<PaymentSession> {
    let gateway = gateway(state)?;
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if !payable(&order) {
        return Err(AppError::bad_request("This order cannot be paid online."));
    }

    let amount = pricing::to_minor_units(order.total_amount).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("order total out of range: {}", order.total_amount))
    })?;
    let request = GatewayOrderRequest {
        amount,
        currency: state.config.currency.clone(),
        receipt: order.order_number.clone(),
        notes: serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "user_id": user.user_id,
        }),
    };
    let gateway_order = gateway.create_order(&request).await.map_err(|err| {
        tracing::error!(error = %err, order_number = %order.order_number, "gateway order failed");
        AppError::Upstream("Could not start the payment. Please try again.".into())
    })?;

    let customer = load_user(&state.orm, user.user_id).await?;
    let order_number = order.order_number.clone();
    let mut active: OrderActive = order.into();
    active.gateway_order_id = Set(Some(gateway_order.id.clone()));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        action,
        "orders",
        serde_json::json!({ "order_id": order_id, "gateway_order_id": gateway_order.id }),
    )
    .await;

    Ok(PaymentSession {
        key_id: gateway.key_id().to_string(),
        gateway_order_id: gateway_order.id,
        amount: gateway_order.amount,
        currency: gateway_order.currency,
        order_id,
        order_number,
        customer_name: customer.full_name(),
        customer_email: customer.email,
        customer_contact: customer.phone,
    })
}

pub async fn initiate_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentSession>> {
    let session = open_session(state, user, order_id, "payment_initiate").await?;
    Ok(ApiResponse::success(
        "Payment initiated",
        session,
        Some(Meta::empty()),
    ))
}

pub async fn retry_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentSession>> {
    let session = open_session(state, user, order_id, "payment_retry").await?;
    Ok(ApiResponse::success(
        "Payment retry initiated",
        session,
        Some(Meta::empty()),
    ))
}

pub async fn verify_payment(
    state: &AppState,
    user: &AuthUser,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<PaymentResult>> {
    let gateway = gateway(state)?;
    let txn = state.orm.begin().await?;
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::GatewayOrderId.eq(payload.gateway_order_id.as_str())),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.payment_status == PaymentStatus::Completed.as_str() {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Payment already verified",
            PaymentResult {
                order: Order::from(order),
            },
            Some(Meta::empty()),
        ));
    }

    let verified = gateway.verify_signature(
        &payload.gateway_order_id,
        &payload.gateway_payment_id,
        &payload.signature,
    );
    let order_id = order.id;
    let was_pending = order.status == OrderStatus::Pending.as_str();
    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.updated_at = Set(now.into());

    if !verified {
        active.payment_status = Set(PaymentStatus::Failed.as_str().into());
        active.update(&txn).await?;
        txn.commit().await?;
        tracing::warn!(%order_id, "payment signature mismatch");
        audit::record(
            &state.pool,
            user.user_id,
            "payment_failed",
            "orders",
            serde_json::json!({ "order_id": order_id }),
        )
        .await;
        return Err(AppError::bad_request(VERIFICATION_FAILED));
    }

    active.payment_status = Set(PaymentStatus::Completed.as_str().into());
    active.payment_method = Set(PaymentMethod::Online.as_str().into());
    active.gateway_payment_id = Set(Some(payload.gateway_payment_id.clone()));
    active.gateway_signature = Set(Some(payload.signature));
    if was_pending {
        active.status = Set(OrderStatus::Confirmed.as_str().into());
    }
    let order = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "payment_verified",
        "orders",
        serde_json::json!({ "order_id": order_id, "payment_id": payload.gateway_payment_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment successful",
        PaymentResult {
            order: Order::from(order),
        },
        Some(Meta::empty()),
    ))
}
