use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::validation,
    dto::addresses::{AddressList, AddressRequest},
    entity::addresses::{
        self, ActiveModel as AddressActive, Column as AddressCol, Entity as Addresses,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
    state::AppState,
};

struct CleanAddress {
    address_type: String,
    full_name: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    landmark: Option<String>,
}

fn clean(payload: &AddressRequest) -> AppResult<CleanAddress> {
    let optional = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Ok(CleanAddress {
        address_type: validation::one_of(
            payload.address_type.as_deref().unwrap_or("home"),
            &validation::ADDRESS_TYPES,
            "address type",
        )?,
        full_name: validation::require(&payload.full_name, "Full name")?,
        phone: validation::phone(&payload.phone)?,
        address_line1: validation::require(&payload.address_line1, "Address line 1")?,
        address_line2: optional(&payload.address_line2),
        city: validation::require(&payload.city, "City")?,
        state: validation::require(&payload.state, "State")?,
        postal_code: validation::require(&payload.postal_code, "Postal code")?,
        country: optional(&payload.country).unwrap_or_else(|| "India".to_string()),
        landmark: optional(&payload.landmark),
    })
}

/// Default first, then newest.
pub(crate) async fn list_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Vec<addresses::Model>> {
    Ok(Addresses::find()
        .filter(AddressCol::UserId.eq(user_id))
        .order_by_desc(AddressCol::IsDefault)
        .order_by_desc(AddressCol::CreatedAt)
        .all(conn)
        .await?)
}

pub(crate) async fn find_owned<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    id: Uuid,
) -> AppResult<Option<addresses::Model>> {
    Ok(Addresses::find_by_id(id)
        .filter(AddressCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

async fn unset_other_defaults<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    keep: Uuid,
) -> AppResult<()> {
    Addresses::update_many()
        .col_expr(AddressCol::IsDefault, Expr::value(false))
        .filter(AddressCol::UserId.eq(user_id))
        .filter(AddressCol::Id.ne(keep))
        .filter(AddressCol::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items: Vec<Address> = list_for_user(&state.orm, user.user_id)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();
    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn get_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    let address = find_owned(&state.orm, user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", Address::from(address), Some(Meta::empty())))
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let data = clean(&payload)?;
    let txn = state.orm.begin().await?;

    let existing = Addresses::find()
        .filter(AddressCol::UserId.eq(user.user_id))
        .count(&txn)
        .await?;
    let is_default = payload.is_default || existing == 0;
    let id = Uuid::new_v4();
    if is_default {
        unset_other_defaults(&txn, user.user_id, id).await?;
    }

    let now = Utc::now();
    let address = AddressActive {
        id: Set(id),
        user_id: Set(user.user_id),
        address_type: Set(data.address_type),
        full_name: Set(data.full_name),
        phone: Set(data.phone),
        address_line1: Set(data.address_line1),
        address_line2: Set(data.address_line2),
        city: Set(data.city),
        state: Set(data.state),
        postal_code: Set(data.postal_code),
        country: Set(data.country),
        landmark: Set(data.landmark),
        is_default: Set(is_default),
        created_at: NotSet,
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "address_create",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address added successfully.",
        Address::from(address),
        Some(Meta::empty()),
    ))
}

/// Sending `is_default: false` never clears the current default; pick another address instead.
pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let data = clean(&payload)?;
    let txn = state.orm.begin().await?;

    let existing = find_owned(&txn, user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let is_default = existing.is_default || payload.is_default;
    if payload.is_default && !existing.is_default {
        unset_other_defaults(&txn, user.user_id, id).await?;
    }

    let mut active: AddressActive = existing.into();
    active.address_type = Set(data.address_type);
    active.full_name = Set(data.full_name);
    active.phone = Set(data.phone);
    active.address_line1 = Set(data.address_line1);
    active.address_line2 = Set(data.address_line2);
    active.city = Set(data.city);
    active.state = Set(data.state);
    active.postal_code = Set(data.postal_code);
    active.country = Set(data.country);
    active.landmark = Set(data.landmark);
    active.is_default = Set(is_default);
    active.updated_at = Set(Utc::now().into());
    let address = active.update(&txn).await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Address updated successfully.",
        Address::from(address),
        Some(Meta::empty()),
    ))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;
    let existing = find_owned(&txn, user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    let was_default = existing.is_default;
    Addresses::delete_by_id(existing.id).exec(&txn).await?;

    let mut promoted = None;
    if was_default {
        let next = Addresses::find()
            .filter(AddressCol::UserId.eq(user.user_id))
            .order_by_desc(AddressCol::CreatedAt)
            .one(&txn)
            .await?;
        if let Some(next) = next {
            promoted = Some(next.id);
            let mut active: AddressActive = next.into();
            active.is_default = Set(true);
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?;
        }
    }
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "address_delete",
        "addresses",
        serde_json::json!({ "address_id": id, "promoted_default": promoted }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address deleted successfully.",
        serde_json::json!({ "deleted_id": id, "new_default_id": promoted }),
        Some(Meta::empty()),
    ))
}

pub async fn set_default_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    let txn = state.orm.begin().await?;
    let existing = find_owned(&txn, user.user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    unset_other_defaults(&txn, user.user_id, id).await?;

    let mut active: AddressActive = existing.into();
    active.is_default = Set(true);
    active.updated_at = Set(Utc::now().into());
    let address = active.update(&txn).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Default address updated.",
        Address::from(address),
        Some(Meta::empty()),
    ))
}
