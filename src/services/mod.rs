pub mod address_service;
pub mod admin_catalog_service;
pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod order_service;
pub mod payment_service;
pub mod profile_service;
pub mod wishlist_service;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    entity::users::{self, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
};

/// Live (not soft-deleted) user row for an authenticated id.
pub(crate) async fn load_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<users::Model> {
    Users::find_by_id(user_id)
        .filter(UserCol::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}
