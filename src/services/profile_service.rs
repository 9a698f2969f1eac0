use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};

use crate::{
    audit,
    domain::validation,
    dto::{
        auth::OtpSent,
        profile::{ChangeEmailRequest, ChangePasswordRequest, OtpCodeRequest, UpdateProfileRequest},
    },
    entity::users::ActiveModel as UserActive,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    notify::{self, OtpError, OtpPurpose},
    response::{ApiResponse, Meta},
    services::{
        auth_service::{email_taken, hash_password, verify_password},
        load_user,
    },
    state::AppState,
};

pub async fn get_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = load_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success("OK", User::from(model), Some(Meta::empty())))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<User>> {
    let model = load_user(&state.orm, user.user_id).await?;
    let mut active: UserActive = model.into();

    if let Some(first_name) = trimmed(payload.first_name) {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = trimmed(payload.last_name) {
        active.last_name = Set(last_name);
    }
    if let Some(phone) = trimmed(payload.phone) {
        let phone = if phone.is_empty() {
            None
        } else {
            Some(validation::phone(&phone)?)
        };
        active.phone = Set(phone);
    }
    if let Some(gender) = trimmed(payload.gender) {
        let gender = if gender.is_empty() {
            None
        } else {
            Some(validation::one_of(&gender, &validation::USER_GENDERS, "gender")?)
        };
        active.gender = Set(gender);
    }
    if let Some(address) = trimmed(payload.address) {
        active.address = Set(Some(address).filter(|a| !a.is_empty()));
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "profile_update",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Profile updated successfully.",
        User::from(updated),
        Some(Meta::empty()),
    ))
}

/// Email-change codes are keyed by the account's current address and mailed to the new one.
pub async fn change_email_start(
    state: &AppState,
    user: &AuthUser,
    payload: ChangeEmailRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let model = load_user(&state.orm, user.user_id).await?;
    let new_email = validation::email(&payload.new_email)?;
    if new_email != payload.confirm_email.trim().to_lowercase() {
        return Err(AppError::bad_request("Email addresses do not match."));
    }
    if new_email == model.email {
        return Err(AppError::bad_request(
            "New email must be different from your current email.",
        ));
    }
    if !verify_password(&model.password_hash, &payload.current_password) {
        return Err(AppError::bad_request("Current password is incorrect."));
    }
    if email_taken(state, &new_email, Some(model.id)).await? {
        return Err(AppError::bad_request("This email is already in use."));
    }

    let record = state
        .otp
        .issue(
            OtpPurpose::EmailChange,
            &model.email,
            Some(serde_json::json!({ "new_email": new_email })),
        )
        .await;
    if let Err(err) = notify::deliver(
        &state.otp,
        state.mailer.as_ref(),
        OtpPurpose::EmailChange,
        &new_email,
        &record,
    )
    .await
    {
        state.otp.clear(OtpPurpose::EmailChange, &model.email).await;
        return Err(err);
    }

    Ok(ApiResponse::success(
        "OTP sent to your new email address.",
        OtpSent {
            email: new_email,
            expires_in_seconds: state.config.otp_ttl_seconds,
        },
        Some(Meta::empty()),
    ))
}

pub async fn change_email_verify(
    state: &AppState,
    user: &AuthUser,
    payload: OtpCodeRequest,
) -> AppResult<ApiResponse<User>> {
    let model = load_user(&state.orm, user.user_id).await?;
    let record = state
        .otp
        .verify(OtpPurpose::EmailChange, &model.email, &payload.otp)
        .await?;
    let new_email = record
        .payload
        .as_ref()
        .and_then(|p| p.get("new_email"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(OtpError::Expired)?;

    if email_taken(state, &new_email, Some(model.id)).await? {
        return Err(AppError::bad_request("This email is already in use."));
    }

    let old_email = model.email.clone();
    let mut active: UserActive = model.into();
    active.email = Set(new_email.clone());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&state.orm).await?;

    state.otp.clear(OtpPurpose::EmailChange, &old_email).await;

    audit::record(
        &state.pool,
        user.user_id,
        "email_change",
        "users",
        serde_json::json!({ "from": old_email, "to": new_email }),
    )
    .await;

    Ok(ApiResponse::success(
        "Email updated successfully.",
        User::from(updated),
        Some(Meta::empty()),
    ))
}

pub async fn change_password_start(
    state: &AppState,
    user: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let model = load_user(&state.orm, user.user_id).await?;
    if !verify_password(&model.password_hash, &payload.current_password) {
        return Err(AppError::bad_request("Current password is incorrect."));
    }
    validation::passwords_match(&payload.new_password, &payload.confirm_password)?;

    let new_hash = hash_password(&payload.new_password)?;
    notify::send_otp(
        &state.otp,
        state.mailer.as_ref(),
        OtpPurpose::PasswordChange,
        &model.email,
        Some(serde_json::json!({ "password_hash": new_hash })),
    )
    .await?;

    Ok(ApiResponse::success(
        "OTP sent to your email.",
        OtpSent {
            email: model.email,
            expires_in_seconds: state.config.otp_ttl_seconds,
        },
        Some(Meta::empty()),
    ))
}

pub async fn change_password_verify(
    state: &AppState,
    user: &AuthUser,
    payload: OtpCodeRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let model = load_user(&state.orm, user.user_id).await?;
    let record = state
        .otp
        .verify(OtpPurpose::PasswordChange, &model.email, &payload.otp)
        .await?;
    let new_hash = record
        .payload
        .as_ref()
        .and_then(|p| p.get("password_hash"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(OtpError::Expired)?;

    let email = model.email.clone();
    let mut active: UserActive = model.into();
    active.password_hash = Set(new_hash);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    state.otp.clear(OtpPurpose::PasswordChange, &email).await;

    audit::record(
        &state.pool,
        user.user_id,
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password changed successfully.",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
