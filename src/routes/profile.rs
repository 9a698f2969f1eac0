use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::{
        auth::OtpSent,
        profile::{ChangeEmailRequest, ChangePasswordRequest, OtpCodeRequest, UpdateProfileRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::profile_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).patch(update_profile))
        .route("/email", post(change_email))
        .route("/email/verify", post(verify_email_change))
        .route("/password", post(change_password))
        .route("/password/verify", post(verify_password_change))
}

#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Current user profile", body = ApiResponse<User>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = profile_service::get_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<User>),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = profile_service::update_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/profile/email",
    request_body = ChangeEmailRequest,
    responses(
        (status = 200, description = "OTP sent to the current email", body = ApiResponse<OtpSent>),
        (status = 400, description = "Invalid email or password")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn change_email(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangeEmailRequest>,
) -> AppResult<Json<ApiResponse<OtpSent>>> {
    let resp = profile_service::change_email_start(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/profile/email/verify",
    request_body = OtpCodeRequest,
    responses(
        (status = 200, description = "Email changed", body = ApiResponse<User>),
        (status = 400, description = "Invalid or expired OTP")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn verify_email_change(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OtpCodeRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = profile_service::change_email_verify(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/profile/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "OTP sent", body = ApiResponse<OtpSent>),
        (status = 400, description = "Wrong current password or weak new password")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<OtpSent>>> {
    let resp = profile_service::change_password_start(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/profile/password/verify",
    request_body = OtpCodeRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid or expired OTP")
    ),
    security(("bearer_auth" = [])),
    tag = "Profile"
)]
pub async fn verify_password_change(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OtpCodeRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = profile_service::change_password_verify(&state, &user, payload).await?;
    Ok(Json(resp))
}
