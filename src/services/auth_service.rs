use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    domain::validation,
    dto::auth::{
        EmailRequest, LoginRequest, LoginResponse, OtpSent, PendingSignup, ResetPasswordRequest,
        SignupRequest, VerifyOtpRequest,
    },
    entity::users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    error::{AppError, AppResult},
    middleware::auth::{BLOCKED_MESSAGE, ROLE_USER, issue_token},
    models::User,
    notify::{self, OtpError, OtpPurpose},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn username_taken(state: &AppState, username: &str) -> AppResult<bool> {
    let found = Users::find()
        .filter(UserCol::Username.eq(username))
        .filter(UserCol::IsDeleted.eq(false))
        .one(&state.orm)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn email_taken(
    state: &AppState,
    email: &str,
    except: Option<Uuid>,
) -> AppResult<bool> {
    let mut finder = Users::find()
        .filter(UserCol::Email.eq(email))
        .filter(UserCol::IsDeleted.eq(false));
    if let Some(id) = except {
        finder = finder.filter(UserCol::Id.ne(id));
    }
    Ok(finder.one(&state.orm).await?.is_some())
}

fn otp_sent(state: &AppState, email: String) -> OtpSent {
    OtpSent {
        email,
        expires_in_seconds: state.config.otp_ttl_seconds,
    }
}

pub async fn signup_start(
    state: &AppState,
    payload: SignupRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    if !payload.agree {
        return Err(AppError::bad_request(
            "You must agree to terms and conditions.",
        ));
    }
    let username = validation::require(&payload.username, "Username")?;
    let email = validation::email(&payload.email)?;
    validation::passwords_match(&payload.password, &payload.confirm_password)?;
    let phone = match payload.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => Some(validation::phone(p)?),
        None => None,
    };

    if username_taken(state, &username).await? {
        return Err(AppError::bad_request("Username already exists."));
    }
    if email_taken(state, &email, None).await? {
        return Err(AppError::bad_request("Email already registered."));
    }

    let pending = PendingSignup {
        username,
        email: email.clone(),
        password_hash: hash_password(&payload.password)?,
        phone,
    };
    let pending = serde_json::to_value(&pending).map_err(|e| AppError::Internal(e.into()))?;

    notify::send_otp(
        &state.otp,
        state.mailer.as_ref(),
        OtpPurpose::Signup,
        &email,
        Some(pending),
    )
    .await?;

    Ok(ApiResponse::success(
        "OTP sent to your email.",
        otp_sent(state, email),
        Some(Meta::empty()),
    ))
}

pub async fn signup_verify(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<User>> {
    let email = normalize_email(&payload.email);
    let record = state
        .otp
        .verify(OtpPurpose::Signup, &email, &payload.otp)
        .await?;
    let pending: PendingSignup = record
        .payload
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or(OtpError::Expired)?;

    // Someone may have claimed the name or address while the code was outstanding.
    if username_taken(state, &pending.username).await? {
        return Err(AppError::bad_request("Username already exists."));
    }
    if email_taken(state, &pending.email, None).await? {
        return Err(AppError::bad_request("Email already registered."));
    }

    let now = Utc::now();
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(pending.username),
        email: Set(pending.email),
        password_hash: Set(pending.password_hash),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        phone: Set(pending.phone),
        gender: Set(None),
        address: Set(None),
        role: Set(ROLE_USER.into()),
        status: Set("active".into()),
        wallet_balance: Set(Decimal::ZERO),
        is_deleted: Set(false),
        created_at: NotSet,
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    state.otp.clear(OtpPurpose::Signup, &email).await;

    audit::record(
        &state.pool,
        user.id,
        "user_signup",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Account created successfully. Please log in.",
        User::from(user),
        Some(Meta::empty()),
    ))
}

pub async fn signup_resend(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let email = normalize_email(&payload.email);
    let record = state
        .otp
        .reissue(OtpPurpose::Signup, &email)
        .await
        .ok_or_else(|| AppError::bad_request("Session expired. Please sign up again."))?;

    notify::deliver(
        &state.otp,
        state.mailer.as_ref(),
        OtpPurpose::Signup,
        &email,
        &record,
    )
    .await?;

    Ok(ApiResponse::success(
        "A new OTP has been sent to your email.",
        otp_sent(state, email),
        Some(Meta::empty()),
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let login = payload.login.trim();
    let user = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Username.eq(login))
                .add(UserCol::Email.eq(login.to_lowercase())),
        )
        .order_by_asc(UserCol::IsDeleted)
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) if verify_password(&u.password_hash, &payload.password) => u,
        _ => return Err(AppError::bad_request("Invalid credentials.")),
    };

    if user.is_deleted || user.is_blocked() {
        return Err(AppError::bad_request(BLOCKED_MESSAGE));
    }

    let token = issue_token(&state.config.jwt_secret, user.id, &user.role)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let role = user.role.clone();
    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
            role,
            user: User::from(user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: EmailRequest,
) -> AppResult<ApiResponse<OtpSent>> {
    let email = normalize_email(&payload.email);
    if !email_taken(state, &email, None).await? {
        return Err(AppError::bad_request("Email not registered."));
    }

    notify::send_otp(
        &state.otp,
        state.mailer.as_ref(),
        OtpPurpose::Forgot,
        &email,
        None,
    )
    .await?;

    Ok(ApiResponse::success(
        "OTP sent to your email.",
        otp_sent(state, email),
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let email = normalize_email(&payload.email);
    state
        .otp
        .verify(OtpPurpose::Forgot, &email, &payload.otp)
        .await?;
    validation::passwords_match(&payload.password, &payload.confirm_password)?;

    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .filter(UserCol::IsDeleted.eq(false))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::bad_request("Email not registered."))?;

    let user_id = user.id;
    let mut active: UserActive = user.into();
    active.password_hash = Set(hash_password(&payload.password)?);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    state.otp.clear(OtpPurpose::Forgot, &email).await;

    audit::record(
        &state.pool,
        user_id,
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password reset successful. Please log in.",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("perfume123").unwrap();
        assert!(verify_password(&hash, "perfume123"));
        assert!(!verify_password(&hash, "perfume124"));
        assert!(!verify_password("not-a-hash", "perfume123"));
    }
}
