mod common;

use std::sync::Arc;

use common::rejection;
use sanjeri_api::{
    dto::{
        auth::{EmailRequest, LoginRequest, ResetPasswordRequest, SignupRequest, VerifyOtpRequest},
        profile::{ChangeEmailRequest, ChangePasswordRequest, OtpCodeRequest},
    },
    entity::users::Entity as Users,
    error::AppError,
    middleware::auth::{BLOCKED_MESSAGE, ROLE_USER},
    notify::{MemoryMailer, OtpPurpose},
    services::{admin_service, auth_service, profile_service},
    state::AppState,
};
use sea_orm::EntityTrait;

async fn login(state: &AppState, login: &str, password: &str) -> Result<String, AppError> {
    let response = auth_service::login(
        state,
        LoginRequest {
            login: login.into(),
            password: password.into(),
        },
    )
    .await?;
    Ok(response.data.map(|d| d.token).unwrap_or_default())
}

fn email(value: &str) -> EmailRequest {
    EmailRequest {
        email: value.into(),
    }
}

// Resend, forgot/reset, email and password changes, then the admin blocks and deletes
// the account.
#[tokio::test]
async fn account_recovery_and_changes() -> anyhow::Result<()> {
    let Some(database_url) = common::database_url() else {
        common::skip_notice();
        return Ok(());
    };
    let mailer = MemoryMailer::new();
    let state = common::db_state(&database_url, Arc::new(mailer.clone()), None).await?;

    // Signup with a resent code
    auth_service::signup_start(
        &state,
        SignupRequest {
            username: "asha".into(),
            email: "asha@example.com".into(),
            password: "first-pass".into(),
            confirm_password: "first-pass".into(),
            phone: None,
            agree: true,
        },
    )
    .await?;
    let first = common::otp_for(&mailer, "asha@example.com").await;

    let unknown = auth_service::signup_resend(&state, email("nobody@example.com")).await;
    assert_eq!(rejection(unknown), "Session expired. Please sign up again.");

    auth_service::signup_resend(&state, email("Asha@Example.com")).await?;
    let second = common::otp_for(&mailer, "asha@example.com").await;
    assert_eq!(second.len(), 6);
    if first != second {
        let stale = auth_service::signup_verify(
            &state,
            VerifyOtpRequest {
                email: "asha@example.com".into(),
                otp: first,
            },
        )
        .await;
        assert_eq!(rejection(stale), "Invalid OTP.");
    }
    auth_service::signup_verify(
        &state,
        VerifyOtpRequest {
            email: "asha@example.com".into(),
            otp: second,
        },
    )
    .await?;
    login(&state, "asha", "first-pass").await?;

    // Forgot and reset
    let unknown = auth_service::forgot_password(&state, email("nobody@example.com")).await;
    assert_eq!(rejection(unknown), "Email not registered.");

    auth_service::forgot_password(&state, email("asha@example.com")).await?;
    let code = common::otp_for(&mailer, "asha@example.com").await;
    let reset = |otp: String, password: &str, confirm: &str| ResetPasswordRequest {
        email: "asha@example.com".into(),
        otp,
        password: password.into(),
        confirm_password: confirm.into(),
    };

    let wrong = auth_service::reset_password(
        &state,
        reset(common::wrong_code(&code), "second-pass", "second-pass"),
    )
    .await;
    assert_eq!(rejection(wrong), "Invalid OTP.");
    let mismatched =
        auth_service::reset_password(&state, reset(code.clone(), "second-pass", "other-pass"))
            .await;
    assert_eq!(rejection(mismatched), "Passwords do not match.");

    auth_service::reset_password(&state, reset(code.clone(), "second-pass", "second-pass"))
        .await?;
    let replay =
        auth_service::reset_password(&state, reset(code, "third-pass", "third-pass")).await;
    assert!(rejection(replay).starts_with("OTP expired"));

    assert_eq!(
        rejection(login(&state, "asha", "first-pass").await),
        "Invalid credentials."
    );
    let token = login(&state, "asha@example.com", "second-pass").await?;
    let asha = common::bearer_user(&state, &token)?;
    assert_eq!(asha.role, ROLE_USER);

    // Email change: the code goes to the new address but is held under the current one
    common::create_user(&state, "ravi", "ravi@example.com", "ravi-pass", ROLE_USER).await?;
    let change = |new_email: &str, confirm: &str, password: &str| ChangeEmailRequest {
        new_email: new_email.into(),
        confirm_email: confirm.into(),
        current_password: password.into(),
    };

    let bad_password = profile_service::change_email_start(
        &state,
        &asha,
        change("asha.new@example.com", "asha.new@example.com", "first-pass"),
    )
    .await;
    assert_eq!(rejection(bad_password), "Current password is incorrect.");
    let mismatch = profile_service::change_email_start(
        &state,
        &asha,
        change("asha.new@example.com", "asha.old@example.com", "second-pass"),
    )
    .await;
    assert_eq!(rejection(mismatch), "Email addresses do not match.");
    let taken = profile_service::change_email_start(
        &state,
        &asha,
        change("ravi@example.com", "ravi@example.com", "second-pass"),
    )
    .await;
    assert_eq!(rejection(taken), "This email is already in use.");

    profile_service::change_email_start(
        &state,
        &asha,
        change("Asha.New@example.com", "asha.new@example.com", "second-pass"),
    )
    .await?;
    let code = common::otp_for(&mailer, "asha.new@example.com").await;
    assert_eq!(code.len(), 6);
    assert!(
        state
            .otp
            .get(OtpPurpose::EmailChange, "asha@example.com")
            .await
            .is_some()
    );

    let wrong = profile_service::change_email_verify(
        &state,
        &asha,
        OtpCodeRequest {
            otp: common::wrong_code(&code),
        },
    )
    .await;
    assert_eq!(rejection(wrong), "Invalid OTP.");
    let updated = profile_service::change_email_verify(&state, &asha, OtpCodeRequest { otp: code })
        .await?
        .data
        .unwrap();
    assert_eq!(updated.email, "asha.new@example.com");

    // Password change
    let password = |current: &str, new: &str, confirm: &str| ChangePasswordRequest {
        current_password: current.into(),
        new_password: new.into(),
        confirm_password: confirm.into(),
    };
    let bad_current = profile_service::change_password_start(
        &state,
        &asha,
        password("first-pass", "third-pass", "third-pass"),
    )
    .await;
    assert_eq!(rejection(bad_current), "Current password is incorrect.");
    let short =
        profile_service::change_password_start(&state, &asha, password("second-pass", "x", "x"))
            .await;
    assert_eq!(
        rejection(short),
        "Password must be at least 8 characters long."
    );

    profile_service::change_password_start(
        &state,
        &asha,
        password("second-pass", "third-pass", "third-pass"),
    )
    .await?;
    let code = common::otp_for(&mailer, "asha.new@example.com").await;
    // Nothing changes until the code is confirmed.
    login(&state, "asha", "second-pass").await?;
    profile_service::change_password_verify(&state, &asha, OtpCodeRequest { otp: code }).await?;
    assert_eq!(
        rejection(login(&state, "asha", "second-pass").await),
        "Invalid credentials."
    );
    login(&state, "asha.new@example.com", "third-pass").await?;

    // Admin blocks, unblocks, then deletes the account
    let admin = common::create_admin(&state).await?;
    let blocked = admin_service::toggle_user_status(&state, &admin, asha.user_id).await?;
    assert_eq!(blocked.message, "User asha has been blocked.");
    assert_eq!(
        rejection(login(&state, "asha", "third-pass").await),
        BLOCKED_MESSAGE
    );

    admin_service::toggle_user_status(&state, &admin, asha.user_id).await?;
    login(&state, "asha", "third-pass").await?;

    let own = admin_service::toggle_user_status(&state, &admin, admin.user_id).await;
    assert!(matches!(own, Err(AppError::NotFound)));

    admin_service::soft_delete_user(&state, &admin, asha.user_id).await?;
    let row = Users::find_by_id(asha.user_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert!(row.is_deleted);
    assert_eq!(row.status, "blocked");
    assert_eq!(
        row.email,
        format!("deleted_{}_asha.new@example.com", asha.user_id)
    );
    assert_eq!(
        rejection(login(&state, "asha", "third-pass").await),
        BLOCKED_MESSAGE
    );

    // The old address is released with the account.
    let released = auth_service::forgot_password(&state, email("asha.new@example.com")).await;
    assert_eq!(rejection(released), "Email not registered.");
    let again = admin_service::toggle_user_status(&state, &admin, asha.user_id).await;
    assert!(matches!(again, Err(AppError::NotFound)));

    Ok(())
}
