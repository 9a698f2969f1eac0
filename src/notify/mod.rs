pub mod mailer;
pub mod otp;

pub use mailer::{LogMailer, Mailer, MemoryMailer, SentMail, SmtpMailer};
pub use otp::{OtpError, OtpPurpose, OtpRecord, OtpStore};

use crate::error::AppResult;

/// Issue a fresh code for `purpose` and email it. The pending payload rides along
/// with the code until it is verified or expires.
pub async fn send_otp(
    store: &OtpStore,
    mailer: &dyn Mailer,
    purpose: OtpPurpose,
    email: &str,
    payload: Option<serde_json::Value>,
) -> AppResult<OtpRecord> {
    let record = store.issue(purpose, email, payload).await;
    if let Err(err) = deliver(store, mailer, purpose, email, &record).await {
        store.clear(purpose, email).await;
        return Err(err);
    }
    Ok(record)
}

/// Email an already issued code to `to`.
pub async fn deliver(
    store: &OtpStore,
    mailer: &dyn Mailer,
    purpose: OtpPurpose,
    to: &str,
    record: &OtpRecord,
) -> AppResult<()> {
    let body = purpose.body(&record.code, store.ttl_minutes());
    if let Err(err) = mailer.send(to, purpose.subject(), &body).await {
        tracing::warn!(
            error = %err,
            mailer = mailer.name(),
            purpose = purpose.as_str(),
            "otp email failed"
        );
        return Err(crate::error::AppError::Upstream(
            "Failed to send OTP email. Please try again.".into(),
        ));
    }
    tracing::debug!(purpose = purpose.as_str(), "otp sent");
    Ok(())
}
