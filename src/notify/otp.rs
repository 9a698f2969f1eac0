use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
    Forgot,
    EmailChange,
    PasswordChange,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::Forgot => "forgot",
            OtpPurpose::EmailChange => "email_change",
            OtpPurpose::PasswordChange => "password_change",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "Verify Your Email - SANJERI",
            OtpPurpose::Forgot => "Password Reset OTP - SANJERI",
            OtpPurpose::EmailChange => "Verify Email Change - SANJERI",
            OtpPurpose::PasswordChange => "Verify Password Change - SANJERI",
        }
    }

    pub fn body(&self, code: &str, minutes: u64) -> String {
        let intro = match self {
            OtpPurpose::Signup => "Your OTP for SANJERI signup is",
            OtpPurpose::Forgot => "Your OTP to reset your SANJERI password is",
            OtpPurpose::EmailChange => "Your OTP to confirm your new SANJERI email is",
            OtpPurpose::PasswordChange => "Your OTP to confirm your SANJERI password change is",
        };
        format!("{intro}: {code}\n\nIt is valid for {minutes} minutes.")
    }
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub payload: Option<Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP expired or not found. Please resend and try again.")]
    Expired,
    #[error("Invalid OTP.")]
    Mismatch,
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

fn key(purpose: OtpPurpose, email: &str) -> String {
    format!("otp:{}:{}", purpose.as_str(), email.to_lowercase())
}

/// Short-lived one-time codes keyed by purpose and email.
#[derive(Clone)]
pub struct OtpStore {
    cache: Cache<String, OtpRecord>,
    ttl: Duration,
}

impl OtpStore {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(ttl)
            .build();
        Self { cache, ttl }
    }

    pub fn ttl_minutes(&self) -> u64 {
        (self.ttl.as_secs() / 60).max(1)
    }

    pub async fn issue(
        &self,
        purpose: OtpPurpose,
        email: &str,
        payload: Option<Value>,
    ) -> OtpRecord {
        let record = OtpRecord {
            code: generate_code(),
            issued_at: Utc::now(),
            payload,
        };
        self.cache.insert(key(purpose, email), record.clone()).await;
        record
    }

    /// New code for a still-pending entry, keeping its payload.
    pub async fn reissue(&self, purpose: OtpPurpose, email: &str) -> Option<OtpRecord> {
        let existing = self.get(purpose, email).await?;
        Some(self.issue(purpose, email, existing.payload).await)
    }

    pub async fn get(&self, purpose: OtpPurpose, email: &str) -> Option<OtpRecord> {
        self.cache.get(&key(purpose, email)).await
    }

    /// Checks `code` without consuming the entry; callers clear it once the change is applied.
    pub async fn verify(
        &self,
        purpose: OtpPurpose,
        email: &str,
        code: &str,
    ) -> Result<OtpRecord, OtpError> {
        let record = self.get(purpose, email).await.ok_or(OtpError::Expired)?;
        if record.code != code.trim() {
            return Err(OtpError::Mismatch);
        }
        Ok(record)
    }

    pub async fn clear(&self, purpose: OtpPurpose, email: &str) {
        self.cache.invalidate(&key(purpose, email)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn verify_distinguishes_missing_and_wrong() {
        let store = OtpStore::new(Duration::from_secs(120));
        assert_eq!(
            store
                .verify(OtpPurpose::Signup, "a@example.com", "123456")
                .await
                .unwrap_err(),
            OtpError::Expired
        );

        let record = store
            .issue(
                OtpPurpose::Signup,
                "a@example.com",
                Some(serde_json::json!({ "username": "asha" })),
            )
            .await;
        let wrong = if record.code == "111111" { "222222" } else { "111111" };
        assert_eq!(
            store
                .verify(OtpPurpose::Signup, "a@example.com", wrong)
                .await
                .unwrap_err(),
            OtpError::Mismatch
        );

        let ok = store
            .verify(OtpPurpose::Signup, "A@example.com", &record.code)
            .await
            .unwrap();
        assert_eq!(ok.payload.unwrap()["username"], "asha");
    }

    #[tokio::test]
    async fn purposes_do_not_collide() {
        let store = OtpStore::new(Duration::from_secs(120));
        store.issue(OtpPurpose::Forgot, "a@example.com", None).await;
        assert!(store.get(OtpPurpose::Signup, "a@example.com").await.is_none());
        store.clear(OtpPurpose::Forgot, "a@example.com").await;
        assert!(store.get(OtpPurpose::Forgot, "a@example.com").await.is_none());
    }

    #[tokio::test]
    async fn reissue_keeps_payload() {
        let store = OtpStore::new(Duration::from_secs(120));
        assert!(store.reissue(OtpPurpose::Signup, "a@example.com").await.is_none());
        store
            .issue(
                OtpPurpose::Signup,
                "a@example.com",
                Some(serde_json::json!({ "k": 1 })),
            )
            .await;
        let again = store.reissue(OtpPurpose::Signup, "a@example.com").await.unwrap();
        assert_eq!(again.payload.unwrap()["k"], 1);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = OtpStore::new(Duration::from_millis(50));
        store.issue(OtpPurpose::Forgot, "a@example.com", None).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(store.get(OtpPurpose::Forgot, "a@example.com").await.is_none());
    }

    #[test]
    fn body_mentions_validity() {
        let body = OtpPurpose::Signup.body("123456", 2);
        assert!(body.contains("123456"));
        assert!(body.contains("2 minutes"));
    }
}
