use std::env;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub otp_ttl_seconds: u64,
    pub email_from: String,
    pub smtp: Option<SmtpConfig>,
    pub razorpay: Option<RazorpayConfig>,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let otp_ttl_seconds = env::var("OTP_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(120);
        let email_from = env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Sanjeri Perfumes <noreply@sanjeri.local>".to_string());

        let smtp = env::var("SMTP_HOST")
            .ok()
            .filter(|h| !h.is_empty())
            .map(|host| SmtpConfig {
                host,
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587),
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
            });

        let razorpay = match (env::var("RAZORPAY_KEY_ID"), env::var("RAZORPAY_KEY_SECRET")) {
            (Ok(key_id), Ok(key_secret)) if !key_id.is_empty() && !key_secret.is_empty() => {
                Some(RazorpayConfig {
                    key_id,
                    key_secret,
                    api_base: env::var("RAZORPAY_API_BASE")
                        .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
                })
            }
            _ => None,
        };

        let currency = env::var("CURRENCY").unwrap_or_else(|_| "INR".to_string());

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            otp_ttl_seconds,
            email_from,
            smtp,
            razorpay,
            currency,
        })
    }

    /// Configuration used by tests and tools that never touch SMTP or the gateway.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 0,
            jwt_secret: "test-secret".into(),
            otp_ttl_seconds: 120,
            email_from: "Sanjeri Perfumes <noreply@sanjeri.local>".into(),
            smtp: None,
            razorpay: None,
            currency: "INR".into(),
        }
    }
}
