use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    notify::{Mailer, OtpStore},
    payments::PaymentGateway,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub otp: OtpStore,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        payments: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        let orm = crate::db::create_orm_conn(&pool);
        let otp = OtpStore::new(std::time::Duration::from_secs(config.otp_ttl_seconds));
        Self {
            pool,
            orm,
            config: Arc::new(config),
            otp,
            mailer,
            payments,
        }
    }
}
