use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sanjeri_api::{
    app::build_app,
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    notify::{LogMailer, Mailer, SmtpMailer},
    payments::{PaymentGateway, RazorpayGateway},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sanjeri_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&create_orm_conn(&pool)).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp, config.email_from.clone())?),
        None => Arc::new(LogMailer),
    };
    tracing::info!(mailer = mailer.name(), "mailer ready");

    let payments: Option<Arc<dyn PaymentGateway>> = match &config.razorpay {
        Some(razorpay) => Some(Arc::new(RazorpayGateway::new(razorpay.clone())?)),
        None => {
            tracing::warn!("razorpay keys not set, online payments disabled");
            None
        }
    };

    let app = build_app(AppState::new(pool, config, mailer, payments));

    tracing::info!(%addr, "sanjeri api listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
