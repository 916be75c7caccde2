use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use atelier_api::{
    app,
    state::{AppState, AuthSettings, CheckoutUrls},
};
use atelier_booking::{AdminSlotBlocker, BookingRules, ConfirmationHandler, ReservationManager};
use atelier_core::clock::SystemClock;
use atelier_core::repository::ServiceRepository;
use atelier_core::service::ServiceCatalog;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = atelier_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Atelier API on port {}", config.server.port);

    let db = atelier_store::DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let redis = Arc::new(
        atelier_store::RedisClient::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?,
    );

    let kafka = Arc::new(
        atelier_store::EventProducer::new(&config.kafka.brokers)
            .context("Failed to create Kafka producer")?,
    );

    let reservations: Arc<dyn atelier_core::repository::ReservationStore> =
        Arc::new(atelier_store::PgReservationStore::new(db.pool.clone()));
    let referrals: Arc<dyn atelier_core::repository::ReferralRepository> =
        Arc::new(atelier_store::PgReferralRepository::new(db.pool.clone()));

    // The catalog is read-only to the core; load it once at startup.
    let services = atelier_store::PgServiceRepository::new(db.pool.clone())
        .list_active()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load service catalog: {e}"))?;
    tracing::info!("Loaded {} active services", services.len());
    let catalog = Arc::new(ServiceCatalog::new(services));

    let gateway: Arc<dyn atelier_core::payment::PaymentGateway> = Arc::new(
        atelier_store::StripeCheckout::new(config.stripe.secret_key.clone())
            .with_api_base(config.stripe.api_base.clone()),
    );

    let rules = BookingRules::from_window_strings(
        config.business_rules.buffer_minutes,
        config.business_rules.hold_timeout_minutes,
        &config.business_rules.window_pairs(),
        config.business_rules.currency.clone(),
    )
    .context("Invalid session windows in config")?;

    let clock = Arc::new(SystemClock);
    let manager = Arc::new(ReservationManager::new(
        reservations.clone(),
        clock.clone(),
        rules.clone(),
    ));
    let confirmations = Arc::new(ConfirmationHandler::new(
        reservations.clone(),
        gateway.clone(),
        clock.clone(),
    ));
    let blocker = Arc::new(AdminSlotBlocker::new(
        reservations.clone(),
        clock.clone(),
        rules.clone(),
    ));

    // SSE Broadcast Channel
    let (monitor_tx, _) = tokio::sync::broadcast::channel(100);

    let app_state = AppState {
        reservations,
        referrals,
        catalog,
        gateway,
        manager,
        confirmations,
        blocker,
        clock,
        redis,
        kafka,
        monitor_tx,
        auth: AuthSettings {
            secret: config.auth.jwt_secret.clone(),
            expiration_seconds: config.auth.jwt_expiration_seconds,
            admin_email: config.auth.admin_email.clone(),
            admin_password: config.auth.admin_password.clone(),
        },
        rules,
        urls: CheckoutUrls {
            success: config.business_rules.success_url.clone(),
            cancel: config.business_rules.cancel_url.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
