use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use venue_ticketing::config::AppConfig;
use venue_ticketing::gateways::gvp::GvpGateway;
use venue_ticketing::gateways::iyzico::IyzicoGateway;
use venue_ticketing::repo::bookings_repo::BookingsRepo;
use venue_ticketing::repo::event_orders_repo::EventOrdersRepo;
use venue_ticketing::repo::outbox_repo::OutboxRepo;
use venue_ticketing::repo::rollups_repo::RollupsRepo;
use venue_ticketing::service::checkout::CheckoutService;
use venue_ticketing::service::reconciler::OrderReconciler;
use venue_ticketing::service::rollup_relay::RollupRelay;
use venue_ticketing::{AppState, RedirectTargets};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let base = cfg.public_base_url.trim_end_matches('/');
    let gvp = Arc::new(GvpGateway {
        config: cfg.gvp.clone(),
        success_url: format!("{base}/payment/callback-success"),
        error_url: format!("{base}/payment/callback-error"),
    });
    let iyzico = Arc::new(IyzicoGateway {
        config: cfg.checkout_form.clone(),
        callback_url: format!("{base}/payment/checkout-form/callback"),
        client: reqwest::Client::new(),
    });

    let bookings_repo = BookingsRepo { pool: pool.clone() };
    let event_orders_repo = EventOrdersRepo { pool: pool.clone() };
    let rollups_repo = RollupsRepo { pool: pool.clone() };
    let outbox_repo = OutboxRepo { pool: pool.clone() };

    let reconciler = OrderReconciler::new(
        Arc::new(bookings_repo.clone()),
        Arc::new(event_orders_repo.clone()),
    );
    let checkout = CheckoutService {
        gvp: gvp.clone(),
        iyzico: iyzico.clone(),
    };

    let relay = RollupRelay {
        outbox_repo: outbox_repo.clone(),
        rollups_repo: rollups_repo.clone(),
    };
    tokio::spawn(relay.run());

    let state = AppState {
        pool,
        checkout,
        reconciler,
        bookings_repo,
        event_orders_repo,
        rollups_repo,
        outbox_repo,
        gvp,
        iyzico,
        urls: RedirectTargets::from_base(&cfg.public_base_url),
    };

    let admin_key = cfg.internal_api_key.clone();
    let admin_routes = Router::new()
        .route(
            "/bookings/:ref_number/status",
            patch(venue_ticketing::http::handlers::bookings::update_booking_status),
        )
        .layer(from_fn_with_state(
            admin_key,
            venue_ticketing::http::middleware::admin_auth::require_internal_api_key,
        ));

    let app = Router::new()
        .route("/health", get(venue_ticketing::http::handlers::payments::health))
        .route(
            "/payment/initiate",
            post(venue_ticketing::http::handlers::payments::initiate),
        )
        .route(
            "/payment/callback-success",
            post(venue_ticketing::http::handlers::payments::gvp_callback_success),
        )
        .route(
            "/payment/callback-error",
            post(venue_ticketing::http::handlers::payments::gvp_callback_error),
        )
        .route(
            "/payment/checkout-form/callback",
            post(venue_ticketing::http::handlers::payments::checkout_form_callback),
        )
        .route(
            "/bookings/free",
            post(venue_ticketing::http::handlers::bookings::create_free_booking),
        )
        .route(
            "/bookings/:ref_number",
            get(venue_ticketing::http::handlers::bookings::get_booking),
        )
        .route(
            "/orders/:order_id",
            get(venue_ticketing::http::handlers::orders::get_order),
        )
        .route(
            "/events/:event_id/rollup",
            get(venue_ticketing::http::handlers::rollups::get_event_rollup),
        )
        .route("/ops/readiness", get(venue_ticketing::http::handlers::ops::readiness))
        .route("/ops/liveness", get(venue_ticketing::http::handlers::ops::liveness))
        .merge(admin_routes)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
