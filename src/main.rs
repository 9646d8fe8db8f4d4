use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use payment_gateway::bank::mock::MockBank;
use payment_gateway::cache::ResultCache;
use payment_gateway::config::AppConfig;
use payment_gateway::http::middleware::auth::AuthState;
use payment_gateway::http::middleware::rate_limit::RateLimitState;
use payment_gateway::repo::payments_repo::PaymentsRepo;
use payment_gateway::resilience::breaker::{BreakerSettings, CircuitBreaker};
use payment_gateway::resilience::{ResilientBank, RetrySettings};
use payment_gateway::service::payment_service::PaymentService;
use payment_gateway::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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

    let cache = ResultCache::new(&cfg.redis_url)?;

    let breaker = Arc::new(CircuitBreaker::new(
        "acquiring_bank",
        BreakerSettings {
            timeout: Duration::from_millis(cfg.breaker.timeout_ms),
            max_concurrent_requests: cfg.breaker.max_concurrent_requests,
            error_percent_threshold: cfg.breaker.error_percent_threshold,
            request_volume_threshold: cfg.breaker.request_volume_threshold,
            sleep_window: Duration::from_millis(cfg.breaker.sleep_window_ms),
        },
    ));
    let bank = Arc::new(ResilientBank {
        inner: Arc::new(MockBank::new(&cfg.mock_bank)),
        breaker,
        retry: RetrySettings {
            max_attempts: cfg.bank_retry.max_attempts,
            backoff: Duration::from_millis(cfg.bank_retry.backoff_ms),
        },
    });

    let payment_service = PaymentService {
        pool: pool.clone(),
        payments_repo: PaymentsRepo { pool: pool.clone() },
        cache,
        bank,
    };

    let state = AppState { payment_service };

    let auth_state = AuthState {
        api_key_secret: cfg.api_key_secret.clone(),
    };
    let rate_limit_state = RateLimitState {
        redis_client: redis::Client::open(cfg.redis_url.clone())?,
        max_per_minute: cfg.allowed_requests_per_minute,
    };

    let v1 = Router::new()
        .route(
            "/payments",
            post(payment_gateway::http::handlers::payments::create_payment),
        )
        .route(
            "/payments/:id",
            get(payment_gateway::http::handlers::payments::get_payment),
        )
        .layer(from_fn_with_state(
            rate_limit_state,
            payment_gateway::http::middleware::rate_limit::enforce,
        ))
        .layer(from_fn_with_state(
            auth_state,
            payment_gateway::http::middleware::auth::enforce,
        ));

    let app = Router::new()
        .route(
            "/health",
            get(payment_gateway::http::handlers::payments::health),
        )
        .nest("/v1", v1)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
