use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware,
    response::IntoResponse,
};
use portal_backend::{
    config::{Config, LogFormat},
    db::{
        postgres_organization_repository::PostgresOrganizationRepository,
        postgres_task_repository::PostgresTaskRepository,
        postgres_user_repository::PostgresUserRepository,
        postgres_workstream_repository::PostgresWorkstreamRepository,
    },
    responses::JsonResponse,
    routes::api_router,
    utils::csrf::{validate_csrf, CSRF_HEADER},
    AppState,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!("connected to the database");
    Ok(pool)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(config.rate_limit.per_millisecond)
            .burst_size(config.rate_limit.burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .context("invalid rate limiter settings")?,
    );

    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || loop {
        std::thread::sleep(Duration::from_secs(60));
        governor_limiter.retain_recent();
    });

    let pg_pool = establish_connection(&config.database_url).await?;
    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pg_pool)
            .await
            .context("failed to run migrations")?;
        info!("migrations applied");
    }

    let frontend_origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .context("FRONTEND_ORIGIN is not a valid header value")?;
    let bind_addr = config.bind_addr;

    let state = AppState {
        users: Arc::new(PostgresUserRepository {
            pool: pg_pool.clone(),
        }),
        organizations: Arc::new(PostgresOrganizationRepository {
            pool: pg_pool.clone(),
        }),
        tasks: Arc::new(PostgresTaskRepository {
            pool: pg_pool.clone(),
        }),
        workstreams: Arc::new(PostgresWorkstreamRepository { pool: pg_pool }),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            ACCEPT,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true);

    let app = api_router(state)
        .layer(middleware::from_fn(validate_csrf))
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(%bind_addr, "portal backend listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
