// Surfcast API v0.1
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod domain;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use db::postgres::PgStore;
use db::ConditionStore;
use services::analytics_run::{run_analytics, AnalyticsRequest};
use services::forecast_run::{run_forecasts, ForecastPools, ForecastRequest};
use services::forecaster::ForecasterFactory;
use services::scheduler::{SchedulerState, SharedSchedulerState};

/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 2;

/// OpenAPI document for the Surfcast API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Surfcast API",
        version = "0.1.0",
        description = "Sea-condition forecasting and surf analytics. \
            Forecasts hourly wave, swell and wind signals per surf spot from observed \
            history, derives surf difficulty, wave quality and a recommendation for each \
            forecast hour, and reports the status of the background forecast runs.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Locations", description = "Forecastable surf spots"),
        (name = "Runs", description = "Background forecast and analytics run status"),
    ),
    paths(
        routes::health::health_check,
        routes::locations::list_locations,
        routes::runs::get_run_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::locations::LocationResponse,
            domain::Coordinates,
            services::scheduler::SchedulerState,
            services::scheduler::LoopStatus,
            services::forecast_run::ForecastRunSummary,
            services::forecast_run::LocationOutcome,
            services::forecast_run::LocationStatus,
            services::forecast_run::LocationPhase,
            services::forecast_run::ColumnFailure,
            services::forecast_run::ExcludedLocation,
            services::analytics_run::AnalyticsRunSummary,
            services::analytics_run::AnalyticsOutcome,
            domain::SignalColumn,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[derive(Debug, Parser)]
#[command(name = "surfcast-api", version, about = "Sea-condition forecasting and surf analytics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and the background scheduler (default).
    Serve,
    /// Run one forecast pass, print the summary as JSON, and exit.
    Forecast {
        /// Comma-separated location ids; all active locations when omitted.
        #[arg(long, value_delimiter = ',')]
        locations: Vec<i32>,
        /// Hours to forecast; defaults to FORECAST_HORIZON.
        #[arg(long)]
        horizon: Option<usize>,
    },
    /// Run one analytics pass, print the summary as JSON, and exit.
    Analytics {
        /// Comma-separated location ids; all active locations when omitted.
        #[arg(long, value_delimiter = ',')]
        locations: Vec<i32>,
        /// Days to analyse from today's midnight; defaults to ANALYTICS_WINDOW_DAYS.
        #[arg(long)]
        days: Option<usize>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "surfcast_api=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn connect(config: &AppConfig) -> PgPool {
    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size())
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");
    pool
}

fn print_summary<T: serde::Serialize>(summary: &T) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialise run summary: {}", e),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let pool = connect(&config).await;
    let store: Arc<dyn ConditionStore> = Arc::new(PgStore::new(pool.clone()));
    let factory = ForecasterFactory::for_model(config.forecast_model);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool, store, factory).await,
        Command::Forecast { locations, horizon } => {
            let mut request =
                ForecastRequest::starting_after(Utc::now(), horizon.unwrap_or(config.forecast_horizon));
            if !locations.is_empty() {
                request = request.with_locations(locations);
            }
            let summary = run_forecasts(
                store,
                factory,
                request,
                ForecastPools {
                    location_workers: config.forecast_workers,
                    column_workers: config.column_workers,
                },
            )
            .await;
            print_summary(&summary);
        }
        Command::Analytics { locations, days } => {
            let mut request =
                AnalyticsRequest::from_today(Utc::now(), days.unwrap_or(config.analytics_window_days));
            if !locations.is_empty() {
                request = request.with_locations(locations);
            }
            let summary = run_analytics(store, request, config.analytics_workers).await;
            print_summary(&summary);
        }
    }
}

async fn serve(
    config: AppConfig,
    pool: PgPool,
    store: Arc<dyn ConditionStore>,
    factory: ForecasterFactory,
) {
    // Create shared scheduler state and spawn the background loops
    let scheduler_state: SharedSchedulerState =
        Arc::new(RwLock::new(SchedulerState::new(config.scheduler_enabled)));
    if config.scheduler_enabled {
        services::scheduler::spawn(store, factory, config.clone(), scheduler_state.clone());
    } else {
        tracing::warn!("Scheduler disabled; runs only via the forecast / analytics subcommands");
    }

    // CORS: read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    // Health check pings the pool and reports the scheduler flag
    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(routes::health::HealthState {
            pool: pool.clone(),
            scheduler: scheduler_state.clone(),
        });

    let location_routes = Router::new()
        .route("/api/v1/locations", get(routes::locations::list_locations))
        .with_state(pool);

    let run_routes = Router::new()
        .route("/api/v1/runs/status", get(routes::runs::get_run_status))
        .with_state(scheduler_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(location_routes)
        .merge(run_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
