//! # fleetctl: Control Layer for Fleet Operations
//!
//! `fleetctl` is a multi-tenant backend for transport operations. Companies (tenants) run routes
//! with their own or subcontracted carriers, drivers and vehicles; trips are scheduled and executed
//! on those routes; alerts, costs and compliance documents are tracked alongside. It provides a
//! RESTful management API, summary reports and CSV/XLSX/PDF exports.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer. Data
//! lives in PostgreSQL, or in process memory for development and tests; both backends sit behind
//! the same repository traits ([`db::Stores`]).
//!
//! ### Request Flow
//!
//! Requests to the management API (`/admin/api/v1/*`) authenticate through a JWT taken from the
//! `Authorization` header, the `X-Access-Token` header or the session cookie ([`auth`]). The
//! handler's signature declares the `(resource, operation)` permission it needs, and the caller's
//! [`auth::permissions::TenantScope`] restricts every read and write to their own company (and,
//! for carrier users, their own carrier).
//!
//! Plain CRUD goes straight from the handlers to the repositories. Operations with lifecycle rules
//! (assigning resources to a route, starting or completing a trip, resolving an alert) and the
//! composite reads behind the dashboard are dispatched through the [`cqrs`] buses.
//!
//! ### Core Components
//!
//! - [`api`]: handlers and request/response models
//! - [`auth`]: sessions, CSRF, the permission table and tenant scoping
//! - [`cqrs`]: commands, queries and their buses
//! - [`db`]: repositories (Postgres and in-memory)
//! - [`reports`] and [`export`]: aggregation and file rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use fleetctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = fleetctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     fleetctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod errors;
pub mod export;
mod openapi;
pub mod references;
pub mod reports;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{self, HeaderName, HeaderValue};
use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers,
    api::models::users::Role,
    auth::{cache::AuthCache, current_user::ACCESS_TOKEN_HEADER, password},
    config::{CorsOrigin, DatabaseConfig},
    cqrs::{CommandBus, QueryBus},
    db::{Stores, handlers::Repository as _, models::users::{UserCreateDBRequest, UserUpdateDBRequest}},
    openapi::AdminApiDoc,
};

pub use config::Config;
pub use types::UserId;

/// Application state shared across all request handlers.
///
/// Cheap to clone: everything heavy sits behind an `Arc`.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .stores(stores)
///     .auth_cache(cache)
///     .commands(Arc::new(commands))
///     .queries(Arc::new(queries))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    /// Verified sessions and revoked token ids
    pub auth_cache: AuthCache,
    pub commands: Arc<CommandBus>,
    pub queries: Arc<QueryBus>,
}

impl AppState {
    /// Wire the buses and the auth cache around `stores`.
    pub fn new(config: Config, stores: Stores) -> anyhow::Result<Self> {
        let commands = cqrs::command_bus(&stores)?;
        let queries = cqrs::query_bus(&stores, &config)?;
        Ok(Self::builder()
            .auth_cache(AuthCache::new(&config.auth.cache))
            .commands(Arc::new(commands))
            .queries(Arc::new(queries))
            .stores(stores)
            .config(config)
            .build())
    }
}

/// Get the fleetctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: an existing user with this email keeps its id, gets the `admin` role back if it
/// lost it, and has its password replaced when one is configured.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, password: Option<&str>, config: &Config, stores: &Stores) -> anyhow::Result<UserId> {
    let password_hash = match password {
        Some(pwd) => Some(password::hash_password(pwd, &config.auth.native.password).await?),
        None => None,
    };

    if let Some(existing) = stores.users.get_user_by_email(email).await? {
        let roles = (!existing.roles.contains(&Role::Admin)).then(|| {
            let mut roles = existing.roles.clone();
            roles.push(Role::Admin);
            roles
        });
        if roles.is_some() || password_hash.is_some() || !existing.active {
            let update = UserUpdateDBRequest {
                roles,
                active: Some(true),
                password_hash,
                ..Default::default()
            };
            stores.users.update(existing.id, &update).await?;
        }
        return Ok(existing.id);
    }

    let created = stores
        .users
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            display_name: Some("Administrator".to_string()),
            password_hash,
            roles: vec![Role::Admin],
            company_id: None,
            carrier_id: None,
            active: true,
        })
        .await?;
    info!(email, "Created initial admin user");
    Ok(created.id)
}

/// Connect to the configured backend, running migrations for Postgres.
async fn setup_database(config: &Config) -> anyhow::Result<Stores> {
    match &config.database {
        DatabaseConfig::Postgres { url, max_connections } => {
            let pool = PgPoolOptions::new().max_connections(*max_connections).connect(url).await?;
            migrator().run(&pool).await?;
            info!("Database migrations applied");
            Ok(Stores::postgres(pool))
        }
        DatabaseConfig::InMemory => {
            warn!("Using the in-memory backend; all data is lost on shutdown");
            Ok(Stores::in_memory())
        }
    }
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([
            http::header::AUTHORIZATION,
            http::header::CONTENT_TYPE,
            HeaderName::from_static(ACCESS_TOKEN_HEADER),
            HeaderName::try_from(config.auth.csrf.header_name.to_ascii_lowercase())?,
        ])
        .expose_headers(vec![http::header::LOCATION, http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Authentication routes at `/authentication/*`
/// - Management API at `/admin/api/v1/*`
/// - OpenAPI document at `/admin/openapi.json`, rendered at `/admin/docs`
/// - CORS and request tracing
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/authentication/login", post(handlers::auth::login))
        .route("/authentication/logout", post(handlers::auth::logout))
        .route("/authentication/me", get(handlers::auth::me))
        .route("/authentication/password-change", post(handlers::auth::change_password))
        .route("/authentication/csrf", get(handlers::auth::csrf_token))
        .with_state(state.clone());

    let api_routes = Router::new()
        // Companies
        .route("/companies", get(handlers::companies::list_companies).post(handlers::companies::create_company))
        .route(
            "/companies/{id}",
            get(handlers::companies::get_company)
                .patch(handlers::companies::update_company)
                .delete(handlers::companies::delete_company),
        )
        // Carriers
        .route("/carriers", get(handlers::carriers::list_carriers).post(handlers::carriers::create_carrier))
        .route(
            "/carriers/{id}",
            get(handlers::carriers::get_carrier)
                .patch(handlers::carriers::update_carrier)
                .delete(handlers::carriers::delete_carrier),
        )
        // Drivers
        .route("/drivers", get(handlers::drivers::list_drivers).post(handlers::drivers::create_driver))
        .route(
            "/drivers/{id}",
            get(handlers::drivers::get_driver)
                .patch(handlers::drivers::update_driver)
                .delete(handlers::drivers::delete_driver),
        )
        // Vehicles
        .route("/vehicles", get(handlers::vehicles::list_vehicles).post(handlers::vehicles::create_vehicle))
        .route(
            "/vehicles/{id}",
            get(handlers::vehicles::get_vehicle)
                .patch(handlers::vehicles::update_vehicle)
                .delete(handlers::vehicles::delete_vehicle),
        )
        // Routes
        .route("/routes", get(handlers::routes::list_routes).post(handlers::routes::create_route))
        .route(
            "/routes/{id}",
            get(handlers::routes::get_route)
                .patch(handlers::routes::update_route)
                .delete(handlers::routes::delete_route),
        )
        .route("/routes/{id}/details", get(handlers::routes::get_route_details))
        .route("/routes/{id}/assignment", post(handlers::routes::assign_route_resources))
        .route("/routes/{id}/status", post(handlers::routes::change_route_status))
        // Trips
        .route("/trips", get(handlers::trips::list_trips).post(handlers::trips::schedule_trip))
        .route("/trips/{id}", get(handlers::trips::get_trip))
        .route("/trips/{id}/start", post(handlers::trips::start_trip))
        .route("/trips/{id}/complete", post(handlers::trips::complete_trip))
        .route("/trips/{id}/cancel", post(handlers::trips::cancel_trip))
        // Alerts
        .route("/alerts", get(handlers::alerts::list_alerts).post(handlers::alerts::raise_alert))
        .route("/alerts/{id}", get(handlers::alerts::get_alert))
        .route("/alerts/{id}/acknowledge", post(handlers::alerts::acknowledge_alert))
        .route("/alerts/{id}/resolve", post(handlers::alerts::resolve_alert))
        // Costs
        .route("/costs", get(handlers::costs::list_costs).post(handlers::costs::record_cost))
        .route(
            "/costs/{id}",
            get(handlers::costs::get_cost)
                .patch(handlers::costs::update_cost)
                .delete(handlers::costs::delete_cost),
        )
        // Documents
        .route(
            "/documents",
            get(handlers::documents::list_documents).post(handlers::documents::create_document),
        )
        .route("/documents/expiring", get(handlers::documents::list_expiring_documents))
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document)
                .patch(handlers::documents::update_document)
                .delete(handlers::documents::delete_document),
        )
        // Users
        .route("/users", get(handlers::users::list_users).post(handlers::users::create_user))
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // Reports and exports
        .route("/dashboard", get(handlers::reports::get_dashboard))
        .route("/reports/summary", get(handlers::reports::get_summary_report))
        .route("/exports/report", get(handlers::exports::export_report))
        .route("/exports/{entity}", get(handlers::exports::export_entity))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/admin/openapi.json", get(|| async { axum::Json(AdminApiDoc::openapi()) }))
        .merge(auth_routes)
        .nest("/admin/api/v1", api_routes)
        .merge(Scalar::with_url("/admin/docs", AdminApiDoc::openapi()));

    let router = router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(create_cors_layer(&state.config)?),
    );

    Ok(router)
}

/// Background tasks running alongside the HTTP server.
///
/// Tasks watch `shutdown_token`; [`BackgroundServices::shutdown`] cancels it and waits for them.
/// Dropping the struct cancels the token through `drop_guard`.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task panicked during shutdown");
            }
        }
    }
}

fn setup_background_services(state: &AppState, shutdown_token: CancellationToken) -> BackgroundServices {
    let mut background_tasks = Vec::new();

    let cache = state.auth_cache.clone();
    let interval = state.config.auth.cache.sweep_interval;
    let token = shutdown_token.clone();
    background_tasks.push(tokio::spawn(async move {
        if let Err(e) = auth::cache::run_sweeper(cache, interval, token).await {
            tracing::error!(error = %e, "Auth cache sweeper stopped");
        }
    }));

    BackgroundServices {
        background_tasks,
        drop_guard: Some(shutdown_token.clone().drop_guard()),
        shutdown_token,
    }
}

/// The HTTP server and everything it owns.
///
/// 1. **Create**: [`Application::new`] connects to the backend, runs migrations, ensures the
///    initial admin exists and starts background services
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, gracefully stops all services
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting fleetctl with configuration: {:#?}", config);

        let stores = setup_database(&config).await?;
        create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &config, &stores).await?;

        let state = AppState::new(config.clone(), stores)?;
        let bg_services = setup_background_services(&state, CancellationToken::new());
        let router = build_router(&state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "fleetctl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_config, create_test_state, test_server};

    #[tokio::test]
    async fn test_healthz_and_openapi() {
        let server = test_server(create_test_state().await);

        let health = server.get("/healthz").await;
        health.assert_status_ok();
        assert_eq!(health.text(), "OK");

        let spec: serde_json::Value = server.get("/admin/openapi.json").await.json();
        assert!(spec["paths"]["/routes/{id}/details"].is_object());
        assert!(spec["components"]["securitySchemes"]["BearerAuth"].is_object());

        server.get("/admin/docs").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_initial_admin_is_idempotent() {
        let config = create_test_config();
        let stores = Stores::in_memory();

        let first = create_initial_admin_user("Admin@Fleet.test", Some("first-password"), &config, &stores)
            .await
            .unwrap();
        let second = create_initial_admin_user("admin@fleet.test", Some("second-password"), &config, &stores)
            .await
            .unwrap();
        assert_eq!(first, second);

        let admin = stores.users.get_user_by_email("admin@fleet.test").await.unwrap().unwrap();
        assert_eq!(admin.roles, vec![Role::Admin]);
        let hash = admin.password_hash.unwrap();
        assert!(password::verify_string("second-password", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_background_services_stop_on_shutdown() {
        let state = create_test_state().await;
        let services = setup_background_services(&state, CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(5), services.shutdown())
            .await
            .expect("background services did not stop");
    }
}
