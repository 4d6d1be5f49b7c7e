//! OpenAPI documentation for the management API at `/admin/api/v1/*`.

use utoipa::{
    Modify, OpenApi,
    openapi::{
        Server,
        security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};

use crate::api;

/// Bearer tokens for API clients and the session cookie for the browser UI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /authentication/login`:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            The same token is also accepted in the `X-Access-Token` header.",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "fleetctl_session",
                    "Session cookie set at login. Unsafe methods must echo the CSRF token from \
                    `GET /authentication/csrf` in the configured header.",
                ))),
            );
        }
    }
}

/// The authentication routes live at the root, outside `/admin/api/v1`.
struct AuthenticationServer;

impl Modify for AuthenticationServer {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        for (path, item) in openapi.paths.paths.iter_mut() {
            if path.starts_with("/authentication/") {
                item.servers = Some(vec![Server::new("/")]);
            }
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/admin/api/v1", description = "Management API")
    ),
    modifiers(&SecurityAddon, &AuthenticationServer),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::me,
        api::handlers::auth::change_password,
        api::handlers::auth::csrf_token,
        api::handlers::companies::list_companies,
        api::handlers::companies::get_company,
        api::handlers::companies::create_company,
        api::handlers::companies::update_company,
        api::handlers::companies::delete_company,
        api::handlers::carriers::list_carriers,
        api::handlers::carriers::get_carrier,
        api::handlers::carriers::create_carrier,
        api::handlers::carriers::update_carrier,
        api::handlers::carriers::delete_carrier,
        api::handlers::drivers::list_drivers,
        api::handlers::drivers::get_driver,
        api::handlers::drivers::create_driver,
        api::handlers::drivers::update_driver,
        api::handlers::drivers::delete_driver,
        api::handlers::vehicles::list_vehicles,
        api::handlers::vehicles::get_vehicle,
        api::handlers::vehicles::create_vehicle,
        api::handlers::vehicles::update_vehicle,
        api::handlers::vehicles::delete_vehicle,
        api::handlers::routes::list_routes,
        api::handlers::routes::get_route,
        api::handlers::routes::get_route_details,
        api::handlers::routes::create_route,
        api::handlers::routes::update_route,
        api::handlers::routes::assign_route_resources,
        api::handlers::routes::change_route_status,
        api::handlers::routes::delete_route,
        api::handlers::trips::list_trips,
        api::handlers::trips::get_trip,
        api::handlers::trips::schedule_trip,
        api::handlers::trips::start_trip,
        api::handlers::trips::complete_trip,
        api::handlers::trips::cancel_trip,
        api::handlers::alerts::list_alerts,
        api::handlers::alerts::get_alert,
        api::handlers::alerts::raise_alert,
        api::handlers::alerts::acknowledge_alert,
        api::handlers::alerts::resolve_alert,
        api::handlers::costs::list_costs,
        api::handlers::costs::get_cost,
        api::handlers::costs::record_cost,
        api::handlers::costs::update_cost,
        api::handlers::costs::delete_cost,
        api::handlers::documents::list_documents,
        api::handlers::documents::list_expiring_documents,
        api::handlers::documents::get_document,
        api::handlers::documents::create_document,
        api::handlers::documents::update_document,
        api::handlers::documents::delete_document,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::reports::get_dashboard,
        api::handlers::reports::get_summary_report,
        api::handlers::exports::export_entity,
        api::handlers::exports::export_report,
    ),
    components(
        schemas(
            api::models::auth::LoginRequest,
            api::models::auth::ChangePasswordRequest,
            api::models::auth::AuthResponse,
            api::models::auth::CsrfTokenResponse,
            api::models::companies::CompanyCreate,
            api::models::companies::CompanyUpdate,
            api::models::companies::CompanyResponse,
            api::models::carriers::CarrierCreate,
            api::models::carriers::CarrierUpdate,
            api::models::carriers::CarrierResponse,
            api::models::drivers::DriverStatus,
            api::models::drivers::DriverCreate,
            api::models::drivers::DriverUpdate,
            api::models::drivers::DriverResponse,
            api::models::vehicles::VehicleKind,
            api::models::vehicles::VehicleStatus,
            api::models::vehicles::VehicleCreate,
            api::models::vehicles::VehicleUpdate,
            api::models::vehicles::VehicleResponse,
            api::models::routes::RouteShift,
            api::models::routes::RouteStatus,
            api::models::routes::RouteCreate,
            api::models::routes::RouteUpdate,
            api::models::routes::RouteAssignment,
            api::models::routes::RouteStatusChange,
            api::models::routes::RouteResponse,
            api::models::routes::RouteDetailsResponse,
            api::models::trips::TripStatus,
            api::models::trips::TripSchedule,
            api::models::trips::TripStart,
            api::models::trips::TripComplete,
            api::models::trips::TripCancel,
            api::models::trips::TripResponse,
            api::models::alerts::AlertKind,
            api::models::alerts::AlertSeverity,
            api::models::alerts::AlertStatus,
            api::models::alerts::AlertCreate,
            api::models::alerts::AlertResolve,
            api::models::alerts::AlertResponse,
            api::models::costs::CostCategory,
            api::models::costs::CostCreate,
            api::models::costs::CostUpdate,
            api::models::costs::CostResponse,
            api::models::documents::DocumentOwnerKind,
            api::models::documents::DocumentType,
            api::models::documents::ExpiryState,
            api::models::documents::DocumentCreate,
            api::models::documents::DocumentUpdate,
            api::models::documents::DocumentResponse,
            api::models::documents::ExpiringDocumentResponse,
            api::models::users::Role,
            api::models::users::CurrentUser,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::reports::FleetReport,
            api::models::reports::DashboardStats,
        )
    ),
    tags(
        (name = "authentication", description = "Log in with email and password, manage the session and change passwords."),
        (name = "companies", description = "Tenants. Every other record belongs to exactly one company."),
        (name = "carriers", description = "Transport providers contracted by a company. Carrier users only see their own carrier's records."),
        (name = "drivers", description = "Drivers, their license data and availability."),
        (name = "vehicles", description = "Buses, minibuses and vans with capacity, odometer and availability."),
        (name = "routes", description = "Planned routes and their carrier, driver and vehicle assignment.

Routes start `planned`, become `active`, may be `suspended` and can be `cancelled`."),
        (name = "trips", description = "Individual runs of a route: scheduled, started, completed or cancelled."),
        (name = "alerts", description = "Operational incidents raised against routes, trips, drivers or vehicles, then acknowledged and resolved."),
        (name = "costs", description = "Fuel, tolls, maintenance and other expenses."),
        (name = "documents", description = "Licenses, registrations, insurance and contracts with expiry tracking."),
        (name = "users", description = "Accounts, roles and their company or carrier."),
        (name = "reports", description = "Dashboard figures and the summary report."),
        (name = "exports", description = "CSV, XLSX and PDF downloads of lists and the summary report."),
    ),
    info(
        title = "Fleet Control API",
        version = "1.0.0",
        description = "Multi-tenant management API for fleet operations.

## Authentication

Log in at `POST /authentication/login`. Send the returned token as `Authorization: Bearer <token>`
or `X-Access-Token: <token>`, or rely on the session cookie from a browser.

## Tenancy

Admins see every company. Everyone else is confined to their own company, and carrier users to
their own carrier. Records outside that scope answer `404`.

## Errors

Errors are JSON objects with a `message`. Validation failures add `errors`, a map from field name to messages.",
    ),
)]
pub struct AdminApiDoc;
