//! Fixtures shared by the unit and HTTP tests: an in-memory app state, tokens and seeded records.

use axum_test::TestServer;
use uuid::Uuid;

use crate::api::models::{
    alerts::{AlertKind, AlertSeverity},
    carriers::CarrierCreate,
    costs::CostCategory,
    companies::CompanyCreate,
    drivers::{DriverCreate, DriverStatus},
    routes::{RouteCreate, RouteShift},
    users::{CurrentUser, Role},
    vehicles::{VehicleCreate, VehicleKind, VehicleStatus},
};
use crate::auth::{password, session};
use crate::config::{Config, DatabaseConfig};
use crate::db::Stores;
use crate::db::handlers::Repository as _;
use crate::db::models::{
    alerts::{AlertCreateDBRequest, AlertDBResponse},
    carriers::{CarrierCreateDBRequest, CarrierDBResponse},
    costs::{CostCreateDBRequest, CostDBResponse},
    companies::{CompanyCreateDBRequest, CompanyDBResponse},
    drivers::{DriverCreateDBRequest, DriverDBResponse},
    routes::{RouteCreateDBRequest, RouteDBResponse},
    users::{UserCreateDBRequest, UserDBResponse},
    vehicles::{VehicleCreateDBRequest, VehicleDBResponse},
};
use crate::types::{CarrierId, CompanyId, DriverId, VehicleId};
use crate::{AppState, build_router};

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// In-memory backend, a fixed secret and cheap password hashing.
pub fn create_test_config() -> Config {
    let mut config = Config {
        database: DatabaseConfig::InMemory,
        admin_email: "admin@fleet.test".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.auth.native.password.argon2_memory_kib = 1024;
    config.auth.native.password.argon2_iterations = 1;
    config.auth.native.password.argon2_parallelism = 1;
    config.auth.native.session.cookie_secure = false;
    config
}

pub async fn create_test_state() -> AppState {
    AppState::new(create_test_config(), Stores::in_memory()).expect("Failed to create test state")
}

pub fn test_server(state: AppState) -> TestServer {
    let router = build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

pub async fn create_test_user(state: &AppState, role: Role, company_id: Option<CompanyId>) -> UserDBResponse {
    create_test_user_with(state, vec![role], company_id, None).await
}

pub async fn create_test_carrier_user(state: &AppState, company_id: CompanyId, carrier_id: CarrierId) -> UserDBResponse {
    create_test_user_with(state, vec![Role::Carrier], Some(company_id), Some(carrier_id)).await
}

pub async fn create_test_user_with(
    state: &AppState,
    roles: Vec<Role>,
    company_id: Option<CompanyId>,
    carrier_id: Option<CarrierId>,
) -> UserDBResponse {
    let password_hash = password::hash_password(TEST_PASSWORD, &state.config.auth.native.password)
        .await
        .expect("Failed to hash test password");
    let request = UserCreateDBRequest {
        email: format!("user-{}@fleet.test", Uuid::new_v4().simple()),
        display_name: Some(format!("Test {}", roles.first().map(Role::as_str).unwrap_or("user"))),
        password_hash: Some(password_hash),
        roles,
        company_id,
        carrier_id,
        active: true,
    };
    state.stores.users.create(&request).await.expect("Failed to create test user")
}

/// `Authorization` header value for a user, without going through login.
pub fn bearer(state: &AppState, user: &UserDBResponse) -> String {
    let issued = session::create_session_token(&CurrentUser::from(user.clone()), &state.config).expect("Failed to issue test token");
    format!("Bearer {}", issued.token)
}

pub async fn create_test_company(stores: &Stores, name: &str) -> CompanyDBResponse {
    let request = CompanyCreateDBRequest::from(CompanyCreate {
        name: name.to_string(),
        tax_id: None,
        email: None,
        phone: None,
        address: None,
        city: None,
        state: None,
        active: None,
    });
    stores.companies.create(&request).await.expect("Failed to create test company")
}

pub async fn create_test_carrier(stores: &Stores, company_id: CompanyId) -> CarrierDBResponse {
    let request = CarrierCreateDBRequest::new(
        company_id,
        CarrierCreate {
            company_id: None,
            name: format!("Carrier {}", &Uuid::new_v4().simple().to_string()[..8]),
            tax_id: None,
            contact_name: None,
            email: None,
            phone: None,
            active: None,
        },
    );
    stores.carriers.create(&request).await.expect("Failed to create test carrier")
}

pub async fn create_test_driver(stores: &Stores, company_id: CompanyId, carrier_id: Option<CarrierId>) -> DriverDBResponse {
    let request = DriverCreateDBRequest::new(
        company_id,
        DriverCreate {
            company_id: None,
            carrier_id,
            name: "Test Driver".to_string(),
            document_number: Uuid::new_v4().simple().to_string(),
            license_number: None,
            license_category: Some("D".to_string()),
            license_expires_on: None,
            phone: None,
            email: None,
            status: Some(DriverStatus::Active),
        },
    );
    stores.drivers.create(&request).await.expect("Failed to create test driver")
}

pub async fn create_test_vehicle(stores: &Stores, company_id: CompanyId, carrier_id: Option<CarrierId>) -> VehicleDBResponse {
    let request = VehicleCreateDBRequest::new(
        company_id,
        VehicleCreate {
            company_id: None,
            carrier_id,
            plate: format!("TST{:04}", Uuid::new_v4().as_u128() % 10_000),
            model: Some("Marcopolo Torino".to_string()),
            manufacturer: None,
            year: Some(2020),
            capacity: Some(44),
            kind: VehicleKind::Bus,
            status: Some(VehicleStatus::Available),
            odometer_km: Some(1000.0),
        },
    );
    stores.vehicles.create(&request).await.expect("Failed to create test vehicle")
}

pub async fn create_test_route(stores: &Stores, company_id: CompanyId, carrier_id: Option<CarrierId>) -> RouteDBResponse {
    let request = RouteCreateDBRequest::new(
        company_id,
        RouteCreate {
            company_id: None,
            carrier_id,
            driver_id: None,
            vehicle_id: None,
            code: format!("R{}", &Uuid::new_v4().simple().to_string()[..6]),
            name: "Plant shuttle".to_string(),
            origin: "Centro".to_string(),
            destination: "Distrito Industrial".to_string(),
            distance_km: 25.0,
            departure_time: None,
            shift: RouteShift::Morning,
        },
    );
    stores.routes.create(&request).await.expect("Failed to create test route")
}

pub async fn create_test_alert(
    stores: &Stores,
    company_id: CompanyId,
    driver_id: Option<DriverId>,
    vehicle_id: Option<VehicleId>,
) -> AlertDBResponse {
    let request = AlertCreateDBRequest {
        company_id,
        kind: AlertKind::Breakdown,
        severity: AlertSeverity::High,
        title: "Engine warning light".to_string(),
        description: None,
        route_id: None,
        trip_id: None,
        vehicle_id,
        driver_id,
        raised_by: None,
    };
    stores.alerts.create(&request).await.expect("Failed to create test alert")
}

pub async fn create_test_cost(
    stores: &Stores,
    company_id: CompanyId,
    vehicle_id: Option<VehicleId>,
    carrier_id: Option<CarrierId>,
) -> CostDBResponse {
    let request = CostCreateDBRequest {
        company_id,
        category: CostCategory::Fuel,
        amount: rust_decimal::Decimal::new(25000, 2),
        currency: "BRL".to_string(),
        incurred_on: chrono::Utc::now().date_naive(),
        description: None,
        route_id: None,
        vehicle_id,
        carrier_id,
        trip_id: None,
        recorded_by: None,
    };
    stores.costs.create(&request).await.expect("Failed to create test cost")
}
