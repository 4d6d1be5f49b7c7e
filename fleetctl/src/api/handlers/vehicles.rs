use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        vehicles::{ListVehiclesQuery, VehicleCreate, VehicleResponse, VehicleUpdate},
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    db::{
        Stores,
        handlers::{
            Repository as _, alerts::AlertFilter, costs::CostFilter, repository::UNBOUNDED, routes::RouteFilter, trips::TripFilter,
            vehicles::VehicleFilter,
        },
        models::{
            alerts::AlertUpdateDBRequest,
            costs::CostUpdateDBRequest,
            routes::RouteUpdateDBRequest,
            trips::TripUpdateDBRequest,
            vehicles::{VehicleCreateDBRequest, VehicleDBResponse, VehicleUpdateDBRequest},
        },
    },
    errors::Result,
    references,
    types::VehicleId,
    validation::Validate,
};

pub(crate) async fn load_vehicle(stores: &Stores, scope: &TenantScope, id: VehicleId) -> Result<VehicleDBResponse> {
    scope.ensure(stores.vehicles.get_by_id(id).await?, "Vehicle", id, |v| (v.company_id, v.carrier_id))
}

pub(crate) fn vehicle_filter(scope: &TenantScope, query: ListVehiclesQuery, skip: i64, limit: i64) -> VehicleFilter {
    let mut filter = VehicleFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.carrier_id = scope.carrier_id().or(query.carrier_id);
    filter.status = query.status;
    filter.kind = query.kind;
    filter.search = query.search;
    filter
}

async fn detach_vehicle(stores: &Stores, id: VehicleId) -> Result<()> {
    let routes = stores.routes.list(&RouteFilter::new(0, UNBOUNDED).with_vehicle(id)).await?;
    let clear_route = RouteUpdateDBRequest {
        vehicle_id: Some(None),
        ..Default::default()
    };
    for route in routes {
        stores.routes.update(route.id, &clear_route).await?;
    }

    let trips = stores.trips.list(&TripFilter::new(0, UNBOUNDED).with_vehicle(id)).await?;
    let clear_trip = TripUpdateDBRequest {
        vehicle_id: Some(None),
        ..Default::default()
    };
    for trip in trips {
        stores.trips.update(trip.id, &clear_trip).await?;
    }

    let alerts = stores.alerts.list(&AlertFilter::new(0, UNBOUNDED).with_vehicle(id)).await?;
    let clear_alert = AlertUpdateDBRequest {
        vehicle_id: Some(None),
        ..Default::default()
    };
    for alert in alerts {
        stores.alerts.update(alert.id, &clear_alert).await?;
    }

    let costs = stores.costs.list(&CostFilter::new(0, UNBOUNDED).with_vehicle(id)).await?;
    let clear_cost = CostUpdateDBRequest {
        vehicle_id: Some(None),
        ..Default::default()
    };
    for cost in costs {
        stores.costs.update(cost.id, &clear_cost).await?;
    }
    Ok(())
}

/// List vehicles
#[utoipa::path(
    get,
    path = "/vehicles",
    tag = "vehicles",
    summary = "List vehicles",
    params(ListVehiclesQuery),
    responses(
        (status = 200, description = "Page of vehicles", body = PaginatedResponse<VehicleResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(mut query): Query<ListVehiclesQuery>,
    current_user: RequiresPermission<resource::Vehicles, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<VehicleResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = vehicle_filter(&scope, query, skip, limit);

    let vehicles = state.stores.vehicles.list(&filter).await?;
    let total_count = state.stores.vehicles.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(vehicles, total_count, &pagination)))
}

/// Get a vehicle
#[utoipa::path(
    get,
    path = "/vehicles/{id}",
    tag = "vehicles",
    summary = "Get vehicle",
    params(("id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle", body = VehicleResponse),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(vehicle_id = %id))]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    current_user: RequiresPermission<resource::Vehicles, operation::ReadOwn>,
) -> Result<Json<VehicleResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_vehicle(&state.stores, &scope, id).await?.into()))
}

/// Create a vehicle
#[utoipa::path(
    post,
    path = "/vehicles",
    tag = "vehicles",
    summary = "Create vehicle",
    request_body = VehicleCreate,
    responses(
        (status = 201, description = "Vehicle created", body = VehicleResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Plate already registered"),
        (status = 422, description = "Invalid fields or unknown carrier"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Vehicles, operation::CreateOwn>,
    Json(create): Json<VehicleCreate>,
) -> Result<(StatusCode, Json<VehicleResponse>)> {
    create.validate()?;
    let scope = current_user.scope()?;
    let company_id = scope.owning_company(create.company_id)?;
    references::check_optional(&state.stores, company_id, create.carrier_id, None, None).await?;

    let vehicle = state
        .stores
        .vehicles
        .create(&VehicleCreateDBRequest::new(company_id, create))
        .await?;
    tracing::info!(vehicle_id = %vehicle.id, plate = %vehicle.plate, "Vehicle created");
    Ok((StatusCode::CREATED, Json(vehicle.into())))
}

/// Update a vehicle
#[utoipa::path(
    patch,
    path = "/vehicles/{id}",
    tag = "vehicles",
    summary = "Update vehicle",
    request_body = VehicleUpdate,
    params(("id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle updated", body = VehicleResponse),
        (status = 404, description = "Vehicle not found"),
        (status = 422, description = "Invalid fields or unknown carrier"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(vehicle_id = %id))]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    current_user: RequiresPermission<resource::Vehicles, operation::UpdateOwn>,
    Json(update): Json<VehicleUpdate>,
) -> Result<Json<VehicleResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let vehicle = load_vehicle(&state.stores, &scope, id).await?;
    if let Some(Some(carrier_id)) = update.carrier_id {
        references::carrier(&state.stores, vehicle.company_id, carrier_id).await?;
    }

    let updated = state
        .stores
        .vehicles
        .update(vehicle.id, &VehicleUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Delete a vehicle
///
/// Routes and trips that name the vehicle keep existing without one.
#[utoipa::path(
    delete,
    path = "/vehicles/{id}",
    tag = "vehicles",
    summary = "Delete vehicle",
    params(("id" = uuid::Uuid, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(vehicle_id = %id))]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(id): Path<VehicleId>,
    current_user: RequiresPermission<resource::Vehicles, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let vehicle = load_vehicle(&state.stores, &scope, id).await?;

    detach_vehicle(&state.stores, vehicle.id).await?;
    if !state.stores.vehicles.delete(vehicle.id).await? {
        return Err(not_found("Vehicle", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::users::Role;
    use crate::api::models::vehicles::{VehicleKind, VehicleStatus};
    use crate::db::models::trips::TripCreateDBRequest;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_create_vehicle_normalizes_plate() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/vehicles")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"plate": "abc-1234", "kind": "minibus", "capacity": 28}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let vehicle: VehicleResponse = response.json();
        assert_eq!(vehicle.plate, "ABC1234");
        assert_eq!(vehicle.kind, VehicleKind::Minibus);
        assert_eq!(vehicle.status, VehicleStatus::Available);

        let response = server
            .post("/admin/api/v1/vehicles")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"plate": "not a plate", "kind": "van", "capacity": 0}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert!(body["errors"]["plate"].is_array());
        assert!(body["errors"]["capacity"].is_array());
    }

    #[tokio::test]
    async fn test_list_vehicles_filters_by_status() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let available = create_test_vehicle(&state.stores, company.id, None).await;
        let broken = create_test_vehicle(&state.stores, company.id, None).await;
        state
            .stores
            .vehicles
            .update(
                broken.id,
                &VehicleUpdateDBRequest {
                    status: Some(VehicleStatus::Maintenance),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        let page: PaginatedResponse<VehicleResponse> = server
            .get("/admin/api/v1/vehicles?status=available")
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, available.id);
    }

    #[tokio::test]
    async fn test_delete_vehicle_detaches_trips() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let vehicle = create_test_vehicle(&state.stores, company.id, None).await;
        let route = create_test_route(&state.stores, company.id, None).await;
        let trip = state
            .stores
            .trips
            .create(&TripCreateDBRequest {
                company_id: company.id,
                route_id: route.id,
                carrier_id: None,
                driver_id: None,
                vehicle_id: Some(vehicle.id),
                scheduled_for: chrono::Utc::now(),
                passenger_count: None,
                notes: None,
            })
            .await
            .unwrap();
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/vehicles/{}", vehicle.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let trip = state.stores.trips.get_by_id(trip.id).await.unwrap().unwrap();
        assert_eq!(trip.vehicle_id, None);
    }

    #[tokio::test]
    async fn test_delete_vehicle_keeps_alerts_and_costs() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let vehicle = create_test_vehicle(&state.stores, company.id, None).await;
        let alert = create_test_alert(&state.stores, company.id, None, Some(vehicle.id)).await;
        let cost = create_test_cost(&state.stores, company.id, Some(vehicle.id), Some(carrier.id)).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/vehicles/{}", vehicle.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let alert = state.stores.alerts.get_by_id(alert.id).await.unwrap().unwrap();
        assert_eq!(alert.vehicle_id, None);
        let cost = state.stores.costs.get_by_id(cost.id).await.unwrap().unwrap();
        assert_eq!(cost.vehicle_id, None);
        assert_eq!(cost.carrier_id, Some(carrier.id));
    }
}
