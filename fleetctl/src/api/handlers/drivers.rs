use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        drivers::{DriverCreate, DriverResponse, DriverUpdate, ListDriversQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    db::{
        Stores,
        handlers::{
            Repository as _, alerts::AlertFilter, drivers::DriverFilter, repository::UNBOUNDED, routes::RouteFilter, trips::TripFilter,
        },
        models::{
            alerts::AlertUpdateDBRequest,
            drivers::{DriverCreateDBRequest, DriverDBResponse, DriverUpdateDBRequest},
            routes::RouteUpdateDBRequest,
            trips::TripUpdateDBRequest,
        },
    },
    errors::Result,
    references,
    types::DriverId,
    validation::Validate,
};

pub(crate) async fn load_driver(stores: &Stores, scope: &TenantScope, id: DriverId) -> Result<DriverDBResponse> {
    scope.ensure(stores.drivers.get_by_id(id).await?, "Driver", id, |d| (d.company_id, d.carrier_id))
}

/// The scoped filter behind both the listing and the export.
pub(crate) fn driver_filter(scope: &TenantScope, query: ListDriversQuery, skip: i64, limit: i64) -> DriverFilter {
    let mut filter = DriverFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.carrier_id = scope.carrier_id().or(query.carrier_id);
    filter.status = query.status;
    filter.search = query.search;
    filter
}

/// Clear the driver from every route, trip and alert that names it.
async fn detach_driver(stores: &Stores, id: DriverId) -> Result<()> {
    let routes = stores.routes.list(&RouteFilter::new(0, UNBOUNDED).with_driver(id)).await?;
    let clear_route = RouteUpdateDBRequest {
        driver_id: Some(None),
        ..Default::default()
    };
    for route in routes {
        stores.routes.update(route.id, &clear_route).await?;
    }

    let trips = stores.trips.list(&TripFilter::new(0, UNBOUNDED).with_driver(id)).await?;
    let clear_trip = TripUpdateDBRequest {
        driver_id: Some(None),
        ..Default::default()
    };
    for trip in trips {
        stores.trips.update(trip.id, &clear_trip).await?;
    }

    let alerts = stores.alerts.list(&AlertFilter::new(0, UNBOUNDED).with_driver(id)).await?;
    let clear_alert = AlertUpdateDBRequest {
        driver_id: Some(None),
        ..Default::default()
    };
    for alert in alerts {
        stores.alerts.update(alert.id, &clear_alert).await?;
    }
    Ok(())
}

/// List drivers
#[utoipa::path(
    get,
    path = "/drivers",
    tag = "drivers",
    summary = "List drivers",
    params(ListDriversQuery),
    responses(
        (status = 200, description = "Page of drivers", body = PaginatedResponse<DriverResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_drivers(
    State(state): State<AppState>,
    Query(mut query): Query<ListDriversQuery>,
    current_user: RequiresPermission<resource::Drivers, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<DriverResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = driver_filter(&scope, query, skip, limit);

    let drivers = state.stores.drivers.list(&filter).await?;
    let total_count = state.stores.drivers.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(drivers, total_count, &pagination)))
}

/// Get a driver
#[utoipa::path(
    get,
    path = "/drivers/{id}",
    tag = "drivers",
    summary = "Get driver",
    params(("id" = uuid::Uuid, Path, description = "Driver ID")),
    responses(
        (status = 200, description = "Driver", body = DriverResponse),
        (status = 404, description = "Driver not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(driver_id = %id))]
pub async fn get_driver(
    State(state): State<AppState>,
    Path(id): Path<DriverId>,
    current_user: RequiresPermission<resource::Drivers, operation::ReadOwn>,
) -> Result<Json<DriverResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_driver(&state.stores, &scope, id).await?.into()))
}

/// Create a driver
#[utoipa::path(
    post,
    path = "/drivers",
    tag = "drivers",
    summary = "Create driver",
    request_body = DriverCreate,
    responses(
        (status = 201, description = "Driver created", body = DriverResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Document number already registered in this company"),
        (status = 422, description = "Invalid fields or unknown carrier"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_driver(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Drivers, operation::CreateOwn>,
    Json(create): Json<DriverCreate>,
) -> Result<(StatusCode, Json<DriverResponse>)> {
    create.validate()?;
    let scope = current_user.scope()?;
    let company_id = scope.owning_company(create.company_id)?;
    references::check_optional(&state.stores, company_id, create.carrier_id, None, None).await?;

    let driver = state
        .stores
        .drivers
        .create(&DriverCreateDBRequest::new(company_id, create))
        .await?;
    tracing::info!(driver_id = %driver.id, %company_id, "Driver created");
    Ok((StatusCode::CREATED, Json(driver.into())))
}

/// Update a driver
#[utoipa::path(
    patch,
    path = "/drivers/{id}",
    tag = "drivers",
    summary = "Update driver",
    request_body = DriverUpdate,
    params(("id" = uuid::Uuid, Path, description = "Driver ID")),
    responses(
        (status = 200, description = "Driver updated", body = DriverResponse),
        (status = 404, description = "Driver not found"),
        (status = 422, description = "Invalid fields or unknown carrier"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(driver_id = %id))]
pub async fn update_driver(
    State(state): State<AppState>,
    Path(id): Path<DriverId>,
    current_user: RequiresPermission<resource::Drivers, operation::UpdateOwn>,
    Json(update): Json<DriverUpdate>,
) -> Result<Json<DriverResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let driver = load_driver(&state.stores, &scope, id).await?;
    if let Some(Some(carrier_id)) = update.carrier_id {
        references::carrier(&state.stores, driver.company_id, carrier_id).await?;
    }

    let updated = state
        .stores
        .drivers
        .update(driver.id, &DriverUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Delete a driver
///
/// Routes and trips that name the driver keep existing without one.
#[utoipa::path(
    delete,
    path = "/drivers/{id}",
    tag = "drivers",
    summary = "Delete driver",
    params(("id" = uuid::Uuid, Path, description = "Driver ID")),
    responses(
        (status = 204, description = "Driver deleted"),
        (status = 404, description = "Driver not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(driver_id = %id))]
pub async fn delete_driver(
    State(state): State<AppState>,
    Path(id): Path<DriverId>,
    current_user: RequiresPermission<resource::Drivers, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let driver = load_driver(&state.stores, &scope, id).await?;

    detach_driver(&state.stores, driver.id).await?;
    if !state.stores.drivers.delete(driver.id).await? {
        return Err(not_found("Driver", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::drivers::DriverStatus;
    use crate::api::models::users::Role;
    use crate::db::models::routes::RouteUpdateDBRequest;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_create_driver_checks_carrier_reference() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let foreign_carrier = create_test_carrier(&state.stores, other.id).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/drivers")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({
                "name": "João Pereira",
                "document_number": "111.222.333-44",
                "carrier_id": foreign_carrier.id,
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert!(body["errors"]["carrier_id"].is_array());

        let response = server
            .post("/admin/api/v1/drivers")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"name": "João Pereira", "document_number": "111.222.333-44"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let driver: DriverResponse = response.json();
        assert_eq!(driver.company_id, company.id);
        assert_eq!(driver.status, DriverStatus::Active);
    }

    #[tokio::test]
    async fn test_list_drivers_is_tenant_scoped() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        create_test_driver(&state.stores, company.id, Some(carrier.id)).await;
        create_test_driver(&state.stores, company.id, None).await;
        let foreign = create_test_driver(&state.stores, other.id, None).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let carrier_user = create_test_carrier_user(&state, company.id, carrier.id).await;
        let server = test_server(state.clone());

        // company_id in the query is ignored for scoped users
        let page: PaginatedResponse<DriverResponse> = server
            .get(&format!("/admin/api/v1/drivers?company_id={}", other.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .json();
        assert_eq!(page.total_count, 2);
        assert!(page.data.iter().all(|d| d.company_id == company.id));

        let page: PaginatedResponse<DriverResponse> = server
            .get("/admin/api/v1/drivers")
            .add_header("authorization", bearer(&state, &carrier_user))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].carrier_id, Some(carrier.id));

        server
            .get(&format!("/admin/api/v1/drivers/{}", foreign.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_not_found();
        server
            .delete(&format!("/admin/api/v1/drivers/{}", foreign.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_delete_driver_detaches_routes() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let driver = create_test_driver(&state.stores, company.id, None).await;
        let route = create_test_route(&state.stores, company.id, None).await;
        state
            .stores
            .routes
            .update(
                route.id,
                &RouteUpdateDBRequest {
                    driver_id: Some(Some(driver.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/drivers/{}", driver.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let route = state.stores.routes.get_by_id(route.id).await.unwrap().unwrap();
        assert_eq!(route.driver_id, None);
        assert!(state.stores.drivers.get_by_id(driver.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_driver_keeps_alerts_without_driver() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let driver = create_test_driver(&state.stores, company.id, None).await;
        let vehicle = create_test_vehicle(&state.stores, company.id, None).await;
        let alert = create_test_alert(&state.stores, company.id, Some(driver.id), Some(vehicle.id)).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/drivers/{}", driver.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let alert = state.stores.alerts.get_by_id(alert.id).await.unwrap().unwrap();
        assert_eq!(alert.driver_id, None);
        assert_eq!(alert.vehicle_id, Some(vehicle.id));
    }

    #[tokio::test]
    async fn test_operator_cannot_delete_drivers() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let driver = create_test_driver(&state.stores, company.id, None).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/drivers/{}", driver.id))
            .add_header("authorization", bearer(&state, &operator))
            .await
            .assert_status_forbidden();
    }
}
