use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        routes::{ListRoutesQuery, RouteAssignment, RouteCreate, RouteDetailsResponse, RouteResponse, RouteStatusChange, RouteUpdate},
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    cqrs::{
        ExecutionContext,
        commands::{AssignRouteResources, ChangeRouteStatus, CreateRoute},
        queries::GetRouteDetails,
    },
    db::{
        Stores,
        handlers::{Repository as _, alerts::AlertFilter, costs::CostFilter, routes::RouteFilter, trips::TripFilter},
        models::routes::{RouteDBResponse, RouteUpdateDBRequest},
    },
    errors::{Error, Result},
    types::RouteId,
    validation::Validate,
};

async fn load_route(stores: &Stores, scope: &TenantScope, id: RouteId) -> Result<RouteDBResponse> {
    scope.ensure(stores.routes.get_by_id(id).await?, "Route", id, |r| (r.company_id, r.carrier_id))
}

pub(crate) fn route_filter(scope: &TenantScope, query: ListRoutesQuery, skip: i64, limit: i64) -> RouteFilter {
    let mut filter = RouteFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.carrier_id = scope.carrier_id().or(query.carrier_id);
    filter.driver_id = query.driver_id;
    filter.vehicle_id = query.vehicle_id;
    filter.status = query.status;
    filter.shift = query.shift;
    filter.search = query.search;
    filter
}

async fn route_dependents(stores: &Stores, id: RouteId) -> Result<Vec<&'static str>> {
    let mut dependents = Vec::new();
    if stores.trips.count(&TripFilter::new(0, 1).with_route(id)).await? > 0 {
        dependents.push("trips");
    }
    if stores.alerts.count(&AlertFilter::new(0, 1).with_route(id)).await? > 0 {
        dependents.push("alerts");
    }
    if stores.costs.count(&CostFilter::new(0, 1).with_route(id)).await? > 0 {
        dependents.push("costs");
    }
    Ok(dependents)
}

/// List routes
///
/// Carrier users only see the routes their carrier operates.
#[utoipa::path(
    get,
    path = "/routes",
    tag = "routes",
    summary = "List routes",
    params(ListRoutesQuery),
    responses(
        (status = 200, description = "Page of routes", body = PaginatedResponse<RouteResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_routes(
    State(state): State<AppState>,
    Query(mut query): Query<ListRoutesQuery>,
    current_user: RequiresPermission<resource::Routes, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<RouteResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = route_filter(&scope, query, skip, limit);

    let routes = state.stores.routes.list(&filter).await?;
    let total_count = state.stores.routes.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(routes, total_count, &pagination)))
}

/// Get a route
#[utoipa::path(
    get,
    path = "/routes/{id}",
    tag = "routes",
    summary = "Get route",
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route", body = RouteResponse),
        (status = 404, description = "Route not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::ReadOwn>,
) -> Result<Json<RouteResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_route(&state.stores, &scope, id).await?.into()))
}

/// Route with its carrier, driver, vehicle, recent trips and open alerts
#[utoipa::path(
    get,
    path = "/routes/{id}/details",
    tag = "routes",
    summary = "Get route details",
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route details", body = RouteDetailsResponse),
        (status = 404, description = "Route not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn get_route_details(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::ReadOwn>,
) -> Result<Json<RouteDetailsResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let details = state.queries.dispatch(&ctx, GetRouteDetails { route_id: id }).await?;
    Ok(Json(details))
}

/// Create a route
///
/// New routes start out `planned`. Referenced carrier, driver and vehicle must belong to the same
/// company; the driver must be active and the vehicle available.
#[utoipa::path(
    post,
    path = "/routes",
    tag = "routes",
    summary = "Create route",
    request_body = RouteCreate,
    responses(
        (status = 201, description = "Route created", body = RouteResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Code already used, or driver/vehicle not assignable"),
        (status = 422, description = "Invalid fields or unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_route(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Routes, operation::CreateOwn>,
    Json(create): Json<RouteCreate>,
) -> Result<(StatusCode, Json<RouteResponse>)> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let route = state.commands.dispatch(&ctx, CreateRoute { input: create }).await?;
    Ok((StatusCode::CREATED, Json(route.into())))
}

/// Update the descriptive fields of a route
#[utoipa::path(
    patch,
    path = "/routes/{id}",
    tag = "routes",
    summary = "Update route",
    request_body = RouteUpdate,
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route updated", body = RouteResponse),
        (status = 404, description = "Route not found"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::UpdateOwn>,
    Json(update): Json<RouteUpdate>,
) -> Result<Json<RouteResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let route = load_route(&state.stores, &scope, id).await?;
    let updated = state
        .stores
        .routes
        .update(route.id, &RouteUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Assign or clear the carrier, driver and vehicle of a route
#[utoipa::path(
    post,
    path = "/routes/{id}/assignment",
    tag = "routes",
    summary = "Assign route resources",
    request_body = RouteAssignment,
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route updated", body = RouteResponse),
        (status = 404, description = "Route not found"),
        (status = 409, description = "Route cancelled, or driver/vehicle not assignable"),
        (status = 422, description = "Unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn assign_route_resources(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::UpdateOwn>,
    Json(assignment): Json<RouteAssignment>,
) -> Result<Json<RouteResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let route = state
        .commands
        .dispatch(&ctx, AssignRouteResources { route_id: id, assignment })
        .await?;
    Ok(Json(route.into()))
}

/// Move a route through its lifecycle
///
/// `planned → active ⇄ suspended`, and any non-cancelled route may be cancelled.
#[utoipa::path(
    post,
    path = "/routes/{id}/status",
    tag = "routes",
    summary = "Change route status",
    request_body = RouteStatusChange,
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 200, description = "Route updated", body = RouteResponse),
        (status = 404, description = "Route not found"),
        (status = 409, description = "Transition not allowed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn change_route_status(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::UpdateOwn>,
    Json(change): Json<RouteStatusChange>,
) -> Result<Json<RouteResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let route = state
        .commands
        .dispatch(
            &ctx,
            ChangeRouteStatus {
                route_id: id,
                status: change.status,
            },
        )
        .await?;
    Ok(Json(route.into()))
}

/// Delete a route
///
/// Fails with 409 while trips, alerts or costs still reference it; cancel it instead.
#[utoipa::path(
    delete,
    path = "/routes/{id}",
    tag = "routes",
    summary = "Delete route",
    params(("id" = uuid::Uuid, Path, description = "Route ID")),
    responses(
        (status = 204, description = "Route deleted"),
        (status = 404, description = "Route not found"),
        (status = 409, description = "Route still has dependent records"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(route_id = %id))]
pub async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<RouteId>,
    current_user: RequiresPermission<resource::Routes, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let route = load_route(&state.stores, &scope, id).await?;

    let dependents = route_dependents(&state.stores, route.id).await?;
    if !dependents.is_empty() {
        return Err(Error::Conflict {
            message: format!("Route {} still has {}", route.code, dependents.join(", ")),
        });
    }

    if !state.stores.routes.delete(route.id).await? {
        return Err(not_found("Route", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::routes::RouteStatus;
    use crate::api::models::users::Role;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_route_lifecycle_over_http() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let driver = create_test_driver(&state.stores, company.id, None).await;
        let vehicle = create_test_vehicle(&state.stores, company.id, None).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());
        let auth = bearer(&state, &operator);

        let response = server
            .post("/admin/api/v1/routes")
            .add_header("authorization", auth.clone())
            .json(&json!({
                "code": "lin-101",
                "name": "Centro - Fábrica",
                "origin": "Terminal Central",
                "destination": "Fábrica Norte",
                "distance_km": 18.5,
                "departure_time": "05:40:00",
                "shift": "morning",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let route: RouteResponse = response.json();
        assert_eq!(route.status, RouteStatus::Planned);
        assert_eq!(route.code, "LIN-101");

        let assigned: RouteResponse = server
            .post(&format!("/admin/api/v1/routes/{}/assignment", route.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"driver_id": driver.id, "vehicle_id": vehicle.id}))
            .await
            .json();
        assert_eq!(assigned.driver_id, Some(driver.id));
        assert_eq!(assigned.vehicle_id, Some(vehicle.id));

        let active: RouteResponse = server
            .post(&format!("/admin/api/v1/routes/{}/status", route.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"status": "active"}))
            .await
            .json();
        assert_eq!(active.status, RouteStatus::Active);

        // Cannot go back to planned
        server
            .post(&format!("/admin/api/v1/routes/{}/status", route.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"status": "planned"}))
            .await
            .assert_status(StatusCode::CONFLICT);

        let details: RouteDetailsResponse = server
            .get(&format!("/admin/api/v1/routes/{}/details", route.id))
            .add_header("authorization", auth)
            .await
            .json();
        assert_eq!(details.driver.map(|d| d.id), Some(driver.id));
        assert_eq!(details.vehicle.map(|v| v.id), Some(vehicle.id));
        assert!(details.recent_trips.is_empty());
    }

    #[tokio::test]
    async fn test_manager_cannot_touch_other_company_routes() {
        let state = create_test_state().await;
        let own = create_test_company(&state.stores, "Own").await;
        let other = create_test_company(&state.stores, "Other").await;
        let foreign = create_test_route(&state.stores, other.id, None).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(own.id)).await;
        let server = test_server(state.clone());
        let auth = bearer(&state, &manager);

        server
            .get(&format!("/admin/api/v1/routes/{}", foreign.id))
            .add_header("authorization", auth.clone())
            .await
            .assert_status_not_found();
        server
            .patch(&format!("/admin/api/v1/routes/{}", foreign.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"name": "Hijacked"}))
            .await
            .assert_status_not_found();
        server
            .post(&format!("/admin/api/v1/routes/{}/status", foreign.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"status": "cancelled"}))
            .await
            .assert_status_not_found();
        server
            .delete(&format!("/admin/api/v1/routes/{}", foreign.id))
            .add_header("authorization", auth)
            .await
            .assert_status_not_found();

        let untouched = state.stores.routes.get_by_id(foreign.id).await.unwrap().unwrap();
        assert_eq!(untouched.name, foreign.name);
        assert_eq!(untouched.status, RouteStatus::Planned);
    }

    #[tokio::test]
    async fn test_route_with_trips_cannot_be_deleted() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let route = create_test_route(&state.stores, company.id, None).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());
        let auth = bearer(&state, &manager);

        server
            .post(&format!("/admin/api/v1/routes/{}/status", route.id))
            .add_header("authorization", auth.clone())
            .json(&json!({"status": "active"}))
            .await
            .assert_status_ok();
        server
            .post("/admin/api/v1/trips")
            .add_header("authorization", auth.clone())
            .json(&json!({"route_id": route.id, "scheduled_for": "2030-01-01T06:00:00Z"}))
            .await
            .assert_status(StatusCode::CREATED);

        server
            .delete(&format!("/admin/api/v1/routes/{}", route.id))
            .add_header("authorization", auth)
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
