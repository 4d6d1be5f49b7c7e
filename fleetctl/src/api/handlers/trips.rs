use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        trips::{ListTripsQuery, TripCancel, TripComplete, TripResponse, TripSchedule, TripStart},
    },
    auth::permissions::{RequiresPermission, TenantScope, operation, resource},
    cqrs::{
        ExecutionContext,
        commands::{CancelTrip, CompleteTrip, ScheduleTrip, StartTrip},
    },
    db::handlers::{Repository as _, trips::TripFilter},
    errors::Result,
    types::TripId,
};

pub(crate) fn trip_filter(scope: &TenantScope, query: ListTripsQuery, skip: i64, limit: i64) -> TripFilter {
    let mut filter = TripFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.carrier_id = scope.carrier_id().or(query.carrier_id);
    filter.route_id = query.route_id;
    filter.driver_id = query.driver_id;
    filter.vehicle_id = query.vehicle_id;
    filter.status = query.status;
    filter.from = query.from;
    filter.to = query.to;
    filter
}

/// List trips, most recently scheduled first
#[utoipa::path(
    get,
    path = "/trips",
    tag = "trips",
    summary = "List trips",
    params(ListTripsQuery),
    responses(
        (status = 200, description = "Page of trips", body = PaginatedResponse<TripResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_trips(
    State(state): State<AppState>,
    Query(mut query): Query<ListTripsQuery>,
    current_user: RequiresPermission<resource::Trips, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<TripResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = trip_filter(&scope, query, skip, limit);

    let trips = state.stores.trips.list(&filter).await?;
    let total_count = state.stores.trips.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(trips, total_count, &pagination)))
}

/// Get a trip
#[utoipa::path(
    get,
    path = "/trips/{id}",
    tag = "trips",
    summary = "Get trip",
    params(("id" = uuid::Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Trip", body = TripResponse),
        (status = 404, description = "Trip not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
    current_user: RequiresPermission<resource::Trips, operation::ReadOwn>,
) -> Result<Json<TripResponse>> {
    let scope = current_user.scope()?;
    let trip = scope.ensure(state.stores.trips.get_by_id(id).await?, "Trip", id, |t| (t.company_id, t.carrier_id))?;
    Ok(Json(trip.into()))
}

/// Schedule a trip on a planned or active route
///
/// Driver and vehicle default to the route's assignment; the carrier is always the route's.
#[utoipa::path(
    post,
    path = "/trips",
    tag = "trips",
    summary = "Schedule trip",
    request_body = TripSchedule,
    responses(
        (status = 201, description = "Trip scheduled", body = TripResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Route not schedulable"),
        (status = 422, description = "Invalid fields or unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn schedule_trip(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Trips, operation::CreateOwn>,
    Json(schedule): Json<TripSchedule>,
) -> Result<(StatusCode, Json<TripResponse>)> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let trip = state.commands.dispatch(&ctx, ScheduleTrip { input: schedule }).await?;
    Ok((StatusCode::CREATED, Json(trip.into())))
}

/// Start a scheduled trip
///
/// Puts the trip's vehicle in service. The start odometer defaults to the vehicle's reading.
#[utoipa::path(
    post,
    path = "/trips/{id}/start",
    tag = "trips",
    summary = "Start trip",
    request_body = TripStart,
    params(("id" = uuid::Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Trip started", body = TripResponse),
        (status = 404, description = "Trip not found"),
        (status = 409, description = "Trip not scheduled, or vehicle/driver unavailable"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
pub async fn start_trip(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
    current_user: RequiresPermission<resource::Trips, operation::UpdateOwn>,
    Json(start): Json<TripStart>,
) -> Result<Json<TripResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let trip = state.commands.dispatch(&ctx, StartTrip { trip_id: id, input: start }).await?;
    Ok(Json(trip.into()))
}

/// Complete a trip in progress
///
/// Releases the vehicle and advances its odometer to the end reading.
#[utoipa::path(
    post,
    path = "/trips/{id}/complete",
    tag = "trips",
    summary = "Complete trip",
    request_body = TripComplete,
    params(("id" = uuid::Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Trip completed", body = TripResponse),
        (status = 404, description = "Trip not found"),
        (status = 409, description = "Trip not in progress"),
        (status = 422, description = "End odometer below start"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
pub async fn complete_trip(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
    current_user: RequiresPermission<resource::Trips, operation::UpdateOwn>,
    Json(complete): Json<TripComplete>,
) -> Result<Json<TripResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let trip = state
        .commands
        .dispatch(&ctx, CompleteTrip { trip_id: id, input: complete })
        .await?;
    Ok(Json(trip.into()))
}

/// Cancel a scheduled or running trip
#[utoipa::path(
    post,
    path = "/trips/{id}/cancel",
    tag = "trips",
    summary = "Cancel trip",
    request_body = TripCancel,
    params(("id" = uuid::Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Trip cancelled", body = TripResponse),
        (status = 404, description = "Trip not found"),
        (status = 409, description = "Trip already finished"),
        (status = 422, description = "Missing reason"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(trip_id = %id))]
pub async fn cancel_trip(
    State(state): State<AppState>,
    Path(id): Path<TripId>,
    current_user: RequiresPermission<resource::Trips, operation::UpdateOwn>,
    Json(cancel): Json<TripCancel>,
) -> Result<Json<TripResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let trip = state.commands.dispatch(&ctx, CancelTrip { trip_id: id, input: cancel }).await?;
    Ok(Json(trip.into()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::routes::RouteStatus;
    use crate::api::models::trips::TripStatus;
    use crate::api::models::users::Role;
    use crate::api::models::vehicles::VehicleStatus;
    use crate::db::models::routes::RouteUpdateDBRequest;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_carrier_user_runs_own_trip() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let driver = create_test_driver(&state.stores, company.id, Some(carrier.id)).await;
        let vehicle = create_test_vehicle(&state.stores, company.id, Some(carrier.id)).await;
        let route = create_test_route(&state.stores, company.id, Some(carrier.id)).await;
        state
            .stores
            .routes
            .update(
                route.id,
                &RouteUpdateDBRequest {
                    driver_id: Some(Some(driver.id)),
                    vehicle_id: Some(Some(vehicle.id)),
                    status: Some(RouteStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let carrier_user = create_test_carrier_user(&state, company.id, carrier.id).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/trips")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"route_id": route.id, "scheduled_for": "2030-03-04T06:00:00Z"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let trip: TripResponse = response.json();
        assert_eq!(trip.carrier_id, Some(carrier.id));
        assert_eq!(trip.vehicle_id, Some(vehicle.id));

        // Carriers cannot schedule, but they drive
        server
            .post("/admin/api/v1/trips")
            .add_header("authorization", bearer(&state, &carrier_user))
            .json(&json!({"route_id": route.id, "scheduled_for": "2030-03-05T06:00:00Z"}))
            .await
            .assert_status_forbidden();

        let started: TripResponse = server
            .post(&format!("/admin/api/v1/trips/{}/start", trip.id))
            .add_header("authorization", bearer(&state, &carrier_user))
            .json(&json!({}))
            .await
            .json();
        assert_eq!(started.status, TripStatus::InProgress);
        assert_eq!(started.start_odometer_km, Some(1000.0));

        let completed: TripResponse = server
            .post(&format!("/admin/api/v1/trips/{}/complete", trip.id))
            .add_header("authorization", bearer(&state, &carrier_user))
            .json(&json!({"end_odometer_km": 1037.0, "passenger_count": 31}))
            .await
            .json();
        assert_eq!(completed.status, TripStatus::Completed);
        assert_eq!(completed.passenger_count, Some(31));

        let vehicle = state.stores.vehicles.get_by_id(vehicle.id).await.unwrap().unwrap();
        assert_eq!(vehicle.status, VehicleStatus::Available);
        assert_eq!(vehicle.odometer_km, 1037.0);

        // Completed trips stay completed
        server
            .post(&format!("/admin/api/v1/trips/{}/cancel", trip.id))
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"reason": "too late"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_trip_listing_is_scoped() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let other_admin = create_test_user(&state, Role::CompanyManager, Some(other.id)).await;
        let route = create_test_route(&state.stores, company.id, None).await;
        let server = test_server(state.clone());

        server
            .post(&format!("/admin/api/v1/routes/{}/status", route.id))
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"status": "active"}))
            .await
            .assert_status_ok();
        let trip: TripResponse = server
            .post("/admin/api/v1/trips")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"route_id": route.id, "scheduled_for": "2030-03-04T06:00:00Z"}))
            .await
            .json();

        let page: PaginatedResponse<TripResponse> = server
            .get(&format!("/admin/api/v1/trips?route_id={}", route.id))
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(page.total_count, 1);

        let page: PaginatedResponse<TripResponse> = server
            .get("/admin/api/v1/trips")
            .add_header("authorization", bearer(&state, &other_admin))
            .await
            .json();
        assert_eq!(page.total_count, 0);

        server
            .get(&format!("/admin/api/v1/trips/{}", trip.id))
            .add_header("authorization", bearer(&state, &other_admin))
            .await
            .assert_status_not_found();
        server
            .post(&format!("/admin/api/v1/trips/{}/cancel", trip.id))
            .add_header("authorization", bearer(&state, &other_admin))
            .json(&json!({"reason": "not mine"}))
            .await
            .assert_status_not_found();
    }
}
