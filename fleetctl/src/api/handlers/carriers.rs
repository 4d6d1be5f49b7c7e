use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        carriers::{CarrierCreate, CarrierResponse, CarrierUpdate, ListCarriersQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    db::{
        Stores,
        handlers::{
            Repository as _, carriers::CarrierFilter, costs::CostFilter, drivers::DriverFilter, repository::UNBOUNDED,
            routes::RouteFilter, trips::TripFilter, users::UserFilter, vehicles::VehicleFilter,
        },
        models::{
            carriers::{CarrierCreateDBRequest, CarrierDBResponse, CarrierUpdateDBRequest},
            costs::CostUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    types::CarrierId,
    validation::Validate,
};

async fn load_carrier(stores: &Stores, scope: &TenantScope, id: CarrierId) -> Result<CarrierDBResponse> {
    scope.ensure(stores.carriers.get_by_id(id).await?, "Carrier", id, |c| (c.company_id, Some(c.id)))
}

async fn carrier_dependents(stores: &Stores, carrier: &CarrierDBResponse) -> Result<Vec<&'static str>> {
    let mut dependents = Vec::new();
    if stores.drivers.count(&DriverFilter::new(0, 1).with_carrier(carrier.id)).await? > 0 {
        dependents.push("drivers");
    }
    if stores.vehicles.count(&VehicleFilter::new(0, 1).with_carrier(carrier.id)).await? > 0 {
        dependents.push("vehicles");
    }
    if stores.routes.count(&RouteFilter::new(0, 1).with_carrier(carrier.id)).await? > 0 {
        dependents.push("routes");
    }
    if stores.trips.count(&TripFilter::new(0, 1).with_carrier(carrier.id)).await? > 0 {
        dependents.push("trips");
    }
    if stores.users.count(&UserFilter::new(0, 1).with_carrier(carrier.id)).await? > 0 {
        dependents.push("users");
    }
    Ok(dependents)
}

/// Costs outlive the carrier they were charged to.
async fn detach_carrier(stores: &Stores, id: CarrierId) -> Result<()> {
    let costs = stores.costs.list(&CostFilter::new(0, UNBOUNDED).with_carrier(id)).await?;
    let clear_cost = CostUpdateDBRequest {
        carrier_id: Some(None),
        ..Default::default()
    };
    for cost in costs {
        stores.costs.update(cost.id, &clear_cost).await?;
    }
    Ok(())
}

/// List carriers
///
/// Carrier users only see their own carrier.
#[utoipa::path(
    get,
    path = "/carriers",
    tag = "carriers",
    summary = "List carriers",
    params(ListCarriersQuery),
    responses(
        (status = 200, description = "Page of carriers", body = PaginatedResponse<CarrierResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_carriers(
    State(state): State<AppState>,
    Query(query): Query<ListCarriersQuery>,
    current_user: RequiresPermission<resource::Carriers, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<CarrierResponse>>> {
    let scope = current_user.scope()?;
    let (skip, limit) = query.pagination.params();

    let mut filter = CarrierFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.id = scope.carrier_id();
    filter.search = query.search;
    filter.active = query.active;

    let carriers = state.stores.carriers.list(&filter).await?;
    let total_count = state.stores.carriers.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(carriers, total_count, &query.pagination)))
}

/// Get a carrier
#[utoipa::path(
    get,
    path = "/carriers/{id}",
    tag = "carriers",
    summary = "Get carrier",
    params(("id" = uuid::Uuid, Path, description = "Carrier ID")),
    responses(
        (status = 200, description = "Carrier", body = CarrierResponse),
        (status = 404, description = "Carrier not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(carrier_id = %id))]
pub async fn get_carrier(
    State(state): State<AppState>,
    Path(id): Path<CarrierId>,
    current_user: RequiresPermission<resource::Carriers, operation::ReadOwn>,
) -> Result<Json<CarrierResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_carrier(&state.stores, &scope, id).await?.into()))
}

/// Create a carrier
#[utoipa::path(
    post,
    path = "/carriers",
    tag = "carriers",
    summary = "Create carrier",
    request_body = CarrierCreate,
    responses(
        (status = 201, description = "Carrier created", body = CarrierResponse),
        (status = 400, description = "company_id missing (admins)"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_carrier(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Carriers, operation::CreateOwn>,
    Json(create): Json<CarrierCreate>,
) -> Result<(StatusCode, Json<CarrierResponse>)> {
    create.validate()?;
    let scope = current_user.scope()?;
    let company_id = scope.owning_company(create.company_id)?;
    if state.stores.companies.get_by_id(company_id).await?.is_none() {
        return Err(crate::references::unknown_reference("company_id"));
    }

    let carrier = state
        .stores
        .carriers
        .create(&CarrierCreateDBRequest::new(company_id, create))
        .await?;
    tracing::info!(carrier_id = %carrier.id, %company_id, "Carrier created");
    Ok((StatusCode::CREATED, Json(carrier.into())))
}

/// Update a carrier
#[utoipa::path(
    patch,
    path = "/carriers/{id}",
    tag = "carriers",
    summary = "Update carrier",
    request_body = CarrierUpdate,
    params(("id" = uuid::Uuid, Path, description = "Carrier ID")),
    responses(
        (status = 200, description = "Carrier updated", body = CarrierResponse),
        (status = 404, description = "Carrier not found"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(carrier_id = %id))]
pub async fn update_carrier(
    State(state): State<AppState>,
    Path(id): Path<CarrierId>,
    current_user: RequiresPermission<resource::Carriers, operation::UpdateOwn>,
    Json(update): Json<CarrierUpdate>,
) -> Result<Json<CarrierResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let carrier = load_carrier(&state.stores, &scope, id).await?;
    let updated = state
        .stores
        .carriers
        .update(carrier.id, &CarrierUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Delete a carrier
///
/// Fails with 409 while drivers, vehicles, routes, trips or users still reference it.
#[utoipa::path(
    delete,
    path = "/carriers/{id}",
    tag = "carriers",
    summary = "Delete carrier",
    params(("id" = uuid::Uuid, Path, description = "Carrier ID")),
    responses(
        (status = 204, description = "Carrier deleted"),
        (status = 404, description = "Carrier not found"),
        (status = 409, description = "Carrier still has dependent records"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(carrier_id = %id))]
pub async fn delete_carrier(
    State(state): State<AppState>,
    Path(id): Path<CarrierId>,
    current_user: RequiresPermission<resource::Carriers, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let carrier = load_carrier(&state.stores, &scope, id).await?;

    let dependents = carrier_dependents(&state.stores, &carrier).await?;
    if !dependents.is_empty() {
        return Err(Error::Conflict {
            message: format!("Carrier still has {}", dependents.join(", ")),
        });
    }

    detach_carrier(&state.stores, carrier.id).await?;
    if !state.stores.carriers.delete(carrier.id).await? {
        return Err(not_found("Carrier", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::users::Role;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_manager_creates_carrier_in_own_company() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/carriers")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"name": "Rápido Sul", "contact_name": "Marta"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let carrier: CarrierResponse = response.json();
        assert_eq!(carrier.company_id, company.id);

        server
            .post("/admin/api/v1/carriers")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"name": "Elsewhere", "company_id": other.id}))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_carrier_user_sees_only_itself() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let mine = create_test_carrier(&state.stores, company.id).await;
        let theirs = create_test_carrier(&state.stores, company.id).await;
        let user = create_test_carrier_user(&state, company.id, mine.id).await;
        let server = test_server(state.clone());

        let page: PaginatedResponse<CarrierResponse> = server
            .get("/admin/api/v1/carriers")
            .add_header("authorization", bearer(&state, &user))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, mine.id);

        server
            .get(&format!("/admin/api/v1/carriers/{}", theirs.id))
            .add_header("authorization", bearer(&state, &user))
            .await
            .assert_status_not_found();

        // Read-only role
        server
            .patch(&format!("/admin/api/v1/carriers/{}", mine.id))
            .add_header("authorization", bearer(&state, &user))
            .json(&json!({"phone": "123"}))
            .await
            .assert_status_forbidden();
    }

    #[tokio::test]
    async fn test_carrier_with_drivers_cannot_be_deleted() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let busy = create_test_carrier(&state.stores, company.id).await;
        create_test_driver(&state.stores, company.id, Some(busy.id)).await;
        let idle = create_test_carrier(&state.stores, company.id).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/carriers/{}", busy.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .delete(&format!("/admin/api/v1/carriers/{}", idle.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_delete_carrier_keeps_its_costs() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let cost = create_test_cost(&state.stores, company.id, None, Some(carrier.id)).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/carriers/{}", carrier.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let cost = state.stores.costs.get_by_id(cost.id).await.unwrap().unwrap();
        assert_eq!(cost.carrier_id, None);
    }
}
