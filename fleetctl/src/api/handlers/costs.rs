use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        costs::{CostCreate, CostResponse, CostUpdate, ListCostsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    cqrs::{ExecutionContext, commands::RecordCost},
    db::{
        Stores,
        handlers::{Repository as _, costs::CostFilter},
        models::costs::{CostDBResponse, CostUpdateDBRequest},
    },
    errors::Result,
    types::CostId,
    validation::Validate,
};

async fn load_cost(stores: &Stores, scope: &TenantScope, id: CostId) -> Result<CostDBResponse> {
    scope.ensure(stores.costs.get_by_id(id).await?, "Cost", id, |c| (c.company_id, None))
}

pub(crate) fn cost_filter(scope: &TenantScope, query: ListCostsQuery, skip: i64, limit: i64) -> CostFilter {
    let mut filter = CostFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.category = query.category;
    filter.route_id = query.route_id;
    filter.vehicle_id = query.vehicle_id;
    filter.carrier_id = query.carrier_id;
    filter.from = query.from;
    filter.to = query.to;
    filter
}

/// List costs, most recent first
#[utoipa::path(
    get,
    path = "/costs",
    tag = "costs",
    summary = "List costs",
    params(ListCostsQuery),
    responses(
        (status = 200, description = "Page of costs", body = PaginatedResponse<CostResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_costs(
    State(state): State<AppState>,
    Query(mut query): Query<ListCostsQuery>,
    current_user: RequiresPermission<resource::Costs, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<CostResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = cost_filter(&scope, query, skip, limit);

    let costs = state.stores.costs.list(&filter).await?;
    let total_count = state.stores.costs.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(costs, total_count, &pagination)))
}

/// Get a cost
#[utoipa::path(
    get,
    path = "/costs/{id}",
    tag = "costs",
    summary = "Get cost",
    params(("id" = uuid::Uuid, Path, description = "Cost ID")),
    responses(
        (status = 200, description = "Cost", body = CostResponse),
        (status = 404, description = "Cost not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(cost_id = %id))]
pub async fn get_cost(
    State(state): State<AppState>,
    Path(id): Path<CostId>,
    current_user: RequiresPermission<resource::Costs, operation::ReadOwn>,
) -> Result<Json<CostResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_cost(&state.stores, &scope, id).await?.into()))
}

/// Record a cost
///
/// Route, trip, vehicle and carrier references must belong to the same company.
#[utoipa::path(
    post,
    path = "/costs",
    tag = "costs",
    summary = "Record cost",
    request_body = CostCreate,
    responses(
        (status = 201, description = "Cost recorded", body = CostResponse),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid fields or unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn record_cost(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Costs, operation::CreateOwn>,
    Json(create): Json<CostCreate>,
) -> Result<(StatusCode, Json<CostResponse>)> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let cost = state.commands.dispatch(&ctx, RecordCost { input: create }).await?;
    Ok((StatusCode::CREATED, Json(cost.into())))
}

/// Update a cost
#[utoipa::path(
    patch,
    path = "/costs/{id}",
    tag = "costs",
    summary = "Update cost",
    request_body = CostUpdate,
    params(("id" = uuid::Uuid, Path, description = "Cost ID")),
    responses(
        (status = 200, description = "Cost updated", body = CostResponse),
        (status = 404, description = "Cost not found"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(cost_id = %id))]
pub async fn update_cost(
    State(state): State<AppState>,
    Path(id): Path<CostId>,
    current_user: RequiresPermission<resource::Costs, operation::UpdateOwn>,
    Json(update): Json<CostUpdate>,
) -> Result<Json<CostResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let cost = load_cost(&state.stores, &scope, id).await?;
    let updated = state.stores.costs.update(cost.id, &CostUpdateDBRequest::from(update)).await?;
    Ok(Json(updated.into()))
}

/// Delete a cost
#[utoipa::path(
    delete,
    path = "/costs/{id}",
    tag = "costs",
    summary = "Delete cost",
    params(("id" = uuid::Uuid, Path, description = "Cost ID")),
    responses(
        (status = 204, description = "Cost deleted"),
        (status = 404, description = "Cost not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(cost_id = %id))]
pub async fn delete_cost(
    State(state): State<AppState>,
    Path(id): Path<CostId>,
    current_user: RequiresPermission<resource::Costs, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let cost = load_cost(&state.stores, &scope, id).await?;
    if !state.stores.costs.delete(cost.id).await? {
        return Err(not_found("Cost", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::api::models::users::Role;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_record_and_filter_costs() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let route = create_test_route(&state.stores, company.id, None).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/costs")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({
                "category": "fuel",
                "amount": "350.00",
                "incurred_on": "2024-05-10",
                "route_id": route.id,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cost: CostResponse = response.json();
        assert_eq!(cost.amount, Decimal::new(35000, 2));
        assert_eq!(cost.currency, "BRL");
        assert_eq!(cost.recorded_by, Some(operator.id));

        server
            .post("/admin/api/v1/costs")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"category": "toll", "amount": "12.40", "incurred_on": "2024-06-02"}))
            .await
            .assert_status(StatusCode::CREATED);

        let page: PaginatedResponse<CostResponse> = server
            .get("/admin/api/v1/costs?from=2024-05-01&to=2024-05-31")
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, cost.id);

        let response = server
            .post("/admin/api/v1/costs")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"category": "fuel", "amount": "0", "incurred_on": "2024-05-10"}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_only_managers_change_costs() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let carrier_user = create_test_carrier_user(&state, company.id, carrier.id).await;
        let server = test_server(state.clone());

        let cost: CostResponse = server
            .post("/admin/api/v1/costs")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"category": "parts", "amount": "80", "incurred_on": "2024-05-10"}))
            .await
            .json();

        server
            .patch(&format!("/admin/api/v1/costs/{}", cost.id))
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"amount": "90"}))
            .await
            .assert_status_forbidden();
        server
            .get("/admin/api/v1/costs")
            .add_header("authorization", bearer(&state, &carrier_user))
            .await
            .assert_status_forbidden();

        let updated: CostResponse = server
            .patch(&format!("/admin/api/v1/costs/{}", cost.id))
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"amount": "90", "description": "Brake pads"}))
            .await
            .json();
        assert_eq!(updated.amount, Decimal::new(90, 0));

        server
            .delete(&format!("/admin/api/v1/costs/{}", cost.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }
}
