use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        alerts::{AlertCreate, AlertResolve, AlertResponse, ListAlertsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, operation, resource},
    cqrs::{
        ExecutionContext,
        commands::{AcknowledgeAlert, RaiseAlert, ResolveAlert},
    },
    db::handlers::{Repository as _, alerts::AlertFilter},
    errors::Result,
    types::AlertId,
};

pub(crate) fn alert_filter(scope: &TenantScope, query: ListAlertsQuery, skip: i64, limit: i64) -> AlertFilter {
    let mut filter = AlertFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.statuses = query.status.map(|status| vec![status]);
    filter.severity = query.severity;
    filter.kind = query.kind;
    filter.route_id = query.route_id;
    filter.vehicle_id = query.vehicle_id;
    filter.driver_id = query.driver_id;
    filter.from = query.from;
    filter.to = query.to;
    filter.search = query.search;
    filter
}

/// List alerts, newest first
#[utoipa::path(
    get,
    path = "/alerts",
    tag = "alerts",
    summary = "List alerts",
    params(ListAlertsQuery),
    responses(
        (status = 200, description = "Page of alerts", body = PaginatedResponse<AlertResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(mut query): Query<ListAlertsQuery>,
    current_user: RequiresPermission<resource::Alerts, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<AlertResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = alert_filter(&scope, query, skip, limit);

    let alerts = state.stores.alerts.list(&filter).await?;
    let total_count = state.stores.alerts.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(alerts, total_count, &pagination)))
}

/// Get an alert
#[utoipa::path(
    get,
    path = "/alerts/{id}",
    tag = "alerts",
    summary = "Get alert",
    params(("id" = uuid::Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert", body = AlertResponse),
        (status = 404, description = "Alert not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(alert_id = %id))]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<AlertId>,
    current_user: RequiresPermission<resource::Alerts, operation::ReadOwn>,
) -> Result<Json<AlertResponse>> {
    let scope = current_user.scope()?;
    let alert = scope.ensure(state.stores.alerts.get_by_id(id).await?, "Alert", id, |a| (a.company_id, None))?;
    Ok(Json(alert.into()))
}

/// Raise an alert
///
/// Carrier users may raise alerts about the routes, trips, drivers and vehicles of their carrier.
#[utoipa::path(
    post,
    path = "/alerts",
    tag = "alerts",
    summary = "Raise alert",
    request_body = AlertCreate,
    responses(
        (status = 201, description = "Alert raised", body = AlertResponse),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid fields or unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn raise_alert(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Alerts, operation::CreateOwn>,
    Json(create): Json<AlertCreate>,
) -> Result<(StatusCode, Json<AlertResponse>)> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let alert = state.commands.dispatch(&ctx, RaiseAlert { input: create }).await?;
    Ok((StatusCode::CREATED, Json(alert.into())))
}

/// Acknowledge an open alert
#[utoipa::path(
    post,
    path = "/alerts/{id}/acknowledge",
    tag = "alerts",
    summary = "Acknowledge alert",
    params(("id" = uuid::Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert acknowledged", body = AlertResponse),
        (status = 404, description = "Alert not found"),
        (status = 409, description = "Alert not open"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(alert_id = %id))]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<AlertId>,
    current_user: RequiresPermission<resource::Alerts, operation::UpdateOwn>,
) -> Result<Json<AlertResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let alert = state.commands.dispatch(&ctx, AcknowledgeAlert { alert_id: id }).await?;
    Ok(Json(alert.into()))
}

/// Resolve an open or acknowledged alert
#[utoipa::path(
    post,
    path = "/alerts/{id}/resolve",
    tag = "alerts",
    summary = "Resolve alert",
    request_body = AlertResolve,
    params(("id" = uuid::Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert resolved", body = AlertResponse),
        (status = 404, description = "Alert not found"),
        (status = 409, description = "Alert already resolved"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(alert_id = %id))]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<AlertId>,
    current_user: RequiresPermission<resource::Alerts, operation::UpdateOwn>,
    Json(resolve): Json<AlertResolve>,
) -> Result<Json<AlertResponse>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let alert = state
        .commands
        .dispatch(&ctx, ResolveAlert { alert_id: id, input: resolve })
        .await?;
    Ok(Json(alert.into()))
}
