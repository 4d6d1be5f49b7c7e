use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::{
    AppState,
    api::models::reports::{DashboardQuery, DashboardStats, FleetReport, ReportQuery},
    auth::permissions::{RequiresPermission, operation, resource},
    cqrs::{
        ExecutionContext,
        queries::{GetDashboardStats, GetFleetReport},
    },
    errors::Result,
};

/// Operational snapshot for today
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "reports",
    summary = "Dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard figures", body = DashboardStats),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadOwn>,
) -> Result<Json<DashboardStats>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let stats = state
        .queries
        .dispatch(&ctx, GetDashboardStats { company_id: query.company_id })
        .await?;
    Ok(Json(stats))
}

/// Summary of routes, trips, costs and alerts over a date range
///
/// The range defaults to the 30 days up to today.
#[utoipa::path(
    get,
    path = "/reports/summary",
    tag = "reports",
    summary = "Summary report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Fleet report", body = FleetReport),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_summary_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    current_user: RequiresPermission<resource::Reports, operation::ReadOwn>,
) -> Result<Json<FleetReport>> {
    let ctx = ExecutionContext::new(current_user.user)?;
    let report = state
        .queries
        .dispatch(
            &ctx,
            GetFleetReport {
                company_id: query.company_id,
                from: query.from,
                to: query.to,
            },
        )
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::api::models::users::Role;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_summary_report_is_scoped_to_company() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        create_test_route(&state.stores, company.id, None).await;
        create_test_route(&state.stores, other.id, None).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let server = test_server(state.clone());

        for (user, category, amount) in [(&manager, "fuel", "100.50"), (&admin, "toll", "20")] {
            server
                .post("/admin/api/v1/costs")
                .add_header("authorization", bearer(&state, user))
                .json(&json!({
                    "company_id": company.id,
                    "category": category,
                    "amount": amount,
                    "incurred_on": "2024-05-10",
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let report: FleetReport = server
            .get(&format!("/admin/api/v1/reports/summary?from=2024-05-01&to=2024-05-31&company_id={}", other.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .json();
        assert_eq!(report.company_id, Some(company.id));
        assert_eq!(report.routes_by_status.values().sum::<i64>(), 1);
        assert_eq!(report.total_cost, rust_decimal::Decimal::new(12050, 2));

        let report: FleetReport = server
            .get("/admin/api/v1/reports/summary?from=2024-05-01&to=2024-05-31")
            .add_header("authorization", bearer(&state, &admin))
            .await
            .json();
        assert_eq!(report.company_id, None);
        assert_eq!(report.routes_by_status.values().sum::<i64>(), 2);

        server
            .get("/admin/api/v1/reports/summary?from=2024-06-01&to=2024-05-01")
            .add_header("authorization", bearer(&state, &admin))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_dashboard_permissions() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let carrier_user = create_test_carrier_user(&state, company.id, carrier.id).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        let stats: DashboardStats = server
            .get("/admin/api/v1/dashboard")
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(stats.company_id, Some(company.id));
        assert_eq!(stats.active_routes, 0);

        server
            .get("/admin/api/v1/dashboard")
            .add_header("authorization", bearer(&state, &carrier_user))
            .await
            .assert_status_forbidden();
    }
}
