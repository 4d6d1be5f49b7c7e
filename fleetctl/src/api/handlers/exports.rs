use axum::{
    extract::{Path, Query, State},
    http::{Uri, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::de::DeserializeOwned;

use crate::{
    AppState,
    api::handlers::{
        alerts::alert_filter, costs::cost_filter, documents::document_filter, drivers::driver_filter, routes::route_filter,
        trips::trip_filter, vehicles::vehicle_filter,
    },
    api::models::{
        alerts::ListAlertsQuery, costs::ListCostsQuery, documents::ListDocumentsQuery, drivers::ListDriversQuery,
        reports::ReportQuery, routes::ListRoutesQuery, trips::ListTripsQuery, users::CurrentUser, vehicles::ListVehiclesQuery,
    },
    auth::permissions::{RequiresPermission, TenantScope, operation, require, resource},
    cqrs::{ExecutionContext, queries::GetFleetReport},
    db::handlers::{
        Repository as _,
        repository::{SharedRepository, UNBOUNDED},
    },
    errors::{Error, Result},
    export::{self, ExportFile, ExportFormat, ExportParams, Tabular, tables},
    types::{Operation, Resource},
};

/// Entity filters come from the same query string as the format.
fn parse_query<T: DeserializeOwned>(uri: &Uri) -> Result<T> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(query)| query)
        .map_err(|rejection| Error::BadRequest {
            message: rejection.body_text(),
        })
}

fn attachment(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, file.content_disposition()),
        ],
        file.bytes,
    )
        .into_response()
}

async fn export_rows<C, U, R, F>(repo: &SharedRepository<C, U, R, F>, filter: F, format: ExportFormat, max_rows: usize) -> Result<ExportFile>
where
    C: Send + Sync,
    U: Send + Sync,
    R: Tabular + Send + Sync,
    F: Send + Sync,
{
    let total = repo.count(&filter).await?;
    if usize::try_from(total).unwrap_or(usize::MAX) > max_rows {
        return Err(Error::BadRequest {
            message: format!("Export matches {total} rows, more than the limit of {max_rows}; narrow the filters"),
        });
    }
    let rows = repo.list(&filter).await?;
    export::render(&rows, format, R::title(), Utc::now().date_naive())
}

/// Download a filtered list of records as CSV, XLSX or PDF
///
/// `entity` is one of `drivers`, `vehicles`, `routes`, `trips`, `alerts`, `costs` or `documents`.
/// Any filter accepted by the entity's list endpoint may be added to the query string.
#[utoipa::path(
    get,
    path = "/exports/{entity}",
    tag = "exports",
    summary = "Export records",
    params(
        ("entity" = String, Path, description = "Entity to export"),
        ExportParams,
    ),
    responses(
        (status = 200, description = "File attachment in the requested format"),
        (status = 400, description = "Unknown format, bad filters or too many rows"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Unknown entity"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(entity = %entity))]
pub async fn export_entity(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(params): Query<ExportParams>,
    uri: Uri,
    current_user: CurrentUser,
) -> Result<Response> {
    let format = params.format()?;
    let max_rows = state.config.exports.max_rows;
    let stores = &state.stores;

    let resource = match entity.as_str() {
        "drivers" => Resource::Drivers,
        "vehicles" => Resource::Vehicles,
        "routes" => Resource::Routes,
        "trips" => Resource::Trips,
        "alerts" => Resource::Alerts,
        "costs" => Resource::Costs,
        "documents" => Resource::Documents,
        _ => {
            return Err(Error::NotFound {
                resource: "Export".to_string(),
                id: entity,
            });
        }
    };
    require(&current_user, resource, Operation::ReadOwn)?;
    let scope = TenantScope::for_user(&current_user)?;

    let file = match resource {
        Resource::Drivers => {
            let filter = driver_filter(&scope, parse_query::<ListDriversQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.drivers, filter, format, max_rows).await?
        }
        Resource::Vehicles => {
            let filter = vehicle_filter(&scope, parse_query::<ListVehiclesQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.vehicles, filter, format, max_rows).await?
        }
        Resource::Routes => {
            let filter = route_filter(&scope, parse_query::<ListRoutesQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.routes, filter, format, max_rows).await?
        }
        Resource::Trips => {
            let filter = trip_filter(&scope, parse_query::<ListTripsQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.trips, filter, format, max_rows).await?
        }
        Resource::Alerts => {
            let filter = alert_filter(&scope, parse_query::<ListAlertsQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.alerts, filter, format, max_rows).await?
        }
        Resource::Costs => {
            let filter = cost_filter(&scope, parse_query::<ListCostsQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.costs, filter, format, max_rows).await?
        }
        _ => {
            let filter = document_filter(&scope, parse_query::<ListDocumentsQuery>(&uri)?, 0, UNBOUNDED);
            export_rows(&stores.documents, filter, format, max_rows).await?
        }
    };

    tracing::info!(user_id = %current_user.id, filename = %file.filename, bytes = file.bytes.len(), "Export generated");
    Ok(attachment(file))
}

/// Download the summary report as CSV, XLSX or PDF
#[utoipa::path(
    get,
    path = "/exports/report",
    tag = "exports",
    summary = "Export summary report",
    params(ReportQuery, ExportParams),
    responses(
        (status = 200, description = "File attachment in the requested format"),
        (status = 400, description = "Unknown format or invalid date range"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn export_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    Query(params): Query<ExportParams>,
    current_user: RequiresPermission<resource::Reports, operation::ReadOwn>,
) -> Result<Response> {
    let format = params.format()?;
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

    let lines = tables::report_lines(&report);
    let file = export::render(&lines, format, &state.config.exports.pdf_title, Utc::now().date_naive())?;
    Ok(attachment(file))
}
