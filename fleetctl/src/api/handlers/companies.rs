use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        companies::{CompanyCreate, CompanyResponse, CompanyUpdate, ListCompaniesQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    db::{
        Stores,
        handlers::{
            Repository as _, alerts::AlertFilter, carriers::CarrierFilter, companies::CompanyFilter, costs::CostFilter,
            documents::DocumentFilter, drivers::DriverFilter, repository::UNBOUNDED, routes::RouteFilter, users::UserFilter,
            vehicles::VehicleFilter,
        },
        models::companies::{CompanyCreateDBRequest, CompanyDBResponse, CompanyUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{CompanyId, Operation, Permission, Resource},
    validation::Validate,
};

pub(crate) async fn load_company(stores: &Stores, scope: &TenantScope, id: CompanyId) -> Result<CompanyDBResponse> {
    match stores.companies.get_by_id(id).await? {
        Some(company) if scope.allows_company(company.id) => Ok(company),
        _ => Err(not_found("Company", id)),
    }
}

/// Names of the dependent record kinds that still reference the company.
async fn company_dependents(stores: &Stores, id: CompanyId) -> Result<Vec<&'static str>> {
    let mut dependents = Vec::new();
    if stores.carriers.count(&CarrierFilter::new(0, 1).with_company(id)).await? > 0 {
        dependents.push("carriers");
    }
    if stores.drivers.count(&DriverFilter::new(0, 1).with_company(id)).await? > 0 {
        dependents.push("drivers");
    }
    if stores.vehicles.count(&VehicleFilter::new(0, 1).with_company(id)).await? > 0 {
        dependents.push("vehicles");
    }
    if stores.routes.count(&RouteFilter::new(0, 1).with_company(id)).await? > 0 {
        dependents.push("routes");
    }
    if stores.users.count(&UserFilter::new(0, 1).with_company(id)).await? > 0 {
        dependents.push("users");
    }
    Ok(dependents)
}

/// Alerts, costs and documents go with their company.
async fn purge_company_records(stores: &Stores, id: CompanyId) -> Result<()> {
    for alert in stores.alerts.list(&AlertFilter::new(0, UNBOUNDED).with_company(id)).await? {
        stores.alerts.delete(alert.id).await?;
    }
    for cost in stores.costs.list(&CostFilter::new(0, UNBOUNDED).with_company(id)).await? {
        stores.costs.delete(cost.id).await?;
    }
    for document in stores.documents.list(&DocumentFilter::new(0, UNBOUNDED).with_company(id)).await? {
        stores.documents.delete(document.id).await?;
    }
    Ok(())
}

/// List companies
///
/// Admins see every company; everyone else only their own.
#[utoipa::path(
    get,
    path = "/companies",
    tag = "companies",
    summary = "List companies",
    params(ListCompaniesQuery),
    responses(
        (status = 200, description = "Page of companies", body = PaginatedResponse<CompanyResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_companies(
    State(state): State<AppState>,
    Query(query): Query<ListCompaniesQuery>,
    current_user: RequiresPermission<resource::Companies, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<CompanyResponse>>> {
    let scope = current_user.scope()?;
    let (skip, limit) = query.pagination.params();

    let mut filter = CompanyFilter::new(skip, limit);
    filter.id = scope.company_id();
    filter.search = query.search;
    filter.active = query.active;

    let companies = state.stores.companies.list(&filter).await?;
    let total_count = state.stores.companies.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(companies, total_count, &query.pagination)))
}

/// Get a company
#[utoipa::path(
    get,
    path = "/companies/{id}",
    tag = "companies",
    summary = "Get company",
    params(("id" = uuid::Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company", body = CompanyResponse),
        (status = 404, description = "Company not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(company_id = %id))]
pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
    current_user: RequiresPermission<resource::Companies, operation::ReadOwn>,
) -> Result<Json<CompanyResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_company(&state.stores, &scope, id).await?.into()))
}

/// Create a company (admin only)
#[utoipa::path(
    post,
    path = "/companies",
    tag = "companies",
    summary = "Create company",
    request_body = CompanyCreate,
    responses(
        (status = 201, description = "Company created", body = CompanyResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Name or tax id already in use"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_company(
    State(state): State<AppState>,
    _current_user: RequiresPermission<resource::Companies, operation::CreateAll>,
    Json(create): Json<CompanyCreate>,
) -> Result<(StatusCode, Json<CompanyResponse>)> {
    create.validate()?;
    let company = state.stores.companies.create(&CompanyCreateDBRequest::from(create)).await?;
    tracing::info!(company_id = %company.id, "Company created");
    Ok((StatusCode::CREATED, Json(company.into())))
}

/// Update a company
///
/// Company managers may edit their own company's details but not its `active` flag.
#[utoipa::path(
    patch,
    path = "/companies/{id}",
    tag = "companies",
    summary = "Update company",
    request_body = CompanyUpdate,
    params(("id" = uuid::Uuid, Path, description = "Company ID")),
    responses(
        (status = 200, description = "Company updated", body = CompanyResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Company not found"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(company_id = %id))]
pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
    current_user: RequiresPermission<resource::Companies, operation::UpdateOwn>,
    Json(update): Json<CompanyUpdate>,
) -> Result<Json<CompanyResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let company = load_company(&state.stores, &scope, id).await?;

    if update.active.is_some() && !scope.is_global() {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Companies, Operation::UpdateAll),
            action: Operation::UpdateAll,
            resource: "company activation".to_string(),
        });
    }

    let updated = state
        .stores
        .companies
        .update(company.id, &CompanyUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Delete a company (admin only)
///
/// Fails with 409 while carriers, drivers, vehicles, routes or users still belong to it.
#[utoipa::path(
    delete,
    path = "/companies/{id}",
    tag = "companies",
    summary = "Delete company",
    params(("id" = uuid::Uuid, Path, description = "Company ID")),
    responses(
        (status = 204, description = "Company deleted"),
        (status = 404, description = "Company not found"),
        (status = 409, description = "Company still has dependent records"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(company_id = %id))]
pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<CompanyId>,
    current_user: RequiresPermission<resource::Companies, operation::DeleteAll>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let company = load_company(&state.stores, &scope, id).await?;

    let dependents = company_dependents(&state.stores, company.id).await?;
    if !dependents.is_empty() {
        return Err(Error::Conflict {
            message: format!("Company still has {}", dependents.join(", ")),
        });
    }

    purge_company_records(&state.stores, company.id).await?;
    if !state.stores.companies.delete(company.id).await? {
        return Err(not_found("Company", id));
    }
    tracing::info!(company_id = %id, "Company deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::models::documents::{DocumentOwnerKind, DocumentType};
    use crate::api::models::users::Role;
    use crate::db::models::documents::DocumentCreateDBRequest;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_admin_creates_and_lists_companies() {
        let state = create_test_state().await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/companies")
            .add_header("authorization", bearer(&state, &admin))
            .json(&json!({"name": "Viação Aurora", "city": "Campinas", "state": "SP"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: CompanyResponse = response.json();
        assert!(created.active);

        let page: PaginatedResponse<CompanyResponse> = server
            .get("/admin/api/v1/companies?search=aurora")
            .add_header("authorization", bearer(&state, &admin))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, created.id);
    }

    #[tokio::test]
    async fn test_manager_only_sees_own_company() {
        let state = create_test_state().await;
        let own = create_test_company(&state.stores, "Own").await;
        let other = create_test_company(&state.stores, "Other").await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(own.id)).await;
        let server = test_server(state.clone());

        let page: PaginatedResponse<CompanyResponse> = server
            .get("/admin/api/v1/companies")
            .add_header("authorization", bearer(&state, &manager))
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, own.id);

        server
            .get(&format!("/admin/api/v1/companies/{}", other.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_not_found();

        server
            .patch(&format!("/admin/api/v1/companies/{}", other.id))
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"phone": "+55 11 0000-0000"}))
            .await
            .assert_status_not_found();

        // Managers may not create companies or toggle their own
        server
            .post("/admin/api/v1/companies")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"name": "Sneaky"}))
            .await
            .assert_status_forbidden();
        server
            .patch(&format!("/admin/api/v1/companies/{}", own.id))
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"active": false}))
            .await
            .assert_status_forbidden();

        let updated: CompanyResponse = server
            .patch(&format!("/admin/api/v1/companies/{}", own.id))
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"phone": "+55 11 0000-0000"}))
            .await
            .json();
        assert_eq!(updated.phone.as_deref(), Some("+55 11 0000-0000"));
    }

    #[tokio::test]
    async fn test_company_with_dependents_cannot_be_deleted() {
        let state = create_test_state().await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let company = create_test_company(&state.stores, "Busy").await;
        create_test_carrier(&state.stores, company.id).await;
        let empty = create_test_company(&state.stores, "Empty").await;
        let server = test_server(state.clone());

        let response = server
            .delete(&format!("/admin/api/v1/companies/{}", company.id))
            .add_header("authorization", bearer(&state, &admin))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        assert!(response.text().contains("carriers"));

        server
            .delete(&format!("/admin/api/v1/companies/{}", empty.id))
            .add_header("authorization", bearer(&state, &admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(state.stores.companies.get_by_id(empty.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_company_removes_alerts_costs_and_documents() {
        let state = create_test_state().await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let company = create_test_company(&state.stores, "Closing").await;
        let other = create_test_company(&state.stores, "Other").await;
        create_test_alert(&state.stores, company.id, None, None).await;
        create_test_cost(&state.stores, company.id, None, None).await;
        let kept = create_test_cost(&state.stores, other.id, None, None).await;
        state
            .stores
            .documents
            .create(&DocumentCreateDBRequest {
                company_id: company.id,
                owner_kind: DocumentOwnerKind::Company,
                owner_id: company.id,
                doc_type: DocumentType::Contract,
                number: "CT-001".to_string(),
                issued_on: None,
                expires_on: None,
                file_url: None,
                notes: None,
            })
            .await
            .unwrap();
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/companies/{}", company.id))
            .add_header("authorization", bearer(&state, &admin))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let alerts = AlertFilter::new(0, UNBOUNDED).with_company(company.id);
        assert_eq!(state.stores.alerts.count(&alerts).await.unwrap(), 0);
        assert_eq!(state.stores.costs.count(&CostFilter::new(0, UNBOUNDED)).await.unwrap(), 1);
        assert!(state.stores.costs.get_by_id(kept.id).await.unwrap().is_some());
        let documents = DocumentFilter::new(0, UNBOUNDED).with_company(company.id);
        assert_eq!(state.stores.documents.count(&documents).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let state = create_test_state().await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/companies")
            .add_header("authorization", bearer(&state, &admin))
            .json(&json!({"name": "   "}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert!(body["errors"]["name"].is_array());
    }
}
