use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        documents::{
            DocumentCreate, DocumentResponse, DocumentUpdate, ExpiringDocumentResponse, ExpiringDocumentsQuery, ListDocumentsQuery,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, TenantScope, not_found, operation, resource},
    cqrs::{ExecutionContext, queries::ListExpiringDocuments},
    db::{
        Stores,
        handlers::{Repository as _, documents::DocumentFilter},
        models::documents::{DocumentCreateDBRequest, DocumentDBResponse, DocumentUpdateDBRequest},
    },
    errors::Result,
    references,
    types::DocumentId,
    validation::Validate,
};

async fn load_document(stores: &Stores, scope: &TenantScope, id: DocumentId) -> Result<DocumentDBResponse> {
    scope.ensure(stores.documents.get_by_id(id).await?, "Document", id, |d| (d.company_id, None))
}

pub(crate) fn document_filter(scope: &TenantScope, query: ListDocumentsQuery, skip: i64, limit: i64) -> DocumentFilter {
    let mut filter = DocumentFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.owner_kind = query.owner_kind;
    filter.owner_id = query.owner_id;
    filter.doc_type = query.doc_type;
    filter.search = query.search;
    filter
}

/// List documents
#[utoipa::path(
    get,
    path = "/documents",
    tag = "documents",
    summary = "List documents",
    params(ListDocumentsQuery),
    responses(
        (status = 200, description = "Page of documents", body = PaginatedResponse<DocumentResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_documents(
    State(state): State<AppState>,
    Query(mut query): Query<ListDocumentsQuery>,
    current_user: RequiresPermission<resource::Documents, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<DocumentResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let filter = document_filter(&scope, query, skip, limit);

    let documents = state.stores.documents.list(&filter).await?;
    let total_count = state.stores.documents.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(documents, total_count, &pagination)))
}

/// List expired and soon-to-expire documents
///
/// Ordered by expiry date. The window defaults to `documents.expiry_warning_days`.
#[utoipa::path(
    get,
    path = "/documents/expiring",
    tag = "documents",
    summary = "List expiring documents",
    params(ExpiringDocumentsQuery),
    responses(
        (status = 200, description = "Page of expiring documents", body = PaginatedResponse<ExpiringDocumentResponse>),
        (status = 400, description = "Negative window"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_expiring_documents(
    State(state): State<AppState>,
    Query(mut query): Query<ExpiringDocumentsQuery>,
    current_user: RequiresPermission<resource::Documents, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<ExpiringDocumentResponse>>> {
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();
    let ctx = ExecutionContext::new(current_user.user)?;

    let (documents, total_count) = state
        .queries
        .dispatch(
            &ctx,
            ListExpiringDocuments {
                company_id: query.company_id,
                within_days: query.within_days,
                skip,
                limit,
            },
        )
        .await?;
    Ok(Json(PaginatedResponse::new(documents, total_count, skip, limit)))
}

/// Get a document
#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "documents",
    summary = "Get document",
    params(("id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(document_id = %id))]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    current_user: RequiresPermission<resource::Documents, operation::ReadOwn>,
) -> Result<Json<DocumentResponse>> {
    let scope = current_user.scope()?;
    Ok(Json(load_document(&state.stores, &scope, id).await?.into()))
}

/// Register a document against a company, carrier, driver or vehicle
#[utoipa::path(
    post,
    path = "/documents",
    tag = "documents",
    summary = "Create document",
    request_body = DocumentCreate,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Invalid fields or unknown owner"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_document(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Documents, operation::CreateOwn>,
    Json(create): Json<DocumentCreate>,
) -> Result<(StatusCode, Json<DocumentResponse>)> {
    create.validate()?;
    let scope = current_user.scope()?;
    let company_id = scope.owning_company(create.company_id)?;
    references::document_owner(&state.stores, company_id, create.owner_kind, create.owner_id).await?;

    let document = state
        .stores
        .documents
        .create(&DocumentCreateDBRequest::new(company_id, create))
        .await?;
    tracing::info!(
        document_id = %document.id,
        owner_kind = document.owner_kind.as_str(),
        doc_type = document.doc_type.as_str(),
        "Document registered"
    );
    Ok((StatusCode::CREATED, Json(document.into())))
}

/// Update a document
///
/// The owner of a document cannot be changed.
#[utoipa::path(
    patch,
    path = "/documents/{id}",
    tag = "documents",
    summary = "Update document",
    request_body = DocumentUpdate,
    params(("id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document updated", body = DocumentResponse),
        (status = 404, description = "Document not found"),
        (status = 422, description = "Invalid fields"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(document_id = %id))]
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    current_user: RequiresPermission<resource::Documents, operation::UpdateOwn>,
    Json(update): Json<DocumentUpdate>,
) -> Result<Json<DocumentResponse>> {
    update.validate()?;
    let scope = current_user.scope()?;
    let document = load_document(&state.stores, &scope, id).await?;
    let updated = state
        .stores
        .documents
        .update(document.id, &DocumentUpdateDBRequest::from(update))
        .await?;
    Ok(Json(updated.into()))
}

/// Delete a document
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "documents",
    summary = "Delete document",
    params(("id" = uuid::Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(document_id = %id))]
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<DocumentId>,
    current_user: RequiresPermission<resource::Documents, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let scope = current_user.scope()?;
    let document = load_document(&state.stores, &scope, id).await?;
    if !state.stores.documents.delete(document.id).await? {
        return Err(not_found("Document", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::{Days, Utc};
    use serde_json::json;

    use crate::api::models::documents::ExpiryState;
    use crate::api::models::users::Role;
    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_document_owner_must_belong_to_company() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let driver = create_test_driver(&state.stores, company.id, None).await;
        let foreign_driver = create_test_driver(&state.stores, other.id, None).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/documents")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({
                "owner_kind": "driver",
                "owner_id": foreign_driver.id,
                "doc_type": "driver_license",
                "number": "CNH-1",
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = response.json();
        assert!(body["errors"]["owner_id"].is_array());

        let response = server
            .post("/admin/api/v1/documents")
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({
                "owner_kind": "driver",
                "owner_id": driver.id,
                "doc_type": "driver_license",
                "number": " CNH-2 ",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let document: DocumentResponse = response.json();
        assert_eq!(document.number, "CNH-2");
        assert_eq!(document.company_id, company.id);

        let page: PaginatedResponse<DocumentResponse> = server
            .get(&format!("/admin/api/v1/documents?owner_kind=driver&owner_id={}", driver.id))
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(page.total_count, 1);
    }

    #[tokio::test]
    async fn test_expiring_documents_are_ordered() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let vehicle = create_test_vehicle(&state.stores, company.id, None).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        let today = Utc::now().date_naive();
        for (number, expires_on) in [
            ("LATER", today.checked_add_days(Days::new(90)).unwrap()),
            ("SOON", today.checked_add_days(Days::new(5)).unwrap()),
            ("GONE", today.checked_sub_days(Days::new(3)).unwrap()),
        ] {
            server
                .post("/admin/api/v1/documents")
                .add_header("authorization", bearer(&state, &manager))
                .json(&json!({
                    "owner_kind": "vehicle",
                    "owner_id": vehicle.id,
                    "doc_type": "insurance",
                    "number": number,
                    "expires_on": expires_on,
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let page: PaginatedResponse<ExpiringDocumentResponse> = server
            .get("/admin/api/v1/documents/expiring")
            .add_header("authorization", bearer(&state, &manager))
            .await
            .json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data[0].document.number, "GONE");
        assert_eq!(page.data[0].expiry_state, ExpiryState::Expired);
        assert_eq!(page.data[0].days_until_expiry, -3);
        assert_eq!(page.data[1].document.number, "SOON");
        assert_eq!(page.data[1].expiry_state, ExpiryState::Expiring);

        let page: PaginatedResponse<ExpiringDocumentResponse> = server
            .get("/admin/api/v1/documents/expiring?within_days=120")
            .add_header("authorization", bearer(&state, &manager))
            .await
            .json();
        assert_eq!(page.total_count, 3);

        server
            .get("/admin/api/v1/documents/expiring?within_days=-1")
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_carrier_users_cannot_see_documents() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let carrier_user = create_test_carrier_user(&state, company.id, carrier.id).await;
        let server = test_server(state.clone());

        server
            .get("/admin/api/v1/documents")
            .add_header("authorization", bearer(&state, &carrier_user))
            .await
            .assert_status_forbidden();
    }
}
