use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, Role, UserCreate, UserResponse, UserUpdate},
    },
    auth::{
        password,
        permissions::{RequiresPermission, TenantScope, not_found, operation, require, resource},
    },
    db::{
        Stores,
        handlers::{Repository as _, users::UserFilter},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    references,
    types::{Operation, Permission, Resource, UserId},
    validation::{Validate, ValidationErrors},
};

fn forbidden(action: Operation, what: &str) -> Error {
    Error::InsufficientPermissions {
        required: Permission::Any(vec![]),
        action,
        resource: what.to_string(),
    }
}

/// Users without a company (platform admins) are only visible to global scopes.
async fn load_user(stores: &Stores, scope: &TenantScope, id: UserId) -> Result<UserDBResponse> {
    let user = stores.users.get_by_id(id).await?.ok_or_else(|| not_found("User", id))?;
    if scope.is_global() || (user.company_id.is_some() && user.company_id == scope.company_id()) {
        Ok(user)
    } else {
        Err(not_found("User", id))
    }
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(mut query): Query<ListUsersQuery>,
    current_user: RequiresPermission<resource::Users, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let scope = current_user.scope()?;
    let pagination = std::mem::take(&mut query.pagination);
    let (skip, limit) = pagination.params();

    let mut filter = UserFilter::new(skip, limit);
    filter.company_id = scope.filter_company(query.company_id);
    filter.role = query.role;
    filter.active = query.active;
    filter.search = query.search;

    let users = state.stores.users.list(&filter).await?;
    let total_count = state.stores.users.count(&filter).await?;
    Ok(Json(PaginatedResponse::from_rows(users, total_count, &pagination)))
}

/// Get a user
///
/// Every user may read their own record.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<UserId>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    if id == current_user.id {
        let user = state.stores.users.get_by_id(id).await?.ok_or_else(|| not_found("User", id))?;
        return Ok(Json(user.into()));
    }
    require(&current_user, Resource::Users, Operation::ReadOwn)?;
    let scope = TenantScope::for_user(&current_user)?;
    Ok(Json(load_user(&state.stores, &scope, id).await?.into()))
}

/// Create a user
///
/// Company managers create users in their own company and cannot grant the admin role.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create user",
    request_body = UserCreate,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid fields or unknown references"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::CreateOwn>,
    Json(create): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    create.validate()?;
    let scope = current_user.scope()?;
    let grants_admin = create.roles.contains(&Role::Admin);
    if grants_admin && !current_user.is_admin() {
        return Err(forbidden(Operation::CreateAll, "users with the admin role"));
    }

    let company_id = match (scope.is_global(), create.company_id) {
        (true, None) if grants_admin => None,
        (true, None) => {
            let mut errors = ValidationErrors::new();
            errors.add("company_id", "is required for non-admin users");
            return Err(Error::Validation { errors });
        }
        (_, requested) => Some(scope.owning_company(requested)?),
    };
    if let Some(company_id) = company_id {
        if state.stores.companies.get_by_id(company_id).await?.is_none() {
            return Err(references::unknown_reference("company_id"));
        }
        if let Some(carrier_id) = create.carrier_id {
            references::carrier(&state.stores, company_id, carrier_id).await?;
        }
    } else if create.carrier_id.is_some() {
        return Err(references::unknown_reference("carrier_id"));
    }

    let password_hash = match create.password.as_deref() {
        Some(password) => Some(password::hash_password(password, &state.config.auth.native.password).await?),
        None => None,
    };

    let user = state
        .stores
        .users
        .create(&UserCreateDBRequest {
            email: create.email.trim().to_string(),
            display_name: create.display_name.map(|n| n.trim().to_string()),
            password_hash,
            roles: create.roles,
            company_id,
            carrier_id: create.carrier_id,
            active: true,
        })
        .await?;
    tracing::info!(user_id = %user.id, created_by = %current_user.id, "User created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Update a user
///
/// Users may change their own display name. Roles, carrier and the active flag need the users
/// permission, and only admins can grant the admin role.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    summary = "Update user",
    request_body = UserUpdate,
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Invalid fields or unknown carrier"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: CurrentUser,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    update.validate()?;
    let profile_only = update.roles.is_none() && update.active.is_none() && update.carrier_id.is_none();

    let user = if id == current_user.id && profile_only {
        state.stores.users.get_by_id(id).await?.ok_or_else(|| not_found("User", id))?
    } else {
        require(&current_user, Resource::Users, Operation::UpdateOwn)?;
        let scope = TenantScope::for_user(&current_user)?;
        load_user(&state.stores, &scope, id).await?
    };

    if let Some(roles) = &update.roles
        && roles.contains(&Role::Admin)
        && !current_user.is_admin()
    {
        return Err(forbidden(Operation::UpdateAll, "users with the admin role"));
    }
    if let Some(Some(carrier_id)) = update.carrier_id {
        let company_id = user.company_id.ok_or_else(|| references::unknown_reference("carrier_id"))?;
        references::carrier(&state.stores, company_id, carrier_id).await?;
    }
    let roles = update.roles.as_ref().unwrap_or(&user.roles);
    let carrier_id = update.carrier_id.unwrap_or(user.carrier_id);
    if roles.contains(&Role::Carrier) && carrier_id.is_none() {
        let mut errors = ValidationErrors::new();
        errors.add("carrier_id", "is required for carrier users");
        return Err(Error::Validation { errors });
    }

    let updated = state.stores.users.update(user.id, &UserUpdateDBRequest::new(update)).await?;
    state.auth_cache.invalidate_user(updated.id).await;
    Ok(Json(updated.into()))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete yourself"),
        (status = 404, description = "User not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(user_id = %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::DeleteOwn>,
) -> Result<StatusCode> {
    if id == current_user.id {
        return Err(Error::BadRequest {
            message: "Cannot delete your own account".to_string(),
        });
    }
    let scope = current_user.scope()?;
    let user = load_user(&state.stores, &scope, id).await?;
    if !state.stores.users.delete(user.id).await? {
        return Err(not_found("User", id));
    }
    state.auth_cache.invalidate_user(user.id).await;
    tracing::info!(user_id = %user.id, deleted_by = %current_user.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::test_utils::*;

    use super::*;

    #[tokio::test]
    async fn test_manager_creates_users_in_own_company() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let carrier = create_test_carrier(&state.stores, company.id).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        let response = server
            .post("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({
                "email": "Dispatch@Aurora.test",
                "roles": ["carrier"],
                "carrier_id": carrier.id,
                "password": "correct horse battery",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let user: UserResponse = response.json();
        assert_eq!(user.email, "dispatch@aurora.test");
        assert_eq!(user.company_id, Some(company.id));
        let stored = state.stores.users.get_by_id(user.id).await.unwrap().unwrap();
        assert!(password::verify_string("correct horse battery", stored.password_hash.as_deref().unwrap()).unwrap());

        server
            .post("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"email": "boss@aurora.test", "roles": ["admin"]}))
            .await
            .assert_status_forbidden();
        server
            .post("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"email": "spy@other.test", "roles": ["operator"], "company_id": other.id}))
            .await
            .assert_status_forbidden();
        server
            .post("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"email": "dispatch@aurora.test", "roles": ["operator"]}))
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .post("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"email": "short@aurora.test", "roles": ["operator"], "password": "x"}))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_self_service_limited_to_profile() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let server = test_server(state.clone());

        let me: UserResponse = server
            .get(&format!("/admin/api/v1/users/{}", operator.id))
            .add_header("authorization", bearer(&state, &operator))
            .await
            .json();
        assert_eq!(me.id, operator.id);

        let renamed: UserResponse = server
            .patch(&format!("/admin/api/v1/users/{}", operator.id))
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"display_name": "Night Shift"}))
            .await
            .json();
        assert_eq!(renamed.display_name.as_deref(), Some("Night Shift"));

        server
            .patch(&format!("/admin/api/v1/users/{}", operator.id))
            .add_header("authorization", bearer(&state, &operator))
            .json(&json!({"roles": ["company_manager"]}))
            .await
            .assert_status_forbidden();
        server
            .get(&format!("/admin/api/v1/users/{}", manager.id))
            .add_header("authorization", bearer(&state, &operator))
            .await
            .assert_status_forbidden();

        server
            .patch(&format!("/admin/api/v1/users/{}", operator.id))
            .add_header("authorization", bearer(&state, &manager))
            .json(&json!({"active": false}))
            .await
            .assert_status_ok();
        // Deactivation drops cached sessions
        server
            .get("/authentication/me")
            .add_header("authorization", bearer(&state, &operator))
            .await
            .assert_status_unauthorized();
    }

    #[tokio::test]
    async fn test_delete_user_scoping() {
        let state = create_test_state().await;
        let company = create_test_company(&state.stores, "Aurora").await;
        let other = create_test_company(&state.stores, "Other").await;
        let manager = create_test_user(&state, Role::CompanyManager, Some(company.id)).await;
        let operator = create_test_user(&state, Role::Operator, Some(company.id)).await;
        let outsider = create_test_user(&state, Role::Operator, Some(other.id)).await;
        let admin = create_test_user(&state, Role::Admin, None).await;
        let server = test_server(state.clone());

        server
            .delete(&format!("/admin/api/v1/users/{}", manager.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_bad_request();
        server
            .delete(&format!("/admin/api/v1/users/{}", outsider.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_not_found();
        server
            .delete(&format!("/admin/api/v1/users/{}", admin.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status_not_found();
        server
            .delete(&format!("/admin/api/v1/users/{}", operator.id))
            .add_header("authorization", bearer(&state, &manager))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let page: PaginatedResponse<UserResponse> = server
            .get("/admin/api/v1/users")
            .add_header("authorization", bearer(&state, &admin))
            .await
            .json();
        assert_eq!(page.total_count, 3);
    }
}
