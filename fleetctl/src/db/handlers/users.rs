//! Database repository for users.

use crate::types::{CarrierId, CompanyId, UserId, abbrev_uuid};
use crate::{
    api::models::users::Role,
    db::{
        errors::{DbError, Result},
        handlers::in_memory::{InMemoryRecord, InMemoryRepository, matches_opt, opt_contains_ci},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing users
#[derive(Debug, Clone)]
pub struct UserFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    /// Case-insensitive substring search on email and display name
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            carrier_id: None,
            role: None,
            active: None,
            search: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_carrier(mut self, carrier_id: CarrierId) -> Self {
        self.carrier_id = Some(carrier_id);
        self
    }
}

/// User lookups beyond plain CRUD, needed by authentication.
#[async_trait::async_trait]
pub trait UserStore:
    Repository<
        CreateRequest = UserCreateDBRequest,
        UpdateRequest = UserUpdateDBRequest,
        Response = UserDBResponse,
        Id = UserId,
        Filter = UserFilter,
    >
{
    /// Emails are stored lowercased; the lookup lowercases its argument.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()>;

    async fn touch_last_login(&self, id: UserId) -> Result<()>;
}

// Row of the users table, roles live in user_roles
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: Option<String>,
    pub company_id: Option<CompanyId>,
    pub carrier_id: Option<CarrierId>,
    pub active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<(Vec<Role>, User)> for UserDBResponse {
    fn from((roles, user): (Vec<Role>, User)) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            password_hash: user.password_hash,
            roles,
            company_id: user.company_id,
            carrier_id: user.carrier_id,
            active: user.active,
            last_login: user.last_login,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UserRole {
    user_id: UserId,
    role: Role,
}

/// Remove duplicate roles, keeping the first occurrence
fn dedup_roles(roles: &[Role]) -> Vec<Role> {
    let mut unique = Vec::with_capacity(roles.len());
    for role in roles {
        if !unique.contains(role) {
            unique.push(*role);
        }
    }
    unique
}

pub struct Users {
    db: PgPool,
}

impl Users {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(carrier_id) = filter.carrier_id {
            query.push(" AND carrier_id = ");
            query.push_bind(carrier_id);
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ");
            query.push_bind(active);
        }
        if let Some(role) = filter.role {
            query.push(" AND id IN (SELECT user_id FROM user_roles WHERE role = ");
            query.push_bind(role);
            query.push(")");
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (email ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(display_name, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }

    /// Attach roles to user rows with a single query
    async fn with_roles(&self, users: Vec<User>) -> Result<Vec<UserDBResponse>> {
        if users.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
        let rows = sqlx::query_as::<_, UserRole>("SELECT user_id, role FROM user_roles WHERE user_id = ANY($1) ORDER BY role")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;

        let mut roles: HashMap<UserId, Vec<Role>> = HashMap::new();
        for row in rows {
            roles.entry(row.user_id).or_default().push(row.role);
        }

        Ok(users
            .into_iter()
            .map(|user| UserDBResponse::from((roles.remove(&user.id).unwrap_or_default(), user)))
            .collect())
    }

    async fn with_roles_one(&self, user: Option<User>) -> Result<Option<UserDBResponse>> {
        match user {
            Some(user) => Ok(self.with_roles(vec![user]).await?.pop()),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl Repository for Users {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user_id = Uuid::new_v4();
        let roles = dedup_roles(&request.roles);

        let mut tx = self.db.begin().await?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, display_name, password_hash, company_id, carrier_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(request.email.to_lowercase())
        .bind(&request.display_name)
        .bind(&request.password_hash)
        .bind(request.company_id)
        .bind(request.carrier_id)
        .bind(request.active)
        .fetch_one(&mut *tx)
        .await?;

        for role in &roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user_id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(UserDBResponse::from((roles, user)))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        self.with_roles_one(user).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(self.with_roles(users).await?.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM users WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY email ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let users = query.build_query_as::<User>().fetch_all(&self.db).await?;
        self.with_roles(users).await
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Touches users and user_roles, so always run in a transaction
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                active = COALESCE($3, active),
                carrier_id = CASE WHEN $4 THEN $5 ELSE carrier_id END,
                password_hash = COALESCE($6, password_hash),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&request.display_name)
        .bind(request.active)
        .bind(request.carrier_id.is_some())
        .bind(request.carrier_id.flatten())
        .bind(&request.password_hash)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)
        .and_then(|result| if result.rows_affected() == 0 { Err(DbError::NotFound) } else { Ok(()) })?;

        if let Some(roles) = &request.roles {
            sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for role in dedup_roles(roles) {
                sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                    .bind(id)
                    .bind(role)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl UserStore for Users {
    #[instrument(skip(self, email), err)]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.db)
            .await?;
        self.with_roles_one(user).await
    }

    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn touch_last_login(&self, id: UserId) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

impl InMemoryRecord for UserDBResponse {
    type Create = UserCreateDBRequest;
    type Update = UserUpdateDBRequest;
    type Filter = UserFilter;

    const TABLE: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            email: request.email.to_lowercase(),
            display_name: request.display_name.clone(),
            password_hash: request.password_hash.clone(),
            roles: dedup_roles(&request.roles),
            company_id: request.company_id,
            carrier_id: request.carrier_id,
            active: request.active,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(display_name) = &request.display_name {
            self.display_name = Some(display_name.clone());
        }
        if let Some(roles) = &request.roles {
            self.roles = dedup_roles(roles);
        }
        if let Some(active) = request.active {
            self.active = active;
        }
        if let Some(carrier_id) = request.carrier_id {
            self.carrier_id = carrier_id;
        }
        if let Some(hash) = &request.password_hash {
            self.password_hash = Some(hash.clone());
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        filter.company_id.is_none_or(|c| self.company_id == Some(c))
            && filter.carrier_id.is_none_or(|c| self.carrier_id == Some(c))
            && matches_opt(&filter.active, &self.active)
            && filter.role.is_none_or(|role| self.roles.contains(&role))
            && filter
                .search
                .as_deref()
                .is_none_or(|s| self.email.contains(&s.to_lowercase()) || opt_contains_ci(self.display_name.as_deref(), s))
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.email.cmp(&other.email)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("users_email_key", self.email.clone())]
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryRepository<UserDBResponse> {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let email = email.to_lowercase();
        Ok(self.find(|user| user.email == email))
    }

    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        self.modify(id, |user| {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
        })?;
        Ok(())
    }

    async fn touch_last_login(&self, id: UserId) -> Result<()> {
        self.modify(id, |user| user.last_login = Some(Utc::now()))?;
        Ok(())
    }
}
