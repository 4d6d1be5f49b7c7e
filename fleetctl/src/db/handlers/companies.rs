//! Database repository for companies.

use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, contains_ci, matches_opt, opt_contains_ci};
use crate::db::handlers::repository::Repository;
use crate::db::models::companies::{CompanyCreateDBRequest, CompanyDBResponse, CompanyUpdateDBRequest};
use crate::types::{CompanyId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing companies
#[derive(Debug, Clone)]
pub struct CompanyFilter {
    pub skip: i64,
    pub limit: i64,
    /// Restrict to a single company (tenant scope)
    pub id: Option<CompanyId>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl CompanyFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            id: None,
            search: None,
            active: None,
        }
    }

    pub fn with_id(mut self, id: CompanyId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_search(mut self, search: String) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

pub struct Companies {
    db: PgPool,
}

impl Companies {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &CompanyFilter) {
        if let Some(id) = filter.id {
            query.push(" AND id = ");
            query.push_bind(id);
        }
        if let Some(active) = filter.active {
            query.push(" AND active = ");
            query.push_bind(active);
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{search}%");
            query.push(" AND (name ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(tax_id, '') ILIKE ");
            query.push_bind(pattern.clone());
            query.push(" OR COALESCE(city, '') ILIKE ");
            query.push_bind(pattern);
            query.push(")");
        }
    }
}

#[async_trait::async_trait]
impl Repository for Companies {
    type CreateRequest = CompanyCreateDBRequest;
    type UpdateRequest = CompanyUpdateDBRequest;
    type Response = CompanyDBResponse;
    type Id = CompanyId;
    type Filter = CompanyFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let company = sqlx::query_as::<_, CompanyDBResponse>(
            r#"
            INSERT INTO companies (id, name, tax_id, email, phone, address, city, state, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.tax_id)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(&request.city)
        .bind(&request.state)
        .bind(request.active)
        .fetch_one(&self.db)
        .await?;

        Ok(company)
    }

    #[instrument(skip(self), fields(company_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let company = sqlx::query_as::<_, CompanyDBResponse>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(company)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let companies = sqlx::query_as::<_, CompanyDBResponse>("SELECT * FROM companies WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(companies.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM companies WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY name ASC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let companies = query.build_query_as::<CompanyDBResponse>().fetch_all(&self.db).await?;
        Ok(companies)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM companies WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(company_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let company = sqlx::query_as::<_, CompanyDBResponse>(
            r#"
            UPDATE companies SET
                name = COALESCE($2, name),
                tax_id = COALESCE($3, tax_id),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                city = COALESCE($7, city),
                state = COALESCE($8, state),
                active = COALESCE($9, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.tax_id)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.address)
        .bind(&request.city)
        .bind(&request.state)
        .bind(request.active)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(company)
    }

    #[instrument(skip(self), fields(company_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| DbError::from(e).protect_on_delete("company", id))?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for CompanyDBResponse {
    type Create = CompanyCreateDBRequest;
    type Update = CompanyUpdateDBRequest;
    type Filter = CompanyFilter;

    const TABLE: &'static str = "companies";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            name: request.name.clone(),
            tax_id: request.tax_id.clone(),
            email: request.email.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
            city: request.city.clone(),
            state: request.state.clone(),
            active: request.active,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(name) = &request.name {
            self.name = name.clone();
        }
        if let Some(tax_id) = &request.tax_id {
            self.tax_id = Some(tax_id.clone());
        }
        if let Some(email) = &request.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &request.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(address) = &request.address {
            self.address = Some(address.clone());
        }
        if let Some(city) = &request.city {
            self.city = Some(city.clone());
        }
        if let Some(state) = &request.state {
            self.state = Some(state.clone());
        }
        if let Some(active) = request.active {
            self.active = active;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.id, &self.id)
            && matches_opt(&filter.active, &self.active)
            && filter.search.as_deref().is_none_or(|s| {
                contains_ci(&self.name, s) || opt_contains_ci(self.tax_id.as_deref(), s) || opt_contains_ci(self.city.as_deref(), s)
            })
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        let mut keys = vec![("companies_name_key", self.name.clone())];
        if let Some(tax_id) = &self.tax_id {
            keys.push(("companies_tax_id_key", tax_id.clone()));
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::in_memory::InMemoryRepository;

    fn create_request(name: &str, tax_id: Option<&str>) -> CompanyCreateDBRequest {
        CompanyCreateDBRequest {
            name: name.to_string(),
            tax_id: tax_id.map(str::to_string),
            email: None,
            phone: None,
            address: None,
            city: Some("Curitiba".to_string()),
            state: Some("PR".to_string()),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_in_memory_company_crud() {
        let repo = InMemoryRepository::<CompanyDBResponse>::new();
        let created = repo.create(&create_request("Acme Transportes", Some("12.345.678/0001-90"))).await.unwrap();
        assert!(created.active);

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Acme Transportes");

        let updated = repo
            .update(
                created.id,
                &CompanyUpdateDBRequest {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.name, "Acme Transportes");
        assert!(updated.updated_at >= created.updated_at);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_unique_name_and_tax_id() {
        let repo = InMemoryRepository::<CompanyDBResponse>::new();
        repo.create(&create_request("Acme", Some("111"))).await.unwrap();

        match repo.create(&create_request("Acme", None)).await {
            Err(DbError::UniqueViolation { constraint, .. }) => assert_eq!(constraint.as_deref(), Some("companies_name_key")),
            other => panic!("expected unique violation, got {other:?}"),
        }
        match repo.create(&create_request("Other", Some("111"))).await {
            Err(DbError::UniqueViolation { constraint, conflicting_value, .. }) => {
                assert_eq!(constraint.as_deref(), Some("companies_tax_id_key"));
                assert_eq!(conflicting_value.as_deref(), Some("111"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
        // Companies without a tax id never collide on it
        repo.create(&create_request("Third", None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_list_filters_orders_and_pages() {
        let repo = InMemoryRepository::<CompanyDBResponse>::new();
        for name in ["Charlie", "alpha", "Bravo"] {
            repo.create(&create_request(name, None)).await.unwrap();
        }
        let all = repo.list(&CompanyFilter::new(0, 10)).await.unwrap();
        assert_eq!(all.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(), vec!["Bravo", "Charlie", "alpha"]);

        let page = repo.list(&CompanyFilter::new(1, 1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Charlie");

        let filter = CompanyFilter::new(0, 10).with_search("ALP".to_string());
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
        assert_eq!(repo.count(&CompanyFilter::new(0, 1)).await.unwrap(), 3);
    }
}
