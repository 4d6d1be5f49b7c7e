//! Database repository for costs.

use crate::api::models::costs::CostCategory;
use crate::db::errors::{DbError, Result};
use crate::db::handlers::in_memory::{InMemoryRecord, matches_nullable, matches_opt};
use crate::db::handlers::repository::Repository;
use crate::db::models::costs::{CostCreateDBRequest, CostDBResponse, CostUpdateDBRequest};
use crate::types::{CarrierId, CompanyId, CostId, RouteId, TripId, VehicleId, abbrev_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing costs
#[derive(Debug, Clone)]
pub struct CostFilter {
    pub skip: i64,
    pub limit: i64,
    pub company_id: Option<CompanyId>,
    pub category: Option<CostCategory>,
    pub route_id: Option<RouteId>,
    pub vehicle_id: Option<VehicleId>,
    pub carrier_id: Option<CarrierId>,
    pub trip_id: Option<TripId>,
    /// Incurred on or after (inclusive)
    pub from: Option<NaiveDate>,
    /// Incurred on or before (inclusive)
    pub to: Option<NaiveDate>,
}

impl CostFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            company_id: None,
            category: None,
            route_id: None,
            vehicle_id: None,
            carrier_id: None,
            trip_id: None,
            from: None,
            to: None,
        }
    }

    pub fn with_company(mut self, company_id: CompanyId) -> Self {
        self.company_id = Some(company_id);
        self
    }

    pub fn with_route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    pub fn with_carrier(mut self, carrier_id: CarrierId) -> Self {
        self.carrier_id = Some(carrier_id);
        self
    }

    pub fn incurred_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

pub struct Costs {
    db: PgPool,
}

impl Costs {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &CostFilter) {
        if let Some(company_id) = filter.company_id {
            query.push(" AND company_id = ");
            query.push_bind(company_id);
        }
        if let Some(category) = filter.category {
            query.push(" AND category = ");
            query.push_bind(category);
        }
        if let Some(route_id) = filter.route_id {
            query.push(" AND route_id = ");
            query.push_bind(route_id);
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            query.push(" AND vehicle_id = ");
            query.push_bind(vehicle_id);
        }
        if let Some(carrier_id) = filter.carrier_id {
            query.push(" AND carrier_id = ");
            query.push_bind(carrier_id);
        }
        if let Some(trip_id) = filter.trip_id {
            query.push(" AND trip_id = ");
            query.push_bind(trip_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND incurred_on >= ");
            query.push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND incurred_on <= ");
            query.push_bind(to);
        }
    }
}

#[async_trait::async_trait]
impl Repository for Costs {
    type CreateRequest = CostCreateDBRequest;
    type UpdateRequest = CostUpdateDBRequest;
    type Response = CostDBResponse;
    type Id = CostId;
    type Filter = CostFilter;

    #[instrument(skip(self, request), fields(category = request.category.as_str(), amount = %request.amount), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let cost = sqlx::query_as::<_, CostDBResponse>(
            r#"
            INSERT INTO costs (id, company_id, category, amount, currency, incurred_on, description, route_id,
                               vehicle_id, carrier_id, trip_id, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.company_id)
        .bind(request.category)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(request.incurred_on)
        .bind(&request.description)
        .bind(request.route_id)
        .bind(request.vehicle_id)
        .bind(request.carrier_id)
        .bind(request.trip_id)
        .bind(request.recorded_by)
        .fetch_one(&self.db)
        .await?;

        Ok(cost)
    }

    #[instrument(skip(self), fields(cost_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        let cost = sqlx::query_as::<_, CostDBResponse>("SELECT * FROM costs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(cost)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let costs = sqlx::query_as::<_, CostDBResponse>("SELECT * FROM costs WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        Ok(costs.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM costs WHERE 1=1");
        Self::push_filters(&mut query, filter);
        query.push(" ORDER BY incurred_on DESC, id ASC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let costs = query.build_query_as::<CostDBResponse>().fetch_all(&self.db).await?;
        Ok(costs)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM costs WHERE 1=1");
        Self::push_filters(&mut query, filter);
        let count: i64 = query.build_query_scalar().fetch_one(&self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self, request), fields(cost_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let cost = sqlx::query_as::<_, CostDBResponse>(
            r#"
            UPDATE costs SET
                category = COALESCE($2, category),
                amount = COALESCE($3, amount),
                currency = COALESCE($4, currency),
                incurred_on = COALESCE($5, incurred_on),
                description = COALESCE($6, description),
                vehicle_id = CASE WHEN $7 THEN $8 ELSE vehicle_id END,
                carrier_id = CASE WHEN $9 THEN $10 ELSE carrier_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.category)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(request.incurred_on)
        .bind(&request.description)
        .bind(request.vehicle_id.is_some())
        .bind(request.vehicle_id.flatten())
        .bind(request.carrier_id.is_some())
        .bind(request.carrier_id.flatten())
        .fetch_optional(&self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(cost)
    }

    #[instrument(skip(self), fields(cost_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM costs WHERE id = $1").bind(id).execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}

impl InMemoryRecord for CostDBResponse {
    type Create = CostCreateDBRequest;
    type Update = CostUpdateDBRequest;
    type Filter = CostFilter;

    const TABLE: &'static str = "costs";

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_create(id: Uuid, now: DateTime<Utc>, request: &Self::Create) -> Self {
        Self {
            id,
            company_id: request.company_id,
            category: request.category,
            amount: request.amount,
            currency: request.currency.clone(),
            incurred_on: request.incurred_on,
            description: request.description.clone(),
            route_id: request.route_id,
            vehicle_id: request.vehicle_id,
            carrier_id: request.carrier_id,
            trip_id: request.trip_id,
            recorded_by: request.recorded_by,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_update(&mut self, request: &Self::Update, now: DateTime<Utc>) {
        if let Some(category) = request.category {
            self.category = category;
        }
        if let Some(amount) = request.amount {
            self.amount = amount;
        }
        if let Some(currency) = &request.currency {
            self.currency = currency.clone();
        }
        if let Some(incurred_on) = request.incurred_on {
            self.incurred_on = incurred_on;
        }
        if let Some(description) = &request.description {
            self.description = Some(description.clone());
        }
        if let Some(vehicle_id) = request.vehicle_id {
            self.vehicle_id = vehicle_id;
        }
        if let Some(carrier_id) = request.carrier_id {
            self.carrier_id = carrier_id;
        }
        self.updated_at = now;
    }

    fn matches(&self, filter: &Self::Filter) -> bool {
        matches_opt(&filter.company_id, &self.company_id)
            && matches_opt(&filter.category, &self.category)
            && matches_nullable(&filter.route_id, &self.route_id)
            && matches_nullable(&filter.vehicle_id, &self.vehicle_id)
            && matches_nullable(&filter.carrier_id, &self.carrier_id)
            && matches_nullable(&filter.trip_id, &self.trip_id)
            && filter.from.is_none_or(|from| self.incurred_on >= from)
            && filter.to.is_none_or(|to| self.incurred_on <= to)
    }

    fn page(filter: &Self::Filter) -> (i64, i64) {
        (filter.skip, filter.limit)
    }

    fn compare(&self, other: &Self) -> Ordering {
        other.incurred_on.cmp(&self.incurred_on)
    }
}
