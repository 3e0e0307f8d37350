//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use ripple_core::error::RippleResult;
use ripple_core::models::tenant::{
    Branding, CreateTenant, Tenant, TenantPlan, TenantStatus, UpdateTenant,
};
use ripple_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::{DbError, parse_uuid};

const SELECT_TENANT: &str = "SELECT meta::id(id) AS record_id, * FROM";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    domain: Option<String>,
    status: String,
    plan: String,
    primary_color: Option<String>,
    secondary_color: Option<String>,
    logo_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn parse_status(s: &str) -> Result<TenantStatus, DbError> {
    match s {
        "Active" => Ok(TenantStatus::Active),
        "Suspended" => Ok(TenantStatus::Suspended),
        other => Err(DbError::invalid_row(
            "tenant",
            format!("unknown status: {other}"),
        )),
    }
}

fn status_to_string(s: TenantStatus) -> &'static str {
    match s {
        TenantStatus::Active => "Active",
        TenantStatus::Suspended => "Suspended",
    }
}

fn parse_plan(s: &str) -> Result<TenantPlan, DbError> {
    match s {
        "Free" => Ok(TenantPlan::Free),
        "Pro" => Ok(TenantPlan::Pro),
        "Enterprise" => Ok(TenantPlan::Enterprise),
        other => Err(DbError::invalid_row("tenant", format!("unknown plan: {other}"))),
    }
}

fn plan_to_string(p: TenantPlan) -> &'static str {
    match p {
        TenantPlan::Free => "Free",
        TenantPlan::Pro => "Pro",
        TenantPlan::Enterprise => "Enterprise",
    }
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid("tenant", "record", &self.record_id)?,
            name: self.name,
            slug: self.slug,
            domain: self.domain,
            status: parse_status(&self.status)?,
            plan: parse_plan(&self.plan)?,
            branding: Branding {
                primary_color: self.primary_color,
                secondary_color: self.secondary_color,
                logo_url: self.logo_url,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(
        &self,
        filter: &str,
        bind: (&'static str, String),
        id_hint: String,
    ) -> Result<Tenant, DbError> {
        let mut result = self
            .db
            .query(format!("{SELECT_TENANT} {filter}"))
            .bind(bind)
            .await?;

        let rows: Vec<TenantRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("tenant", id_hint))?
            .try_into_tenant()
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> RippleResult<Tenant> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, domain = $domain, \
                 status = 'Active', plan = $plan, \
                 primary_color = $primary_color, \
                 secondary_color = $secondary_color, \
                 logo_url = $logo_url",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("domain", input.domain))
            .bind(("plan", plan_to_string(input.plan)))
            .bind(("primary_color", input.branding.primary_color))
            .bind(("secondary_color", input.branding.secondary_color))
            .bind(("logo_url", input.branding.logo_url))
            .await
            .map_err(|e| DbError::from_statement("tenant", e))?;

        result
            .check()
            .map_err(|e| DbError::from_statement("tenant", e))?;

        Ok(self.get_by_id(id).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> RippleResult<Tenant> {
        let id_str = id.to_string();
        Ok(self
            .fetch_one("type::record('tenant', $id)", ("id", id_str.clone()), id_str)
            .await?)
    }

    async fn get_by_slug(&self, slug: &str) -> RippleResult<Tenant> {
        Ok(self
            .fetch_one(
                "tenant WHERE slug = $slug",
                ("slug", slug.to_string()),
                format!("slug={slug}"),
            )
            .await?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> RippleResult<Tenant> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.domain.is_some() {
            sets.push("domain = $domain");
        }
        if input.plan.is_some() {
            sets.push("plan = $plan");
        }
        if input.branding.is_some() {
            sets.push(
                "primary_color = $primary_color, \
                 secondary_color = $secondary_color, logo_url = $logo_url",
            );
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(domain) = input.domain {
            builder = builder.bind(("domain", domain));
        }
        if let Some(plan) = input.plan {
            builder = builder.bind(("plan", plan_to_string(plan)));
        }
        if let Some(branding) = input.branding {
            builder = builder
                .bind(("primary_color", branding.primary_color))
                .bind(("secondary_color", branding.secondary_color))
                .bind(("logo_url", branding.logo_url));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::from_statement("tenant", e))?;

        self.get_by_id(id).await
    }

    async fn set_status(&self, id: Uuid, status: TenantStatus) -> RippleResult<Tenant> {
        self.db
            .query(
                "UPDATE type::record('tenant', $id) SET \
                 status = $status, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("status", status_to_string(status)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        self.get_by_id(id).await
    }

    async fn list(&self, pagination: Pagination) -> RippleResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "{SELECT_TENANT} tenant ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
