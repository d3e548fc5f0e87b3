// Postgres implementation of BaseContentStore
//
// Thin adapter: all SQL lives on the models.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::BaseContentStore;
use crate::common::{CompanyId, TargetId};
use crate::domains::companies::Company;
use crate::domains::personalization::models::{NewPersonalizedContent, PersonalizedContent};
use crate::domains::targets::Target;

#[derive(Clone)]
pub struct PostgresContentStore {
    pool: PgPool,
}

impl PostgresContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseContentStore for PostgresContentStore {
    async fn find_company(&self, id: CompanyId) -> Result<Option<Company>> {
        Company::find_by_id(id, &self.pool)
            .await
            .with_context(|| format!("Failed to load company {}", id))
    }

    async fn find_target(&self, id: TargetId) -> Result<Option<Target>> {
        Target::find_by_id(id, &self.pool)
            .await
            .with_context(|| format!("Failed to load target account {}", id))
    }

    async fn insert_personalized_content(
        &self,
        record: &NewPersonalizedContent,
    ) -> Result<PersonalizedContent> {
        record
            .insert(&self.pool)
            .await
            .context("Failed to insert personalized content")
    }
}
