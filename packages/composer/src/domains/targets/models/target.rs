use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::TargetId;

/// An account that copy gets tailored to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    /// Website used to pull context about the account, if known
    pub url: Option<String>,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// The reference URL, if one is set and non-blank.
    pub fn reference_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Find target account by ID
    pub async fn find_by_id(id: TargetId, pool: &PgPool) -> Result<Option<Self>> {
        let target = sqlx::query_as::<_, Target>(
            "SELECT id, name, url FROM accounts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(target)
    }
}
