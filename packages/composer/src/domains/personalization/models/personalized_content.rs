use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use typed_builder::TypedBuilder;

use crate::common::{CompanyId, PersonalizedContentId, TargetId};

/// Stored result of one personalization. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersonalizedContent {
    pub id: PersonalizedContentId,
    pub company_info_id: CompanyId,
    pub target_account_id: TargetId,
    pub original_text: String,
    pub personalized_text: String,
    pub text_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewPersonalizedContent {
    pub company_info_id: CompanyId,
    pub target_account_id: TargetId,
    pub original_text: String,
    pub personalized_text: String,
    pub text_type: String,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl NewPersonalizedContent {
    /// Insert the record, returning the stored row
    pub async fn insert(&self, pool: &PgPool) -> Result<PersonalizedContent> {
        let row = sqlx::query_as::<_, PersonalizedContent>(
            r#"
            INSERT INTO personalized_content (
                company_info_id, target_account_id, original_text,
                personalized_text, text_type, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(self.company_info_id)
        .bind(self.target_account_id)
        .bind(&self.original_text)
        .bind(&self.personalized_text)
        .bind(&self.text_type)
        .bind(self.created_at)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }
}
