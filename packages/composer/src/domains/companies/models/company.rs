use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::CompanyId;

/// Company profile used as the "voice" of personalized copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Company {
    pub id: CompanyId,
    pub company_name: String,
    pub company_website: Option<String>,
    pub company_description: Option<String>,
    pub official_overview: Option<String>,
    pub product_overview: Option<String>,
    pub differentiators: Option<String>,
}

impl Company {
    /// Minimal record, mostly useful for fixtures.
    pub fn new(id: CompanyId, company_name: impl Into<String>) -> Self {
        Self {
            id,
            company_name: company_name.into(),
            company_website: None,
            company_description: None,
            official_overview: None,
            product_overview: None,
            differentiators: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.company_description = Some(description.into());
        self
    }

    /// Best available description: the explicit one, then the official overview.
    pub fn description(&self) -> &str {
        self.company_description
            .as_deref()
            .or(self.official_overview.as_deref())
            .map(str::trim)
            .unwrap_or("")
    }

    // =========================================================================
    // SQL Queries
    // =========================================================================

    /// Find company by ID
    pub async fn find_by_id(id: CompanyId, pool: &PgPool) -> Result<Option<Self>> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            SELECT id, company_name, company_website, company_description,
                   official_overview, product_overview, differentiators
            FROM company_info
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(company)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_falls_back_to_overview() {
        let mut company = Company::new(CompanyId::new(1), "Acme");
        assert_eq!(company.description(), "");

        company.official_overview = Some(" Spend management for finance teams ".into());
        assert_eq!(company.description(), "Spend management for finance teams");

        let company = company.with_description("AP automation");
        assert_eq!(company.description(), "AP automation");
    }
}
