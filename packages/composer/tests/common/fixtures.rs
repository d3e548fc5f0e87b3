//! Test fixtures: a small catalog of companies and target accounts.

use composer_core::common::{CompanyId, TargetId};
use composer_core::domains::companies::Company;
use composer_core::domains::personalization::Job;
use composer_core::domains::targets::Target;
use composer_core::kernel::MockContentStore;

pub const ACME: i64 = 1;
pub const GLOBEX: i64 = 10;
/// Has a reference URL, so context extraction runs.
pub const INITECH: i64 = 11;
pub const UMBRELLA: i64 = 12;
pub const HOOLI: i64 = 13;
pub const INITECH_URL: &str = "https://initech.example";

/// Store seeded with one company and four targets. Ids not listed here are missing.
pub fn seeded_store() -> MockContentStore {
    MockContentStore::new()
        .with_company(
            Company::new(CompanyId::new(ACME), "Acme Payables")
                .with_description("Accounts payable automation for mid-market finance teams"),
        )
        .with_target(Target::new(TargetId::new(GLOBEX), "Globex"))
        .with_target(Target::new(TargetId::new(INITECH), "Initech").with_url(INITECH_URL))
        .with_target(Target::new(TargetId::new(UMBRELLA), "Umbrella"))
        .with_target(Target::new(TargetId::new(HOOLI), "Hooli"))
}

pub fn job(company: i64, target: i64, content_type: &str, text: &str) -> Job {
    Job::new(
        CompanyId::new(company),
        TargetId::new(target),
        content_type,
        text,
    )
}
