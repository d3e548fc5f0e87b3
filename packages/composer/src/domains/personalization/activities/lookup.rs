use crate::common::{CompanyId, TargetId};
use crate::domains::companies::Company;
use crate::domains::targets::Target;
use crate::kernel::substrate::{ErrorKind, StepError};
use crate::kernel::BaseContentStore;

/// Load the company. A missing row is terminal; a store error is retryable.
pub async fn resolve_company(
    store: &dyn BaseContentStore,
    company_id: CompanyId,
) -> Result<Company, StepError> {
    match store.find_company(company_id).await {
        Ok(Some(company)) => Ok(company),
        Ok(None) => Err(StepError::new(
            ErrorKind::CompanyNotFound,
            format!("Company info not found for ID: {}", company_id),
        )),
        Err(e) => Err(StepError::new(ErrorKind::LookupError, format!("{:#}", e))),
    }
}

/// Load the target account. A missing row is terminal; a store error is
/// retryable.
pub async fn resolve_target(
    store: &dyn BaseContentStore,
    target_id: TargetId,
) -> Result<Target, StepError> {
    match store.find_target(target_id).await {
        Ok(Some(target)) => Ok(target),
        Ok(None) => Err(StepError::new(
            ErrorKind::TargetNotFound,
            format!("Target account not found for ID: {}", target_id),
        )),
        Err(e) => Err(StepError::new(ErrorKind::LookupError, format!("{:#}", e))),
    }
}
