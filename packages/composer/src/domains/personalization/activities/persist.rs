use crate::domains::personalization::models::{NewPersonalizedContent, PersonalizedContent};
use crate::kernel::substrate::{ErrorKind, StepError};
use crate::kernel::BaseContentStore;

/// Append the personalized copy to `personalized_content`.
pub async fn persist_personalized_content(
    store: &dyn BaseContentStore,
    record: &NewPersonalizedContent,
) -> Result<PersonalizedContent, StepError> {
    store
        .insert_personalized_content(record)
        .await
        .map_err(|e| StepError::new(ErrorKind::PersistError, format!("{:#}", e)))
}
