//! Typed ID definitions for the composer's domain entities.
//!
//! ```rust
//! use composer_core::common::{CompanyId, TargetId};
//!
//! let company_id = CompanyId::new(1);
//! let target_id = TargetId::new(10);
//!
//! // This would be a compile error:
//! // let wrong: TargetId = company_id;
//! # let _ = (company_id, target_id);
//! ```

// Re-export the core Id type
pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for CompanyInfo entities (the company whose copy is personalized).
pub struct CompanyInfo;

/// Marker type for TargetAccount entities (the account the copy is tailored to).
pub struct TargetAccount;

/// Marker type for stored personalized content records.
pub struct PersonalizedContentRecord;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for CompanyInfo entities.
pub type CompanyId = Id<CompanyInfo>;

/// Typed ID for TargetAccount entities.
pub type TargetId = Id<TargetAccount>;

/// Typed ID for personalized content records.
pub type PersonalizedContentId = Id<PersonalizedContentRecord>;
