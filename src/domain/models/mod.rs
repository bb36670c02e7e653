pub mod auth;
pub mod booking;
pub mod payment;
pub mod review;
pub mod tour;
pub mod user;

use crate::domain::services::api_features::FieldSpec;
use crate::error::AppError;
use serde::Serialize;

/// A persisted collection that the generic CRUD handlers can serve.
pub trait Document: Send + Sync + 'static {
    /// Singular, lower-case name used in error messages.
    const NAME: &'static str;
    /// Fields a list request may filter and sort on.
    const FIELDS: &'static [FieldSpec];

    type Record: Serialize + Send + Sync;
    type Create: Send + Sync;
    type Update: Send + Sync;
}

pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

/// A partial update. Applying it re-runs validation on the merged result.
pub trait Patch<T> {
    fn apply(self, target: &mut T) -> Result<(), AppError>;
}
