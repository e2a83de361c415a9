use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body shape shared by every failure response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}
