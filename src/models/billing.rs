use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of the eligibility gate guarding every quota-consuming action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BillingStatus {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub subscription_status: String,
    pub available: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopUpRequest {
    /// Pack size in emails; must be one of 250, 500 or 1000.
    pub emails: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutSessionResponse {
    /// Hosted payment page URL to redirect the user to.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PortalSessionResponse {
    pub url: String,
}
