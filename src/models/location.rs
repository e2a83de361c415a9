use crate::entities::locations;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateLocationRequest {
    pub name: String,
    pub address: String,
    pub business_phone: String,
    pub business_email: String,
    pub google_review_url: String,
    #[serde(default)]
    pub contact_us_url: Option<String>,
}

/// Partial update of the descriptive fields. The short code never changes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateLocationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub business_phone: Option<String>,
    #[serde(default)]
    pub business_email: Option<String>,
    #[serde(default)]
    pub google_review_url: Option<String>,
    #[serde(default)]
    pub contact_us_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub address: String,
    pub business_phone: String,
    pub business_email: String,
    pub google_review_url: String,
    pub contact_us_url: Option<String>,
    pub short_code: String,
    /// Public short link for the redirect endpoint.
    pub short_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl LocationResponse {
    pub fn from_model(model: locations::Model, base_url: &str) -> Self {
        let short_url = format!("{}/r/{}", base_url.trim_end_matches('/'), model.short_code);
        Self {
            id: model.id,
            account_id: model.account_id,
            name: model.name,
            address: model.address,
            business_phone: model.business_phone,
            business_email: model.business_email,
            google_review_url: model.google_review_url,
            contact_us_url: model.contact_us_url,
            short_code: model.short_code,
            short_url,
            created_at: model.created_at,
        }
    }
}
