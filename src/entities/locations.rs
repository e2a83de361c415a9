use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Business location. One per account in V1. `short_code` is generated once
/// at creation and immutable; uniqueness is enforced by the database index.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub address: String,
    pub business_phone: String,
    pub business_email: String,
    pub google_review_url: String,
    pub contact_us_url: Option<String>,
    pub short_code: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
