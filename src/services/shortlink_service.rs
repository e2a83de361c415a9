use crate::entities::{link_event_entity as link_events, location_entity as locations};
use crate::error::{AppError, AppResult};
use crate::models::{CreateLocationRequest, UpdateLocationRequest};
use crate::utils::generate_short_code;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// Source tag recorded when a visit carries no `src` parameter.
pub const DEFAULT_LINK_SOURCE: &str = "qr";

/// Generation retries before giving up. At 8 chars over 36 symbols a
/// collision is astronomically unlikely; the bound only guarantees
/// termination, and the unique index remains the hard check.
const MAX_CODE_ATTEMPTS: usize = 5;

// Arc-shared pool: `DatabaseConnection` is not Clone under the `mock`
// feature, and `resolve` clones the whole service onto the detached
// visit-log task.
#[derive(Clone)]
pub struct ShortLinkService {
    pool: Arc<DatabaseConnection>,
}

impl ShortLinkService {
    pub fn new(pool: Arc<DatabaseConnection>) -> Self {
        Self { pool }
    }

    /// Generate a short code that is not yet taken.
    pub async fn allocate_short_code(&self) -> AppResult<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_short_code();
            let collision = locations::Entity::find()
                .filter(locations::Column::ShortCode.eq(&code))
                .one(&*self.pool)
                .await?;
            if collision.is_none() {
                return Ok(code);
            }
        }
        Err(AppError::ShortCodeAllocation)
    }

    /// Onboard the account's location. One location per account in V1; the
    /// short code is allocated here and never changes afterwards.
    pub async fn create_location(
        &self,
        account_id: Uuid,
        req: CreateLocationRequest,
    ) -> AppResult<locations::Model> {
        let existing = locations::Entity::find()
            .filter(locations::Column::AccountId.eq(account_id))
            .one(&*self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::PreconditionFailed(
                "Location already configured".to_string(),
            ));
        }

        if req.name.trim().is_empty()
            || req.address.trim().is_empty()
            || req.business_phone.trim().is_empty()
            || req.business_email.trim().is_empty()
            || req.google_review_url.trim().is_empty()
        {
            return Err(AppError::ValidationError(
                "Please fill in all required fields".to_string(),
            ));
        }
        validate_destination_url(&req.google_review_url)?;

        let short_code = self.allocate_short_code().await?;

        let location = locations::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            name: Set(req.name),
            address: Set(req.address),
            business_phone: Set(req.business_phone),
            business_email: Set(req.business_email),
            google_review_url: Set(req.google_review_url),
            contact_us_url: Set(req.contact_us_url.filter(|u| !u.trim().is_empty())),
            short_code: Set(short_code),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        Ok(location)
    }

    pub async fn get_location(&self, account_id: Uuid) -> AppResult<Option<locations::Model>> {
        Ok(locations::Entity::find()
            .filter(locations::Column::AccountId.eq(account_id))
            .one(&*self.pool)
            .await?)
    }

    /// Update descriptive fields and the destination URL. The short code is
    /// immutable after creation.
    pub async fn update_location(
        &self,
        account_id: Uuid,
        req: UpdateLocationRequest,
    ) -> AppResult<locations::Model> {
        let location = self
            .get_location(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Location not found".to_string()))?;

        if let Some(url) = req.google_review_url.as_deref() {
            validate_destination_url(url)?;
        }

        let mut update = location.into_active_model();
        if let Some(name) = req.name {
            update.name = Set(name);
        }
        if let Some(address) = req.address {
            update.address = Set(address);
        }
        if let Some(phone) = req.business_phone {
            update.business_phone = Set(phone);
        }
        if let Some(email) = req.business_email {
            update.business_email = Set(email);
        }
        if let Some(url) = req.google_review_url {
            update.google_review_url = Set(url);
        }
        if let Some(url) = req.contact_us_url {
            update.contact_us_url = Set(Some(url).filter(|u| !u.trim().is_empty()));
        }

        Ok(update.update(&*self.pool).await?)
    }

    /// Resolve a public short code to its destination URL and dispatch the
    /// visit log without blocking the redirect. The lookup is exact and
    /// case-sensitive; a missing row and a missing destination URL collapse
    /// into the same not-found condition.
    pub async fn resolve(&self, code: &str, source: Option<String>) -> AppResult<String> {
        let location = locations::Entity::find()
            .filter(locations::Column::ShortCode.eq(code))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Link not found".to_string()))?;

        if location.google_review_url.trim().is_empty() {
            return Err(AppError::NotFound("Link not found".to_string()));
        }

        let source_tag = source
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LINK_SOURCE.to_string());

        // Analytics is best-effort: the redirect is the user-facing
        // contract, so the log write runs detached and only reports
        // failures to the log.
        let service = self.clone();
        let (account_id, location_id) = (location.account_id, location.id);
        tokio::spawn(async move {
            if let Err(e) = service.record_visit(account_id, location_id, source_tag).await {
                log::error!("Failed to log link event for location {location_id}: {e}");
            }
        });

        Ok(location.google_review_url)
    }

    /// Append one visit record. `contact_id` stays null for anonymous
    /// redirect traffic.
    pub async fn record_visit(
        &self,
        account_id: Uuid,
        location_id: Uuid,
        source: String,
    ) -> AppResult<()> {
        link_events::ActiveModel {
            account_id: Set(account_id),
            location_id: Set(location_id),
            source: Set(source),
            contact_id: Set(None),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;
        Ok(())
    }
}

fn validate_destination_url(url: &str) -> AppResult<()> {
    reqwest::Url::parse(url)
        .map_err(|_| {
            AppError::ValidationError("Google Review URL must be a valid URL".to_string())
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn location(code: &str, url: &str) -> locations::Model {
        locations::Model {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            name: "Cafe Aurora".to_string(),
            address: "1 Main St".to_string(),
            business_phone: "+15550100".to_string(),
            business_email: "hello@aurora.example".to_string(),
            google_review_url: url.to_string(),
            contact_us_url: None,
            short_code: code.to_string(),
            created_at: Some(Utc::now()),
        }
    }

    fn link_event(location: &locations::Model, source: &str) -> link_events::Model {
        link_events::Model {
            id: 1,
            account_id: location.account_id,
            location_id: location.id,
            source: source.to_string(),
            contact_id: None,
            created_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_allocate_retries_past_one_collision() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![location("taken123", "https://g.page/r/abc")],
                vec![],
            ])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let code = service.allocate_short_code().await.unwrap();
        assert_eq!(code.len(), 8);
    }

    #[tokio::test]
    async fn test_allocate_gives_up_after_five_collisions() {
        let collision = vec![location("taken123", "https://g.page/r/abc")];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                collision.clone(),
                collision.clone(),
                collision.clone(),
                collision.clone(),
                collision,
            ])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let result = service.allocate_short_code().await;
        assert!(matches!(result, Err(AppError::ShortCodeAllocation)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_code() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<locations::Model>::new()])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let result = service.resolve("nosuch00", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_misconfigured_destination_collapses_to_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![location("abc12345", "")]])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let result = service.resolve("abc12345", None).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_returns_destination() {
        let loc = location("abc12345", "https://g.page/r/review-me");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![loc.clone()]])
            .append_query_results([vec![link_event(&loc, DEFAULT_LINK_SOURCE)]])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let url = service.resolve("abc12345", None).await.unwrap();
        assert_eq!(url, "https://g.page/r/review-me");
    }

    #[tokio::test]
    async fn test_record_visit_inserts_one_event() {
        let loc = location("abc12345", "https://g.page/r/review-me");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![link_event(&loc, "email")]])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        service
            .record_visit(loc.account_id, loc.id, "email".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_location_rejects_invalid_url() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<locations::Model>::new()])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let result = service
            .create_location(
                Uuid::new_v4(),
                CreateLocationRequest {
                    name: "Cafe Aurora".to_string(),
                    address: "1 Main St".to_string(),
                    business_phone: "+15550100".to_string(),
                    business_email: "hello@aurora.example".to_string(),
                    google_review_url: "not a url".to_string(),
                    contact_us_url: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_create_location_enforces_single_location() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![location("abc12345", "https://g.page/r/abc")]])
            .into_connection();
        let service = ShortLinkService::new(Arc::new(db));

        let result = service
            .create_location(
                Uuid::new_v4(),
                CreateLocationRequest {
                    name: "Cafe Aurora".to_string(),
                    address: "1 Main St".to_string(),
                    business_phone: "+15550100".to_string(),
                    business_email: "hello@aurora.example".to_string(),
                    google_review_url: "https://g.page/r/abc".to_string(),
                    contact_us_url: None,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }
}
