use crate::entities::account_entity as accounts;
use crate::error::{AppError, AppResult};
use crate::external::stripe::StripeService;
use crate::models::{BillingStatus, CheckoutSessionResponse, PortalSessionResponse};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

/// Emails included in the base plan per billing period.
pub const BASE_QUOTA: i64 = 1000;

/// Purchasable one-time top-up pack sizes.
pub const TOPUP_PACK_SIZES: [i64; 3] = [250, 500, 1000];

/// Remaining send allowance. May be negative; callers clamp for display.
pub fn compute_available(sent_count: i64, topup_quota: i64) -> i64 {
    BASE_QUOTA + topup_quota - sent_count
}

/// Whether the subscription status allows sending. The status itself is an
/// open provider string; only these two values are eligible.
pub fn is_sending_eligible(status: &str) -> bool {
    status == "active" || status == "trialing"
}

/// Pure eligibility gate over an account's billing fields.
pub fn evaluate_eligibility(status: &str, sent_count: i64, topup_quota: i64) -> BillingStatus {
    if !is_sending_eligible(status) {
        return BillingStatus {
            eligible: false,
            reason: Some(
                "Subscription is not active. Please start or renew your subscription."
                    .to_string(),
            ),
            subscription_status: status.to_string(),
            available: compute_available(sent_count, topup_quota).max(0),
        };
    }

    let available = compute_available(sent_count, topup_quota);
    if available <= 0 {
        return BillingStatus {
            eligible: false,
            reason: Some(
                "Email quota exhausted. Purchase a top-up pack to continue sending.".to_string(),
            ),
            subscription_status: status.to_string(),
            available: 0,
        };
    }

    BillingStatus {
        eligible: true,
        reason: None,
        subscription_status: status.to_string(),
        available,
    }
}

/// Authoritative subscription state extracted from a provider notification.
#[derive(Debug, Clone)]
pub struct SubscriptionPatch {
    pub subscription_id: String,
    pub status: String,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

/// Provider epoch seconds to a period timestamp.
pub fn period_from_timestamp(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Build the account update for a subscription created/updated/renewal event.
///
/// Counters reset exactly when the incoming period-start is present and
/// differs from the stored one. Providers deliver overlapping notifications
/// near renewal (subscription.updated and invoice.paid both fire), so the
/// stored-vs-incoming comparison is the de-duplication mechanism: re-applying
/// the same event is a plain overwrite and leaves counters alone.
pub fn build_subscription_update(
    account: &accounts::Model,
    patch: &SubscriptionPatch,
) -> accounts::ActiveModel {
    let mut update = accounts::ActiveModel {
        subscription_status: Set(patch.status.clone()),
        stripe_subscription_id: Set(Some(patch.subscription_id.clone())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };

    if let Some(period_start) = patch.period_start {
        update.period_start = Set(Some(period_start));
        if patch.period_end.is_some() {
            update.period_end = Set(patch.period_end);
        }

        // New billing period: counters start over. A first-ever period (no
        // stored value) leaves the freshly-zeroed counters untouched.
        if account.period_start.is_some() && account.period_start != Some(period_start) {
            update.sent_count = Set(0);
            update.topup_quota = Set(0);
        }
    }

    update
}

// The pool is shared behind an Arc: sea-orm's `DatabaseConnection` is not
// Clone when the `mock` feature is on, and each actix worker gets its own
// clone of the service.
#[derive(Clone)]
pub struct BillingService {
    pool: Arc<DatabaseConnection>,
    stripe_service: StripeService,
    base_url: String,
}

impl BillingService {
    pub fn new(
        pool: Arc<DatabaseConnection>,
        stripe_service: StripeService,
        base_url: String,
    ) -> Self {
        Self {
            pool,
            stripe_service,
            base_url,
        }
    }

    pub async fn find_account(&self, account_id: Uuid) -> AppResult<Option<accounts::Model>> {
        Ok(accounts::Entity::find_by_id(account_id).one(&*self.pool).await?)
    }

    pub async fn find_account_by_customer(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<accounts::Model>> {
        Ok(accounts::Entity::find()
            .filter(accounts::Column::StripeCustomerId.eq(customer_id))
            .one(&*self.pool)
            .await?)
    }

    /// Resolve the account a provider notification targets: embedded account
    /// metadata first, stored customer id as fallback. Older event shapes
    /// carry no metadata at all.
    pub async fn resolve_account(
        &self,
        metadata_account_id: Option<&str>,
        customer_id: &str,
    ) -> AppResult<Option<accounts::Model>> {
        if let Some(id) = metadata_account_id
            && let Ok(account_id) = id.parse::<Uuid>()
        {
            if let Some(account) = self.find_account(account_id).await? {
                return Ok(Some(account));
            }
        }
        self.find_account_by_customer(customer_id).await
    }

    /// Apply a subscription created/updated notification to an account.
    /// Safe to re-apply: the write is a plain overwrite and the counter
    /// reset is keyed on the period-start comparison.
    pub async fn apply_subscription_update(
        &self,
        account: &accounts::Model,
        patch: &SubscriptionPatch,
    ) -> AppResult<()> {
        let update = build_subscription_update(account, patch);
        accounts::Entity::update_many()
            .set(update)
            .filter(accounts::Column::Id.eq(account.id))
            .exec(&*self.pool)
            .await?;
        Ok(())
    }

    /// Subscription deleted: status becomes canceled, counters untouched.
    pub async fn mark_subscription_canceled(&self, account_id: Uuid) -> AppResult<()> {
        accounts::Entity::update_many()
            .set(accounts::ActiveModel {
                subscription_status: Set("canceled".to_string()),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(accounts::Column::Id.eq(account_id))
            .exec(&*self.pool)
            .await?;
        Ok(())
    }

    /// Credit a completed top-up purchase. A single atomic increment at the
    /// storage layer, so concurrent deliveries cannot lose an update.
    pub async fn credit_topup(&self, account_id: Uuid, emails: i64) -> AppResult<()> {
        let result = accounts::Entity::update_many()
            .col_expr(
                accounts::Column::TopupQuota,
                Expr::col(accounts::Column::TopupQuota).add(emails),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(accounts::Column::Id.eq(account_id))
            .exec(&*self.pool)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Account {account_id} not found for top-up credit"
            )));
        }
        Ok(())
    }

    /// invoice.paid: the invoice's own period is authoritative for the
    /// billing cycle; the subscription is retrieved for status and account
    /// resolution.
    pub async fn apply_invoice_renewal(
        &self,
        subscription_id: &str,
        period_start: Option<DateTime<Utc>>,
        period_end: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let subscription = self
            .stripe_service
            .retrieve_subscription(subscription_id)
            .await?;

        let account = self
            .resolve_account(
                subscription.metadata.get("account_id").map(String::as_str),
                &subscription.customer,
            )
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No account for subscription {subscription_id} (customer {})",
                    subscription.customer
                ))
            })?;

        let patch = SubscriptionPatch {
            subscription_id: subscription.id,
            status: subscription.status,
            period_start,
            period_end,
        };
        self.apply_subscription_update(&account, &patch).await
    }

    /// The single choke point before any quota-consuming action. Does not
    /// decrement anything itself.
    pub async fn check_send_eligibility(&self, account_id: Uuid) -> AppResult<BillingStatus> {
        let Some(account) = self.find_account(account_id).await? else {
            return Ok(BillingStatus {
                eligible: false,
                reason: Some("Account not found".to_string()),
                subscription_status: "none".to_string(),
                available: 0,
            });
        };

        Ok(evaluate_eligibility(
            &account.subscription_status,
            account.sent_count,
            account.topup_quota,
        ))
    }

    /// Validate a top-up purchase and create the one-time checkout session.
    /// The quota credit happens later via the payment-completed webhook; the
    /// purchase may still be abandoned at this point.
    pub async fn purchase_topup(
        &self,
        account_id: Uuid,
        emails: i64,
    ) -> AppResult<CheckoutSessionResponse> {
        if !TOPUP_PACK_SIZES.contains(&emails) {
            return Err(AppError::ValidationError(
                "Invalid pack. Choose 250, 500, or 1000.".to_string(),
            ));
        }

        let price_id = self
            .stripe_service
            .topup_price_id(emails)
            .ok_or_else(|| {
                AppError::ConfigError(format!("Top-up price for {emails} emails not configured"))
            })?
            .to_string();

        let account = self
            .find_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if !is_sending_eligible(&account.subscription_status) {
            return Err(AppError::PreconditionFailed(
                "Active subscription required to purchase top-ups.".to_string(),
            ));
        }

        let customer_id = account.stripe_customer_id.as_deref().ok_or_else(|| {
            AppError::PreconditionFailed("No Stripe customer on file.".to_string())
        })?;

        let session = self
            .stripe_service
            .create_topup_checkout(
                customer_id,
                &price_id,
                account.id,
                emails,
                &format!("{}/app/billing?topup=success", self.base_url),
                &format!("{}/app/billing", self.base_url),
            )
            .await?;

        Ok(CheckoutSessionResponse { url: session.url })
    }

    /// Checkout session for the base subscription, creating the Stripe
    /// customer lazily on first use.
    pub async fn create_subscription_checkout(
        &self,
        account_id: Uuid,
    ) -> AppResult<CheckoutSessionResponse> {
        let account = self
            .find_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if is_sending_eligible(&account.subscription_status) {
            return Err(AppError::PreconditionFailed(
                "Already subscribed. Use the billing portal to manage.".to_string(),
            ));
        }

        let price_id = self
            .stripe_service
            .base_monthly_price_id()
            .ok_or_else(|| {
                AppError::ConfigError("Base subscription price not configured".to_string())
            })?
            .to_string();

        let customer_id = match account.stripe_customer_id.clone() {
            Some(id) => id,
            None => {
                let customer = self.stripe_service.create_customer(None, account.id).await?;
                accounts::Entity::update_many()
                    .set(accounts::ActiveModel {
                        stripe_customer_id: Set(Some(customer.id.clone())),
                        updated_at: Set(Some(Utc::now())),
                        ..Default::default()
                    })
                    .filter(accounts::Column::Id.eq(account.id))
                    .exec(&*self.pool)
                    .await?;
                customer.id
            }
        };

        let session = self
            .stripe_service
            .create_subscription_checkout(
                &customer_id,
                &price_id,
                account.id,
                &format!(
                    "{}/app/billing?session_id={{CHECKOUT_SESSION_ID}}",
                    self.base_url
                ),
                &format!("{}/app/billing", self.base_url),
            )
            .await?;

        Ok(CheckoutSessionResponse { url: session.url })
    }

    pub async fn create_portal_session(
        &self,
        account_id: Uuid,
    ) -> AppResult<PortalSessionResponse> {
        let account = self
            .find_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let customer_id = account.stripe_customer_id.as_deref().ok_or_else(|| {
            AppError::PreconditionFailed("No billing account. Start a trial first.".to_string())
        })?;

        let session = self
            .stripe_service
            .create_portal_session(customer_id, &format!("{}/app/billing", self.base_url))
            .await?;

        Ok(PortalSessionResponse { url: session.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeConfig;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn account(
        status: &str,
        sent_count: i64,
        topup_quota: i64,
        period_start: Option<DateTime<Utc>>,
    ) -> accounts::Model {
        accounts::Model {
            id: Uuid::new_v4(),
            subscription_status: status.to_string(),
            stripe_customer_id: Some("cus_123".to_string()),
            stripe_subscription_id: Some("sub_123".to_string()),
            period_start,
            period_end: None,
            sent_count,
            topup_quota,
            created_at: None,
            updated_at: None,
        }
    }

    fn service(db: sea_orm::DatabaseConnection) -> BillingService {
        let stripe = StripeService::new(StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            price_base_monthly: Some("price_base".to_string()),
            price_topup_250: Some("price_250".to_string()),
            price_topup_500: Some("price_500".to_string()),
            price_topup_1000: Some("price_1000".to_string()),
        });
        BillingService::new(Arc::new(db), stripe, "http://localhost:8080".to_string())
    }

    #[test]
    fn test_compute_available() {
        assert_eq!(compute_available(0, 0), 1000);
        assert_eq!(compute_available(1000, 0), 0);
        assert_eq!(compute_available(1200, 500), 300);
        assert_eq!(compute_available(1500, 0), -500);
    }

    #[test]
    fn test_is_sending_eligible() {
        assert!(is_sending_eligible("active"));
        assert!(is_sending_eligible("trialing"));
        for status in ["", "none", "past_due", "canceled", "unpaid", "ACTIVE"] {
            assert!(!is_sending_eligible(status), "{status} should be ineligible");
        }
    }

    #[test]
    fn test_eligibility_inactive_subscription() {
        let status = evaluate_eligibility("past_due", 100, 0);
        assert!(!status.eligible);
        assert!(status.reason.as_deref().unwrap().contains("not active"));
        assert_eq!(status.subscription_status, "past_due");
        assert_eq!(status.available, 900);
    }

    #[test]
    fn test_eligibility_negative_available_clamped() {
        let status = evaluate_eligibility("canceled", 1500, 0);
        assert!(!status.eligible);
        assert_eq!(status.available, 0);
    }

    #[test]
    fn test_eligibility_quota_exhausted() {
        let status = evaluate_eligibility("active", 1000, 0);
        assert!(!status.eligible);
        assert!(status.reason.as_deref().unwrap().contains("quota exhausted"));
        assert_eq!(status.available, 0);
    }

    #[test]
    fn test_eligibility_trialing_full_quota() {
        let status = evaluate_eligibility("trialing", 0, 0);
        assert!(status.eligible);
        assert_eq!(status.reason, None);
        assert_eq!(status.available, 1000);
    }

    fn patch(period_start: Option<DateTime<Utc>>) -> SubscriptionPatch {
        SubscriptionPatch {
            subscription_id: "sub_123".to_string(),
            status: "active".to_string(),
            period_start,
            period_end: period_start.map(|p| p + chrono::Duration::days(30)),
        }
    }

    #[test]
    fn test_new_period_resets_counters() {
        let p0 = period_from_timestamp(Some(1_700_000_000));
        let p1 = period_from_timestamp(Some(1_702_600_000));
        let acct = account("active", 5, 3, p0);

        let update = build_subscription_update(&acct, &patch(p1));
        assert_eq!(update.sent_count, Set(0));
        assert_eq!(update.topup_quota, Set(0));
        assert_eq!(update.period_start, Set(p1));
    }

    #[test]
    fn test_unchanged_period_leaves_counters() {
        let p0 = period_from_timestamp(Some(1_700_000_000));
        let acct = account("active", 5, 3, p0);

        let update = build_subscription_update(&acct, &patch(p0));
        assert!(update.sent_count.is_not_set());
        assert!(update.topup_quota.is_not_set());
        assert_eq!(update.period_start, Set(p0));
    }

    #[test]
    fn test_absent_period_is_status_only_overwrite() {
        let p0 = period_from_timestamp(Some(1_700_000_000));
        let acct = account("active", 5, 3, p0);

        let update = build_subscription_update(&acct, &patch(None));
        assert!(update.period_start.is_not_set());
        assert!(update.period_end.is_not_set());
        assert!(update.sent_count.is_not_set());
        assert!(update.topup_quota.is_not_set());
        assert_eq!(update.subscription_status, Set("active".to_string()));
    }

    #[test]
    fn test_first_period_does_not_reset() {
        let p1 = period_from_timestamp(Some(1_700_000_000));
        let acct = account("none", 0, 0, None);

        let update = build_subscription_update(&acct, &patch(p1));
        assert!(update.sent_count.is_not_set());
        assert_eq!(update.period_start, Set(p1));
    }

    #[test]
    fn test_reapply_after_reset_is_noop() {
        // Second delivery of the same new-period event: stored value now
        // matches, so no further reset.
        let p1 = period_from_timestamp(Some(1_702_600_000));
        let acct_after_first = account("active", 0, 0, p1);

        let update = build_subscription_update(&acct_after_first, &patch(p1));
        assert!(update.sent_count.is_not_set());
        assert!(update.topup_quota.is_not_set());
    }

    #[tokio::test]
    async fn test_credit_topup_single_atomic_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let service = service(db);

        service.credit_topup(Uuid::new_v4(), 500).await.unwrap();
    }

    #[tokio::test]
    async fn test_credit_topup_unknown_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = service(db);

        let result = service.credit_topup(Uuid::new_v4(), 500).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_check_send_eligibility_loads_account() {
        let acct = account("active", 200, 100, None);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![acct]])
            .into_connection();
        let service = service(db);

        let status = service.check_send_eligibility(Uuid::new_v4()).await.unwrap();
        assert!(status.eligible);
        assert_eq!(status.available, 900);
    }

    #[tokio::test]
    async fn test_check_send_eligibility_unknown_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<accounts::Model>::new()])
            .into_connection();
        let service = service(db);

        let status = service.check_send_eligibility(Uuid::new_v4()).await.unwrap();
        assert!(!status.eligible);
        assert_eq!(status.subscription_status, "none");
        assert_eq!(status.available, 0);
    }

    #[tokio::test]
    async fn test_cloned_services_share_one_pool() {
        // Per-worker clones must hit the same connection.
        let acct = account("active", 200, 100, None);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![acct.clone()], vec![acct]])
            .into_connection();
        let service = service(db);
        let worker_copy = service.clone();

        let first = service.check_send_eligibility(Uuid::new_v4()).await.unwrap();
        let second = worker_copy
            .check_send_eligibility(Uuid::new_v4())
            .await
            .unwrap();
        assert!(first.eligible);
        assert!(second.eligible);
    }

    #[tokio::test]
    async fn test_purchase_topup_rejects_unknown_pack() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = service(db);

        let result = service.purchase_topup(Uuid::new_v4(), 300).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_purchase_topup_requires_active_subscription() {
        let acct = account("canceled", 0, 0, None);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![acct]])
            .into_connection();
        let service = service(db);

        let result = service.purchase_topup(Uuid::new_v4(), 250).await;
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn test_purchase_topup_requires_customer_on_file() {
        let mut acct = account("active", 0, 0, None);
        acct.stripe_customer_id = None;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![acct]])
            .into_connection();
        let service = service(db);

        let result = service.purchase_topup(Uuid::new_v4(), 250).await;
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }
}
