use crate::error::{AppError, AppResult};
use crate::external::stripe::StripeService;
use crate::services::billing_service::{BillingService, SubscriptionPatch, period_from_timestamp};
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, info, warn};
use stripe::{CheckoutSessionMode, Customer, Event, EventObject, EventType, Expandable};
use uuid::Uuid;

/// Stripe webhook intake.
///
/// Verifies the signed payload and translates lifecycle events into ledger
/// updates. Unrecognized event kinds and processing failures are always
/// acknowledged with 200 so the provider does not retry them; only signature
/// problems are client errors.
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    stripe_service: web::Data<StripeService>,
    billing_service: web::Data<BillingService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("stripe-signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            warn!("Missing stripe-signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing stripe-signature header"
            })));
        }
    };

    let payload = std::str::from_utf8(&body).map_err(|_| {
        error!("Invalid UTF-8 in webhook payload");
        actix_web::error::ErrorBadRequest("Invalid payload encoding")
    })?;

    let event = match stripe_service.verify_webhook_signature(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Invalid signature"
            })));
        }
    };

    info!("Received Stripe webhook event: {} ({})", event.type_, event.id);

    match handle_stripe_event(event, &billing_service).await {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook event: {e}");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": format!("Processing failed: {}", e)
            })))
        }
    }
}

async fn handle_stripe_event(event: Event, billing: &BillingService) -> AppResult<()> {
    match event.type_ {
        EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated => {
            if let EventObject::Subscription(subscription) = event.data.object {
                let customer_id = customer_ref_id(&subscription.customer);
                let account = billing
                    .resolve_account(
                        subscription.metadata.get("account_id").map(String::as_str),
                        &customer_id,
                    )
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("No account for customer {customer_id}"))
                    })?;

                let patch = SubscriptionPatch {
                    subscription_id: subscription.id.to_string(),
                    status: subscription.status.to_string(),
                    period_start: period_from_timestamp(Some(subscription.current_period_start)),
                    period_end: period_from_timestamp(Some(subscription.current_period_end)),
                };
                billing.apply_subscription_update(&account, &patch).await?;
            }
            Ok(())
        }
        EventType::CustomerSubscriptionDeleted => {
            if let EventObject::Subscription(subscription) = event.data.object {
                let customer_id = customer_ref_id(&subscription.customer);
                match billing
                    .resolve_account(
                        subscription.metadata.get("account_id").map(String::as_str),
                        &customer_id,
                    )
                    .await?
                {
                    Some(account) => billing.mark_subscription_canceled(account.id).await?,
                    None => warn!("Subscription deleted for unknown customer {customer_id}"),
                }
            }
            Ok(())
        }
        EventType::CheckoutSessionCompleted => {
            if let EventObject::CheckoutSession(session) = event.data.object {
                match topup_credit_from_session(session.mode, session.metadata.as_ref()) {
                    Some((account_id, emails)) => {
                        billing.credit_topup(account_id, emails).await?;
                    }
                    None if session.mode == CheckoutSessionMode::Payment => {
                        // Not retriable: a session without our metadata will
                        // never gain it.
                        error!("Top-up checkout {} missing metadata", session.id);
                    }
                    // Subscription-mode checkouts are handled by the
                    // subscription lifecycle events.
                    None => {}
                }
            }
            Ok(())
        }
        EventType::InvoicePaid => {
            if let EventObject::Invoice(invoice) = event.data.object
                && let Some(subscription) = invoice.subscription.as_ref()
            {
                let subscription_id = match subscription {
                    Expandable::Id(id) => id.to_string(),
                    Expandable::Object(obj) => obj.id.to_string(),
                };
                billing
                    .apply_invoice_renewal(
                        &subscription_id,
                        period_from_timestamp(invoice.period_start),
                        period_from_timestamp(invoice.period_end),
                    )
                    .await?;
            }
            Ok(())
        }
        _ => {
            info!("Unhandled event type: {:?}", event.type_);
            Ok(())
        }
    }
}

fn customer_ref_id(customer: &Expandable<Customer>) -> String {
    match customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(obj) => obj.id.to_string(),
    }
}

/// Top-up credit carried by a completed checkout session, if any: the
/// session must be a one-time payment and its metadata must name both the
/// account and a positive pack size. Anything else credits nothing.
fn topup_credit_from_session(
    mode: CheckoutSessionMode,
    metadata: Option<&stripe::Metadata>,
) -> Option<(Uuid, i64)> {
    if mode != CheckoutSessionMode::Payment {
        return None;
    }
    let metadata = metadata?;
    let account_id = metadata.get("account_id")?.parse::<Uuid>().ok()?;
    let emails = metadata.get("topup_emails")?.parse::<i64>().ok()?;
    (emails > 0).then_some((account_id, emails))
}

pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> stripe::Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_subscription_mode_session_credits_nothing() {
        let account_id = Uuid::new_v4().to_string();
        let meta = metadata(&[("account_id", &account_id), ("topup_emails", "500")]);
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Subscription, Some(&meta)),
            None
        );
    }

    #[test]
    fn test_payment_session_with_metadata_credits_the_pack() {
        let account_id = Uuid::new_v4();
        let id_string = account_id.to_string();
        let meta = metadata(&[("account_id", &id_string), ("topup_emails", "500")]);
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Payment, Some(&meta)),
            Some((account_id, 500))
        );
    }

    #[test]
    fn test_payment_session_missing_metadata_credits_nothing() {
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Payment, None),
            None
        );

        let only_account = metadata(&[("account_id", &Uuid::new_v4().to_string())]);
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Payment, Some(&only_account)),
            None
        );

        let only_pack = metadata(&[("topup_emails", "250")]);
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Payment, Some(&only_pack)),
            None
        );

        let garbage = metadata(&[("account_id", "not-a-uuid"), ("topup_emails", "250")]);
        assert_eq!(
            topup_credit_from_session(CheckoutSessionMode::Payment, Some(&garbage)),
            None
        );
    }
}
