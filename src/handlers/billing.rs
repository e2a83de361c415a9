use crate::error::AppError;
use crate::models::*;
use crate::services::BillingService;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

fn account_id_from_request(req: &HttpRequest) -> Option<Uuid> {
    req.extensions().get::<Uuid>().copied()
}

fn unauthorized() -> HttpResponse {
    AppError::AuthError("Missing account identity".to_string()).error_response()
}

#[utoipa::path(
    get,
    path = "/billing/eligibility",
    tag = "billing",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Eligibility gate result", body = BillingStatus),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_eligibility(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match billing_service.check_send_eligibility(account_id).await {
        Ok(status) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": status
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/billing/checkout",
    tag = "billing",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Subscription checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Already subscribed"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_checkout(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match billing_service.create_subscription_checkout(account_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/billing/topup",
    tag = "billing",
    request_body = TopUpRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Top-up checkout session created", body = CheckoutSessionResponse),
        (status = 400, description = "Invalid pack or unmet precondition"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_topup(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
    request: web::Json<TopUpRequest>,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match billing_service
        .purchase_topup(account_id, request.into_inner().emails)
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/billing/portal",
    tag = "billing",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Billing portal session created", body = PortalSessionResponse),
        (status = 400, description = "No payment customer on file"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_portal(
    billing_service: web::Data<BillingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match billing_service.create_portal_session(account_id).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn billing_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/billing")
            .route("/eligibility", web::get().to(get_eligibility))
            .route("/checkout", web::post().to(create_checkout))
            .route("/topup", web::post().to(create_topup))
            .route("/portal", web::post().to(create_portal)),
    );
}
