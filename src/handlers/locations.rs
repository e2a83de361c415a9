use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::*;
use crate::services::ShortLinkService;
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
    post,
    path = "/locations",
    tag = "locations",
    request_body = CreateLocationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Location created with its short link", body = LocationResponse),
        (status = 400, description = "Validation failed or location already configured"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn create_location(
    shortlink_service: web::Data<ShortLinkService>,
    app_config: web::Data<AppConfig>,
    req: HttpRequest,
    request: web::Json<CreateLocationRequest>,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match shortlink_service
        .create_location(account_id, request.into_inner())
        .await
    {
        Ok(location) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LocationResponse::from_model(location, &app_config.base_url)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/locations",
    tag = "locations",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "The account's location", body = LocationResponse),
        (status = 404, description = "No location configured yet"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_location(
    shortlink_service: web::Data<ShortLinkService>,
    app_config: web::Data<AppConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match shortlink_service.get_location(account_id).await {
        Ok(Some(location)) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LocationResponse::from_model(location, &app_config.base_url)
        }))),
        Ok(None) => {
            Ok(AppError::NotFound("Location not found".to_string()).error_response())
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/locations",
    tag = "locations",
    request_body = UpdateLocationRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Location updated", body = LocationResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "No location configured yet"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn update_location(
    shortlink_service: web::Data<ShortLinkService>,
    app_config: web::Data<AppConfig>,
    req: HttpRequest,
    request: web::Json<UpdateLocationRequest>,
) -> Result<HttpResponse> {
    let Some(account_id) = account_id_from_request(&req) else {
        return Ok(unauthorized());
    };

    match shortlink_service
        .update_location(account_id, request.into_inner())
        .await
    {
        Ok(location) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": LocationResponse::from_model(location, &app_config.base_url)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn location_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/locations")
            .route("", web::post().to(create_location))
            .route("", web::get().to(get_location))
            .route("", web::put().to(update_location)),
    );
}
