use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::billing::get_eligibility,
        handlers::billing::create_checkout,
        handlers::billing::create_topup,
        handlers::billing::create_portal,
        handlers::locations::create_location,
        handlers::locations::get_location,
        handlers::locations::update_location,
    ),
    components(
        schemas(
            BillingStatus,
            TopUpRequest,
            CheckoutSessionResponse,
            PortalSessionResponse,
            CreateLocationRequest,
            UpdateLocationRequest,
            LocationResponse,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "billing", description = "Subscription, quota and top-up API"),
        (name = "locations", description = "Location and short link management API"),
    ),
    info(
        title = "ReviewAware Backend API",
        version = "1.0.0",
        description = "ReviewAware Backend REST API documentation",
        contact(
            name = "API Support",
            email = "support@reviewaware.app"
        )
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
