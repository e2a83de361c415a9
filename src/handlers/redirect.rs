use crate::error::AppError;
use crate::services::ShortLinkService;
use actix_web::{HttpResponse, Result, http::header, web};
use log::error;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub src: Option<String>,
}

/// Public short-link resolver. Successful lookups answer with a 302 so the
/// destination can be changed later without stale caches; misses and
/// misconfigured rows both look like a plain 404 to the visitor.
pub async fn resolve_short_link(
    shortlink_service: web::Data<ShortLinkService>,
    path: web::Path<String>,
    query: web::Query<RedirectQuery>,
) -> Result<HttpResponse> {
    let code = path.into_inner();

    match shortlink_service
        .resolve(&code, query.into_inner().src)
        .await
    {
        Ok(destination) => Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, destination))
            .finish()),
        Err(AppError::NotFound(_)) => Ok(HttpResponse::NotFound()
            .content_type("text/plain; charset=utf-8")
            .body("Link not found")),
        Err(e) => {
            error!("Short link resolution failed for {code}: {e}");
            Ok(HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body("Something went wrong"))
        }
    }
}

pub fn redirect_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/r").route("/{code}", web::get().to(resolve_short_link)));
}
