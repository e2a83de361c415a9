use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use reviewaware_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::StripeService,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::{BillingService, ShortLinkService},
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().expect("Failed to load configuration file");

    let pool = Arc::new(
        create_pool(&config.database)
            .await
            .expect("Failed to create database connection pool"),
    );

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    let stripe_service = StripeService::new(config.stripe.clone());

    let billing_service = BillingService::new(
        pool.clone(),
        stripe_service.clone(),
        config.app.base_url.clone(),
    );
    let shortlink_service = ShortLinkService::new(pool.clone());
    let app_config = config.app.clone();

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(billing_service.clone()))
            .app_data(web::Data::new(shortlink_service.clone()))
            .app_data(web::Data::new(stripe_service.clone()))
            .app_data(web::Data::new(app_config.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .configure(handlers::redirect_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::billing_config)
                    .configure(handlers::location_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
