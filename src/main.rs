mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    log::info!("🚀 Starting Task Service...");

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url, config.max_pool_size)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to MongoDB: {}", e)))?;

    log::info!("✅ MongoDB connected successfully");

    let repos = database::Repositories::new(db.clone().into_store());

    log::info!("📅 Starting background jobs...");
    jobs::start_reconcile_scheduler(repos.clone(), config.reconcile_interval);
    log::info!("✅ Background jobs started");

    let bind_address = config.bind_address();
    log::info!("🌐 Server starting on {}", bind_address);
    log::info!("📚 Swagger UI available at: http://{}/swagger-ui/", bind_address);
    log::info!("📄 OpenAPI spec at: http://{}/api-docs/openapi.json", bind_address);

    let repos_data = web::Data::new(repos);
    let config_data = web::Data::new(config);

    // Start HTTP server
    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .expose_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        cors = if config_data.cors_allowed_origins.is_empty() {
            cors.allow_any_origin()
        } else {
            config_data
                .cors_allowed_origins
                .iter()
                .fold(cors, |cors, origin| cors.allowed_origin(origin))
        };

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(repos_data.clone())
            .app_data(config_data.clone())
            .app_data(api::json_config())
            .app_data(api::query_config())
            .wrap(cors)
            .wrap(middleware::RequestMetrics)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    log::info!("🛑 HTTP server stopped");
    db.shutdown().await;

    Ok(())
}
