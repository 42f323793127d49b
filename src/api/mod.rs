pub mod health;
pub mod metrics;
pub mod swagger;
pub mod tasks;
pub mod users;

use crate::{
    database::StoreError,
    models::ApiResponse,
    utils::{model_to_json, ApiResult},
};
use actix_web::{error::InternalError, web, HttpResponse};
use serde::Serialize;
use serde_json::Value;

/// Registers every resource route. Shared by `main` and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check))
        .route("/metrics", web::get().to(metrics::get_metrics))
        .service(
            web::scope("/tasks")
                .service(tasks::get_tasks)
                .service(tasks::create_task)
                .service(tasks::get_task)
                .service(tasks::update_task)
                .service(tasks::delete_task),
        )
        .service(
            web::scope("/users")
                .service(users::get_users)
                .service(users::create_user)
                .service(users::get_user)
                .service(users::update_user)
                .service(users::delete_user),
        );
}

/// Malformed request bodies get the same 400 envelope as validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {}", err);
        InternalError::from_response(err, HttpResponse::BadRequest().json(ApiResponse::empty(message)))
            .into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid query string: {}", err);
        InternalError::from_response(err, HttpResponse::BadRequest().json(ApiResponse::empty(message)))
            .into()
    })
}

fn to_json<T: Serialize>(model: &T) -> ApiResult<Value> {
    model_to_json(model).map_err(|e| StoreError::from(e).into())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{config::AppConfig, database::memory::InMemoryStore, database::Repositories};
    use actix_web::{
        body::MessageBody,
        dev::{ServiceFactory, ServiceRequest, ServiceResponse},
        web, App,
    };
    use std::sync::Arc;

    pub fn repositories() -> Repositories {
        Repositories::new(Arc::new(InMemoryStore::new()))
    }

    pub fn app(
        repos: Repositories,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let config = AppConfig::from_lookup(|name| match name {
            "DATABASE_URL" => Some("mongodb://localhost:27017/task_service_test".to_string()),
            _ => None,
        })
        .unwrap();

        App::new()
            .app_data(web::Data::new(repos))
            .app_data(web::Data::new(config))
            .app_data(super::json_config())
            .app_data(super::query_config())
            .configure(super::configure)
    }
}
