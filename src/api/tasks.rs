use crate::{
    config::AppConfig,
    database::Repositories,
    models::{ApiResponse, TaskRequest},
    services::{
        query::{ListParams, SelectParams},
        task_service,
    },
    utils::ApiError,
};
use actix_web::{delete, get, post, put, web, HttpResponse};

/// GET /tasks - Lista tasks (where/sort/select/skip/limit/count)
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "Tasks",
    params(ListParams),
    responses(
        (status = 200, description = "Matching tasks, or their number when count=true", body = ApiResponse),
        (status = 400, description = "Malformed query parameter", body = ApiResponse)
    )
)]
#[get("")]
pub async fn get_tasks(
    repos: web::Data<Repositories>,
    config: web::Data<AppConfig>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse, ApiError> {
    let data = task_service::list_tasks(&repos, &params, config.tasks_default_limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", data)))
}

/// POST /tasks - Cria task e a adiciona em pendingTasks do usuário
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "Tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task created", body = ApiResponse),
        (status = 400, description = "Missing field or invalid assignment", body = ApiResponse)
    )
)]
#[post("")]
pub async fn create_task(
    repos: web::Data<Repositories>,
    body: web::Json<TaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let task = task_service::create_task(&repos, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new("Task created", super::to_json(&task)?)))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task id"), SelectParams),
    responses(
        (status = 200, description = "Task", body = ApiResponse),
        (status = 404, description = "Task not found", body = ApiResponse)
    )
)]
#[get("/{id}")]
pub async fn get_task(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
    params: web::Query<SelectParams>,
) -> Result<HttpResponse, ApiError> {
    let data = task_service::get_task(&repos, &path.into_inner(), params.select.as_deref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", data)))
}

/// PUT /tasks/{id} - Atualiza task e move entre listas pendingTasks
#[utoipa::path(
    put,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task id")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated", body = ApiResponse),
        (status = 400, description = "Invalid field or assignment", body = ApiResponse),
        (status = 404, description = "Task not found", body = ApiResponse)
    )
)]
#[put("/{id}")]
pub async fn update_task(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
    body: web::Json<TaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let task = task_service::update_task(&repos, &path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Task updated", super::to_json(&task)?)))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "Tasks",
    params(("id" = String, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ApiResponse)
    )
)]
#[delete("/{id}")]
pub async fn delete_task(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    task_service::delete_task(&repos, &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
