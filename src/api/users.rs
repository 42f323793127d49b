use crate::{
    database::Repositories,
    models::{ApiResponse, UserRequest},
    services::{
        query::{ListParams, SelectParams},
        user_service,
    },
    utils::ApiError,
};
use actix_web::{delete, get, post, put, web, HttpResponse};

/// GET /users - Lista usuários (sem limite padrão)
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(ListParams),
    responses(
        (status = 200, description = "Matching users, or their number when count=true", body = ApiResponse),
        (status = 400, description = "Malformed query parameter", body = ApiResponse)
    )
)]
#[get("")]
pub async fn get_users(
    repos: web::Data<Repositories>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse, ApiError> {
    let data = user_service::list_users(&repos, &params).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", data)))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body = UserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse),
        (status = 400, description = "Missing field or duplicate email", body = ApiResponse)
    )
)]
#[post("")]
pub async fn create_user(
    repos: web::Data<Repositories>,
    body: web::Json<UserRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = user_service::create_user(&repos, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::new("User created", super::to_json(&user)?)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id"), SelectParams),
    responses(
        (status = 200, description = "User", body = ApiResponse),
        (status = 404, description = "User not found", body = ApiResponse)
    )
)]
#[get("/{id}")]
pub async fn get_user(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
    params: web::Query<SelectParams>,
) -> Result<HttpResponse, ApiError> {
    let data = user_service::get_user(&repos, &path.into_inner(), params.select.as_deref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", data)))
}

/// PUT /users/{id} - Atualiza usuário; pendingTasks reatribui as tasks
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    request_body = UserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse),
        (status = 400, description = "Invalid field, duplicate email or invalid pendingTasks", body = ApiResponse),
        (status = 404, description = "User not found", body = ApiResponse)
    )
)]
#[put("/{id}")]
pub async fn update_user(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
    body: web::Json<UserRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = user_service::update_user(&repos, &path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("User updated", super::to_json(&user)?)))
}

/// DELETE /users/{id} - Remove usuário e desatribui suas tasks
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = ApiResponse),
        (status = 404, description = "User not found", body = ApiResponse)
    )
)]
#[delete("/{id}")]
pub async fn delete_user(
    repos: web::Data<Repositories>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    user_service::delete_user(&repos, &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::empty("User deleted")))
}
