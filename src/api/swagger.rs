use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Task Service API",
        version = "1.0.0",
        description = "REST API for tasks and the users they are assigned to.\n\n**Consistency:** a user's `pendingTasks` always lists the incomplete tasks assigned to them. Creating, updating or deleting a task, and updating or deleting a user, keeps both sides in sync.\n\n**Queries:** list endpoints accept `where`, `sort` and `select` as JSON objects, plus `skip`, `limit` and `count=true`.\n\nEvery resource response uses the `{ message, data }` envelope.",
        contact(
            name = "Task Service Team"
        )
    ),
    paths(
        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Tasks
        crate::api::tasks::get_tasks,
        crate::api::tasks::create_task,
        crate::api::tasks::get_task,
        crate::api::tasks::update_task,
        crate::api::tasks::delete_task,

        // Users
        crate::api::users::get_users,
        crate::api::users::create_user,
        crate::api::users::get_user,
        crate::api::users::update_user,
        crate::api::users::delete_user,
    ),
    components(
        schemas(
            crate::models::ApiResponse,
            crate::models::TaskRequest,
            crate::models::UserRequest,

            // Health & Metrics
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check and request metrics for monitoring service status."),
        (name = "Tasks", description = "Task CRUD. Assignment changes are mirrored into the assignee's pendingTasks."),
        (name = "Users", description = "User CRUD. Renames and deletions propagate to assigned tasks."),
    )
)]
pub struct ApiDoc;
