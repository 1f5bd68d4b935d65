use axum::{
    extract::{Query, State},
    routing::get,
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::ScheduleQuery,
    serialized::{CalendarResponse, FeedResponse, TasksResponse, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/schedule/calendar",
    tag = "schedule",
    params(ScheduleQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CalendarResponse),
        (status = 401, description = "No linked Google account")
    )
)]
async fn calendar(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ScheduleQuery>,
) -> ServerResult<Json<CalendarResponse>> {
    let data = context
        .collab
        .schedule
        .calendar_data(session.user().id, &query.window())
        .await?;

    Ok(Json(data.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/schedule/tasks",
    tag = "schedule",
    params(ScheduleQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TasksResponse),
        (status = 401, description = "No linked Google account")
    )
)]
async fn tasks(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ScheduleQuery>,
) -> ServerResult<Json<TasksResponse>> {
    let data = context
        .collab
        .schedule
        .tasks(session.user().id, &query.window())
        .await?;

    Ok(Json(data.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/schedule/feed",
    tag = "schedule",
    params(ScheduleQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = FeedResponse, description = "Events and tasks merged, ordered by start ascending"),
        (status = 401, description = "No linked Google account")
    )
)]
async fn feed(
    session: Session,
    State(context): State<ServerContext>,
    Query(query): Query<ScheduleQuery>,
) -> ServerResult<Json<FeedResponse>> {
    let feed = context
        .collab
        .schedule
        .feed(session.user().id, &query.window())
        .await?;

    Ok(Json(feed.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/calendar", get(calendar))
        .route("/tasks", get(tasks))
        .route("/feed", get(feed))
}
