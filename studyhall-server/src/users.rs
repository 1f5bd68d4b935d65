use axum::{
    extract::{Path, State},
    routing::patch,
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{UpdateNameSchema, ValidatedJson},
    serialized::{ToSerialized, User},
    Router,
};

#[utoipa::path(
    patch,
    path = "/v1/users/{id}",
    tag = "users",
    request_body = UpdateNameSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn update_name(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<UpdateNameSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .collab
        .auth
        .update_name(session.user().id, user_id, &body.name)
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User, description = "The deleted user")
    )
)]
async fn delete_account(
    session: Session,
    State(context): State<ServerContext>,
    Path(user_id): Path<i32>,
) -> ServerResult<Json<User>> {
    let user = session.user();

    context
        .collab
        .auth
        .delete_account(user.id, user_id)
        .await?;

    Ok(Json(user.to_serialized()))
}

pub fn router() -> Router {
    Router::new().route("/:id", patch(update_name).delete(delete_account))
}
