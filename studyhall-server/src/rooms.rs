use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use studyhall_collab::MemberTarget;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{AddMemberSchema, NewMessageSchema, NewRoomSchema, ValidatedJson},
    serialized::{Message, Room, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Room>)
    )
)]
async fn list_rooms(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<Room>>> {
    let rooms = context
        .collab
        .rooms
        .rooms_for_user(session.user().id)
        .await?;

    Ok(Json(rooms.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .create_room(session.user().id, &body.name)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .room_for_member(session.user().id, room_id)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "The deleted room")
    )
)]
async fn delete_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .delete_room(session.user().id, room_id)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/join",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn join_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .join_room(session.user().id, room_id)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/members",
    tag = "rooms",
    request_body = AddMemberSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn add_member(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<AddMemberSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .add_member(session.user().id, room_id, &body.username)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}/members/{target}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "Target may be a user id or \"self\"")
    )
)]
async fn remove_member(
    session: Session,
    State(context): State<ServerContext>,
    Path((room_id, target)): Path<(i32, String)>,
) -> ServerResult<Json<Room>> {
    let target = if target == "self" {
        MemberTarget::Own
    } else {
        let user_id = target.parse().map_err(|_| {
            ServerError::Validation("Member target must be a user id or \"self\"".to_string())
        })?;

        MemberTarget::User(user_id)
    };

    let room = context
        .collab
        .rooms
        .remove_member(session.user().id, room_id, target)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/messages",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Message>, description = "The newest 100 messages, newest first")
    )
)]
async fn messages(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<Vec<Message>>> {
    let messages = context
        .collab
        .chat
        .messages(session.user().id, room_id)
        .await?;

    Ok(Json(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{id}/messages",
    tag = "rooms",
    request_body = NewMessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn send_message(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<NewMessageSchema>,
) -> ServerResult<Json<Message>> {
    let message = context
        .collab
        .chat
        .send_message(session.user().id, room_id, &body.content)
        .await?;

    Ok(Json(message.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/:id", get(room).delete(delete_room))
        .route("/:id/join", post(join_room))
        .route("/:id/members", post(add_member))
        .route("/:id/members/:target", delete(remove_member))
        .route("/:id/messages", get(messages).post(send_message))
}
