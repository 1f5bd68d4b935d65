mod auth;
mod context;
mod docs;
mod errors;
mod rooms;
mod schedule;
mod schemas;
mod serialized;
mod users;

pub mod config;
pub mod logging;

use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    thread,
};

use axum::routing::get;
use log::info;
use studyhall_collab::{Collab, CollabEvent, EventReceiver};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
pub use crate::context::ServerContext;

pub type Router = axum::Router<ServerContext>;

/// Starts the studyhall server
pub async fn run_server(config: Config, collab: Collab) {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let collab = Arc::new(collab);
    run_event_logger(collab.events());

    let context = ServerContext { collab };

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/rooms", rooms::router())
        .nest("/schedule", schedule::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}", config.port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server is running")
}

/// Drains collab events into the log
fn run_event_logger(events: EventReceiver) {
    thread::spawn(move || {
        while let Ok(event) = events.recv() {
            match event {
                CollabEvent::RoomCreated { room_id, name } => {
                    info!("Room {name} ({room_id}) created")
                }
                CollabEvent::RoomDeleted { room_id } => info!("Room {room_id} deleted"),
                CollabEvent::UserJoined {
                    room_id,
                    new_member,
                } => info!(
                    "User {} joined room {room_id}",
                    new_member.user.display_name
                ),
                CollabEvent::UserLeft { room_id, user_id } => {
                    info!("User {user_id} left room {room_id}")
                }
                CollabEvent::MessageSent { room_id, .. } => {
                    log::debug!("Message appended to room {room_id}")
                }
            }
        }
    });
}
