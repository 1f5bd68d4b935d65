mod auth;
mod chat;
mod db;
mod events;
mod rooms;
mod schedule;
mod util;

use std::sync::Arc;

use crossbeam::channel::unbounded;

pub use auth::*;
pub use chat::*;
pub use db::*;
pub use events::*;
pub use rooms::*;
pub use schedule::*;

/// The studyhall collab system, facilitating room management, chat,
/// authentication, and the schedule feed.
pub struct Collab {
    pub auth: Auth,
    pub rooms: RoomManager,
    pub chat: Chat,
    pub schedule: Schedule,

    context: CollabContext,
}

/// A type passed to various components of the collab system, to access state
/// and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: Arc<dyn Database>,

    events: EventSender,
    receiver: EventReceiver,
}

impl CollabContext {
    pub fn new(database: Arc<dyn Database>) -> Self {
        let (events, receiver) = unbounded();

        Self {
            database,
            events,
            receiver,
        }
    }

    pub fn emit(&self, event: CollabEvent) {
        self.events.send(event).ok();
    }
}

impl Collab {
    pub fn new<Db>(database: Db, auth_config: AuthConfig) -> Self
    where
        Db: Database + 'static,
    {
        let database: Arc<dyn Database> = Arc::new(database);
        let context = CollabContext::new(database.clone());

        Self {
            auth: Auth::new(&database, auth_config),
            rooms: RoomManager::new(&context),
            chat: Chat::new(&context),
            schedule: Schedule::new(&database, Arc::new(GoogleRestApi::new())),
            context,
        }
    }

    /// A receiver for every event the system emits, for consumers like the
    /// server's event logger
    pub fn events(&self) -> EventReceiver {
        self.context.receiver.clone()
    }
}
