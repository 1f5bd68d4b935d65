use thiserror::Error;

use crate::{
    events::CollabEvent, rooms::is_member, CollabContext, DatabaseError, MessageData, NewMessage,
    PrimaryKey,
};

/// How many messages a single history read returns
pub const MESSAGE_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message content cannot be empty")]
    EmptyContent,
    #[error("You must be a member of this room to use its chat")]
    NotAMember,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The append-only message log of a room. Clients poll [Chat::messages] on an
/// interval; there is no push delivery.
pub struct Chat {
    context: CollabContext,
}

impl Chat {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Appends a message to the room's log. Membership is re-checked on
    /// every call.
    pub async fn send_message(
        &self,
        user_id: PrimaryKey,
        room_id: PrimaryKey,
        content: &str,
    ) -> Result<MessageData, ChatError> {
        let content = content.trim();

        if content.is_empty() {
            return Err(ChatError::EmptyContent);
        }

        let room = self.context.database.room_by_id(room_id).await?;

        if !is_member(&room, user_id) {
            return Err(ChatError::NotAMember);
        }

        let message = self
            .context
            .database
            .create_message(NewMessage {
                room_id,
                user_id,
                content: content.to_string(),
            })
            .await?;

        self.context.emit(CollabEvent::message_sent(&message));
        Ok(message)
    }

    /// The newest 100 messages of the room, newest first. Reading history
    /// requires membership, same as writing to it.
    pub async fn messages(
        &self,
        user_id: PrimaryKey,
        room_id: PrimaryKey,
    ) -> Result<Vec<MessageData>, ChatError> {
        let room = self.context.database.room_by_id(room_id).await?;

        if !is_member(&room, user_id) {
            return Err(ChatError::NotAMember);
        }

        Ok(self
            .context
            .database
            .messages_for_room(room_id, MESSAGE_HISTORY_LIMIT)
            .await?)
    }
}
