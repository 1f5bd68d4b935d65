use crossbeam::channel::{Receiver, Sender};

use crate::{MessageData, PrimaryKey, RoomData, RoomMemberData};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted by the collab system
#[derive(Debug)]
pub enum CollabEvent {
    /// A room was created
    RoomCreated { room_id: PrimaryKey, name: String },
    /// A room was deleted by its owner
    RoomDeleted { room_id: PrimaryKey },
    /// User became a member of a room
    UserJoined {
        room_id: PrimaryKey,
        new_member: RoomMemberData,
    },
    /// User left a room, or was removed by the owner
    UserLeft {
        room_id: PrimaryKey,
        user_id: PrimaryKey,
    },
    /// A message was appended to a room's chat
    MessageSent {
        room_id: PrimaryKey,
        message_id: PrimaryKey,
    },
}

impl CollabEvent {
    pub fn joined(room: &RoomData, new_member: RoomMemberData) -> Self {
        Self::UserJoined {
            room_id: room.id,
            new_member,
        }
    }

    pub fn message_sent(message: &MessageData) -> Self {
        Self::MessageSent {
            room_id: message.room_id,
            message_id: message.id,
        }
    }
}
