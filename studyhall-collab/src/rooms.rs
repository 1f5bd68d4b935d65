use log::info;
use thiserror::Error;

use crate::{
    events::CollabEvent, CollabContext, DatabaseError, NewRoom, NewRoomMember, PrimaryKey,
    RoomData,
};

pub type RoomId = PrimaryKey;

/// The target of a member removal. The "self" sentinel resolves to the
/// requester before any ownership check runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemberTarget {
    Own,
    User(PrimaryKey),
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room name cannot be empty")]
    EmptyName,
    #[error("Only the room owner can {0}")]
    OwnerOnly(&'static str),
    #[error("You are not a member of this room")]
    NotAMember,
    #[error("The room owner cannot be removed")]
    OwnerImmovable,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// Facilitates room lifecycle and membership changes. Every mutating
/// operation re-derives permission from the current room state, never from
/// anything cached on the session.
pub struct RoomManager {
    context: CollabContext,
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a new room. The creator becomes the owner, and is a member
    /// from the moment the room exists.
    pub async fn create_room(
        &self,
        owner_id: PrimaryKey,
        name: &str,
    ) -> Result<RoomData, RoomError> {
        let name = name.trim();

        if name.is_empty() {
            return Err(RoomError::EmptyName);
        }

        let room = self
            .context
            .database
            .create_room(NewRoom {
                name: name.to_string(),
                created_by: owner_id,
            })
            .await?;

        info!("Room {} created by user {}", room.name, owner_id);

        self.context.emit(CollabEvent::RoomCreated {
            room_id: room.id,
            name: room.name.clone(),
        });

        Ok(room)
    }

    /// Adds the user to the room. Joining a room the user already belongs to
    /// returns the room unchanged.
    pub async fn join_room(&self, user_id: PrimaryKey, room_id: RoomId) -> Result<RoomData, RoomError> {
        let room = self.context.database.room_by_id(room_id).await?;

        if is_member(&room, user_id) {
            return Ok(room);
        }

        let new_member = self
            .context
            .database
            .create_room_member(NewRoomMember {
                user_id,
                room_id,
                owner: false,
            })
            .await?;

        self.context.emit(CollabEvent::joined(&room, new_member));
        Ok(self.context.database.room_by_id(room_id).await?)
    }

    /// Adds a user to the room by username. Owner-only.
    pub async fn add_member(
        &self,
        requester_id: PrimaryKey,
        room_id: RoomId,
        username: &str,
    ) -> Result<RoomData, RoomError> {
        let room = self.context.database.room_by_id(room_id).await?;

        if room.created_by != requester_id {
            return Err(RoomError::OwnerOnly("add members"));
        }

        let user = self.context.database.user_by_username(username).await?;

        if is_member(&room, user.id) {
            return Ok(room);
        }

        let new_member = self
            .context
            .database
            .create_room_member(NewRoomMember {
                user_id: user.id,
                room_id,
                owner: false,
            })
            .await?;

        info!(
            "User {} added to room {} by its owner",
            new_member.user.display_name, room.name
        );

        self.context.emit(CollabEvent::joined(&room, new_member));
        Ok(self.context.database.room_by_id(room_id).await?)
    }

    /// Removes a member from the room. Members may remove themselves, the
    /// owner may remove anyone else, and the owner can never be removed.
    pub async fn remove_member(
        &self,
        requester_id: PrimaryKey,
        room_id: RoomId,
        target: MemberTarget,
    ) -> Result<RoomData, RoomError> {
        let room = self.context.database.room_by_id(room_id).await?;

        let target_id = match target {
            MemberTarget::Own => requester_id,
            MemberTarget::User(id) => id,
        };

        if target_id != requester_id && room.created_by != requester_id {
            return Err(RoomError::OwnerOnly("remove other members"));
        }

        if target_id == room.created_by {
            return Err(RoomError::OwnerImmovable);
        }

        self.context
            .database
            .delete_room_member(room_id, target_id)
            .await?;

        self.context.emit(CollabEvent::UserLeft {
            room_id,
            user_id: target_id,
        });

        Ok(self.context.database.room_by_id(room_id).await?)
    }

    /// Deletes the room, its memberships, and its messages. Owner-only.
    pub async fn delete_room(
        &self,
        requester_id: PrimaryKey,
        room_id: RoomId,
    ) -> Result<RoomData, RoomError> {
        let room = self.context.database.room_by_id(room_id).await?;

        if room.created_by != requester_id {
            return Err(RoomError::OwnerOnly("delete the room"));
        }

        self.context.database.delete_room(room_id).await?;

        info!("Room {} deleted by its owner", room.name);

        self.context.emit(CollabEvent::RoomDeleted { room_id });
        Ok(room)
    }

    /// Returns the room with its members. Member-only.
    pub async fn room_for_member(
        &self,
        user_id: PrimaryKey,
        room_id: RoomId,
    ) -> Result<RoomData, RoomError> {
        let room = self.context.database.room_by_id(room_id).await?;

        if !is_member(&room, user_id) {
            return Err(RoomError::NotAMember);
        }

        Ok(room)
    }

    /// All rooms the user owns or is a member of
    pub async fn rooms_for_user(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>, RoomError> {
        Ok(self.context.database.rooms_for_user(user_id).await?)
    }
}

/// The creator counts as a member even if the membership edge were ever
/// missing, matching the ownership checks elsewhere.
pub fn is_member(room: &RoomData, user_id: PrimaryKey) -> bool {
    room.created_by == user_id || room.members.iter().any(|m| m.user.id == user_id)
}
