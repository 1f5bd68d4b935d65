use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A studyhall account holder
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserData {
    pub id: PrimaryKey,
    /// The name used to resolve mentions and member additions
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// A linked external OAuth identity, keyed by (provider, provider_account_id)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A studyhall room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    pub name: String,
    /// The owner of the room. Immutable after creation.
    pub created_by: PrimaryKey,
    pub members: Vec<RoomMemberData>,
}

/// A member of a room
#[derive(Debug, Clone)]
pub struct RoomMemberData {
    pub id: PrimaryKey,
    /// If this is true, the member has full control over the room
    pub owner: bool,
    pub user: UserData,
}

/// A chat message, scoped to a room. Append-only.
#[derive(Debug, Clone)]
pub struct MessageData {
    pub id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The sending user
    pub user: UserData,
}

#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug)]
pub struct UpdatedUser {
    pub id: PrimaryKey,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug)]
pub struct NewAccount {
    pub user_id: PrimaryKey,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Fresh tokens for an existing account, written when the same identity
/// signs in again (possibly with a broader scope grant)
#[derive(Debug)]
pub struct UpdatedAccountTokens {
    pub id: PrimaryKey,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewRoom {
    pub name: String,
    /// The owner of the new room
    pub created_by: PrimaryKey,
}

#[derive(Debug)]
pub struct NewRoomMember {
    pub user_id: PrimaryKey,
    pub room_id: PrimaryKey,
    pub owner: bool,
}

#[derive(Debug)]
pub struct NewMessage {
    pub room_id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub content: String,
}
