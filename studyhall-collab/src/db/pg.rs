use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Error as SqlxError, PgPool, Row};

use super::{
    AccountData, Database, DatabaseError, DatabaseResult, IntoDatabaseError, MessageData,
    NewAccount, NewMessage, NewRoom, NewRoomMember, NewSession, NewUser, PrimaryKey, Result,
    RoomData, RoomMemberData, SessionData, UpdatedAccountTokens, UpdatedUser, UserData,
};

const USER_COLUMNS: &str = "id, username, display_name, email, avatar_url";

/// A postgres database implementation for studyhall
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn room_members(&self, room_id: PrimaryKey) -> Result<Vec<RoomMemberData>> {
        let member_rows = sqlx::query(
            "
            SELECT
                room_members.id,
                room_members.owner,
                users.id AS user_id,
                users.username,
                users.display_name,
                users.email,
                users.avatar_url
            FROM room_members
                INNER JOIN users ON room_members.user_id = users.id
            WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let members: Vec<_> = member_rows
            .into_iter()
            .map(|r| RoomMemberData {
                id: r.get("id"),
                owner: r.get("owner"),
                user: UserData {
                    id: r.get("user_id"),
                    username: r.get("username"),
                    display_name: r.get("display_name"),
                    email: r.get("email"),
                    avatar_url: r.get("avatar_url"),
                },
            })
            .collect();

        Ok(members)
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        sqlx::query_as::<_, UserData>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        sqlx::query_as::<_, UserData>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 ORDER BY id LIMIT 1"
        ))
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        sqlx::query_as::<_, UserData>(&format!(
            "INSERT INTO users (username, display_name, email, avatar_url)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.username)
        .bind(&new_user.display_name)
        .bind(&new_user.email)
        .bind(&new_user.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_id(updated_user.id).await?;

        sqlx::query("UPDATE users SET display_name = $1, avatar_url = $2 WHERE id = $3")
            .bind(updated_user.display_name.unwrap_or(user.display_name))
            .bind(updated_user.avatar_url.or(user.avatar_url))
            .bind(updated_user.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.user_by_id(updated_user.id).await
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn account_by_provider_identity(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<AccountData> {
        sqlx::query_as::<_, AccountData>(
            "SELECT * FROM accounts WHERE provider = $1 AND provider_account_id = $2",
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("account", "provider identity"))
    }

    async fn account_for_user(&self, user_id: PrimaryKey, provider: &str) -> Result<AccountData> {
        sqlx::query_as::<_, AccountData>(
            "SELECT * FROM accounts WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(provider)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("account", "user:provider"))
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<AccountData> {
        self.account_by_provider_identity(
            &new_account.provider,
            &new_account.provider_account_id,
        )
        .await
        .conflict_or_ok(
            "account",
            "provider identity",
            &format!(
                "{}:{}",
                new_account.provider, new_account.provider_account_id
            ),
        )?;

        sqlx::query_as::<_, AccountData>(
            "INSERT INTO accounts
                (user_id, provider, provider_account_id, access_token, refresh_token, scope, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(new_account.user_id)
        .bind(&new_account.provider)
        .bind(&new_account.provider_account_id)
        .bind(&new_account.access_token)
        .bind(&new_account.refresh_token)
        .bind(&new_account.scope)
        .bind(new_account.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_account_tokens(&self, updated: UpdatedAccountTokens) -> Result<AccountData> {
        sqlx::query_as::<_, AccountData>(
            "UPDATE accounts SET
                access_token = $1,
                refresh_token = COALESCE($2, refresh_token),
                scope = $3,
                expires_at = $4
             WHERE id = $5
             RETURNING *",
        )
        .bind(&updated.access_token)
        .bind(&updated.refresh_token)
        .bind(&updated.scope)
        .bind(updated.expires_at)
        .bind(updated.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("account", "id"))
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = sqlx::query(
            "SELECT
                sessions.id,
                sessions.token,
                sessions.expires_at,
                users.id AS user_id,
                users.username,
                users.display_name,
                users.email,
                users.avatar_url
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
             WHERE token = $1
            ",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        let result = SessionData {
            id: row.get("id"),
            token: row.get("token"),
            expires_at: row.get("expires_at"),
            user: UserData {
                id: row.get("user_id"),
                username: row.get("username"),
                display_name: row.get("display_name"),
                email: row.get("email"),
                avatar_url: row.get("avatar_url"),
            },
        };

        Ok(result)
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        let record = sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3) RETURNING token",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.session_by_token(record.get("token")).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        // Ensure session exists
        let _ = self.session_by_token(token).await?;

        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE timezone('UTC', now()) > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let room_row = sqlx::query("SELECT id, name, created_by FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        let members = self.room_members(room_id).await?;

        Ok(RoomData {
            id: room_row.get("id"),
            name: room_row.get("name"),
            created_by: room_row.get("created_by"),
            members,
        })
    }

    async fn rooms_for_user(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>> {
        let rows = sqlx::query(
            "SELECT DISTINCT rooms.id, rooms.name, rooms.created_by
             FROM rooms
                LEFT JOIN room_members ON room_members.room_id = rooms.id
             WHERE rooms.created_by = $1 OR room_members.user_id = $1
             ORDER BY rooms.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let mut rooms: Vec<_> = rows
            .into_iter()
            .map(|row| RoomData {
                id: row.get("id"),
                name: row.get("name"),
                created_by: row.get("created_by"),
                members: vec![],
            })
            .collect();

        for room in rooms.iter_mut() {
            room.members = self.room_members(room.id).await?
        }

        Ok(rooms)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let owner = self.user_by_id(new_room.created_by).await?;

        // The room and its owner membership edge must appear together
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room_row = sqlx::query(
            "INSERT INTO rooms (name, created_by) VALUES ($1, $2) RETURNING id",
        )
        .bind(&new_room.name)
        .bind(owner.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| e.any())?;

        let room_id: PrimaryKey = room_row.get("id");

        sqlx::query("INSERT INTO room_members (room_id, user_id, owner) VALUES ($1, $2, true)")
            .bind(room_id)
            .bind(owner.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        tx.commit().await.map_err(|e| e.any())?;

        self.room_by_id(room_id).await
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        // Ensure room exists
        let _ = self.room_by_id(room_id).await?;

        sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_room_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        // Ensure the user isn't a member of this room already
        sqlx::query("SELECT id FROM room_members WHERE user_id = $1 AND room_id = $2")
            .bind(new_member.user_id)
            .bind(new_member.room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("", ""))
            .conflict_or_ok(
                "room member",
                "user:room",
                format!("{}:{}", new_member.user_id, new_member.room_id).as_str(),
            )?;

        let user = self.user_by_id(new_member.user_id).await?;

        let row = sqlx::query(
            "INSERT INTO room_members (room_id, user_id, owner) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(new_member.room_id)
        .bind(new_member.user_id)
        .bind(new_member.owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(RoomMemberData {
            id: row.get("id"),
            owner: new_member.owner,
            user,
        })
    }

    async fn delete_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let member = sqlx::query("SELECT id FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room member", "room_id:user_id"))?;

        sqlx::query("DELETE FROM room_members WHERE id = $1")
            .bind(member.get::<PrimaryKey, _>("id"))
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let user = self.user_by_id(new_message.user_id).await?;

        let row = sqlx::query(
            "INSERT INTO messages (room_id, user_id, content)
             VALUES ($1, $2, $3)
             RETURNING id, room_id, content, created_at",
        )
        .bind(new_message.room_id)
        .bind(new_message.user_id)
        .bind(&new_message.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(MessageData {
            id: row.get("id"),
            room_id: row.get("room_id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            user,
        })
    }

    async fn messages_for_room(&self, room_id: PrimaryKey, limit: i64) -> Result<Vec<MessageData>> {
        let rows = sqlx::query(
            "SELECT
                messages.id,
                messages.room_id,
                messages.content,
                messages.created_at,
                users.id AS user_id,
                users.username,
                users.display_name,
                users.email,
                users.avatar_url
            FROM messages
                INNER JOIN users ON messages.user_id = users.id
            WHERE room_id = $1
            ORDER BY messages.created_at DESC, messages.id DESC
            LIMIT $2",
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let messages = rows
            .into_iter()
            .map(|row| MessageData {
                id: row.get("id"),
                room_id: row.get("room_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
                user: UserData {
                    id: row.get("user_id"),
                    username: row.get("username"),
                    display_name: row.get("display_name"),
                    email: row.get("email"),
                    avatar_url: row.get("avatar_url"),
                },
            })
            .collect();

        Ok(messages)
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
