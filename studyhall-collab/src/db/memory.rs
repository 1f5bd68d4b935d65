//! An in-memory [Database] used by the unit tests, so service invariants can
//! be exercised without a running postgres instance.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{
    AccountData, Database, DatabaseError, MessageData, NewAccount, NewMessage, NewRoom,
    NewRoomMember, NewSession, NewUser, PrimaryKey, Result, RoomData, RoomMemberData, SessionData,
    UpdatedAccountTokens, UpdatedUser, UserData,
};

#[derive(Default)]
struct MemoryState {
    next_id: PrimaryKey,
    users: Vec<UserData>,
    accounts: Vec<AccountData>,
    sessions: Vec<(SessionData, PrimaryKey)>,
    rooms: Vec<(PrimaryKey, String, PrimaryKey)>,
    members: Vec<(PrimaryKey, PrimaryKey, PrimaryKey, bool)>,
    messages: Vec<MessageData>,
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn room(&self, room_id: PrimaryKey) -> Result<RoomData> {
        let (id, name, created_by) = self
            .rooms
            .iter()
            .find(|(id, _, _)| *id == room_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })?;

        let members = self
            .members
            .iter()
            .filter(|(_, r, _, _)| *r == room_id)
            .map(|(id, _, user_id, owner)| {
                Ok(RoomMemberData {
                    id: *id,
                    owner: *owner,
                    user: self.user(*user_id)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RoomData {
            id,
            name,
            created_by,
            members,
        })
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.state.lock().user(user_id)
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "username",
            })
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();
        let user = UserData {
            id: state.next_id(),
            username: new_user.username,
            display_name: new_user.display_name,
            email: new_user.email,
            avatar_url: new_user.avatar_url,
        };

        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let mut state = self.state.lock();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == updated_user.id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        if let Some(display_name) = updated_user.display_name {
            user.display_name = display_name;
        }
        if let Some(avatar_url) = updated_user.avatar_url {
            user.avatar_url = Some(avatar_url);
        }

        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.user(user_id)?;

        state.users.retain(|u| u.id != user_id);
        state.accounts.retain(|a| a.user_id != user_id);
        state.sessions.retain(|(_, owner)| *owner != user_id);

        // Cascade owned rooms, then dangling memberships and messages
        let owned: Vec<_> = state
            .rooms
            .iter()
            .filter(|(_, _, created_by)| *created_by == user_id)
            .map(|(id, _, _)| *id)
            .collect();

        state.rooms.retain(|(_, _, created_by)| *created_by != user_id);
        state
            .members
            .retain(|(_, room_id, uid, _)| *uid != user_id && !owned.contains(room_id));
        state
            .messages
            .retain(|m| m.user.id != user_id && !owned.contains(&m.room_id));

        Ok(())
    }

    async fn account_by_provider_identity(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<AccountData> {
        self.state
            .lock()
            .accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_account_id == provider_account_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "account",
                identifier: "provider identity",
            })
    }

    async fn account_for_user(&self, user_id: PrimaryKey, provider: &str) -> Result<AccountData> {
        self.state
            .lock()
            .accounts
            .iter()
            .find(|a| a.user_id == user_id && a.provider == provider)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "account",
                identifier: "user:provider",
            })
    }

    async fn create_account(&self, new_account: NewAccount) -> Result<AccountData> {
        let mut state = self.state.lock();

        if state.accounts.iter().any(|a| {
            a.provider == new_account.provider
                && a.provider_account_id == new_account.provider_account_id
        }) {
            return Err(DatabaseError::Conflict {
                resource: "account",
                field: "provider identity",
                value: format!(
                    "{}:{}",
                    new_account.provider, new_account.provider_account_id
                ),
            });
        }

        let account = AccountData {
            id: state.next_id(),
            user_id: new_account.user_id,
            provider: new_account.provider,
            provider_account_id: new_account.provider_account_id,
            access_token: new_account.access_token,
            refresh_token: new_account.refresh_token,
            scope: new_account.scope,
            expires_at: new_account.expires_at,
        };

        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn update_account_tokens(&self, updated: UpdatedAccountTokens) -> Result<AccountData> {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .iter_mut()
            .find(|a| a.id == updated.id)
            .ok_or(DatabaseError::NotFound {
                resource: "account",
                identifier: "id",
            })?;

        account.access_token = updated.access_token;
        if updated.refresh_token.is_some() {
            account.refresh_token = updated.refresh_token;
        }
        account.scope = updated.scope;
        account.expires_at = updated.expires_at;

        Ok(account.clone())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|(s, _)| s.token == token)
            .map(|(s, _)| s.clone())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let mut state = self.state.lock();
        let user = state.user(new_session.user_id)?;

        let session = SessionData {
            id: state.next_id(),
            token: new_session.token,
            expires_at: new_session.expires_at,
            user,
        };

        state.sessions.push((session.clone(), new_session.user_id));
        Ok(session)
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.sessions.len();
        state.sessions.retain(|(s, _)| s.token != token);

        if state.sessions.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|(s, _)| s.expires_at > now);
        Ok(())
    }

    async fn room_by_id(&self, room_id: PrimaryKey) -> Result<RoomData> {
        self.state.lock().room(room_id)
    }

    async fn rooms_for_user(&self, user_id: PrimaryKey) -> Result<Vec<RoomData>> {
        let ids: Vec<_> = {
            let state = self.state.lock();
            state
                .rooms
                .iter()
                .filter(|(id, _, created_by)| {
                    *created_by == user_id
                        || state
                            .members
                            .iter()
                            .any(|(_, room_id, uid, _)| room_id == id && *uid == user_id)
                })
                .map(|(id, _, _)| *id)
                .collect()
        };

        let mut rooms = Vec::new();
        for id in ids {
            rooms.push(self.state.lock().room(id)?);
        }

        Ok(rooms)
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let room_id = {
            let mut state = self.state.lock();
            state.user(new_room.created_by)?;

            let room_id = state.next_id();
            state
                .rooms
                .push((room_id, new_room.name, new_room.created_by));

            let member_id = state.next_id();
            state
                .members
                .push((member_id, room_id, new_room.created_by, true));

            room_id
        };

        self.room_by_id(room_id).await
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.room(room_id)?;

        state.rooms.retain(|(id, _, _)| *id != room_id);
        state.members.retain(|(_, r, _, _)| *r != room_id);
        state.messages.retain(|m| m.room_id != room_id);

        Ok(())
    }

    async fn create_room_member(&self, new_member: NewRoomMember) -> Result<RoomMemberData> {
        let mut state = self.state.lock();

        if state
            .members
            .iter()
            .any(|(_, r, u, _)| *r == new_member.room_id && *u == new_member.user_id)
        {
            return Err(DatabaseError::Conflict {
                resource: "room member",
                field: "user:room",
                value: format!("{}:{}", new_member.user_id, new_member.room_id),
            });
        }

        let user = state.user(new_member.user_id)?;
        let id = state.next_id();
        state.members.push((
            id,
            new_member.room_id,
            new_member.user_id,
            new_member.owner,
        ));

        Ok(RoomMemberData {
            id,
            owner: new_member.owner,
            user,
        })
    }

    async fn delete_room_member(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.members.len();
        state
            .members
            .retain(|(_, r, u, _)| !(*r == room_id && *u == user_id));

        if state.members.len() == before {
            return Err(DatabaseError::NotFound {
                resource: "room member",
                identifier: "room_id:user_id",
            });
        }

        Ok(())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let mut state = self.state.lock();
        let user = state.user(new_message.user_id)?;

        let message = MessageData {
            id: state.next_id(),
            room_id: new_message.room_id,
            content: new_message.content,
            created_at: Utc::now(),
            user,
        };

        state.messages.push(message.clone());
        Ok(message)
    }

    async fn messages_for_room(&self, room_id: PrimaryKey, limit: i64) -> Result<Vec<MessageData>> {
        let state = self.state.lock();
        let mut messages: Vec<_> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();

        // Ids are monotonic, so they break created_at ties deterministically
        messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        messages.truncate(limit as usize);

        Ok(messages)
    }
}
