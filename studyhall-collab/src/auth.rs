use std::{collections::HashMap, fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use log::info;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::{
    util::random_string, Database, DatabaseError, NewAccount, NewSession, NewUser, PrimaryKey,
    SessionData, UpdatedAccountTokens, UpdatedUser, UserData,
};

const DISCORD_AUTH_URL: &str = "https://discord.com/oauth2/authorize";
const DISCORD_TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const DISCORD_USER_URL: &str = "https://discord.com/api/v10/users/@me";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

type OauthClient = oauth2::Client<
    oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>,
    oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>,
    oauth2::StandardTokenIntrospectionResponse<
        oauth2::EmptyExtraTokenFields,
        oauth2::basic::BasicTokenType,
    >,
    oauth2::StandardRevocableToken,
    oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>,
    oauth2::EndpointSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointNotSet,
    oauth2::EndpointSet,
>;

/// The OAuth providers a user can sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Discord,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Google => "google",
        }
    }

    fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Discord => &["identify", "email"],
            Self::Google => &[
                "openid",
                "email",
                "profile",
                "https://www.googleapis.com/auth/calendar.readonly",
                "https://www.googleapis.com/auth/tasks.readonly",
            ],
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client credentials and redirect target for one provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub discord: Option<ProviderSettings>,
    pub google: Option<ProviderSettings>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The callback state is unknown, expired, or for another provider
    #[error("Unknown or expired login attempt")]
    UnknownLoginAttempt,
    #[error("OAuth provider {0} keys not supplied")]
    ProviderNotConfigured(&'static str),
    #[error("Code exchange failed: {0}")]
    Exchange(String),
    #[error("Profile fetch failed: {0}")]
    Profile(String),
    #[error("Display name cannot be empty")]
    EmptyName,
    #[error("You can only modify your own account")]
    NotYourAccount,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The identity a provider reports for a signed-in user
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// The provider's stable account id
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Tokens granted by the provider during a sign-in
#[derive(Debug, Clone, Default)]
pub struct ProviderTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

struct PendingLogin {
    provider: Provider,
    verifier: String,
    started_at: DateTime<Utc>,
}

/// Handles OAuth sign-in, account linking, and sessions
pub struct Auth {
    db: Arc<dyn Database>,
    http: reqwest::Client,
    discord: Option<OauthClient>,
    google: Option<OauthClient>,
    pending: Mutex<HashMap<String, PendingLogin>>,
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: usize = 7;
    const LOGIN_ATTEMPT_TTL_IN_MINUTES: usize = 10;

    pub fn new(db: &Arc<dyn Database>, config: AuthConfig) -> Self {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("http client is built");

        Self {
            db: db.clone(),
            http,
            discord: config
                .discord
                .map(|s| build_client(s, DISCORD_AUTH_URL, DISCORD_TOKEN_URL)),
            google: config
                .google
                .map(|s| build_client(s, GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL)),
            pending: Default::default(),
        }
    }

    fn client(&self, provider: Provider) -> Result<&OauthClient, AuthError> {
        match provider {
            Provider::Discord => self.discord.as_ref(),
            Provider::Google => self.google.as_ref(),
        }
        .ok_or(AuthError::ProviderNotConfigured(provider.as_str()))
    }

    /// Builds the provider's authorize URL and remembers the CSRF state and
    /// PKCE verifier until the callback comes back
    pub fn begin_login(&self, provider: Provider) -> Result<Url, AuthError> {
        let client = self.client(provider)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client.authorize_url(CsrfToken::new_random);

        for scope in provider.scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let (authorize_url, csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

        let mut pending = self.pending.lock();
        let cutoff = Utc::now() - Duration::minutes(Self::LOGIN_ATTEMPT_TTL_IN_MINUTES as i64);
        pending.retain(|_, login| login.started_at > cutoff);

        pending.insert(
            csrf_state.secret().clone(),
            PendingLogin {
                provider,
                verifier: pkce_verifier.secret().clone(),
                started_at: Utc::now(),
            },
        );

        Ok(authorize_url)
    }

    /// Completes a sign-in: verifies the callback state, exchanges the code,
    /// links the provider identity to a user, and opens a session
    pub async fn complete_login(
        &self,
        provider: Provider,
        state: &str,
        code: &str,
    ) -> Result<SessionData, AuthError> {
        let pending = self
            .pending
            .lock()
            .remove(state)
            .ok_or(AuthError::UnknownLoginAttempt)?;

        let cutoff = Utc::now() - Duration::minutes(Self::LOGIN_ATTEMPT_TTL_IN_MINUTES as i64);

        if pending.provider != provider || pending.started_at <= cutoff {
            return Err(AuthError::UnknownLoginAttempt);
        }

        let client = self.client(provider)?;
        let token_result = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let access_token = token_result.access_token().secret().clone();
        let profile = self.fetch_profile(provider, &access_token).await?;

        let tokens = ProviderTokens {
            access_token: Some(access_token),
            refresh_token: token_result.refresh_token().map(|t| t.secret().clone()),
            scope: token_result.scopes().map(scope_string),
            expires_at: token_result
                .expires_in()
                .and_then(|d| Duration::from_std(d).ok())
                .map(|d| Utc::now() + d),
        };

        let user = self.register_identity(provider, profile, tokens).await?;

        info!("User {} signed in via {}", user.display_name, provider);

        self.clear_expired().await;
        self.create_session(user.id).await
    }

    /// Links a provider identity to a user. A known identity has its stored
    /// tokens and scopes replaced, which is how a later grant of the
    /// Calendar/Tasks scope lands on an existing account. An unknown one
    /// gets a new user.
    pub async fn register_identity(
        &self,
        provider: Provider,
        profile: ProviderProfile,
        tokens: ProviderTokens,
    ) -> Result<UserData, AuthError> {
        let existing = self
            .db
            .account_by_provider_identity(provider.as_str(), &profile.id)
            .await;

        match existing {
            Ok(account) => {
                self.db
                    .update_account_tokens(UpdatedAccountTokens {
                        id: account.id,
                        access_token: tokens.access_token,
                        refresh_token: tokens.refresh_token,
                        scope: tokens.scope,
                        expires_at: tokens.expires_at,
                    })
                    .await?;

                let user = self
                    .db
                    .update_user(UpdatedUser {
                        id: account.user_id,
                        display_name: None,
                        avatar_url: profile.avatar_url,
                    })
                    .await?;

                Ok(user)
            }
            Err(e) if e.is_not_found() => {
                let user = self
                    .db
                    .create_user(NewUser {
                        username: profile.username.clone(),
                        display_name: profile.username,
                        email: profile.email,
                        avatar_url: profile.avatar_url,
                    })
                    .await?;

                self.db
                    .create_account(NewAccount {
                        user_id: user.id,
                        provider: provider.as_str().to_string(),
                        provider_account_id: profile.id,
                        access_token: tokens.access_token,
                        refresh_token: tokens.refresh_token,
                        scope: tokens.scope,
                        expires_at: tokens.expires_at,
                    })
                    .await?;

                Ok(user)
            }
            Err(e) => Err(AuthError::Db(e)),
        }
    }

    /// Returns a session if it exists
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        self.db.session_by_token(token).await
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.db.delete_session_by_token(token).await
    }

    /// Renames a user. Users can only rename themselves.
    pub async fn update_name(
        &self,
        principal: PrimaryKey,
        user_id: PrimaryKey,
        name: &str,
    ) -> Result<UserData, AuthError> {
        if principal != user_id {
            return Err(AuthError::NotYourAccount);
        }

        let name = name.trim();

        if name.is_empty() {
            return Err(AuthError::EmptyName);
        }

        Ok(self
            .db
            .update_user(UpdatedUser {
                id: user_id,
                display_name: Some(name.to_string()),
                avatar_url: None,
            })
            .await?)
    }

    /// Deletes a user completely, cascading owned rooms, memberships,
    /// messages, accounts, and sessions. Users can only delete themselves.
    pub async fn delete_account(
        &self,
        principal: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<(), AuthError> {
        if principal != user_id {
            return Err(AuthError::NotYourAccount);
        }

        info!("User {} deleted their account", user_id);

        Ok(self.db.delete_user(user_id).await?)
    }

    async fn fetch_profile(
        &self,
        provider: Provider,
        access_token: &str,
    ) -> Result<ProviderProfile, AuthError> {
        match provider {
            Provider::Discord => {
                let profile: DiscordProfile =
                    self.get_profile_json(DISCORD_USER_URL, access_token).await?;

                Ok(ProviderProfile {
                    avatar_url: Some(discord_avatar_url(
                        &profile.id,
                        &profile.discriminator,
                        profile.avatar.as_deref(),
                    )),
                    id: profile.id,
                    username: profile.username,
                    email: profile.email,
                })
            }
            Provider::Google => {
                let profile: GoogleProfile = self
                    .get_profile_json(GOOGLE_USERINFO_URL, access_token)
                    .await?;

                Ok(ProviderProfile {
                    id: profile.id,
                    username: profile
                        .name
                        .or(profile.email.clone())
                        .unwrap_or_else(|| "anonymous".to_string()),
                    email: profile.email,
                    avatar_url: profile.picture,
                })
            }
        }
    }

    async fn get_profile_json<T>(&self, url: &str, access_token: &str) -> Result<T, AuthError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::Profile(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Profile(e.to_string()))
    }

    async fn create_session(&self, user_id: PrimaryKey) -> Result<SessionData, AuthError> {
        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let session = self
            .db
            .create_session(NewSession {
                token: random_string(32),
                user_id,
                expires_at,
            })
            .await?;

        Ok(session)
    }

    async fn clear_expired(&self) {
        self.db
            .clear_expired_sessions()
            .await
            .expect("sessions are cleared")
    }
}

fn build_client(settings: ProviderSettings, auth_url: &str, token_url: &str) -> OauthClient {
    let auth_url = AuthUrl::new(auth_url.to_string()).expect("auth url is valid");
    let token_url = TokenUrl::new(token_url.to_string()).expect("token url is valid");
    let redirect_url =
        RedirectUrl::new(settings.redirect_url).expect("redirect url is valid");

    BasicClient::new(ClientId::new(settings.client_id))
        .set_client_secret(ClientSecret::new(settings.client_secret))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url)
}

fn scope_string(scopes: &Vec<Scope>) -> String {
    scopes
        .iter()
        .map(|s| (**s).clone())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Discord's avatar URL scheme: accounts without a custom avatar get one of
/// the default embed avatars, animated hashes serve as gif
fn discord_avatar_url(id: &str, discriminator: &str, avatar: Option<&str>) -> String {
    match avatar {
        Some(hash) => {
            let format = if hash.starts_with("a_") { "gif" } else { "png" };
            format!("https://cdn.discordapp.com/avatars/{id}/{hash}.{format}")
        }
        None => {
            let index = if discriminator == "0" {
                (id.parse::<u64>().unwrap_or_default() >> 22) % 6
            } else {
                discriminator.parse::<u64>().unwrap_or_default() % 5
            };

            format!("https://cdn.discordapp.com/embed/avatars/{index}.png")
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscordProfile {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: String,
    avatar: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleProfile {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}
