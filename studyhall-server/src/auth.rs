use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    routing::{get, post},
    Json,
};
use chrono::Utc;
use studyhall_collab::{Provider, SessionData, UserData};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::CallbackQuery,
    serialized::{LoginResult, LoginUrl, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|x| x.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

        let parts: Vec<_> = token.split_ascii_whitespace().collect();

        if parts.first() != Some(&"Bearer") {
            return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
        }

        let token = parts.last().cloned().unwrap_or_default();

        let session = context
            .collab
            .auth
            .session(token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        if session.expires_at <= Utc::now() {
            return Err((StatusCode::UNAUTHORIZED, "Session has expired"));
        }

        Ok(Self(session))
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/login/{provider}",
    tag = "auth",
    responses(
        (status = 200, body = LoginUrl)
    )
)]
async fn login(
    State(context): State<ServerContext>,
    Path(provider): Path<Provider>,
) -> ServerResult<Json<LoginUrl>> {
    let url = context.collab.auth.begin_login(provider)?;

    Ok(Json(LoginUrl {
        url: url.to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/auth/callback/{provider}",
    tag = "auth",
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn callback(
    State(context): State<ServerContext>,
    Path(provider): Path<Provider>,
    Query(CallbackQuery { state, code }): Query<CallbackQuery>,
) -> ServerResult<Json<LoginResult>> {
    let state = state.ok_or_else(|| ServerError::Validation("Callback without state".to_string()))?;
    let code = code.ok_or_else(|| ServerError::Validation("Callback without code".to_string()))?;

    let session = context
        .collab
        .auth
        .complete_login(provider, &state, &code)
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted")
    )
)]
async fn logout(session: Session, State(context): State<ServerContext>) -> ServerResult<()> {
    context.collab.auth.logout(session.token()).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/login/:provider", get(login))
        .route("/callback/:provider", get(callback))
        .route("/logout", post(logout))
        .route("/user", get(user))
}
