use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use studyhall_collab::{AuthError, ChatError, DatabaseError, RoomError, ScheduleError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Validation(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::EmptyName => Self::Validation(value.to_string()),
            RoomError::OwnerOnly(_) | RoomError::NotAMember | RoomError::OwnerImmovable => {
                Self::Forbidden(value.to_string())
            }
            RoomError::Db(e) => e.into(),
        }
    }
}

impl From<ChatError> for ServerError {
    fn from(value: ChatError) -> Self {
        match value {
            ChatError::EmptyContent => Self::Validation(value.to_string()),
            ChatError::NotAMember => Self::Forbidden(value.to_string()),
            ChatError::Db(e) => e.into(),
        }
    }
}

impl From<ScheduleError> for ServerError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::NotConnected => Self::Unauthorized(value.to_string()),
            ScheduleError::Provider(_) => Self::Unknown(value.to_string()),
            ScheduleError::Db(e) => e.into(),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::UnknownLoginAttempt | AuthError::Exchange(_) | AuthError::Profile(_) => {
                Self::Unauthorized(value.to_string())
            }
            AuthError::ProviderNotConfigured(_) | AuthError::EmptyName => {
                Self::Validation(value.to_string())
            }
            AuthError::NotYourAccount => Self::Forbidden(value.to_string()),
            AuthError::Db(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let forbidden: ServerError = RoomError::OwnerImmovable.into();
        assert_eq!(forbidden.as_status_code(), StatusCode::FORBIDDEN);

        let not_found: ServerError = DatabaseError::NotFound {
            resource: "room",
            identifier: "id",
        }
        .into();
        assert_eq!(not_found.as_status_code(), StatusCode::NOT_FOUND);

        let unauthorized: ServerError = ScheduleError::NotConnected.into();
        assert_eq!(unauthorized.as_status_code(), StatusCode::UNAUTHORIZED);

        let validation: ServerError = ChatError::EmptyContent.into();
        assert_eq!(validation.as_status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_messages_survive_conversion() {
        let error: ServerError = RoomError::NotAMember.into();
        assert_eq!(error.to_string(), "You are not a member of this room");
    }
}
