use crate::auth::jwt::TokenError;
use crate::bootstrap::BootstrapError;
use crate::cisterns::CisternError;
use crate::promos::PromoError;
use crate::sales::SaleError;
use crate::users::UserError;
use axum::http::StatusCode;
use thiserror::Error;

/// Failures of the record-keeping services (products, rates, cisterns, deliveries).
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(message) => Self::bad_request(message),
            StoreError::NotFound(message) => Self::not_found(message),
            StoreError::Conflict(message) => Self::conflict(message),
        }
    }
}

impl From<CisternError> for AppError {
    fn from(err: CisternError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<SaleError> for AppError {
    fn from(err: SaleError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<PromoError> for AppError {
    fn from(err: PromoError) -> Self {
        let message = err.to_string();
        match err {
            PromoError::NotFound(_) => Self::not_found(message),
            _ => Self::bad_request(message),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::InvalidCredentials | UserError::Inactive => Self::unauthorized(message),
            UserError::Duplicate(_) => Self::conflict(message),
            UserError::Hashing(_) => Self::internal(err),
            UserError::MissingUsername | UserError::PasswordTooShort => Self::bad_request(message),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => Self::internal(err),
            TokenError::Invalid(_) => Self::unauthorized(err.to_string()),
        }
    }
}

impl From<BootstrapError> for AppError {
    fn from(err: BootstrapError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.user_message().to_string(),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
