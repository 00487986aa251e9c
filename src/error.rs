use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReviewError>;

/// Every failure the review core can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    #[error("{0}")]
    Validation(String),

    #[error("Review not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReviewError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ReviewError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReviewError::NotFound(_))
    }
}

impl From<rusqlite::Error> for ReviewError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;
        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure => ReviewError::StoreUnavailable(err.to_string()),
                _ => ReviewError::Internal(err.to_string()),
            },
            _ => ReviewError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ReviewError {
    fn from(err: serde_json::Error) -> Self {
        ReviewError::Internal(err.to_string())
    }
}

#[cfg(feature = "ssr")]
mod http {
    use super::ReviewError;
    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, ResponseError};
    use serde_json::json;

    impl ResponseError for ReviewError {
        fn status_code(&self) -> StatusCode {
            match self {
                ReviewError::Validation(_) => StatusCode::BAD_REQUEST,
                ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
                ReviewError::StoreUnavailable(_) | ReviewError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }

        fn error_response(&self) -> HttpResponse {
            let message = match self {
                ReviewError::Validation(msg) => msg.clone(),
                ReviewError::NotFound(_) => "Cannot find review".to_string(),
                // Storage details stay in the server log.
                _ => {
                    tracing::error!("[API] Request failed: {}", self);
                    "Something went wrong!".to_string()
                }
            };
            HttpResponse::build(self.status_code()).json(json!({ "message": message }))
        }
    }
}
