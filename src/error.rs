use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{archive::ExtractError, scoring::ScoringError, storage::StorageError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Extract(ExtractError::UnsupportedFileType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            AppError::Extract(ExtractError::InvalidFilename(_)) => StatusCode::BAD_REQUEST,
            AppError::Extract(ExtractError::Archive(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(StorageError::InvalidPath(_)) => StatusCode::BAD_REQUEST,
            AppError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Storage(StorageError::Io(_))
            | AppError::Scoring(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, body).into_response()
    }
}

/// True when `err` wraps a Postgres unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|db| db.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use std::{borrow::Cow, error::Error as StdError, fmt};

    use sqlx::error::{DatabaseError, ErrorKind};

    use super::*;

    #[derive(Debug)]
    struct DuplicateEmail;

    impl fmt::Display for DuplicateEmail {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.message())
        }
    }

    impl StdError for DuplicateEmail {}

    impl DatabaseError for DuplicateEmail {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }
        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }
        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_is_recognised_through_anyhow() {
        let dup = anyhow::Error::from(sqlx::Error::Database(Box::new(DuplicateEmail)));
        assert!(is_unique_violation(&dup));

        let wrapped = dup.context("insert user");
        assert!(is_unique_violation(&wrapped));

        assert!(!is_unique_violation(&anyhow::Error::from(sqlx::Error::RowNotFound)));
        assert!(!is_unique_violation(&anyhow::anyhow!("23505")));
    }

    #[test]
    fn taxonomy_maps_to_statuses() {
        let cases = [
            (
                AppError::from(ExtractError::UnsupportedFileType("a.rar".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AppError::from(ExtractError::InvalidFilename(".zip".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ExtractError::Archive("bad".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(StorageError::InvalidPath("../x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(StorageError::NotFound("file x".into())),
                StatusCode::NOT_FOUND,
            ),
            (AppError::NotFound("Project".into()), StatusCode::NOT_FOUND),
            (
                AppError::from(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let res = AppError::from(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }
}
