use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::{
    http::Status,
    request::Request,
    response::{self, Responder},
};

/// Failure of a page or redirect handler.
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("no matching record")]
    NotFound,
    #[error("a record with this key already exists")]
    Conflict,
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(DieselError),
}

impl From<DieselError> for PageError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => PageError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                PageError::Conflict
            }
            err => PageError::Database(err),
        }
    }
}

impl<'r> Responder<'r, 'static> for PageError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self {
            // handed to the 404 catcher, which may still find a legacy redirect
            PageError::NotFound => Err(Status::NotFound),
            PageError::Conflict => (Status::Conflict, self.to_string()).respond_to(request),
            PageError::Invalid(message) => {
                (Status::UnprocessableEntity, message).respond_to(request)
            }
            PageError::Database(err) => {
                log::error!("{} {}: {}", request.method(), request.uri(), err);
                Err(Status::InternalServerError)
            }
        }
    }
}

pub type Result<T, E = PageError> = std::result::Result<T, E>;
