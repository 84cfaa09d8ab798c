//! Spendwise is a web service for tracking the expenses of small organizations.
//!
//! Employees record categorised credit and debit transactions, and admins see
//! aggregated summaries for their whole organization. Every organization is
//! an isolated tenant that employees join with a short join code.
//!
//! This library provides a JSON API. The filtering and aggregation rules live
//! in the [aggregation] module and are pure functions over expense snapshots.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use time::Date;
use tokio::signal;

pub mod aggregation;
mod app_state;
mod auth;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
pub mod expense;
mod logging;
mod name;
mod organization;
mod routing;
mod timezone;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppState, create_cookie_key};
pub use auth::{Identity, PasswordHash, ValidatedPassword};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use organization::{Organization, OrganizationId};
pub use routing::build_router;
pub use timezone::get_local_offset;
pub use user::{Role, User, UserID, get_user_by_email, update_password};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The email and password combination did not match a registered user.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The request did not carry a valid auth cookie.
    #[error("you must be logged in to access this resource")]
    Unauthenticated,

    /// The user is logged in but is not allowed to perform the action.
    #[error("you do not have permission to perform this action")]
    Forbidden,

    /// The auth cookie could not be created, read or extended.
    ///
    /// The string describes the underlying problem and should only be logged.
    #[error("could not handle the auth cookie: {0}")]
    CookieError(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// The password and its confirmation did not match.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The email address could not be parsed.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address is already used by another user.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// A user or organization name was empty or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// No organization uses the join code given during registration.
    #[error("invalid organization code")]
    InvalidOrganizationCode,

    /// The query string of a filtered request could not be understood.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// An expense amount was negative or not a finite number.
    #[error("{0} is not a valid amount, amounts must be zero or greater")]
    NegativeAmount(f64),

    /// The location does not belong to the main category of the expense.
    #[error("\"{location}\" is not a location for \"{main_category}\"")]
    InvalidLocation {
        /// The main category the location was checked against.
        main_category: String,
        /// The offending location.
        location: String,
    },

    /// The person does not belong to the location of the expense.
    #[error("\"{person}\" is not a team member at \"{location}\"")]
    InvalidPerson {
        /// The location the person was checked against.
        location: String,
        /// The offending person.
        person: String,
    },

    /// The expense category was empty.
    #[error("an expense category is required")]
    EmptyCategory,

    /// A date in the future was used to create an expense.
    ///
    /// Expenses record events that have already happened, therefore future
    /// dates are not allowed.
    #[error("{0} is a date in the future, which is not allowed")]
    FutureDate(Date),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    /// Resources in other organizations are reported as not found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update an expense that does not exist.
    #[error("tried to update an expense that is not in the database")]
    UpdateMissingExpense,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound | Error::UpdateMissingExpense | Error::InvalidOrganizationCode => {
                StatusCode::NOT_FOUND
            }
            Error::DuplicateEmail => StatusCode::CONFLICT,
            Error::TooWeak(_)
            | Error::PasswordMismatch
            | Error::InvalidEmail(_)
            | Error::InvalidName(_)
            | Error::InvalidFilter(_)
            | Error::NegativeAmount(_)
            | Error::InvalidLocation { .. }
            | Error::InvalidPerson { .. }
            | Error::EmptyCategory
            | Error::FutureDate(_) => StatusCode::BAD_REQUEST,
            Error::CookieError(_)
            | Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError
            | Error::InvalidTimezoneError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are not intended to be shown to the client.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests_with_message() {
        let (status, body) = body_json(Error::EmptyCategory).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "an expense category is required");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = body_json(Error::HashingError("secret detail".to_owned())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body["error"].as_str().unwrap().contains("secret detail"));
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }
}
