//! Authentication middleware that validates the session cookie, resolves the
//! caller's [Identity] and extends the session.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        Identity,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
    },
    timezone::get_local_offset,
    user::get_user_by_id,
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
    /// Used to load the role and organization of the logged-in user.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

fn load_identity(jar: &PrivateCookieJar, state: &AuthState) -> Result<Identity, Error> {
    let token = get_token_from_cookies(jar)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    match get_user_by_id(token.user_id, &connection) {
        Ok(user) => Ok(Identity::from(&user)),
        Err(Error::NotFound) => {
            tracing::warn!(
                "auth token refers to user {} who no longer exists",
                token.user_id
            );
            Err(Error::Unauthenticated)
        }
        Err(error) => Err(error),
    }
}

/// Middleware function that checks for a valid authorization cookie.
///
/// If the cookie is valid, the user's [Identity] is loaded from the database,
/// placed into the request and the request is executed normally. Otherwise a
/// 401 JSON error is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(identity): Extension<Identity>` to receive the identity.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezoneError(state.local_timezone).into_response();
    };

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error getting cookie jar: {error:?}");
            return Error::Unauthenticated.into_response();
        }
    };

    let identity = match load_identity(&jar, &state) {
        Ok(identity) => identity,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(identity);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(
        jar.clone(),
        state.cookie_duration,
        local_offset,
    ) {
        Ok(updated_jar) => updated_jar,
        Err(error) => {
            tracing::error!("Error extending cookie duration: {error}. Rolling back cookie jar.");
            jar
        }
    };

    // A handler such as log-out may already have set the cookie.
    if !parts.headers.contains_key(SET_COOKIE) {
        for (key, val) in jar.into_response().headers().iter() {
            if key != SET_COOKIE {
                continue;
            }

            parts.headers.append(key, val.to_owned());
        }
    }

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Json, Router,
        extract::{Path, State},
        http::StatusCode,
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use axum_test::TestServer;
    use time::{Duration, OffsetDateTime, UtcOffset};

    use crate::{
        Error, Identity, Role, UserID,
        app_state::create_cookie_key,
        auth::{AuthState, COOKIE_TOKEN, DEFAULT_COOKIE_DURATION, Token, set_auth_cookie},
        test_utils::{SeededOrganization, get_test_connection, seed_organization},
    };

    use super::auth_guard;

    async fn whoami(Extension(identity): Extension<Identity>) -> Json<Identity> {
        Json(identity)
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        Path(user_id): Path<i64>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(
            jar,
            UserID::new(user_id),
            state.cookie_duration,
            UtcOffset::UTC,
        )
    }

    const TEST_LOG_IN_ROUTE_PATH: &str = "/log_in/{user_id}";
    const TEST_PROTECTED_ROUTE: &str = "/protected";

    fn get_test_server(cookie_duration: Duration) -> (TestServer, SeededOrganization) {
        let connection = get_test_connection();
        let seeded = seed_organization(&connection, "Acme");

        let state = AuthState {
            cookie_key: create_cookie_key("nafstenoas"),
            cookie_duration,
            local_timezone: "Etc/UTC".to_owned(),
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .route(TEST_LOG_IN_ROUTE_PATH, post(stub_log_in_route))
            .with_state(state);

        (
            TestServer::try_new(app).expect("Could not create test server."),
            seeded,
        )
    }

    fn log_in_path(user_id: UserID) -> String {
        TEST_LOG_IN_ROUTE_PATH.replace("{user_id}", &user_id.to_string())
    }

    #[tokio::test]
    async fn inserts_identity_from_database() {
        let (server, seeded) = get_test_server(DEFAULT_COOKIE_DURATION);
        let response = server.post(&log_in_path(seeded.employee.id)).await;
        response.assert_status_ok();

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(response.cookie(COOKIE_TOKEN))
            .await;

        response.assert_status_ok();
        let identity = response.json::<serde_json::Value>();
        assert_eq!(identity["user_id"], seeded.employee.id.as_i64());
        assert_eq!(identity["organization_id"], seeded.organization.id.as_i64());
        assert_eq!(identity["role"], Role::Employee.as_str());
    }

    #[tokio::test]
    async fn rejects_request_without_cookie() {
        let (server, _) = get_test_server(DEFAULT_COOKIE_DURATION);

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.json::<serde_json::Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn rejects_unencrypted_cookie() {
        let (server, seeded) = get_test_server(DEFAULT_COOKIE_DURATION);
        let forged = serde_json::to_string(&Token {
            user_id: seeded.admin.id,
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        })
        .unwrap();

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::new(COOKIE_TOKEN, forged))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_token_for_unknown_user() {
        let (server, _) = get_test_server(DEFAULT_COOKIE_DURATION);
        let response = server.post(&log_in_path(UserID::new(999))).await;

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(response.cookie(COOKIE_TOKEN))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rejects_expired_cookie() {
        let (server, seeded) = get_test_server(Duration::ZERO);
        let response = server.post(&log_in_path(seeded.admin.id)).await;

        server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(response.cookie(COOKIE_TOKEN))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn extends_cookie_expiry() {
        let (server, seeded) = get_test_server(DEFAULT_COOKIE_DURATION);
        let response = server.post(&log_in_path(seeded.admin.id)).await;
        let first_expiry = response
            .cookie(COOKIE_TOKEN)
            .expires_datetime()
            .expect("cookie should have an expiry");

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(response.cookie(COOKIE_TOKEN))
            .await;

        response.assert_status_ok();
        let second_expiry = response
            .cookie(COOKIE_TOKEN)
            .expires_datetime()
            .expect("cookie should have an expiry");
        assert!(
            second_expiry > first_expiry,
            "expected {second_expiry} to be after {first_expiry}"
        );
    }
}
