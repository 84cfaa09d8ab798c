//! Registration of admins (who create an organization) and employees (who join one).

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error, Organization, PasswordHash, ValidatedPassword,
    auth::set_auth_cookie,
    name::Name,
    organization::{create_organization, get_organization_by_code},
    timezone::get_local_offset,
    user::{NewUser, Role, SessionView, User, create_user, parse_email},
};

/// The state needed for creating a new user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            password_cost: PasswordHash::DEFAULT_COST,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<RegistrationState> for Key {
    fn from_ref(state: &RegistrationState) -> Self {
        state.cookie_key.clone()
    }
}

/// The details shared by both kinds of registration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AccountData {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// The request body for registering an admin and their organization.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterAdminData {
    pub organization_name: String,
    #[serde(flatten)]
    pub account: AccountData,
}

/// The request body for registering an employee with an existing organization.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterEmployeeData {
    pub organization_code: String,
    #[serde(flatten)]
    pub account: AccountData,
}

/// An account that passed validation and is ready to insert.
struct ValidatedAccount {
    name: Name,
    email: String,
    password_hash: PasswordHash,
}

fn validate_account(account: &AccountData, password_cost: u32) -> Result<ValidatedAccount, Error> {
    let name = Name::new(&account.name)?;
    let email = parse_email(&account.email)?;
    let password = ValidatedPassword::new_confirmed(
        &account.password,
        &account.confirm_password,
        &[name.as_ref(), &email],
    )?;
    let password_hash = PasswordHash::new(password, password_cost)?;

    Ok(ValidatedAccount {
        name,
        email,
        password_hash,
    })
}

/// Create a new organization and its first admin, then log the admin in.
///
/// Responds with 201 and the new session, which includes the join code.
pub async fn register_admin(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Json(data): Json<RegisterAdminData>,
) -> Response {
    let result = Name::new(&data.organization_name)
        .and_then(|organization_name| {
            let account = validate_account(&data.account, state.password_cost)?;
            insert_admin(organization_name, account, &state.db_connection)
        })
        .and_then(|(user, organization)| log_in_new_user(&state, jar, user, organization));

    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

/// Create a new employee in the organization with the given join code, then log them in.
///
/// Responds with 201 and the new session.
pub async fn register_employee(
    State(state): State<RegistrationState>,
    jar: PrivateCookieJar,
    Json(data): Json<RegisterEmployeeData>,
) -> Response {
    let result = validate_account(&data.account, state.password_cost)
        .and_then(|account| insert_employee(&data.organization_code, account, &state.db_connection))
        .and_then(|(user, organization)| log_in_new_user(&state, jar, user, organization));

    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

fn insert_admin(
    organization_name: Name,
    account: ValidatedAccount,
    db_connection: &Mutex<Connection>,
) -> Result<(User, Organization), Error> {
    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    // The organization must not outlive a failed admin insert, e.g. a duplicate email.
    let transaction = connection.unchecked_transaction()?;
    let organization = create_organization(organization_name, &transaction)?;
    let user = create_user(
        NewUser {
            name: account.name,
            email: account.email,
            role: Role::Admin,
            organization_id: organization.id,
            password_hash: account.password_hash,
        },
        &transaction,
    )?;
    transaction.commit()?;

    tracing::info!(
        "created organization {} with admin {}",
        organization.id,
        user.id
    );

    Ok((user, organization))
}

fn insert_employee(
    organization_code: &str,
    account: ValidatedAccount,
    db_connection: &Mutex<Connection>,
) -> Result<(User, Organization), Error> {
    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let organization = get_organization_by_code(organization_code, &connection)?;
    let user = create_user(
        NewUser {
            name: account.name,
            email: account.email,
            role: Role::Employee,
            organization_id: organization.id,
            password_hash: account.password_hash,
        },
        &connection,
    )?;

    tracing::info!(
        "employee {} joined organization {}",
        user.id,
        organization.id
    );

    Ok((user, organization))
}

fn log_in_new_user(
    state: &RegistrationState,
    jar: PrivateCookieJar,
    user: User,
    organization: Organization,
) -> Result<Response, Error> {
    let local_offset = get_local_offset(&state.local_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(state.local_timezone.clone()))?;
    let jar = set_auth_cookie(jar, user.id, state.cookie_duration, local_offset)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionView::new(&user, &organization)),
    )
        .into_response())
}

#[cfg(test)]
mod register_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::post};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        app_state::create_cookie_key,
        auth::{COOKIE_TOKEN, DEFAULT_COOKIE_DURATION},
        organization::JOIN_CODE_LENGTH,
        test_utils::{TEST_PASSWORD, get_test_connection},
        user::{Role, get_user_by_email},
    };

    use super::{RegistrationState, register_admin, register_employee};

    fn get_test_server() -> (TestServer, Arc<Mutex<Connection>>) {
        let db_connection = Arc::new(Mutex::new(get_test_connection()));
        let state = RegistrationState {
            cookie_key: create_cookie_key("foobar"),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: "Etc/UTC".to_owned(),
            password_cost: 4,
            db_connection: db_connection.clone(),
        };
        let app = Router::new()
            .route("/register/admin", post(register_admin))
            .route("/register/employee", post(register_employee))
            .with_state(state);

        (TestServer::try_new(app).unwrap(), db_connection)
    }

    fn admin_body(email: &str) -> Value {
        json!({
            "organization_name": "Sanghamitra Trust",
            "name": "Asha",
            "email": email,
            "password": TEST_PASSWORD,
            "confirm_password": TEST_PASSWORD,
        })
    }

    fn employee_body(code: &str, email: &str) -> Value {
        json!({
            "organization_code": code,
            "name": "Mayur",
            "email": email,
            "password": TEST_PASSWORD,
            "confirm_password": TEST_PASSWORD,
        })
    }

    #[tokio::test]
    async fn admin_registration_creates_organization() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register/admin")
            .json(&admin_body("asha@example.com"))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["user"]["role"], "admin");
        assert_eq!(body["organization"]["name"], "Sanghamitra Trust");
        assert_eq!(
            body["organization"]["code"].as_str().unwrap().len(),
            JOIN_CODE_LENGTH
        );
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
    }

    #[tokio::test]
    async fn employee_joins_with_lower_case_code() {
        let (server, db_connection) = get_test_server();
        let admin = server
            .post("/register/admin")
            .json(&admin_body("asha@example.com"))
            .await
            .json::<Value>();
        let code = admin["organization"]["code"].as_str().unwrap().to_lowercase();

        let response = server
            .post("/register/employee")
            .json(&employee_body(&code, "Mayur@Example.com"))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body = response.json::<Value>();
        assert_eq!(body["organization"]["id"], admin["organization"]["id"]);
        assert!(body["organization"]["code"].is_null());

        let user = get_user_by_email("mayur@example.com", &db_connection.lock().unwrap()).unwrap();
        assert_eq!(user.role, Role::Employee);
    }

    #[tokio::test]
    async fn employee_registration_fails_with_unknown_code() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register/employee")
            .json(&employee_body("ZZZZZZ", "mayur@example.com"))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_and_leaves_no_organization() {
        let (server, db_connection) = get_test_server();
        server
            .post("/register/admin")
            .json(&admin_body("asha@example.com"))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/register/admin")
            .json(&admin_body("ASHA@example.com"))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let organization_count: i64 = db_connection
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM organization", [], |row| row.get(0))
            .unwrap();
        assert_eq!(organization_count, 1);
    }

    #[tokio::test]
    async fn mismatched_passwords_are_rejected() {
        let (server, _) = get_test_server();
        let mut body = admin_body("asha@example.com");
        body["confirm_password"] = json!("somethingelse");

        let response = server.post("/register/admin").json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "passwords do not match");
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let (server, _) = get_test_server();
        let mut body = admin_body("asha@example.com");
        body["password"] = json!("password");
        body["confirm_password"] = json!("password");

        let response = server.post("/register/admin").json(&body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected() {
        let (server, _) = get_test_server();

        let response = server
            .post("/register/admin")
            .json(&admin_body("not-an-email"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
