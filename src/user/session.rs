//! Endpoints that describe the logged-in user and their organization.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, Identity, Organization, OrganizationId,
    name::Name,
    organization::get_organization_by_id,
    user::{User, UserSummary, get_user_by_id, get_users_in_organization},
};

/// The state needed by the session endpoints.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// An organization as seen by one of its users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationView {
    pub id: OrganizationId,
    pub name: Name,
    /// The join code, only shown to admins.
    pub code: Option<String>,
}

/// The logged-in user and their organization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub user: UserSummary,
    pub organization: OrganizationView,
}

impl SessionView {
    /// Describe the session of `user`, who must belong to `organization`.
    pub fn new(user: &User, organization: &Organization) -> Self {
        let code = Identity::from(user)
            .is_admin()
            .then(|| organization.code.clone());

        Self {
            user: UserSummary::from(user),
            organization: OrganizationView {
                id: organization.id,
                name: organization.name.clone(),
                code,
            },
        }
    }
}

/// Get the logged-in user and their organization.
pub async fn get_me(
    State(state): State<SessionState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<SessionView>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(identity.user_id, &connection)?;
    let organization = get_organization_by_id(identity.organization_id, &connection)?;

    Ok(Json(SessionView::new(&user, &organization)))
}

/// List the users of the caller's organization.
///
/// # Errors
///
/// Returns an [Error::Forbidden] if the caller is not an admin.
pub async fn get_employees(
    State(state): State<SessionState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<UserSummary>>, Error> {
    if !identity.is_admin() {
        return Err(Error::Forbidden);
    }

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let users = get_users_in_organization(identity.organization_id, &connection)?;

    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

#[cfg(test)]
mod session_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State};

    use crate::{
        Error, Identity,
        test_utils::{get_test_connection, seed_organization},
    };

    use super::{SessionState, get_employees, get_me};

    #[tokio::test]
    async fn me_shows_join_code_to_admin() {
        let connection = get_test_connection();
        let seeded = seed_organization(&connection, "Acme");
        let state = SessionState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let Json(session) = get_me(State(state), Extension(Identity::from(&seeded.admin)))
            .await
            .unwrap();

        assert_eq!(session.user.id, seeded.admin.id);
        assert_eq!(session.organization.code, Some(seeded.organization.code));
    }

    #[tokio::test]
    async fn me_hides_join_code_from_employee() {
        let connection = get_test_connection();
        let seeded = seed_organization(&connection, "Acme");
        let state = SessionState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let Json(session) = get_me(State(state), Extension(Identity::from(&seeded.employee)))
            .await
            .unwrap();

        assert_eq!(session.organization.code, None);
        assert_eq!(session.organization.name, seeded.organization.name);
    }

    #[tokio::test]
    async fn employees_lists_only_own_organization() {
        let connection = get_test_connection();
        let seeded = seed_organization(&connection, "Acme");
        seed_organization(&connection, "Globex");
        let state = SessionState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let Json(users) = get_employees(State(state), Extension(Identity::from(&seeded.admin)))
            .await
            .unwrap();

        let mut ids: Vec<_> = users.iter().map(|user| user.id).collect();
        ids.sort_by_key(|id| id.as_i64());
        let mut want = vec![seeded.admin.id, seeded.employee.id, seeded.other_employee.id];
        want.sort_by_key(|id| id.as_i64());
        assert_eq!(ids, want);
    }

    #[tokio::test]
    async fn employees_is_forbidden_for_employees() {
        let connection = get_test_connection();
        let seeded = seed_organization(&connection, "Acme");
        let state = SessionState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let result =
            get_employees(State(state), Extension(Identity::from(&seeded.employee))).await;

        assert_eq!(result.err(), Some(Error::Forbidden));
    }
}
