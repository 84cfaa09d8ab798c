//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/expenses/{expense_id}', the tests fill it in with `format_endpoint`.

/// The route for registering a new organization and its admin.
pub const REGISTER_ADMIN: &str = "/api/register/admin";
/// The route for joining an organization with its join code.
pub const REGISTER_EMPLOYEE: &str = "/api/register/employee";
/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route for the logged-in user and their organization.
pub const ME: &str = "/api/me";
/// The route listing the users of the admin's organization.
pub const EMPLOYEES: &str = "/api/employees";
/// The route for the category hierarchy.
pub const TAXONOMY: &str = "/api/taxonomy";
/// The route to list and create expenses.
pub const EXPENSES: &str = "/api/expenses";
/// The route to create several expenses at once.
pub const EXPENSES_BATCH: &str = "/api/expenses/batch";
/// The route to correct a single expense.
pub const EXPENSE: &str = "/api/expenses/{expense_id}";
/// The route for the dashboard summary.
pub const DASHBOARD: &str = "/api/dashboard";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace and ends with a
/// right brace. For example, in the endpoint path '/api/expenses/{expense_id}',
/// '{expense_id}' is the parameter. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
#[cfg(test)]
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know the routes are valid URIs once formatted.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    #[test]
    fn endpoints_are_valid_uris() {
        for endpoint in [
            endpoints::REGISTER_ADMIN,
            endpoints::REGISTER_EMPLOYEE,
            endpoints::LOG_IN,
            endpoints::LOG_OUT,
            endpoints::ME,
            endpoints::EMPLOYEES,
            endpoints::TAXONOMY,
            endpoints::EXPENSES,
            endpoints::EXPENSES_BATCH,
            endpoints::DASHBOARD,
        ] {
            assert!(endpoint.parse::<Uri>().is_ok(), "{endpoint} is not a valid URI");
        }

        assert!(
            format_endpoint(endpoints::EXPENSE, 1)
                .parse::<Uri>()
                .is_ok()
        );
    }

    #[test]
    fn formats_parameter() {
        assert_eq!(
            format_endpoint("/api/expenses/{expense_id}", 42),
            "/api/expenses/42"
        );
        assert_eq!(format_endpoint("/a/{id}/b", 7), "/a/7/b");
    }

    #[test]
    fn leaves_path_without_parameter() {
        assert_eq!(format_endpoint("/api/expenses", 1), "/api/expenses");
    }
}
