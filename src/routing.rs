//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::{
    AppState, Error,
    auth::{auth_guard, post_log_in, post_log_out},
    dashboard::get_dashboard,
    endpoints,
    expense::{
        create_expense_batch_endpoint, create_expense_endpoint, edit_expense_endpoint,
        get_expenses, get_taxonomy,
    },
    user::{get_employees, get_me, register_admin, register_employee},
};

/// Return a router with all the app's routes.
///
/// Every route except registration, log-in and log-out requires a valid auth cookie.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::REGISTER_ADMIN, post(register_admin))
        .route(endpoints::REGISTER_EMPLOYEE, post(register_employee))
        .route(endpoints::LOG_IN, post(post_log_in))
        .route(endpoints::LOG_OUT, post(post_log_out));

    let protected_routes = Router::new()
        .route(endpoints::ME, get(get_me))
        .route(endpoints::EMPLOYEES, get(get_employees))
        .route(endpoints::TAXONOMY, get(get_taxonomy))
        .route(
            endpoints::EXPENSES,
            get(get_expenses).post(create_expense_endpoint),
        )
        .route(
            endpoints::EXPENSES_BATCH,
            post(create_expense_batch_endpoint),
        )
        .route(endpoints::EXPENSE, patch(edit_expense_endpoint))
        .route(endpoints::DASHBOARD, get(get_dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
