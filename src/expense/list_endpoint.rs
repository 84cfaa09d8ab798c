//! The endpoint that lists the caller's expenses.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;

use crate::{
    AppState, Error, Identity,
    aggregation::{FilterQuery, FilterSpec, apply_filters, restrict_to_identity},
    expense::{ExpenseView, query::fetch_visible_expenses},
};

/// The state needed to list expenses.
#[derive(Debug, Clone)]
pub struct ListExpensesState {
    /// The database connection for reading expenses.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ListExpensesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A route handler that returns the caller's visible expenses matching the
/// query string filters, newest first.
///
/// # Errors
///
/// Returns an [Error::InvalidFilter] if the query string cannot be parsed.
pub async fn get_expenses(
    State(state): State<ListExpensesState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<ExpenseView>>, Error> {
    let spec = FilterSpec::try_from(query)?;

    let expenses = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        fetch_visible_expenses(&identity, &connection)?
    };

    let visible = restrict_to_identity(expenses, &identity);

    Ok(Json(
        apply_filters(&visible, &spec)
            .into_iter()
            .map(ExpenseView::from)
            .collect(),
    ))
}
