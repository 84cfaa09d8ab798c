//! Defines the endpoint for correcting an expense.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error, Identity,
    aggregation::is_visible_to,
    database_id::ExpenseId,
    expense::{
        Expense, ExpenseUpdate, ExpenseView,
        core::{get_expense, update_expense},
    },
};

/// The state needed to edit an expense.
#[derive(Debug, Clone)]
pub struct EditExpenseState {
    /// The database connection for managing expenses.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The request body for correcting an expense. Missing fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditExpenseData {
    /// The corrected amount.
    #[serde(default)]
    pub amount: Option<f64>,
    /// The corrected note, an empty string clears the note.
    #[serde(default)]
    pub note: Option<String>,
}

/// Whether `identity` may correct `expense`.
///
/// The author of an expense and the admins of its organization may edit it,
/// which is exactly who may see it.
pub fn can_edit(identity: &Identity, expense: &Expense) -> bool {
    is_visible_to(expense, identity)
}

/// A route handler for correcting the amount or note of an expense.
///
/// # Errors
///
/// Returns a:
/// - [Error::NotFound] if the expense is not in the caller's organization,
/// - [Error::Forbidden] if the caller is neither the author nor an admin,
/// - or [Error::NegativeAmount] if the new amount is invalid.
pub async fn edit_expense_endpoint(
    State(state): State<EditExpenseState>,
    Extension(identity): Extension<Identity>,
    Path(expense_id): Path<ExpenseId>,
    Json(data): Json<EditExpenseData>,
) -> Result<Json<ExpenseView>, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let expense = get_expense(expense_id, identity.organization_id, &connection)?;

    if !can_edit(&identity, &expense) {
        tracing::warn!(
            "user {} tried to edit expense {expense_id} without permission",
            identity.user_id
        );
        return Err(Error::Forbidden);
    }

    let update = ExpenseUpdate {
        amount: data.amount,
        note: data.note,
    };
    let updated = update_expense(expense_id, identity.organization_id, update, &connection)?;

    Ok(Json(ExpenseView::from(updated)))
}
