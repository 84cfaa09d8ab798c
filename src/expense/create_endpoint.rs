//! Defines the endpoints for recording new expenses.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error, Identity,
    expense::{
        Expense, ExpenseBuilder, ExpenseView, MainCategory,
        core::{create_expense, create_expenses},
    },
    timezone::get_local_offset,
};

/// The state needed to create expenses.
#[derive(Debug, Clone)]
pub struct CreateExpenseState {
    /// The database connection for managing expenses.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Asia/Kolkata".
    pub local_timezone: String,
}

impl FromRef<AppState> for CreateExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for one expense.
///
/// A `type` field is accepted but ignored, the type always follows the category.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    /// e.g. "Office Based".
    pub main_category: MainCategory,
    /// One of the locations of the main category.
    pub location: String,
    /// One of the team members at the location.
    #[serde(default)]
    pub person: Option<String>,
    /// What the money was for.
    pub category: String,
    /// Used instead of the category when the category is "Others".
    #[serde(default)]
    pub custom_category: Option<String>,
    /// The amount of money, zero or greater.
    pub amount: f64,
    /// An ISO 8601 date that is not in the future.
    pub date: Date,
    /// Free text.
    #[serde(default)]
    pub note: Option<String>,
    /// A link to a photo of the receipt.
    #[serde(default)]
    pub receipt_url: Option<String>,
}

impl ExpenseInput {
    fn into_builder(self) -> ExpenseBuilder {
        Expense::build(
            self.main_category,
            &self.location,
            &self.category,
            self.amount,
            self.date,
        )
        .person(self.person.as_deref())
        .custom_category(self.custom_category.as_deref())
        .note(self.note.as_deref())
        .receipt_url(self.receipt_url.as_deref())
    }
}

/// The request body for several expenses.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseBatchInput {
    /// The expenses to record, all or none.
    pub expenses: Vec<ExpenseInput>,
}

fn local_today(local_timezone: &str) -> Result<Date, Error> {
    let Some(local_offset) = get_local_offset(local_timezone) else {
        tracing::error!("Invalid timezone {}", local_timezone);
        return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
    };

    Ok(OffsetDateTime::now_utc().to_offset(local_offset).date())
}

/// A route handler for recording one expense for the caller.
///
/// # Errors
///
/// Returns a validation error if the expense does not fit the category
/// hierarchy, has a negative amount or a future date.
pub async fn create_expense_endpoint(
    State(state): State<CreateExpenseState>,
    Extension(identity): Extension<Identity>,
    Json(input): Json<ExpenseInput>,
) -> Result<(StatusCode, Json<ExpenseView>), Error> {
    let today = local_today(&state.local_timezone)?;
    let expense = input
        .into_builder()
        .finalize(today)
        .inspect_err(|error| tracing::warn!("rejected expense from {}: {error}", identity.user_id))?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let created = create_expense(expense, &identity, &connection)?;

    Ok((StatusCode::CREATED, Json(ExpenseView::from(created))))
}

/// A route handler for recording several expenses at once.
///
/// Every expense is validated before any is inserted, and the inserts run in
/// one transaction, so a bad expense means nothing is recorded.
///
/// # Errors
///
/// Returns the validation error of the first invalid expense.
pub async fn create_expense_batch_endpoint(
    State(state): State<CreateExpenseState>,
    Extension(identity): Extension<Identity>,
    Json(batch): Json<ExpenseBatchInput>,
) -> Result<(StatusCode, Json<Vec<ExpenseView>>), Error> {
    let today = local_today(&state.local_timezone)?;
    let expenses = batch
        .expenses
        .into_iter()
        .map(|input| input.into_builder().finalize(today))
        .collect::<Result<Vec<_>, _>>()
        .inspect_err(|error| {
            tracing::warn!("rejected expense batch from {}: {error}", identity.user_id)
        })?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let created = create_expenses(expenses, &identity, &connection)?;

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(ExpenseView::from).collect()),
    ))
}

#[cfg(test)]
mod create_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Json, extract::State, http::StatusCode};
    use serde_json::json;
    use time::OffsetDateTime;

    use crate::{
        Error, Identity,
        expense::{ExpenseType, fetch_visible_expenses},
        test_utils::{get_test_connection, seed_organization},
    };

    use super::{
        CreateExpenseState, ExpenseBatchInput, ExpenseInput, create_expense_batch_endpoint,
        create_expense_endpoint,
    };

    fn today() -> String {
        OffsetDateTime::now_utc().date().to_string()
    }

    fn input(category: &str, amount: f64) -> ExpenseInput {
        serde_json::from_value(json!({
            "main_category": "Event Based",
            "location": "Deekshabhoomi",
            "person": "Mayur",
            "category": category,
            "type": "Credit",
            "amount": amount,
            "date": today(),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn creates_expense_for_caller() {
        let conn = get_test_connection();
        let seeded = seed_organization(&conn, "Acme");
        let identity = Identity::from(&seeded.employee);
        let state = CreateExpenseState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let (status, Json(view)) = create_expense_endpoint(
            State(state.clone()),
            Extension(identity),
            Json(input("Grocery", 42.5)),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(view.expense.user_id, Some(identity.user_id));
        assert_eq!(view.expense.organization_id, identity.organization_id);
        assert_eq!(view.expense.person.as_deref(), Some("Mayur"));
        // The client asked for a credit, but groceries are always debits.
        assert_eq!(view.expense.expense_type, ExpenseType::Debit);
        let stored = fetch_visible_expenses(&identity, &state.db_connection.lock().unwrap())
            .unwrap();
        assert_eq!(stored, vec![view.expense]);
    }

    #[tokio::test]
    async fn rejects_invalid_expense() {
        let conn = get_test_connection();
        let seeded = seed_organization(&conn, "Acme");
        let state = CreateExpenseState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let mut bad = input("Grocery", 10.0);
        bad.location = "Wardha".to_owned();

        let result = create_expense_endpoint(
            State(state),
            Extension(Identity::from(&seeded.admin)),
            Json(bad),
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidLocation { .. })));
    }

    #[tokio::test]
    async fn rejects_invalid_timezone() {
        let conn = get_test_connection();
        let seeded = seed_organization(&conn, "Acme");
        let state = CreateExpenseState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Middle/Earth".to_owned(),
        };

        let result = create_expense_endpoint(
            State(state),
            Extension(Identity::from(&seeded.admin)),
            Json(input("Grocery", 10.0)),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::InvalidTimezoneError("Middle/Earth".to_owned()))
        );
    }

    #[tokio::test]
    async fn batch_creates_every_expense() {
        let conn = get_test_connection();
        let seeded = seed_organization(&conn, "Acme");
        let identity = Identity::from(&seeded.admin);
        let state = CreateExpenseState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let batch = ExpenseBatchInput {
            expenses: vec![input("Salary", 1000.0), input("Grocery", 300.0)],
        };

        let (status, Json(views)) =
            create_expense_batch_endpoint(State(state), Extension(identity), Json(batch))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].expense.expense_type, ExpenseType::Credit);
        assert_eq!(views[1].expense.expense_type, ExpenseType::Debit);
    }

    #[tokio::test]
    async fn batch_with_one_invalid_expense_records_nothing() {
        let conn = get_test_connection();
        let seeded = seed_organization(&conn, "Acme");
        let identity = Identity::from(&seeded.admin);
        let state = CreateExpenseState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Etc/UTC".to_owned(),
        };
        let batch = ExpenseBatchInput {
            expenses: vec![input("Salary", 1000.0), input("Grocery", -1.0)],
        };

        let result =
            create_expense_batch_endpoint(State(state.clone()), Extension(identity), Json(batch))
                .await;

        assert_eq!(result.err(), Some(Error::NegativeAmount(-1.0)));
        let stored = fetch_visible_expenses(&identity, &state.db_connection.lock().unwrap())
            .unwrap();
        assert!(stored.is_empty());
    }
}
