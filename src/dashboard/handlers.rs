//! Dashboard HTTP handlers.
//!
//! This module contains:
//! - The route handler for the dashboard summary
//! - The pipeline that turns the caller's expenses into a [DashboardView]

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error, Identity,
    aggregation::{
        CategoryTotal, EmployeeTotal, FilterQuery, FilterSpec, Summary, Tally, aggregate,
        apply_filters, compute_carry_over, final_balance, percent_of_total, restrict_to_identity,
    },
    expense::{Expense, fetch_visible_expenses, fetch_visible_expenses_in_month},
    user::get_employee_directory,
};

/// The state needed for the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading expenses and users.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A breakdown group with its share of all money moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share<T> {
    /// The group and its totals.
    #[serde(flatten)]
    pub group: T,
    /// The group's credits and debits as a percentage of all credits and debits.
    pub percent_of_total: f64,
}

/// Everything the dashboard shows for one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// The sum of all credits in the period.
    pub total_credit: f64,
    /// The sum of all debits in the period.
    pub total_debit: f64,
    /// Credits minus debits in the period.
    pub net: f64,
    /// How many expenses matched the filter.
    pub expense_count: usize,
    /// The mean amount per expense.
    pub average_amount: f64,
    /// Per category, largest first.
    pub by_category: Vec<Share<CategoryTotal>>,
    /// Per employee, largest first.
    pub by_employee: Vec<Share<EmployeeTotal>>,
    /// The net balance of the previous month, zero unless a month and year are selected.
    pub carry_over: f64,
    /// The carry-over plus the net of the period.
    pub final_balance: f64,
}

fn with_shares<T>(
    groups: Vec<T>,
    grand_total: f64,
    tally_of: impl Fn(&T) -> &Tally,
) -> Vec<Share<T>> {
    groups
        .into_iter()
        .map(|group| Share {
            percent_of_total: percent_of_total(tally_of(&group).total(), grand_total),
            group,
        })
        .collect()
}

impl DashboardView {
    fn new(summary: Summary, carry_over: f64) -> Self {
        let grand_total = summary.total_credit + summary.total_debit;

        Self {
            total_credit: summary.total_credit,
            total_debit: summary.total_debit,
            net: summary.net,
            expense_count: summary.expense_count,
            average_amount: summary.average_amount,
            by_category: with_shares(summary.by_category, grand_total, |group| &group.tally),
            by_employee: with_shares(summary.by_employee, grand_total, |group| &group.tally),
            carry_over,
            final_balance: final_balance(carry_over, summary.net),
        }
    }
}

/// Run the dashboard pipeline for `identity`.
///
/// The caller's visible expenses are fetched, restricted to what the caller
/// may see, filtered and summarised. When `spec` selects a month and a year,
/// the previous month is fetched again for the carry-over.
///
/// # Errors
///
/// Returns an [Error::SqlError] if a query fails.
pub fn build_dashboard(
    identity: &Identity,
    spec: &FilterSpec,
    connection: &Connection,
) -> Result<DashboardView, Error> {
    let expenses = restrict_to_identity(fetch_visible_expenses(identity, connection)?, identity);
    let current = apply_filters(&expenses, spec);
    let directory = get_employee_directory(identity.organization_id, connection)?;
    let summary = aggregate(&current, &directory);

    let refetch = |previous: &FilterSpec| -> Result<Vec<Expense>, Error> {
        let fetched = match (previous.month.as_only(), previous.year.as_only()) {
            (Some(&month), Some(&year)) => {
                fetch_visible_expenses_in_month(identity, year, month, connection)?
            }
            _ => fetch_visible_expenses(identity, connection)?,
        };

        Ok(restrict_to_identity(fetched, identity))
    };
    let carry_over = compute_carry_over(spec, refetch)?;

    Ok(DashboardView::new(summary, carry_over))
}

/// A route handler that summarises the caller's expenses matching the query
/// string filters.
///
/// # Errors
///
/// Returns an [Error::InvalidFilter] if the query string cannot be parsed.
pub async fn get_dashboard(
    State(state): State<DashboardState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<DashboardView>, Error> {
    let spec = FilterSpec::try_from(query)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    build_dashboard(&identity, &spec, &connection)
        .inspect_err(|error| tracing::error!("could not build dashboard: {error}"))
        .map(Json)
}
