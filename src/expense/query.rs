//! Role-scoped database reads.
//!
//! Every query is restricted to the caller's organization, and to the
//! caller's own expenses when they are an employee.

use rusqlite::{Connection, named_params};
use time::{Date, Month};

use crate::{
    Error, Identity,
    expense::{
        Expense,
        core::{EXPENSE_COLUMNS, map_expense_row},
    },
};

/// Get every expense the caller may see, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn fetch_visible_expenses(
    identity: &Identity,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    fetch_visible_expenses_between(identity, Date::MIN, Date::MAX, connection)
}

/// Get the expenses the caller may see in one calendar month, newest first.
///
/// # Errors
/// Returns [Error::SqlError] if the query fails.
pub fn fetch_visible_expenses_in_month(
    identity: &Identity,
    year: i32,
    month: Month,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    let Ok(start) = Date::from_calendar_date(year, month, 1) else {
        // Years outside the supported range cannot have any expenses.
        return Ok(Vec::new());
    };
    let end = start
        .replace_day(month.length(year))
        .unwrap_or(start);

    fetch_visible_expenses_between(identity, start, end, connection)
}

fn fetch_visible_expenses_between(
    identity: &Identity,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    // Admins pass a NULL user filter, which matches every author.
    let user_id = (!identity.is_admin()).then(|| identity.user_id.as_i64());

    connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense
             WHERE organization_id = :organization_id
               AND (:user_id IS NULL OR user_id = :user_id)
               AND date BETWEEN :start AND :end
             ORDER BY date DESC, id DESC"
        ))?
        .query_map(
            named_params! {
                ":organization_id": identity.organization_id.as_i64(),
                ":user_id": user_id,
                ":start": start,
                ":end": end,
            },
            map_expense_row,
        )?
        .map(|expense_result| expense_result.map_err(Error::SqlError))
        .collect()
}
