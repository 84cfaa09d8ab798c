//! Sets up the application's SQLite database.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, expense::create_expense_table, organization::create_organization_table,
    user::create_user_table,
};

/// Create the application tables if they do not exist yet.
///
/// Foreign keys are enabled on `connection`, since deleting a user relies on
/// them to detach the user's expenses.
///
/// # Errors
/// This function will return an error if there is an SQL error, in which case
/// no tables are created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_organization_table(&transaction)?;
    create_user_table(&transaction)?;
    create_expense_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
