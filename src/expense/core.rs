//! Defines the expense model, validation at ingestion and the expense table queries.

use std::str::FromStr;

use rusqlite::{Connection, Row, types::Type};
use serde::Serialize;
use time::{Date, Month};

use crate::{
    Error, Identity, OrganizationId, UserID,
    database_id::ExpenseId,
    expense::taxonomy::{ExpenseType, MainCategory, OTHER_CATEGORY, persons_at},
};

// ============================================================================
// MODELS
// ============================================================================

/// A credit or debit recorded by a member of an organization.
///
/// To create a new `Expense`, use [Expense::build].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expense {
    /// The ID of the expense.
    pub id: ExpenseId,
    /// The organization that owns the expense.
    pub organization_id: OrganizationId,
    /// The user who recorded the expense, if they still exist.
    pub user_id: Option<UserID>,
    /// The top level of the category hierarchy.
    pub main_category: MainCategory,
    /// Where the money was spent or earned, one of [MainCategory::locations].
    pub location: String,
    /// The team member the expense was for, one of [persons_at] the location.
    pub person: Option<String>,
    /// What the money was for.
    pub category: String,
    /// Whether this is a credit or a debit, decided by the category.
    #[serde(rename = "type")]
    pub expense_type: ExpenseType,
    /// The amount of money, never negative.
    pub amount: f64,
    /// When the expense happened.
    pub date: Date,
    /// A free-form note.
    pub note: Option<String>,
    /// A link to a receipt, stored but never interpreted.
    pub receipt_url: Option<String>,
}

impl Expense {
    /// Start building a new expense.
    ///
    /// Shortcut for [ExpenseBuilder] for discoverability.
    pub fn build(
        main_category: MainCategory,
        location: &str,
        category: &str,
        amount: f64,
        date: Date,
    ) -> ExpenseBuilder {
        ExpenseBuilder {
            main_category,
            location: location.to_owned(),
            person: None,
            category: category.to_owned(),
            custom_category: None,
            amount,
            date,
            note: None,
            receipt_url: None,
        }
    }

    /// The calendar month of the expense, derived from its date.
    pub fn month(&self) -> Month {
        self.date.month()
    }
}

/// An expense as returned by the API, with its derived month name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseView {
    /// The stored expense.
    #[serde(flatten)]
    pub expense: Expense,
    /// The English name of the month of the expense date.
    pub month: String,
}

impl From<Expense> for ExpenseView {
    fn from(expense: Expense) -> Self {
        Self {
            month: expense.month().to_string(),
            expense,
        }
    }
}

/// A builder for expenses that have not been validated yet.
///
/// Call [ExpenseBuilder::finalize] to check the expense against the category
/// hierarchy and turn it into a [NewExpense].
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseBuilder {
    /// The top level of the category hierarchy.
    pub main_category: MainCategory,
    /// Must be one of the locations of `main_category`.
    pub location: String,
    /// Must be one of the team members at `location`, if given.
    pub person: Option<String>,
    /// What the money was for.
    pub category: String,
    /// Replaces the category when the category is "Others".
    pub custom_category: Option<String>,
    /// Must not be negative.
    pub amount: f64,
    /// Must not be after today.
    pub date: Date,
    /// Free text.
    pub note: Option<String>,
    /// A link to a photo of the receipt.
    pub receipt_url: Option<String>,
}

impl ExpenseBuilder {
    /// Set the team member the expense was for.
    pub fn person(mut self, person: Option<&str>) -> Self {
        self.person = person.map(str::to_owned);
        self
    }

    /// Set the category text used when the category is "Others".
    pub fn custom_category(mut self, custom_category: Option<&str>) -> Self {
        self.custom_category = custom_category.map(str::to_owned);
        self
    }

    /// Set the note.
    pub fn note(mut self, note: Option<&str>) -> Self {
        self.note = note.map(str::to_owned);
        self
    }

    /// Set the receipt link.
    pub fn receipt_url(mut self, receipt_url: Option<&str>) -> Self {
        self.receipt_url = receipt_url.map(str::to_owned);
        self
    }

    /// Validate the expense.
    ///
    /// `today` is the current date in the server's local timezone.
    /// The expense type is derived from the final category, so any type the
    /// client asked for is ignored.
    ///
    /// # Errors
    ///
    /// Returns a:
    /// - [Error::NegativeAmount] if the amount is negative or not finite,
    /// - [Error::InvalidLocation] if the location is not part of the main category,
    /// - [Error::InvalidPerson] if the person does not work at the location,
    /// - [Error::EmptyCategory] if the category is blank,
    /// - or [Error::FutureDate] if the date is after `today`.
    pub fn finalize(self, today: Date) -> Result<NewExpense, Error> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(Error::NegativeAmount(self.amount));
        }

        let location = self.location.trim();
        if !self.main_category.has_location(location) {
            return Err(Error::InvalidLocation {
                main_category: self.main_category.to_string(),
                location: location.to_owned(),
            });
        }

        let person = non_blank(self.person);
        if let Some(person) = &person
            && !persons_at(location).contains(&person.as_str())
        {
            return Err(Error::InvalidPerson {
                location: location.to_owned(),
                person: person.clone(),
            });
        }

        let category = match (self.category.trim(), non_blank(self.custom_category)) {
            (OTHER_CATEGORY, Some(custom_category)) => custom_category,
            (category, _) => category.to_owned(),
        };
        if category.is_empty() {
            return Err(Error::EmptyCategory);
        }

        if self.date > today {
            return Err(Error::FutureDate(self.date));
        }

        Ok(NewExpense {
            main_category: self.main_category,
            location: location.to_owned(),
            person,
            expense_type: ExpenseType::for_category(&category),
            category,
            amount: self.amount,
            date: self.date,
            note: non_blank(self.note),
            receipt_url: non_blank(self.receipt_url),
        })
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// An expense that passed validation and is ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    main_category: MainCategory,
    location: String,
    person: Option<String>,
    category: String,
    expense_type: ExpenseType,
    amount: f64,
    date: Date,
    note: Option<String>,
    receipt_url: Option<String>,
}

impl NewExpense {
    /// The category after the "Others" override.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The type derived from the category.
    pub fn expense_type(&self) -> ExpenseType {
        self.expense_type
    }
}

/// A correction to an existing expense. Fields that are `None` are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseUpdate {
    /// The corrected amount.
    pub amount: Option<f64>,
    /// The corrected note. `Some("")` clears the note.
    pub note: Option<String>,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the expense table in the database.
///
/// Requires the organization and user tables.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                organization_id INTEGER NOT NULL,
                user_id INTEGER,
                main_category TEXT NOT NULL,
                location TEXT NOT NULL,
                person TEXT,
                category TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('Credit', 'Debit')),
                amount REAL NOT NULL CHECK (amount >= 0),
                date TEXT NOT NULL,
                month TEXT NOT NULL,
                note TEXT,
                receipt_url TEXT,
                FOREIGN KEY(organization_id) REFERENCES organization(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // Every read is scoped by organization and usually a date range.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_expense_organization_date ON expense(organization_id, date);",
        (),
    )?;

    Ok(())
}

pub(crate) const EXPENSE_COLUMNS: &str = "id, organization_id, user_id, main_category, location, person, category, amount, date, note, receipt_url";

/// Insert a validated expense recorded by `owner` into their organization.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error.
pub fn create_expense(
    expense: NewExpense,
    owner: &Identity,
    connection: &Connection,
) -> Result<Expense, Error> {
    let month = expense.date.month().to_string();

    connection
        .prepare(&format!(
            "INSERT INTO expense (organization_id, user_id, main_category, location, person, category, type, amount, date, month, note, receipt_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            rusqlite::params![
                owner.organization_id.as_i64(),
                owner.user_id.as_i64(),
                expense.main_category.as_str(),
                expense.location,
                expense.person,
                expense.category,
                expense.expense_type.as_str(),
                expense.amount,
                expense.date,
                month,
                expense.note,
                expense.receipt_url,
            ],
            map_expense_row,
        )
        .map_err(|error| error.into())
}

/// Insert several validated expenses in one transaction.
///
/// Either every expense is inserted or none are.
///
/// # Errors
/// Returns a [Error::SqlError] if there is an SQL error, in which case nothing is inserted.
pub fn create_expenses(
    expenses: Vec<NewExpense>,
    owner: &Identity,
    connection: &Connection,
) -> Result<Vec<Expense>, Error> {
    // Using unchecked_transaction because we only have &Connection from the MutexGuard.
    let transaction = connection.unchecked_transaction()?;

    let created = expenses
        .into_iter()
        .map(|expense| create_expense(expense, owner, &transaction))
        .collect::<Result<Vec<_>, _>>()?;

    transaction.commit()?;

    Ok(created)
}

/// Retrieve an expense by its `id` from the caller's organization.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an expense in `organization_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_expense(
    id: ExpenseId,
    organization_id: OrganizationId,
    connection: &Connection,
) -> Result<Expense, Error> {
    let expense = connection
        .prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense WHERE id = :id AND organization_id = :organization_id"
        ))?
        .query_one(
            &[
                (":id", &id),
                (":organization_id", &organization_id.as_i64()),
            ],
            map_expense_row,
        )?;

    Ok(expense)
}

/// Apply `update` to the expense with `id` in `organization_id`.
///
/// Permission checks are the caller's job, see [crate::expense::can_edit].
///
/// # Errors
/// This function will return a:
/// - [Error::NegativeAmount] if the new amount is negative or not finite,
/// - [Error::UpdateMissingExpense] if the expense does not exist in the organization,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_expense(
    id: ExpenseId,
    organization_id: OrganizationId,
    update: ExpenseUpdate,
    connection: &Connection,
) -> Result<Expense, Error> {
    if let Some(amount) = update.amount
        && (!amount.is_finite() || amount < 0.0)
    {
        return Err(Error::NegativeAmount(amount));
    }

    let note = update.note.map(|note| note.trim().to_owned());

    connection
        .prepare(&format!(
            "UPDATE expense SET
                amount = COALESCE(:amount, amount),
                note = CASE WHEN :set_note THEN NULLIF(:note, '') ELSE note END
             WHERE id = :id AND organization_id = :organization_id
             RETURNING {EXPENSE_COLUMNS}"
        ))?
        .query_row(
            rusqlite::named_params! {
                ":amount": update.amount,
                ":set_note": note.is_some(),
                ":note": note,
                ":id": id,
                ":organization_id": organization_id.as_i64(),
            },
            map_expense_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UpdateMissingExpense,
            error => error.into(),
        })
}

/// Map a database row to an [Expense].
///
/// The columns must be in the order of [EXPENSE_COLUMNS]. The stored type is
/// not read back, it is derived from the category again.
pub(crate) fn map_expense_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    let raw_main_category: String = row.get(3)?;
    let main_category = MainCategory::from_str(&raw_main_category).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error))
    })?;
    let category: String = row.get(6)?;

    Ok(Expense {
        id: row.get(0)?,
        organization_id: OrganizationId::new(row.get(1)?),
        user_id: row.get::<_, Option<i64>>(2)?.map(UserID::new),
        main_category,
        location: row.get(4)?,
        person: row.get(5)?,
        expense_type: ExpenseType::for_category(&category),
        category,
        amount: row.get(7)?,
        date: row.get(8)?,
        note: row.get(9)?,
        receipt_url: row.get(10)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
