//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    aggregation::EmployeeDirectory,
    auth::PasswordHash,
    name::Name,
    organization::OrganizationId,
};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to see within their organization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sees every expense in the organization.
    Admin,
    /// Sees only their own expenses.
    Employee,
}

impl Role {
    /// The string stored in the database for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            other => {
                tracing::error!("unknown role {other:?} in the user table");
                Err(Error::NotFound)
            }
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse and normalise an email address.
///
/// Addresses are stored in lower case so that uniqueness is case-insensitive.
///
/// # Errors
///
/// Returns an [Error::InvalidEmail] if `raw_email` is not a valid address.
pub fn parse_email(raw_email: &str) -> Result<String, Error> {
    let raw_email = raw_email.trim();

    EmailAddress::from_str(raw_email)
        .map(|email| email.as_str().to_lowercase())
        .map_err(|_| Error::InvalidEmail(raw_email.to_owned()))
}

/// A user of the application.
///
/// The caller should ensure that `id` is unique.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name.
    pub name: Name,
    /// The user's email address, in lower case.
    pub email: String,
    /// Whether the user is an admin or an employee.
    pub role: Role,
    /// The organization the user belongs to. This never changes after registration.
    pub organization_id: OrganizationId,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The data needed to insert a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// The user's display name.
    pub name: Name,
    /// A normalised email address, see [parse_email].
    pub email: String,
    /// Whether the user is an admin or an employee.
    pub role: Role,
    /// The organization the user belongs to.
    pub organization_id: OrganizationId,
    /// The user's password hash.
    pub password_hash: PasswordHash,
}

/// The public view of a user, without their password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    /// The user's ID.
    pub id: UserID,
    /// The user's display name.
    pub name: Name,
    /// The user's email address.
    pub email: String,
    /// The user's role.
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Create the user table.
///
/// Requires the organization table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('admin', 'employee')),
                organization_id INTEGER NOT NULL,
                FOREIGN KEY(organization_id) REFERENCES organization(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_organization ON user(organization_id);",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateEmail] if the email address is already registered,
/// - or [Error::SqlError] if some other SQL related error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "INSERT INTO user (name, email, password, role, organization_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, name, email, password, role, organization_id",
        )?
        .query_row(
            (
                new_user.name.as_ref(),
                &new_user.email,
                new_user.password_hash.as_ref(),
                new_user.role.as_str(),
                new_user.organization_id.as_i64(),
            ),
            map_user_row,
        )
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password, role, organization_id FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with the email address `email`.
///
/// `email` is normalised before the lookup.
///
/// # Errors
///
/// This function will return an [Error::NotFound] if no user has the email address,
/// or an [Error::SqlError] if there was some other SQL error.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    let email = email.trim().to_lowercase();

    connection
        .prepare(
            "SELECT id, name, email, password, role, organization_id FROM user WHERE email = :email",
        )?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| error.into())
}

/// Get all users in the organization, ordered by name.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_users_in_organization(
    organization_id: OrganizationId,
    connection: &Connection,
) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, name, email, password, role, organization_id FROM user
             WHERE organization_id = :organization_id
             ORDER BY name ASC, id ASC",
        )?
        .query_map(
            &[(":organization_id", &organization_id.as_i64())],
            map_user_row,
        )?
        .map(|user_result| user_result.map_err(Error::from))
        .collect()
}

/// Build the lookup from user ID to display name for an organization.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_employee_directory(
    organization_id: OrganizationId,
    connection: &Connection,
) -> Result<EmployeeDirectory, Error> {
    connection
        .prepare("SELECT id, name FROM user WHERE organization_id = :organization_id")?
        .query_map(&[(":organization_id", &organization_id.as_i64())], |row| {
            Ok((UserID::new(row.get(0)?), row.get::<_, String>(1)?))
        })?
        .map(|entry| entry.map_err(Error::from))
        .collect()
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns a [Error::NotFound] if there is no such user,
/// or [Error::SqlError] if some other SQL related error occurred.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let id = UserID::new(row.get(0)?);
    let name: String = row.get(1)?;
    let email = row.get(2)?;
    let raw_password_hash: String = row.get(3)?;
    let raw_role: String = row.get(4)?;
    let organization_id = OrganizationId::new(row.get(5)?);

    let role = Role::from_str(&raw_role).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(User {
        id,
        name: Name::new_unchecked(&name),
        email,
        role,
        organization_id,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
    })
}
