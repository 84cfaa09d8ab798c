//! Code for creating the organization table and looking up organizations.
//!
//! An organization is a tenant: every user and expense belongs to exactly one
//! organization. Employees join an organization by presenting its join code.

use std::fmt::Display;

use rand::Rng;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, name::Name};

/// A newtype wrapper for integer organization IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct OrganizationId(i64);

impl OrganizationId {
    /// Create a new organization ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the organization ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The number of characters in a join code.
pub const JOIN_CODE_LENGTH: usize = 6;

const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many times to retry generating a join code that is already taken.
const MAX_JOIN_CODE_ATTEMPTS: usize = 5;

/// Generate a random, upper-case alphanumeric join code.
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();

    (0..JOIN_CODE_LENGTH)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalise a join code entered by a user, e.g. " ab12cd" -> "AB12CD".
pub fn normalize_join_code(raw_code: &str) -> String {
    raw_code.trim().to_ascii_uppercase()
}

/// An isolated customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// The organization's ID in the application database.
    pub id: OrganizationId,
    /// The display name of the organization.
    pub name: Name,
    /// The unique join code employees use to register with the organization.
    pub code: String,
}

/// Create the organization table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_organization_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS organization (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new organization with a freshly generated join code.
///
/// Join codes are retried a few times if they clash with an existing code.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_organization(name: Name, connection: &Connection) -> Result<Organization, Error> {
    let mut attempt = 1;

    loop {
        let code = generate_join_code();

        let result = connection
            .prepare(
                "INSERT INTO organization (name, code) VALUES (?1, ?2)
                 RETURNING id, name, code",
            )?
            .query_row((name.as_ref(), &code), map_organization_row);

        match result {
            Ok(organization) => return Ok(organization),
            Err(rusqlite::Error::SqliteFailure(sql_error, Some(ref desc)))
                if sql_error.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    && desc.ends_with("organization.code")
                    && attempt < MAX_JOIN_CODE_ATTEMPTS =>
            {
                tracing::warn!("join code {code} already taken, generating another one");
                attempt += 1;
            }
            Err(error) => return Err(error.into()),
        }
    }
}

/// Get the organization with an ID equal to `id`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to an organization,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_organization_by_id(
    id: OrganizationId,
    connection: &Connection,
) -> Result<Organization, Error> {
    connection
        .prepare("SELECT id, name, code FROM organization WHERE id = :id")?
        .query_row(&[(":id", &id.as_i64())], map_organization_row)
        .map_err(|error| error.into())
}

/// Get the organization that uses the join code `code`.
///
/// The code is normalised before the lookup, so lower-case input is accepted.
///
/// # Errors
///
/// This function will return a:
/// - [Error::InvalidOrganizationCode] if no organization uses the code,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_organization_by_code(
    code: &str,
    connection: &Connection,
) -> Result<Organization, Error> {
    let code = normalize_join_code(code);

    connection
        .prepare("SELECT id, name, code FROM organization WHERE code = :code")?
        .query_row(&[(":code", &code)], map_organization_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::InvalidOrganizationCode,
            error => error.into(),
        })
}

fn map_organization_row(row: &Row) -> Result<Organization, rusqlite::Error> {
    let id = OrganizationId::new(row.get(0)?);
    let name: String = row.get(1)?;
    let code = row.get(2)?;

    Ok(Organization {
        id,
        name: Name::new_unchecked(&name),
        code,
    })
}
