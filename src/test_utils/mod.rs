#![allow(missing_docs)]

use rusqlite::Connection;
use time::Date;

use crate::{
    Organization, OrganizationId, PasswordHash, Role, User, UserID, ValidatedPassword,
    db::initialize,
    expense::{Expense, ExpenseType, MainCategory},
    name::Name,
    organization::create_organization,
    user::{NewUser, create_user},
};

/// A password that passes the strength check.
pub(crate) const TEST_PASSWORD: &str = "quokkalanterntundra47";

pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();
    connection
}

/// An organization with one admin and two employees.
#[derive(Debug, Clone)]
pub(crate) struct SeededOrganization {
    pub organization: Organization,
    pub admin: User,
    pub employee: User,
    pub other_employee: User,
}

/// Create an organization called `name` and its users.
///
/// Every user's password is [TEST_PASSWORD]. Emails are derived from `name`,
/// so seed each organization name at most once per connection.
pub(crate) fn seed_organization(connection: &Connection, name: &str) -> SeededOrganization {
    let organization = create_organization(Name::new_unchecked(name), connection).unwrap();
    let password_hash =
        PasswordHash::new(ValidatedPassword::new_unchecked(TEST_PASSWORD), 4).unwrap();
    let domain = name.to_lowercase().replace(' ', "-");

    let create = |user_name: &str, role: Role| {
        create_user(
            NewUser {
                name: Name::new_unchecked(&format!("{user_name} of {name}")),
                email: format!("{}@{domain}.test", user_name.to_lowercase()),
                role,
                organization_id: organization.id,
                password_hash: password_hash.clone(),
            },
            connection,
        )
        .unwrap()
    };

    SeededOrganization {
        admin: create("Admin", Role::Admin),
        employee: create("Employee", Role::Employee),
        other_employee: create("Other", Role::Employee),
        organization,
    }
}

/// An office expense recorded by user 1 of organization 1.
pub(crate) fn expense_on(date: Date, category: &str, amount: f64) -> Expense {
    Expense {
        id: 0,
        organization_id: OrganizationId::new(1),
        user_id: Some(UserID::new(1)),
        main_category: MainCategory::OfficeBased,
        location: "Wardha".to_owned(),
        person: None,
        category: category.to_owned(),
        expense_type: ExpenseType::for_category(category),
        amount,
        date,
        note: None,
        receipt_url: None,
    }
}
