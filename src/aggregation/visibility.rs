//! Role-based visibility over in-memory expense snapshots.

use crate::{Identity, expense::Expense};

/// Whether `identity` may see `expense`.
///
/// Admins see every expense in their organization, employees only see the
/// expenses they recorded themselves.
pub fn is_visible_to(expense: &Expense, identity: &Identity) -> bool {
    expense.organization_id == identity.organization_id
        && (identity.is_admin() || expense.user_id == Some(identity.user_id))
}

/// Drop the expenses `identity` may not see.
///
/// This runs before any other filter, so an employee filter can never widen
/// what an employee sees.
pub fn restrict_to_identity(expenses: Vec<Expense>, identity: &Identity) -> Vec<Expense> {
    expenses
        .into_iter()
        .filter(|expense| is_visible_to(expense, identity))
        .collect()
}
