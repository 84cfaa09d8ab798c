//! Totals and breakdowns over a set of expenses.

use std::collections::HashMap;

use serde::Serialize;

use crate::{
    UserID,
    expense::{Expense, ExpenseType},
};

/// Maps user IDs to display names for the employee breakdown.
pub type EmployeeDirectory = HashMap<UserID, String>;

/// The category bucket for expenses with a blank category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The employee bucket for expenses whose author is missing or unknown.
pub const UNKNOWN_EMPLOYEE: &str = "Unknown";

/// The sum of the amounts of the expenses of type `expense_type`.
pub fn total_by_type(expenses: &[Expense], expense_type: ExpenseType) -> f64 {
    expenses
        .iter()
        .filter(|expense| expense.expense_type == expense_type)
        .map(|expense| expense.amount)
        .sum()
}

/// Credits minus debits.
pub fn net_balance(expenses: &[Expense]) -> f64 {
    total_by_type(expenses, ExpenseType::Credit) - total_by_type(expenses, ExpenseType::Debit)
}

/// `group_total` as a percentage of `grand_total`, or zero if `grand_total` is zero.
pub fn percent_of_total(group_total: f64, grand_total: f64) -> f64 {
    if grand_total == 0.0 {
        return 0.0;
    }

    group_total / grand_total * 100.0
}

/// The running totals of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    /// How many expenses are in the group.
    pub count: usize,
    /// The sum of the credits in the group.
    pub credit_total: f64,
    /// The sum of the debits in the group.
    pub debit_total: f64,
}

impl Tally {
    fn add(&mut self, expense: &Expense) {
        self.count += 1;

        match expense.expense_type {
            ExpenseType::Credit => self.credit_total += expense.amount,
            ExpenseType::Debit => self.debit_total += expense.amount,
        }
    }

    /// The magnitude of money moved, used to rank groups.
    pub fn total(&self) -> f64 {
        self.credit_total + self.debit_total
    }
}

/// The expenses of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    /// The category, or [UNCATEGORIZED].
    pub category: String,
    /// The totals for the category.
    #[serde(flatten)]
    pub tally: Tally,
}

/// The expenses recorded by one employee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeTotal {
    /// The employee, or `None` for the [UNKNOWN_EMPLOYEE] bucket.
    pub user_id: Option<UserID>,
    /// The employee's name from the directory, or [UNKNOWN_EMPLOYEE].
    pub display_name: String,
    /// The totals for the employee.
    #[serde(flatten)]
    pub tally: Tally,
}

/// Tally expenses per key, keeping groups in first-seen order.
fn group_by<K, F>(expenses: &[Expense], key_of: F) -> Vec<(K, Tally)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&Expense) -> K,
{
    let mut index_of_key: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Tally)> = Vec::new();

    for expense in expenses {
        let key = key_of(expense);
        let index = *index_of_key.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Tally::default()));
            groups.len() - 1
        });

        groups[index].1.add(expense);
    }

    // `sort_by` is stable, so ties stay in first-seen order.
    groups.sort_by(|(_, a), (_, b)| b.total().total_cmp(&a.total()));

    groups
}

/// Break the expenses down by category, largest total first.
///
/// Blank categories are grouped under [UNCATEGORIZED].
pub fn group_by_category(expenses: &[Expense]) -> Vec<CategoryTotal> {
    group_by(expenses, |expense| {
        let category = expense.category.trim();

        if category.is_empty() {
            UNCATEGORIZED.to_owned()
        } else {
            category.to_owned()
        }
    })
    .into_iter()
    .map(|(category, tally)| CategoryTotal { category, tally })
    .collect()
}

/// Break the expenses down by the employee who recorded them, largest total first.
///
/// Expenses without an author, or whose author is not in `directory`, are
/// grouped under [UNKNOWN_EMPLOYEE] rather than dropped.
pub fn group_by_employee(
    expenses: &[Expense],
    directory: &EmployeeDirectory,
) -> Vec<EmployeeTotal> {
    group_by(expenses, |expense| {
        expense
            .user_id
            .filter(|user_id| directory.contains_key(user_id))
    })
    .into_iter()
    .map(|(user_id, tally)| EmployeeTotal {
        user_id,
        display_name: user_id
            .and_then(|user_id| directory.get(&user_id).cloned())
            .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_owned()),
        tally,
    })
    .collect()
}

/// Everything the dashboard shows about a set of expenses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// The sum of all credits.
    pub total_credit: f64,
    /// The sum of all debits.
    pub total_debit: f64,
    /// Credits minus debits.
    pub net: f64,
    /// How many expenses were summarised.
    pub expense_count: usize,
    /// The mean amount per expense, or zero with no expenses.
    pub average_amount: f64,
    /// See [group_by_category].
    pub by_category: Vec<CategoryTotal>,
    /// See [group_by_employee].
    pub by_employee: Vec<EmployeeTotal>,
}

/// Compute the totals and breakdowns of `expenses`.
pub fn aggregate(expenses: &[Expense], directory: &EmployeeDirectory) -> Summary {
    let total_credit = total_by_type(expenses, ExpenseType::Credit);
    let total_debit = total_by_type(expenses, ExpenseType::Debit);
    let expense_count = expenses.len();

    let average_amount = if expense_count == 0 {
        0.0
    } else {
        (total_credit + total_debit) / expense_count as f64
    };

    Summary {
        total_credit,
        total_debit,
        net: total_credit - total_debit,
        expense_count,
        average_amount,
        by_category: group_by_category(expenses),
        by_employee: group_by_employee(expenses, directory),
    }
}
