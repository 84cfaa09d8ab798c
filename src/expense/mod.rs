//! Expense management.
//!
//! This module contains everything related to expenses:
//! - The [Expense] model, ingestion validation and the expense table queries
//! - The category hierarchy and the category to type lookup
//! - Role-scoped reads of an organization's expenses
//! - The JSON endpoints for listing, recording and correcting expenses

mod core;
mod create_endpoint;
mod edit_endpoint;
mod list_endpoint;
mod query;
mod taxonomy;

pub use core::{
    Expense, ExpenseBuilder, ExpenseUpdate, ExpenseView, NewExpense, create_expense,
    create_expense_table, create_expenses, get_expense, update_expense,
};
pub use create_endpoint::{
    ExpenseBatchInput, ExpenseInput, create_expense_batch_endpoint, create_expense_endpoint,
};
pub use edit_endpoint::{EditExpenseData, can_edit, edit_expense_endpoint};
pub use list_endpoint::get_expenses;
pub use query::{fetch_visible_expenses, fetch_visible_expenses_in_month};
pub use taxonomy::{
    AUTO_CREDIT_CATEGORIES, COMMON_CATEGORIES, ExpenseType, MainCategory, OTHER_CATEGORY,
    get_taxonomy, month_names, persons_at,
};
