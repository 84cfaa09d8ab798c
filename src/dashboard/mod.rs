//! Dashboard module
//!
//! Provides the filtered summary of an organization's expenses: totals,
//! breakdowns by category and employee, and the balance carried over from
//! the previous month.

mod handlers;

pub use handlers::get_dashboard;
