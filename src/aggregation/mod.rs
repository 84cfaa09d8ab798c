//! Filtering and aggregation over snapshots of expenses.
//!
//! Everything here is a pure function of its inputs. The handlers fetch the
//! caller's expenses, restrict them with [restrict_to_identity], filter them
//! with [apply_filters] and then summarise them with [aggregate].

pub mod carry_over;
pub mod filter;
pub mod rollup;
pub mod visibility;

pub use carry_over::{compute_carry_over, final_balance, previous_period};
pub use filter::{DateRange, FilterQuery, FilterSpec, Selection, apply_filters};
pub use rollup::{
    CategoryTotal, EmployeeDirectory, EmployeeTotal, Summary, Tally, UNCATEGORIZED,
    UNKNOWN_EMPLOYEE, aggregate, group_by_category, group_by_employee, net_balance,
    percent_of_total, total_by_type,
};
pub use visibility::{is_visible_to, restrict_to_identity};
