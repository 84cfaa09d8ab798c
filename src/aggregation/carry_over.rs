//! The balance carried over from the month before the selected one.

use time::Month;

use crate::{
    aggregation::{
        filter::{FilterSpec, Selection, apply_filters},
        rollup::net_balance,
    },
    expense::Expense,
};

/// The calendar month before `month` of `year`.
pub fn previous_period(month: Month, year: i32) -> (Month, i32) {
    match month {
        Month::January => (Month::December, year - 1),
        month => (month.previous(), year),
    }
}

/// The net balance of the month before the one selected in `spec`.
///
/// Only applies when both the month and the year are selected. Otherwise
/// there is no previous period, the result is zero and `refetch` is not called.
///
/// `refetch` must return the caller's visible expenses for the filter it is
/// given. Every dimension of `spec` other than the month and year is kept,
/// including the date range. Only one month is looked at, so a month with no
/// expenses carries over zero even if the months before it had a balance.
///
/// # Errors
///
/// Returns the error from `refetch`, if any.
pub fn compute_carry_over<E>(
    spec: &FilterSpec,
    refetch: impl FnOnce(&FilterSpec) -> Result<Vec<Expense>, E>,
) -> Result<f64, E> {
    let (Selection::Only(month), Selection::Only(year)) = (spec.month, spec.year) else {
        return Ok(0.0);
    };

    let (previous_month, previous_year) = previous_period(month, year);
    let previous_spec = spec.with_period(previous_month, previous_year);
    let previous_expenses = refetch(&previous_spec)?;

    Ok(net_balance(&apply_filters(
        &previous_expenses,
        &previous_spec,
    )))
}

/// The balance at the end of the selected period.
pub fn final_balance(carry_over: f64, net: f64) -> f64 {
    carry_over + net
}

#[cfg(test)]
mod carry_over_tests {
    use std::convert::Infallible;

    use time::{Month, macros::date};

    use crate::{
        aggregation::{
            filter::{FilterSpec, Selection, apply_filters},
            rollup::net_balance,
        },
        expense::Expense,
        test_utils::expense_on,
    };

    use super::{compute_carry_over, final_balance, previous_period};

    fn scenario() -> Vec<Expense> {
        vec![
            expense_on(date!(2025 - 01 - 05), "Salary", 1000.0),
            expense_on(date!(2025 - 01 - 18), "Grocery", 300.0),
            expense_on(date!(2025 - 02 - 11), "Grocery", 200.0),
        ]
    }

    fn month_of(month: Month, year: i32) -> FilterSpec {
        FilterSpec {
            month: Selection::Only(month),
            year: Selection::Only(year),
            ..Default::default()
        }
    }

    /// Answers a refetch the way the database would, from an in-memory list.
    fn refetch_from(
        expenses: &[Expense],
    ) -> impl FnOnce(&FilterSpec) -> Result<Vec<Expense>, Infallible> + '_ {
        move |spec: &FilterSpec| Ok(apply_filters(expenses, spec))
    }

    #[test]
    fn previous_period_wraps_january() {
        assert_eq!(
            previous_period(Month::January, 2025),
            (Month::December, 2024)
        );
        assert_eq!(
            previous_period(Month::March, 2025),
            (Month::February, 2025)
        );
    }

    #[test]
    fn february_scenario() {
        let expenses = scenario();
        let spec = month_of(Month::February, 2025);

        let current = apply_filters(&expenses, &spec);
        let net = net_balance(&current);
        let carry_over = compute_carry_over(&spec, refetch_from(&expenses)).unwrap();

        assert_eq!(current.len(), 1);
        assert_eq!(net, -200.0);
        assert_eq!(carry_over, 700.0);
        assert_eq!(final_balance(carry_over, net), 500.0);
    }

    #[test]
    fn carry_over_is_zero_without_previous_data() {
        let expenses = scenario();

        let carry_over =
            compute_carry_over(&month_of(Month::January, 2025), refetch_from(&expenses)).unwrap();

        assert_eq!(carry_over, 0.0);
    }

    #[test]
    fn carry_over_looks_back_exactly_one_month() {
        // March's previous month, February, only has a -200 debit. January's
        // +700 is not rolled forward.
        let expenses = scenario();

        let carry_over =
            compute_carry_over(&month_of(Month::March, 2025), refetch_from(&expenses)).unwrap();

        assert_eq!(carry_over, -200.0);
    }

    #[test]
    fn carry_over_skips_empty_month() {
        let expenses = scenario();

        let carry_over =
            compute_carry_over(&month_of(Month::April, 2025), refetch_from(&expenses)).unwrap();

        assert_eq!(carry_over, 0.0);
    }

    #[test]
    fn no_carry_over_without_a_concrete_period() {
        let specs = [
            FilterSpec::default(),
            FilterSpec {
                month: Selection::Only(Month::February),
                ..Default::default()
            },
            FilterSpec {
                year: Selection::Only(2025),
                ..Default::default()
            },
        ];

        for spec in specs {
            let carry_over = compute_carry_over(&spec, |_| -> Result<Vec<Expense>, Infallible> {
                panic!("refetch must not be called for {spec:?}")
            })
            .unwrap();

            assert_eq!(carry_over, 0.0);
        }
    }

    #[test]
    fn other_dimensions_are_held_fixed() {
        let mut expenses = scenario();
        expenses[0].category = "UPI Payment".to_owned();
        let spec = FilterSpec {
            category: Selection::Only("Grocery".to_owned()),
            ..month_of(Month::February, 2025)
        };

        let carry_over = compute_carry_over(&spec, |previous: &FilterSpec| {
            assert_eq!(previous.category, spec.category);
            assert_eq!(previous.month, Selection::Only(Month::January));
            Ok::<_, Infallible>(expenses.clone())
        })
        .unwrap();

        // Only January's Grocery debit counts.
        assert_eq!(carry_over, -300.0);
    }

    #[test]
    fn refetch_errors_propagate() {
        let result = compute_carry_over(&month_of(Month::February, 2025), |_| {
            Err::<Vec<Expense>, _>("database is down")
        });

        assert_eq!(result, Err("database is down"));
    }
}
