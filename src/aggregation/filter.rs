//! Multi-dimensional expense filters.
//!
//! A [FilterSpec] is a conjunction of independent dimensions. Each dimension
//! is either [Selection::All], which imposes no constraint, or
//! [Selection::Only], which keeps the expenses with exactly that value.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Month, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error, UserID,
    expense::{Expense, ExpenseType, MainCategory, persons_at},
};

/// The value a filter selects for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection<T> {
    /// Every value matches.
    All,
    /// Only this value matches.
    Only(T),
}

// Written by hand so that `T` does not need a default.
impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: PartialEq> Selection<T> {
    /// Whether `value` is selected.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(selected) => selected == value,
        }
    }

    /// Whether every value is selected.
    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

impl<T> Selection<T> {
    /// The selected value, if there is one.
    pub fn as_only(&self) -> Option<&T> {
        match self {
            Selection::All => None,
            Selection::Only(value) => Some(value),
        }
    }
}

/// An inclusive date range. A missing bound imposes no constraint on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// The earliest date to keep.
    pub start: Option<Date>,
    /// The latest date to keep.
    pub end: Option<Date>,
}

impl DateRange {
    /// Whether `date` lies within the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start.is_none_or(|start| start <= date) && self.end.is_none_or(|end| date <= end)
    }
}

/// Which expenses to keep.
///
/// Build one from a [FilterQuery] to get validation and the dependent reset
/// cascade, or construct it directly in code that already has typed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// The calendar month of the expense date.
    pub month: Selection<Month>,
    /// The calendar year of the expense date.
    pub year: Selection<i32>,
    /// The expense's main category.
    pub main_category: Selection<MainCategory>,
    /// The expense's location.
    pub location: Selection<String>,
    /// The team member tagged on the expense.
    pub person: Selection<String>,
    /// The expense's category.
    pub category: Selection<String>,
    /// Credit or debit.
    pub expense_type: Selection<ExpenseType>,
    /// The user who recorded the expense.
    pub employee_id: Selection<UserID>,
    /// An inclusive range on the expense date.
    pub date_range: DateRange,
}

type Predicate<'a> = Box<dyn Fn(&Expense) -> bool + 'a>;

impl FilterSpec {
    /// One predicate per filter dimension.
    ///
    /// The predicates do not depend on each other, so they can be combined in
    /// any order.
    pub fn dimensions(&self) -> Vec<Predicate<'_>> {
        let dimensions: [Predicate<'_>; 9] = [
            Box::new(|expense: &Expense| self.month.matches(&expense.date.month())),
            Box::new(|expense: &Expense| self.year.matches(&expense.date.year())),
            Box::new(|expense: &Expense| self.main_category.matches(&expense.main_category)),
            Box::new(|expense: &Expense| self.location.matches(&expense.location)),
            Box::new(|expense: &Expense| match (&self.person, &expense.person) {
                (Selection::All, _) => true,
                (Selection::Only(selected), Some(person)) => selected == person,
                (Selection::Only(_), None) => false,
            }),
            Box::new(|expense: &Expense| self.category.matches(&expense.category)),
            Box::new(|expense: &Expense| self.expense_type.matches(&expense.expense_type)),
            Box::new(|expense: &Expense| match (&self.employee_id, expense.user_id) {
                (Selection::All, _) => true,
                (Selection::Only(selected), Some(user_id)) => *selected == user_id,
                (Selection::Only(_), None) => false,
            }),
            Box::new(|expense: &Expense| self.date_range.contains(expense.date)),
        ];

        Vec::from(dimensions)
    }

    /// Whether `expense` satisfies every dimension.
    pub fn matches(&self, expense: &Expense) -> bool {
        self.dimensions()
            .iter()
            .all(|predicate| predicate(expense))
    }

    /// A copy of this filter with the month and year replaced.
    pub fn with_period(&self, month: Month, year: i32) -> Self {
        Self {
            month: Selection::Only(month),
            year: Selection::Only(year),
            ..self.clone()
        }
    }

    /// Apply the dependent reset cascade and check the hierarchy.
    ///
    /// Selecting every main category resets the location, and selecting every
    /// location resets the person.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidFilter] if a concrete location is not part of
    /// the concrete main category, or a concrete person does not work at the
    /// concrete location.
    pub fn normalize(mut self) -> Result<Self, Error> {
        if self.main_category.is_all() {
            self.location = Selection::All;
        }

        if self.location.is_all() {
            self.person = Selection::All;
        }

        if let (Selection::Only(main_category), Selection::Only(location)) =
            (&self.main_category, &self.location)
            && !main_category.has_location(location)
        {
            return Err(Error::InvalidFilter(format!(
                "\"{location}\" is not a location for \"{main_category}\""
            )));
        }

        if let (Selection::Only(location), Selection::Only(person)) = (&self.location, &self.person)
            && !persons_at(location).contains(&person.as_str())
        {
            return Err(Error::InvalidFilter(format!(
                "\"{person}\" is not a team member at \"{location}\""
            )));
        }

        Ok(self)
    }
}

/// Keep the expenses that match every active dimension of `spec`.
///
/// The result preserves the input order.
pub fn apply_filters(expenses: &[Expense], spec: &FilterSpec) -> Vec<Expense> {
    let dimensions = spec.dimensions();

    expenses
        .iter()
        .filter(|&expense| dimensions.iter().all(|predicate| predicate(expense)))
        .cloned()
        .collect()
}

/// The raw filter parameters from a query string.
///
/// Every field is optional. A missing field, an empty string or "All" selects
/// every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterQuery {
    /// An English month name, e.g. "February".
    pub month: Option<String>,
    /// A four digit year, e.g. "2025".
    pub year: Option<String>,
    /// e.g. "Office Based".
    pub main_category: Option<String>,
    /// e.g. "Wardha".
    pub location: Option<String>,
    /// e.g. "Mayur".
    pub person: Option<String>,
    /// e.g. "Grocery".
    pub category: Option<String>,
    /// "Credit" or "Debit".
    #[serde(rename = "type")]
    pub expense_type: Option<String>,
    /// A user ID.
    pub employee_id: Option<String>,
    /// An ISO 8601 date, e.g. "2025-02-01".
    pub start_date: Option<String>,
    /// An ISO 8601 date, e.g. "2025-02-28".
    pub end_date: Option<String>,
}

const ALL: &str = "All";

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

fn parse_selection<T>(
    raw: Option<&str>,
    parse: impl FnOnce(&str) -> Result<T, Error>,
) -> Result<Selection<T>, Error> {
    match raw.map(str::trim) {
        None | Some("") | Some(ALL) => Ok(Selection::All),
        Some(raw) => parse(raw).map(Selection::Only),
    }
}

fn parse_month(raw: &str) -> Result<Month, Error> {
    let mut month = Month::January;

    for _ in 0..12 {
        if month.to_string().eq_ignore_ascii_case(raw) {
            return Ok(month);
        }
        month = month.next();
    }

    Err(Error::InvalidFilter(format!("unknown month \"{raw}\"")))
}

fn parse_year(raw: &str) -> Result<i32, Error> {
    if raw.len() != 4 || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(Error::InvalidFilter(format!(
            "\"{raw}\" is not a four digit year"
        )));
    }

    raw.parse()
        .map_err(|_| Error::InvalidFilter(format!("\"{raw}\" is not a four digit year")))
}

fn parse_date(raw: &str) -> Result<Date, Error> {
    Date::parse(raw, DATE_FORMAT)
        .map_err(|_| Error::InvalidFilter(format!("\"{raw}\" is not a date like 2025-02-01")))
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<Date>, Error> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(raw).map(Some),
    }
}

impl TryFrom<FilterQuery> for FilterSpec {
    type Error = Error;

    fn try_from(query: FilterQuery) -> Result<Self, Self::Error> {
        let date_range = DateRange {
            start: parse_optional_date(query.start_date.as_deref())?,
            end: parse_optional_date(query.end_date.as_deref())?,
        };

        if let (Some(start), Some(end)) = (date_range.start, date_range.end)
            && start > end
        {
            return Err(Error::InvalidFilter(format!(
                "the start date {start} is after the end date {end}"
            )));
        }

        FilterSpec {
            month: parse_selection(query.month.as_deref(), parse_month)?,
            year: parse_selection(query.year.as_deref(), parse_year)?,
            main_category: parse_selection(query.main_category.as_deref(), MainCategory::from_str)?,
            location: parse_selection(query.location.as_deref(), |raw| Ok(raw.to_owned()))?,
            person: parse_selection(query.person.as_deref(), |raw| Ok(raw.to_owned()))?,
            category: parse_selection(query.category.as_deref(), |raw| Ok(raw.to_owned()))?,
            expense_type: parse_selection(query.expense_type.as_deref(), ExpenseType::from_str)?,
            employee_id: parse_selection(query.employee_id.as_deref(), |raw| {
                raw.parse()
                    .map(UserID::new)
                    .map_err(|_| Error::InvalidFilter(format!("\"{raw}\" is not a user ID")))
            })?,
            date_range,
        }
        .normalize()
    }
}
