//! The fixed hierarchy of main categories, locations and team members, and
//! the lookup that decides whether a category is a credit or a debit.

use std::{fmt::Display, str::FromStr};

use axum::Json;
use serde::{Deserialize, Serialize};
use time::Month;

use crate::Error;

/// The top level of the main category → location → person hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MainCategory {
    /// Expenses for events held at the memorial sites.
    #[serde(rename = "Event Based")]
    EventBased,
    /// Day to day running of an office.
    #[serde(rename = "Office Based")]
    OfficeBased,
    /// Engineering work carried out from an office.
    #[serde(rename = "Engineering Based")]
    EngineeringBased,
}

impl MainCategory {
    /// Every main category, in display order.
    pub const ALL: [MainCategory; 3] = [
        MainCategory::EventBased,
        MainCategory::OfficeBased,
        MainCategory::EngineeringBased,
    ];

    /// The display name, which is also the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            MainCategory::EventBased => "Event Based",
            MainCategory::OfficeBased => "Office Based",
            MainCategory::EngineeringBased => "Engineering Based",
        }
    }

    /// The locations that expenses under this main category may use.
    pub fn locations(&self) -> &'static [&'static str] {
        match self {
            MainCategory::EventBased => &[CHAITYABHOOMI, DEEKSHABHOOMI],
            MainCategory::OfficeBased => &[WARDHA, HYDERABAD],
            MainCategory::EngineeringBased => &[HYDERABAD, WARDHA],
        }
    }

    /// Whether `location` belongs to this main category.
    pub fn has_location(&self, location: &str) -> bool {
        self.locations().contains(&location)
    }
}

impl FromStr for MainCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MainCategory::ALL
            .into_iter()
            .find(|main_category| main_category.as_str() == s)
            .ok_or_else(|| Error::InvalidFilter(format!("unknown main category \"{s}\"")))
    }
}

impl Display for MainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const CHAITYABHOOMI: &str = "Chaityabhoomi";
const DEEKSHABHOOMI: &str = "Deekshabhoomi";
const HYDERABAD: &str = "Hyderabad";
const WARDHA: &str = "Wardha";

const HYDERABAD_TEAM: &[&str] = &["Mallesh", "Shignesh", "Rakshit", "Chandu", "Shreyas"];
const WARDHA_TEAM: &[&str] = &["Siddhant", "Mayur", "Apeksha", "Nikhil", "Vaibhav", "Prayag"];
// Events are staffed by both offices.
const EVENT_TEAM: &[&str] = &[
    "Mallesh", "Shignesh", "Rakshit", "Chandu", "Shreyas", "Siddhant", "Mayur", "Apeksha",
    "Nikhil", "Vaibhav", "Prayag",
];

/// The team members who may be tagged on an expense at `location`.
///
/// Unknown locations have no team members.
pub fn persons_at(location: &str) -> &'static [&'static str] {
    match location {
        HYDERABAD => HYDERABAD_TEAM,
        WARDHA => WARDHA_TEAM,
        CHAITYABHOOMI | DEEKSHABHOOMI => EVENT_TEAM,
        _ => &[],
    }
}

/// The categories offered when recording an expense.
///
/// Categories are free-form, so this list is a suggestion rather than a constraint.
pub const COMMON_CATEGORIES: &[&str] = &[
    "Grocery",
    "Household Work",
    "Computer Repair",
    "D-Mart",
    "Utilities",
    "Products and Services",
    "Salary",
    "Travel and Transport",
    "Internet Recharge",
    "Petrol",
    "Office Rent",
    "Electricity Bill",
    "Direct Payment",
    "UPI Payment",
    OTHER_CATEGORY,
];

/// The category whose expenses may carry a custom category instead.
pub const OTHER_CATEGORY: &str = "Others";

/// Categories that are always recorded as money coming in.
pub const AUTO_CREDIT_CATEGORIES: &[&str] = &["UPI Payment", "Direct Payment", "Salary"];

/// Whether an expense is money coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseType {
    /// Money coming in.
    Credit,
    /// Money going out.
    Debit,
}

impl ExpenseType {
    /// The type forced by `category`.
    ///
    /// This is the only place an expense type is decided.
    pub fn for_category(category: &str) -> Self {
        if AUTO_CREDIT_CATEGORIES.contains(&category) {
            ExpenseType::Credit
        } else {
            ExpenseType::Debit
        }
    }

    /// The stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseType::Credit => "Credit",
            ExpenseType::Debit => "Debit",
        }
    }
}

impl FromStr for ExpenseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit" => Ok(ExpenseType::Credit),
            "Debit" => Ok(ExpenseType::Debit),
            other => Err(Error::InvalidFilter(format!(
                "unknown expense type \"{other}\""
            ))),
        }
    }
}

impl Display for ExpenseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The English month names in calendar order.
pub fn month_names() -> Vec<String> {
    let mut month = Month::January;
    let mut names = Vec::with_capacity(12);

    for _ in 0..12 {
        names.push(month.to_string());
        month = month.next();
    }

    names
}

/// A location and the team members who work there.
#[derive(Debug, Serialize)]
pub struct LocationView {
    /// The location name.
    pub name: &'static str,
    /// See [persons_at].
    pub persons: &'static [&'static str],
}

/// A main category and its locations.
#[derive(Debug, Serialize)]
pub struct MainCategoryView {
    /// The main category's display name.
    pub name: &'static str,
    /// See [MainCategory::locations].
    pub locations: Vec<LocationView>,
}

/// Everything a client needs to build an expense form or a filter bar.
#[derive(Debug, Serialize)]
#[allow(missing_docs)]
pub struct Taxonomy {
    pub main_categories: Vec<MainCategoryView>,
    pub categories: &'static [&'static str],
    pub auto_credit_categories: &'static [&'static str],
    pub other_category: &'static str,
    pub months: Vec<String>,
}

/// Get the category hierarchy and lookups.
pub async fn get_taxonomy() -> Json<Taxonomy> {
    let main_categories = MainCategory::ALL
        .iter()
        .map(|main_category| MainCategoryView {
            name: main_category.as_str(),
            locations: main_category
                .locations()
                .iter()
                .map(|&location| LocationView {
                    name: location,
                    persons: persons_at(location),
                })
                .collect(),
        })
        .collect();

    Json(Taxonomy {
        main_categories,
        categories: COMMON_CATEGORIES,
        auto_credit_categories: AUTO_CREDIT_CATEGORIES,
        other_category: OTHER_CATEGORY,
        months: month_names(),
    })
}
