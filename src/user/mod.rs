//! Users, registration and the endpoints that describe the caller's session.

mod core;
mod register;
mod session;

pub use core::{
    NewUser, Role, User, UserID, UserSummary, create_user, create_user_table,
    get_employee_directory, get_user_by_email, get_user_by_id, get_users_in_organization,
    parse_email, update_password,
};
pub use register::{register_admin, register_employee};
pub use session::{SessionView, get_employees, get_me};
