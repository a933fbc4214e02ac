use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, AsRefStr)]
pub enum Role {
    SuperAdmin = 1,
    Admin = 2,
    Hr = 3,
    Employee = 4,
    ApiUser = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::SuperAdmin),
            2 => Some(Role::Admin),
            3 => Some(Role::Hr),
            4 => Some(Role::Employee),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Roles allowed to submit and lock reports, and to read HR data.
pub const REPORT_MANAGERS: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Hr];
/// Roles allowed to run payroll.
pub const PAYROLL_RUNNERS: &[Role] = &[Role::SuperAdmin, Role::Admin];
