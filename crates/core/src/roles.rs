//! Well-known role names and the [`Role`] enum.
//!
//! These must match the `CHECK` constraint on `users.role`.

use serde::{Deserialize, Serialize};

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_INSTRUCTOR: &str = "instructor";
pub const ROLE_ADMIN: &str = "admin";

/// All valid role strings.
pub const VALID_ROLES: &[&str] = &[ROLE_STUDENT, ROLE_INSTRUCTOR, ROLE_ADMIN];

/// The single role a user holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            ROLE_STUDENT => Ok(Self::Student),
            ROLE_INSTRUCTOR => Ok(Self::Instructor),
            ROLE_ADMIN => Ok(Self::Admin),
            _ => Err(format!(
                "Invalid role '{s}'. Must be one of: {}",
                VALID_ROLES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => ROLE_STUDENT,
            Self::Instructor => ROLE_INSTRUCTOR,
            Self::Admin => ROLE_ADMIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_round_trip() {
        for s in VALID_ROLES {
            assert_eq!(Role::from_str_value(s).unwrap().as_str(), *s);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        let err = Role::from_str_value("superuser").unwrap_err();
        assert!(err.contains("Invalid role"));
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::Instructor).unwrap(),
            "\"instructor\""
        );
    }
}
