use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The role a platform member signs in as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Gives blood.
    Donor,

    /// Receives regular transfusions.
    Patient,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Donor => write!(f, "donor"),
            UserRole::Patient => write!(f, "patient"),
        }
    }
}

/// Error returned when parsing an invalid role string.
#[derive(Debug)]
pub struct UserRoleParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for UserRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown user role: {}", self.invalid_value)
    }
}

impl std::error::Error for UserRoleParseError {}

impl FromStr for UserRole {
    type Err = UserRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(UserRole::Donor),
            "patient" => Ok(UserRole::Patient),
            _ => Err(UserRoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}
