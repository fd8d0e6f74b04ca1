//! Bookable service types.

use core::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of service a customer can book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    HomeCleaning,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HomeCleaning => write!(f, "home_cleaning"),
        }
    }
}

/// The validated result of the details step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelection {
    pub kind: ServiceKind,
    /// Chosen option code, e.g. `30hr`.
    pub choice: String,
    /// Human-readable label for the chosen option.
    pub label: String,
}
