//! Who is checking out.

use serde::{Deserialize, Serialize};

use cleanjoy_core::{Email, UserId};

/// The requesting identity, resolved by the surrounding request layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// Anonymous checkout; an email must be captured before shipping.
    Guest,
    /// Signed-in customer with an address book.
    User { id: UserId, email: Email },
}

impl Identity {
    /// The user id, if signed in.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Guest => None,
            Self::User { id, .. } => Some(*id),
        }
    }

    /// The account email, if signed in.
    #[must_use]
    pub const fn email(&self) -> Option<&Email> {
        match self {
            Self::Guest => None,
            Self::User { email, .. } => Some(email),
        }
    }

    /// Whether the request is authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}
