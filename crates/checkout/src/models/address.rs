//! Shipping address types.
//!
//! The field set is enumerated explicitly: only these fields are ever staged
//! into a checkout session or copied onto an order.

use serde::{Deserialize, Serialize};

use cleanjoy_core::{AddressId, UserId};

/// Canonical shipping-address record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub title: Option<Title>,
    pub first_name: String,
    pub last_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub line3: Option<String>,
    /// Town or city.
    pub line4: String,
    pub state: Option<String>,
    pub postcode: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    pub phone: Option<String>,
    /// Access instructions for the cleaner (door code, pets, keys).
    pub notes: Option<String>,
}

impl AddressRecord {
    /// Every field name a submitted address may carry.
    pub const FIELDS: [&'static str; 12] = [
        "title",
        "first_name",
        "last_name",
        "line1",
        "line2",
        "line3",
        "line4",
        "state",
        "postcode",
        "country",
        "phone",
        "notes",
    ];

    /// Fields that must be present and non-blank.
    pub const REQUIRED_FIELDS: [&'static str; 6] = [
        "first_name",
        "last_name",
        "line1",
        "line4",
        "postcode",
        "country",
    ];

    /// Recipient name, including the title when present.
    #[must_use]
    pub fn salutation(&self) -> String {
        match self.title {
            Some(title) => format!("{title} {} {}", self.first_name, self.last_name),
            None => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

/// Honorific for the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Title {
    Mr,
    Miss,
    Mrs,
    Ms,
    Dr,
}

impl std::fmt::Display for Title {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mr => "Mr",
            Self::Miss => "Miss",
            Self::Mrs => "Mrs",
            Self::Ms => "Ms",
            Self::Dr => "Dr",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Title {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
            "mr" => Ok(Self::Mr),
            "miss" => Ok(Self::Miss),
            "mrs" => Ok(Self::Mrs),
            "ms" => Ok(Self::Ms),
            "dr" => Ok(Self::Dr),
            _ => Err(format!("unknown title: {s}")),
        }
    }
}

/// Raw address fields as submitted by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressForm {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub line3: Option<String>,
    pub line4: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

impl AddressForm {
    /// Look up a submitted value by field name.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&str> {
        let value = match field {
            "title" => self.title.as_deref(),
            "first_name" => self.first_name.as_deref(),
            "last_name" => self.last_name.as_deref(),
            "line1" => self.line1.as_deref(),
            "line2" => self.line2.as_deref(),
            "line3" => self.line3.as_deref(),
            "line4" => self.line4.as_deref(),
            "state" => self.state.as_deref(),
            "postcode" => self.postcode.as_deref(),
            "country" => self.country.as_deref(),
            "phone" => self.phone.as_deref(),
            "notes" => self.notes.as_deref(),
            _ => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// An entry in a user's address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAddress {
    pub id: AddressId,
    pub owner: UserId,
    pub record: AddressRecord,
    pub is_default_for_shipping: bool,
}

/// Where the shipping address for this checkout comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    /// Ship to an existing address-book entry.
    BookEntry(AddressId),
    /// Ship to freshly entered fields.
    Fields(AddressForm),
}
