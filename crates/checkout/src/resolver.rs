//! Shipping address resolution.
//!
//! Turns an [`AddressSource`] into a canonical [`AddressRecord`]. Book
//! entries must belong to the requesting user; submitted fields are checked
//! against the required-field list and per-field formats. A resolved address
//! is only staged into the session, never written to the address book.

use std::sync::Arc;

use tracing::{debug, instrument};

use cleanjoy_core::AddressId;

use crate::error::{CheckoutError, FieldErrors};
use crate::models::{
    AddressForm, AddressRecord, AddressSource, CheckoutSession, Identity, SessionError, Title,
};
use crate::services::AddressBook;

const MAX_FIELD_LENGTH: usize = 255;
const MIN_PHONE_DIGITS: usize = 6;
const REQUIRED: &str = "This field is required.";

/// A resolved shipping address and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAddress {
    /// Copied from the user's address book.
    BookEntry { id: AddressId, record: AddressRecord },
    /// Built from submitted fields.
    Entered(AddressRecord),
}

impl ResolvedAddress {
    #[must_use]
    pub const fn record(&self) -> &AddressRecord {
        match self {
            Self::BookEntry { record, .. } | Self::Entered(record) => record,
        }
    }

    /// Stage the address as the session's shipping address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Finalized`] if the order is already placed.
    pub fn stage_into(self, session: &mut CheckoutSession) -> Result<(), SessionError> {
        match self {
            Self::BookEntry { id, record } => session.ship_to_user_address(id, record),
            Self::Entered(record) => session.ship_to_new_address(record),
        }
    }
}

/// Resolves address choices against the address book.
#[derive(Clone)]
pub struct AddressResolver {
    book: Arc<dyn AddressBook>,
}

impl AddressResolver {
    #[must_use]
    pub fn new(book: Arc<dyn AddressBook>) -> Self {
        Self { book }
    }

    /// Resolve an address choice for `identity`.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::NotFound`] if a book entry does not exist or belongs
    ///   to someone else (guests own no entries)
    /// - [`CheckoutError::Invalid`] if submitted fields are missing or malformed
    /// - [`CheckoutError::Store`] if the address book is unavailable
    #[instrument(skip(self, source), fields(user_id = ?identity.user_id()))]
    pub async fn resolve(
        &self,
        identity: &Identity,
        source: &AddressSource,
    ) -> Result<ResolvedAddress, CheckoutError> {
        match source {
            AddressSource::BookEntry(id) => {
                let owner = identity.user_id().ok_or(CheckoutError::NotFound)?;
                let entry = self
                    .book
                    .get(owner, *id)
                    .await?
                    .ok_or(CheckoutError::NotFound)?;
                debug!(address_id = %id, "Resolved address-book entry");
                Ok(ResolvedAddress::BookEntry {
                    id: entry.id,
                    record: entry.record,
                })
            }
            AddressSource::Fields(form) => validate_fields(form)
                .map(ResolvedAddress::Entered)
                .map_err(CheckoutError::Invalid),
        }
    }
}

/// Validate submitted fields into a canonical record.
///
/// Errors are reported in field order.
///
/// # Errors
///
/// Returns every missing or malformed field.
pub fn validate_fields(form: &AddressForm) -> Result<AddressRecord, FieldErrors> {
    let mut errors = FieldErrors::new();

    for field in AddressRecord::FIELDS {
        let value = form.value(field);
        if value.is_none() && AddressRecord::REQUIRED_FIELDS.contains(&field) {
            errors.add(field, REQUIRED);
        } else if value.is_some_and(|v| v.chars().count() > MAX_FIELD_LENGTH) {
            errors.add(
                field,
                format!("Ensure this value has at most {MAX_FIELD_LENGTH} characters."),
            );
        }
    }

    let title = match form.value("title").map(str::parse::<Title>) {
        None => None,
        Some(Ok(title)) => Some(title),
        Some(Err(_)) => {
            errors.add("title", "Select a valid title.");
            None
        }
    };

    let country = form.value("country").map(str::to_ascii_uppercase);
    if let Some(code) = &country
        && !is_country_code(code)
    {
        errors.add("country", "Enter a two-letter country code.");
    }

    let postcode = form
        .value("postcode")
        .map(|raw| normalize_postcode(raw, country.as_deref().unwrap_or_default()));
    if matches!(postcode, Some(None)) {
        errors.add("postcode", "Enter a valid postcode.");
    }

    if let Some(phone) = form.value("phone")
        && !is_phone_number(phone)
    {
        errors.add("phone", "Enter a valid phone number.");
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let owned = |field: &str| form.value(field).map(str::to_string);
    Ok(AddressRecord {
        title,
        first_name: owned("first_name").unwrap_or_default(),
        last_name: owned("last_name").unwrap_or_default(),
        line1: owned("line1").unwrap_or_default(),
        line2: owned("line2"),
        line3: owned("line3"),
        line4: owned("line4").unwrap_or_default(),
        state: owned("state"),
        postcode: postcode.flatten().unwrap_or_default(),
        country: country.unwrap_or_default(),
        phone: owned("phone"),
        notes: owned("notes"),
    })
}

fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase())
}

fn is_phone_number(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    let plus_only_leading = phone.chars().skip(1).all(|c| c != '+');
    allowed && digits >= MIN_PHONE_DIGITS && plus_only_leading
}

/// Canonical postcode for `country`, or `None` if it is malformed.
fn normalize_postcode(raw: &str, country: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let prefix = format!("{country}-");
    let compact = compact.strip_prefix(prefix.as_str()).unwrap_or(&compact);

    let digits_only =
        |len: usize| compact.len() == len && compact.chars().all(|c| c.is_ascii_digit());
    match country {
        // Swedish postcodes are written "NNN NN".
        "SE" if digits_only(5) => compact
            .split_at_checked(3)
            .map(|(head, tail)| format!("{head} {tail}")),
        "FI" | "DE" if digits_only(5) => Some(compact.to_string()),
        "NO" | "DK" if digits_only(4) => Some(compact.to_string()),
        "SE" | "FI" | "DE" | "NO" | "DK" => None,
        _ if !compact.is_empty()
            && compact.len() <= 10
            && compact.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') =>
        {
            Some(raw.trim().to_ascii_uppercase())
        }
        _ => None,
    }
}
