//! Service registry.
//!
//! Maps each [`ServiceKind`] to the form shown on the details step and the
//! validator that turns a submission into a [`ServiceSelection`]. The
//! registry is resolved once at request entry.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, FieldErrors};
use crate::models::{ServiceKind, ServiceSelection};

/// Submitted form values keyed by field name.
pub type FormInput = BTreeMap<String, String>;

/// Turns a submission into a selection, or field-level errors.
pub type Validator =
    fn(ServiceKind, &FormSchema, &FormInput) -> Result<ServiceSelection, FieldErrors>;

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Declarative description of one form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub choices: Vec<Choice>,
    pub initial: Option<String>,
}

impl FieldSpec {
    /// Label of the option with `value`, if it is one of the choices.
    #[must_use]
    pub fn choice_label(&self, value: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.value == value)
            .map(|c| c.label.as_str())
    }
}

/// The fields a service form consists of.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check required fields and choice membership.
    #[must_use]
    pub fn check(&self, input: &FormInput) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            match input.get(&field.name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
                None if field.required => errors.add(&field.name, "This field is required."),
                None => {}
                Some(value) if !field.choices.is_empty() && field.choice_label(value).is_none() => {
                    errors.add(
                        &field.name,
                        format!(
                            "Select a valid choice. {value} is not one of the available choices."
                        ),
                    );
                }
                Some(_) => {}
            }
        }
        errors
    }
}

/// A form schema paired with its validator.
#[derive(Debug, Clone)]
pub struct ServiceForm {
    pub schema: FormSchema,
    validator: Validator,
}

impl ServiceForm {
    #[must_use]
    pub const fn new(schema: FormSchema, validator: Validator) -> Self {
        Self { schema, validator }
    }

    /// Validate a submission for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Invalid`] with one entry per offending field.
    pub fn validate(
        &self,
        kind: ServiceKind,
        input: &FormInput,
    ) -> Result<ServiceSelection, CheckoutError> {
        (self.validator)(kind, &self.schema, input).map_err(CheckoutError::Invalid)
    }
}

/// Registry of bookable services.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    forms: HashMap<ServiceKind, ServiceForm>,
}

impl ServiceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            forms: HashMap::new(),
        }
    }

    /// Register (or replace) the form for a service kind.
    pub fn register(&mut self, kind: ServiceKind, form: ServiceForm) {
        self.forms.insert(kind, form);
    }

    /// Resolve the form for a service kind.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnknownService`] if nothing is registered.
    pub fn resolve(&self, kind: ServiceKind) -> Result<&ServiceForm, CheckoutError> {
        self.forms
            .get(&kind)
            .ok_or_else(|| CheckoutError::UnknownService(kind.to_string()))
    }

    /// Registered kinds.
    pub fn kinds(&self) -> impl Iterator<Item = ServiceKind> + '_ {
        self.forms.keys().copied()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(ServiceKind::HomeCleaning, home_cleaning_form());
        registry
    }
}

/// Name of the time-slot field on the home-cleaning form.
pub const SERVICE_CHOICE: &str = "service_choice";

const HOME_CLEANING_SLOTS: [(&str, &str); 5] = [
    ("20hr", "02:00 Hours (~35 m2)"),
    ("25hr", "02:30 Hours (~45 m2)"),
    ("30hr", "03:00 Hours (~55 m2)"),
    ("35hr", "03:30 Hours (~65 m2)"),
    ("40hr", "04:00 Hours (~75 m2)"),
];

/// The home-cleaning form: a required choice of visit length.
#[must_use]
pub fn home_cleaning_form() -> ServiceForm {
    let choices: Vec<Choice> = HOME_CLEANING_SLOTS
        .iter()
        .map(|(value, label)| Choice {
            value: (*value).to_string(),
            label: (*label).to_string(),
        })
        .collect();
    let schema = FormSchema {
        fields: vec![FieldSpec {
            name: SERVICE_CHOICE.to_string(),
            label: "Visit length".to_string(),
            required: true,
            choices,
            initial: Some("30hr".to_string()),
        }],
    };
    ServiceForm::new(schema, validate_single_choice)
}

fn validate_single_choice(
    kind: ServiceKind,
    schema: &FormSchema,
    input: &FormInput,
) -> Result<ServiceSelection, FieldErrors> {
    let errors = schema.check(input);
    if !errors.is_empty() {
        return Err(errors);
    }

    let selected = input
        .get(SERVICE_CHOICE)
        .map(|v| v.trim())
        .and_then(|value| {
            schema
                .field(SERVICE_CHOICE)
                .and_then(|f| f.choice_label(value))
                .map(|label| (value, label))
        });

    match selected {
        Some((choice, label)) => Ok(ServiceSelection {
            kind,
            choice: choice.to_string(),
            label: label.to_string(),
        }),
        None => {
            let mut errors = FieldErrors::new();
            errors.add(SERVICE_CHOICE, "This field is required.");
            Err(errors)
        }
    }
}
