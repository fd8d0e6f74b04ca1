//! List bookable services and their form fields.

use cleanjoy_checkout::registry::ServiceRegistry;

/// Print every registered service with its fields and choices.
#[allow(clippy::print_stdout)]
pub fn list() {
    let registry = ServiceRegistry::default();
    let mut kinds: Vec<_> = registry.kinds().collect();
    kinds.sort_by_key(ToString::to_string);

    for kind in kinds {
        println!("{kind}");
        let Ok(form) = registry.resolve(kind) else {
            continue;
        };
        for field in &form.schema.fields {
            let required = if field.required { " (required)" } else { "" };
            println!("  {} - {}{required}", field.name, field.label);
            for choice in &field.choices {
                let initial = if field.initial.as_deref() == Some(choice.value.as_str()) {
                    " [default]"
                } else {
                    ""
                };
                println!("    {:<6} {}{initial}", choice.value, choice.label);
            }
        }
    }
}
