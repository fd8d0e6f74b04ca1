//! Run a checkout scenario from a YAML file.
//!
//! A scenario describes the basket, who is checking out, the collaborators'
//! behaviour and the list of step requests to send. Each transition is
//! printed as JSON.
//!
//! ```yaml
//! identity: guest
//! basket:
//!   id: 42
//!   lines:
//!     - { sku: clean-30hr, title: Home cleaning 3h, quantity: 1,
//!         unit_price_excl_tax: "800", unit_tax: "200" }
//! steps:
//!   - step: details
//!   - step: details
//!     action:
//!       submit: { type: service, kind: home_cleaning,
//!                 fields: { service_choice: 30hr }, guest_email: kund@example.se }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cleanjoy_checkout::models::{Basket, Identity, ShippingMethod, UserAddress};
use cleanjoy_checkout::services::{InMemoryAddressBook, SandboxGateway, StaticShippingRepository};
use cleanjoy_checkout::{Action, CheckoutConfig, CheckoutFlow, CheckoutRequest, Step, Transition};
use cleanjoy_core::SessionId;

/// A scripted checkout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scenario {
    #[serde(default)]
    session_id: Option<SessionId>,
    #[serde(default)]
    identity: Option<Identity>,
    basket: Basket,
    #[serde(default)]
    address_book: Vec<UserAddress>,
    #[serde(default)]
    shipping: Option<ShippingScenario>,
    /// Sandbox gateway settings; when absent the configured gateway is used.
    #[serde(default)]
    gateway: Option<GatewayScenario>,
    steps: Vec<ScenarioStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ShippingScenario {
    #[serde(default)]
    methods: Option<Vec<ShippingMethod>>,
    /// Only serve addresses in these countries.
    #[serde(default)]
    countries: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GatewayScenario {
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    fail_next: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioStep {
    step: Step,
    /// Defaults to viewing the step.
    #[serde(default)]
    action: Option<Action>,
}

#[derive(Serialize)]
struct StepReport<'a> {
    request: usize,
    step: Step,
    transition: &'a Transition,
}

/// Run the scenario in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the configuration
/// is invalid, or a request fails outside the checkout's own recovery.
#[allow(clippy::print_stdout)]
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading scenario");
    let content = tokio::fs::read_to_string(path).await?;
    let scenario: Scenario = serde_yaml::from_str(&content)?;
    info!(steps = scenario.steps.len(), "Parsed scenario");

    let config = CheckoutConfig::from_env()?;
    if scenario.basket.currency != config.currency {
        warn!(
            basket = %scenario.basket.currency,
            configured = %config.currency,
            "Basket currency differs from configured currency"
        );
    }

    let flow = build_flow(config, &scenario)?;
    let session_id = scenario
        .session_id
        .clone()
        .unwrap_or_else(|| SessionId::new("cli-session"));
    let identity = scenario.identity.clone().unwrap_or(Identity::Guest);

    for (index, entry) in scenario.steps.into_iter().enumerate() {
        let transition = flow
            .handle(CheckoutRequest {
                session_id: session_id.clone(),
                identity: identity.clone(),
                basket: scenario.basket.clone(),
                step: entry.step,
                action: entry.action.unwrap_or(Action::View),
            })
            .await?;

        let report = StepReport {
            request: index + 1,
            step: entry.step,
            transition: &transition,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if let Some(session) = flow.session(&session_id).await? {
        println!("{}", serde_json::to_string_pretty(&session)?);
    }

    Ok(())
}

fn build_flow(
    config: CheckoutConfig,
    scenario: &Scenario,
) -> Result<CheckoutFlow, Box<dyn std::error::Error>> {
    let mut builder = CheckoutFlow::builder(config).address_book(Arc::new(
        InMemoryAddressBook::with_entries(scenario.address_book.clone()),
    ));

    if let Some(shipping) = &scenario.shipping {
        let mut repository = shipping
            .methods
            .clone()
            .map_or_else(StaticShippingRepository::default, StaticShippingRepository::new);
        if !shipping.countries.is_empty() {
            let countries: Vec<&str> = shipping.countries.iter().map(String::as_str).collect();
            repository = repository.serving(&countries);
        }
        builder = builder.shipping(Arc::new(repository));
    }

    if let Some(gateway) = &scenario.gateway {
        let mut sandbox = SandboxGateway::new().failing_next(gateway.fail_next);
        if gateway.delay_ms > 0 {
            sandbox = sandbox.with_delay(Duration::from_millis(gateway.delay_ms));
        }
        builder = builder.gateway(Arc::new(sandbox));
    }

    Ok(builder.build()?)
}
