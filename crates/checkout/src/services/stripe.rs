//! Stripe charges API client.
//!
//! Creates one charge per request against `/v1/charges` using a card token
//! produced by Stripe's browser library. The request's idempotency key is
//! sent as the `Idempotency-Key` header so Stripe replays, rather than
//! repeats, a resubmitted charge.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{GatewayError, PaymentGateway};
use crate::config::StripeConfig;
use crate::models::ChargeRequest;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: SecretString,
    charges_url: Url,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("secret_key", &"[REDACTED]")
            .field("charges_url", &self.charges_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: String,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
}

impl StripeGateway {
    /// Create a new Stripe client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transient`] if the configured base URL cannot
    /// be joined with the charges path or the HTTP client cannot be built.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let charges_url = config
            .api_base
            .join("/v1/charges")
            .map_err(|e| GatewayError::Transient(format!("invalid Stripe API base: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            secret_key: config.secret_key.clone(),
            charges_url,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, request), fields(order_number = %request.order_number))]
    async fn charge(&self, request: &ChargeRequest) -> Result<String, GatewayError> {
        let amount = request
            .amount
            .to_minor_units()
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let params = charge_params(request, amount);

        let response = self
            .client
            .post(self.charges_url.clone())
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        if !status.is_success() {
            let error = classify_error(status, &body);
            warn!(status = %status, error = %error, "Stripe charge failed");
            return Err(error);
        }

        let charge: Charge = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Transient(format!("malformed charge response: {e}")))?;
        debug!(reference = %charge.id, "Stripe charge created");
        Ok(charge.id)
    }
}

/// Form fields for a charge.
fn charge_params(request: &ChargeRequest, amount_minor: i64) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), amount_minor.to_string()),
        (
            "currency".to_string(),
            request.amount.currency_code.code().to_ascii_lowercase(),
        ),
        ("source".to_string(), request.card_token.clone()),
        ("description".to_string(), request.description.clone()),
    ];
    params.extend(
        request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
    );
    params
}

/// Map a failed Stripe response to a gateway error.
///
/// Only `card_error` responses are declines; everything else is treated as
/// transient.
#[must_use]
pub fn classify_error(status: StatusCode, body: &str) -> GatewayError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) if error.kind == "card_error" => {
            let reason = error
                .decline_code
                .or(error.code)
                .or(error.message)
                .unwrap_or_else(|| "card_declined".to_string());
            GatewayError::Declined(reason)
        }
        Ok(ErrorEnvelope { error }) => GatewayError::Transient(format!(
            "{status}: {}",
            error.message.unwrap_or(error.kind)
        )),
        Err(_) => GatewayError::Transient(format!("{status}: unexpected response body")),
    }
}
