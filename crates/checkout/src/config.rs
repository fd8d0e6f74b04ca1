//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CHECKOUT_CURRENCY` - Basket currency when none is given (default: SEK)
//! - `CHECKOUT_SESSION_TTL_SECS` - Idle lifetime of a checkout session (default: 3600)
//! - `CHECKOUT_SESSION_CAPACITY` - Maximum live sessions kept in memory (default: 10000)
//! - `CHECKOUT_PAYMENT_TIMEOUT_SECS` - Deadline for one gateway charge (default: 30)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key; without it the sandbox gateway is used
//! - `STRIPE_PUBLISHABLE_KEY` - Stripe publishable key shown on the payment page;
//!   setting it without `STRIPE_SECRET_KEY` is an error
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use cleanjoy_core::CurrencyCode;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Prefixes every Stripe secret key starts with.
const STRIPE_SECRET_PREFIXES: &[&str] = &["sk_test_", "sk_live_", "rk_test_", "rk_live_"];

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Checkout engine configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Currency assumed for baskets and shipping charges
    pub currency: CurrencyCode,
    /// How long an untouched session is kept
    pub session_ttl: Duration,
    /// Upper bound on concurrently stored sessions
    pub session_capacity: u64,
    /// Deadline for a single charge against the gateway
    pub payment_timeout: Duration,
    /// Stripe settings; `None` selects the sandbox gateway
    pub stripe: Option<StripeConfig>,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::SEK,
            session_ttl: Duration::from_secs(3600),
            session_capacity: 10_000,
            payment_timeout: Duration::from_secs(30),
            stripe: None,
        }
    }
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (server-side only)
    pub secret_key: SecretString,
    /// Publishable key (safe to expose in browser)
    pub publishable_key: Option<String>,
    /// API base URL
    pub api_base: Url,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or the Stripe secret
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let currency = get_env_or_default("CHECKOUT_CURRENCY", "SEK")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_CURRENCY".to_string(), e))?;
        let session_ttl = Duration::from_secs(parse_env("CHECKOUT_SESSION_TTL_SECS", 3600)?);
        let session_capacity = parse_env("CHECKOUT_SESSION_CAPACITY", 10_000)?;
        let payment_timeout =
            Duration::from_secs(parse_env("CHECKOUT_PAYMENT_TIMEOUT_SECS", 30)?);
        if payment_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_PAYMENT_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let stripe = StripeConfig::from_env()?;

        Ok(Self {
            currency,
            session_ttl,
            session_capacity,
            payment_timeout,
            stripe,
        })
    }

    /// Publishable key rendered on the payment-details step, if any.
    #[must_use]
    pub fn publishable_key(&self) -> Option<&str> {
        self.stripe
            .as_ref()
            .and_then(|s| s.publishable_key.as_deref())
    }
}

impl StripeConfig {
    /// Stripe settings are optional as a whole; a secret key switches them on.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_values(
            get_optional_env("STRIPE_SECRET_KEY"),
            get_optional_env("STRIPE_PUBLISHABLE_KEY"),
            &get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com"),
        )
    }

    /// A publishable key without its secret is a half-configured account.
    fn from_values(
        secret: Option<String>,
        publishable_key: Option<String>,
        api_base: &str,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(secret) = secret else {
            if publishable_key.is_some() {
                return Err(ConfigError::MissingEnvVar("STRIPE_SECRET_KEY".to_string()));
            }
            return Ok(None);
        };
        validate_stripe_key(&secret, "STRIPE_SECRET_KEY")?;

        let api_base = api_base.parse::<Url>().map_err(|e| {
            ConfigError::InvalidEnvVar("STRIPE_API_BASE".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            secret_key: SecretString::from(secret),
            publishable_key,
            api_base,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a numeric environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= \
                 {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key from the Stripe dashboard."
            ),
        ));
    }

    Ok(())
}

/// Validate a Stripe secret key: known prefix, then strength of the remainder.
fn validate_stripe_key(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let Some(body) = STRIPE_SECRET_PREFIXES
        .iter()
        .find_map(|prefix| secret.strip_prefix(prefix))
    else {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must start with sk_test_, sk_live_, rk_test_ or rk_live_".to_string(),
        ));
    };
    validate_secret_strength(body, var_name)
}
