//! End-to-end tests for the CleanJoy checkout.
//!
//! Every test drives a [`CheckoutFlow`] through its public API with
//! in-memory collaborators, so no external services are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cleanjoy-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Step order, guards and shipping-method shortcuts
//! - `payments` - Charges, declines, retries and order placement
//! - `session_lifecycle` - Abandon, restart, events and address-book upkeep

#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::sync::mpsc::UnboundedReceiver;

use cleanjoy_checkout::events::{ChannelEvents, CheckoutStarted};
use cleanjoy_checkout::models::{
    AddressForm, AddressSource, Basket, BasketLine, ChargeRequest, CheckoutSession, Identity,
    PaymentSubmission, PlacedOrder, ServiceKind, ShippingMethod, ShippingMethodCode, UserAddress,
};
use cleanjoy_checkout::registry::{FormInput, SERVICE_CHOICE};
use cleanjoy_checkout::services::{
    AddressBook, GatewayError, InMemoryAddressBook, InMemoryOrderStore, OrderStore, PaymentGateway,
    SandboxGateway, StaticShippingRepository,
};
use cleanjoy_checkout::{
    Action, CheckoutConfig, CheckoutFlow, CheckoutRequest, Step, StepInput, Transition,
};
use cleanjoy_core::{BasketId, CurrencyCode, Email, OrderNumber, SessionId, UserId};

/// Email used by every test identity.
pub const EMAIL: &str = "kund@example.se";

/// Basket id used by [`basket`]; its order number is `100000 + id`.
pub const BASKET_ID: i32 = 42;

// =============================================================================
// Fixtures
// =============================================================================

/// A one-line basket: a three-hour cleaning at 800 SEK plus 200 SEK VAT.
#[must_use]
pub fn basket() -> Basket {
    basket_priced(dec!(800), dec!(200))
}

/// A one-line basket at the given price.
#[must_use]
pub fn basket_priced(price: rust_decimal::Decimal, tax: rust_decimal::Decimal) -> Basket {
    let mut basket = Basket::new(BasketId::new(BASKET_ID), CurrencyCode::SEK);
    basket.lines.push(BasketLine {
        sku: "clean-30hr".to_string(),
        title: "Home cleaning 3h".to_string(),
        quantity: 1,
        unit_price_excl_tax: price,
        unit_tax: tax,
        available: true,
    });
    basket
}

/// The order number the flow derives for [`basket`].
#[must_use]
pub const fn order_number() -> OrderNumber {
    OrderNumber::for_basket(BasketId::new(BASKET_ID))
}

#[must_use]
pub fn email() -> Email {
    Email::parse(EMAIL).expect("valid test email")
}

/// A signed-in customer.
#[must_use]
pub fn user(id: i32) -> Identity {
    Identity::User {
        id: UserId::new(id),
        email: email(),
    }
}

/// A shipping method with a travel charge.
#[must_use]
pub fn method(code: &str, charge_incl_tax: rust_decimal::Decimal) -> ShippingMethod {
    ShippingMethod {
        code: ShippingMethodCode::new(code),
        name: code.to_string(),
        charge_excl_tax: charge_incl_tax * dec!(0.8),
        charge_incl_tax,
    }
}

/// A complete Stockholm address.
#[must_use]
pub fn address_form() -> AddressForm {
    AddressForm {
        first_name: Some("Anna".to_string()),
        last_name: Some("Svensson".to_string()),
        line1: Some("Storgatan 1".to_string()),
        line4: Some("Stockholm".to_string()),
        postcode: Some("11122".to_string()),
        country: Some("SE".to_string()),
        ..AddressForm::default()
    }
}

/// Details-step submission choosing the three-hour slot.
#[must_use]
pub fn details_input(guest_email: Option<&str>) -> StepInput {
    let mut fields = FormInput::new();
    fields.insert(SERVICE_CHOICE.to_string(), "30hr".to_string());
    StepInput::Service {
        kind: ServiceKind::HomeCleaning,
        fields,
        guest_email: guest_email.map(str::to_owned),
    }
}

/// Address-step submission with freshly entered fields.
#[must_use]
pub fn address_input() -> StepInput {
    StepInput::Address {
        source: AddressSource::Fields(address_form()),
    }
}

/// Payment-step submission with a card token.
#[must_use]
pub fn payment_input(token: &str) -> StepInput {
    StepInput::Payment(PaymentSubmission {
        stripe_token: token.to_string(),
        stripe_email: email(),
    })
}

/// A gateway that always answers with the same reference.
#[derive(Debug)]
pub struct FixedGateway(pub &'static str);

#[async_trait]
impl PaymentGateway for FixedGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<String, GatewayError> {
        Ok(self.0.to_string())
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// How to assemble the flow under test.
pub struct TestSetup {
    pub identity: Identity,
    pub basket: Basket,
    pub shipping: StaticShippingRepository,
    pub sandbox: SandboxGateway,
    /// Replaces the sandbox gateway when set.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub address_book: Vec<UserAddress>,
    pub payment_timeout: Duration,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            identity: Identity::Guest,
            basket: basket(),
            shipping: StaticShippingRepository::default(),
            sandbox: SandboxGateway::new(),
            gateway: None,
            address_book: Vec::new(),
            payment_timeout: Duration::from_secs(5),
        }
    }
}

impl TestSetup {
    /// Build the flow and a context bound to one session.
    #[must_use]
    pub fn start(self) -> TestContext {
        let orders = InMemoryOrderStore::new();
        let book = Arc::new(InMemoryAddressBook::with_entries(self.address_book));
        let sandbox = Arc::new(self.sandbox);
        let (events, started) = ChannelEvents::new();

        let gateway: Arc<dyn PaymentGateway> = self
            .gateway
            .unwrap_or_else(|| Arc::clone(&sandbox) as Arc<dyn PaymentGateway>);

        let config = CheckoutConfig {
            payment_timeout: self.payment_timeout,
            ..CheckoutConfig::default()
        };
        let flow = CheckoutFlow::builder(config)
            .shipping(Arc::new(self.shipping))
            .gateway(gateway)
            .orders(Arc::new(orders.clone()))
            .address_book(Arc::clone(&book) as Arc<dyn AddressBook>)
            .events(Arc::new(events))
            .build()
            .expect("flow builds without Stripe");

        TestContext {
            flow,
            orders,
            sandbox,
            book,
            started,
            session_id: SessionId::new("integration-session"),
            identity: self.identity,
            basket: self.basket,
        }
    }
}

/// A flow plus handles on its in-memory collaborators.
pub struct TestContext {
    pub flow: CheckoutFlow,
    pub orders: InMemoryOrderStore,
    pub sandbox: Arc<SandboxGateway>,
    pub book: Arc<InMemoryAddressBook>,
    pub started: UnboundedReceiver<CheckoutStarted>,
    pub session_id: SessionId,
    pub identity: Identity,
    pub basket: Basket,
}

impl TestContext {
    /// A guest checking out [`basket`] with the default collaborators.
    #[must_use]
    pub fn guest() -> Self {
        TestSetup::default().start()
    }

    /// Send one request for this context's session.
    pub async fn request(&self, step: Step, action: Action) -> Transition {
        self.flow
            .handle(CheckoutRequest {
                session_id: self.session_id.clone(),
                identity: self.identity.clone(),
                basket: self.basket.clone(),
                step,
                action,
            })
            .await
            .expect("request is handled")
    }

    pub async fn view(&self, step: Step) -> Transition {
        self.request(step, Action::View).await
    }

    pub async fn submit(&self, step: Step, input: StepInput) -> Transition {
        self.request(step, Action::Submit(input)).await
    }

    /// Current session state.
    pub async fn session(&self) -> CheckoutSession {
        self.flow
            .session(&self.session_id)
            .await
            .expect("session store is available")
            .expect("session exists")
    }

    /// The order placed for [`basket`], if any.
    pub async fn order(&self) -> Option<PlacedOrder> {
        self.orders
            .get(order_number())
            .await
            .expect("order store is available")
    }

    /// Complete details and address so payment steps are reachable.
    pub async fn fill_details_and_address(&self) {
        let guest_email = (!self.identity.is_authenticated()).then_some(EMAIL);
        assert_eq!(
            self.submit(Step::Details, details_input(guest_email)).await,
            Transition::next(Step::Address)
        );
        assert_eq!(
            self.submit(Step::Address, address_input()).await,
            Transition::next(Step::ShippingMethod)
        );
    }

    /// Everything up to a payment-details view.
    pub async fn ready_to_pay(&self) {
        self.fill_details_and_address().await;
        assert_eq!(
            self.view(Step::ShippingMethod).await,
            Transition::next(Step::PaymentMethod)
        );
        assert_eq!(
            self.view(Step::PaymentMethod).await,
            Transition::next(Step::PaymentDetails)
        );
    }
}
