//! Payment coordination.
//!
//! Runs one [`PaymentAttempt`] per submission: charge the card through the
//! gateway under a deadline, then record the payment source and purchase
//! event against the order in a single store call. Declines and gateway
//! failures are reported back to the caller; nothing is retried here.
//!
//! The gateway idempotency key comes from the order number and the attempt
//! sequence. The sequence only advances once a card is declined, so a
//! resubmission after a gateway failure (possibly with a fresh single-use
//! token) replays the original charge instead of creating another one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use cleanjoy_core::{OrderNumber, PaymentEventKind, Price};

use crate::error::CheckoutError;
use crate::models::{
    ChargeRequest, PAYMENT_METHOD_STRIPE, PaymentAttempt, PaymentEvent, PaymentSource,
    PaymentSubmission,
};
use crate::services::{GatewayError, OrderStore, PaymentGateway};

/// What a successful charge produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub attempt: PaymentAttempt,
    pub source: PaymentSource,
    pub event: PaymentEvent,
    /// `false` when the reference had already been recorded for the order.
    pub newly_recorded: bool,
}

/// Charges cards and books the result against orders.
#[derive(Clone)]
pub struct PaymentCoordinator {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    timeout: Duration,
}

impl PaymentCoordinator {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            orders,
            timeout,
        }
    }

    /// Charge `amount` for an order.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::Declined`] if the card was refused; only the decline
    ///   is counted, so the next card is charged under a new key
    /// - [`CheckoutError::Gateway`] if the gateway failed or missed the deadline;
    ///   resubmitting is safe whatever card token it carries
    /// - [`CheckoutError::Store`] if the payment could not be recorded
    #[instrument(skip(self, submission), fields(order_number = %order_number, amount = %amount))]
    pub async fn charge(
        &self,
        order_number: OrderNumber,
        amount: Price,
        submission: &PaymentSubmission,
    ) -> Result<PaymentReceipt, CheckoutError> {
        let sequence = self
            .orders
            .declined_attempts(order_number)
            .await?
            .saturating_add(1);
        let mut attempt =
            PaymentAttempt::pending(order_number, sequence, amount, &submission.stripe_token);
        let request = ChargeRequest::for_attempt(&attempt, submission);

        let reference = match tokio::time::timeout(self.timeout, self.gateway.charge(&request))
            .await
        {
            Ok(Ok(reference)) => reference,
            Ok(Err(GatewayError::Declined(reason))) => {
                attempt.decline();
                self.orders.record_decline(order_number).await?;
                info!(
                    attempt_id = %attempt.id,
                    sequence = attempt.sequence,
                    reason = %reason,
                    "Payment declined"
                );
                return Err(CheckoutError::Declined { reason });
            }
            Ok(Err(GatewayError::Transient(detail))) => {
                attempt.error();
                warn!(attempt_id = %attempt.id, detail = %detail, "Payment gateway error");
                return Err(CheckoutError::Gateway(detail));
            }
            Err(_) => {
                attempt.error();
                warn!(
                    attempt_id = %attempt.id,
                    timeout = ?self.timeout,
                    "Payment gateway timed out"
                );
                return Err(CheckoutError::Gateway(format!(
                    "no response from payment gateway within {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        attempt.succeed(reference.clone());
        let source = PaymentSource {
            source_type: PAYMENT_METHOD_STRIPE.to_string(),
            currency: amount.currency_code,
            amount_allocated: amount.amount,
            amount_debited: amount.amount,
            reference: reference.clone(),
        };
        let event = PaymentEvent {
            kind: PaymentEventKind::Purchase,
            amount: amount.amount,
            reference,
            occurred_at: Utc::now(),
        };

        let newly_recorded = self
            .orders
            .record_payment(order_number, source.clone(), event.clone())
            .await?;
        if newly_recorded {
            info!(attempt_id = %attempt.id, reference = %source.reference, "Payment recorded");
        } else {
            info!(reference = %source.reference, "Payment already recorded, skipping");
        }

        Ok(PaymentReceipt {
            attempt,
            source,
            event,
            newly_recorded,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    use cleanjoy_core::{CurrencyCode, Email, PaymentOutcome};

    use super::*;
    use crate::services::{InMemoryOrderStore, SandboxGateway};

    struct FixedGateway(Result<String, GatewayError>);

    #[async_trait]
    impl PaymentGateway for FixedGateway {
        async fn charge(&self, _request: &ChargeRequest) -> Result<String, GatewayError> {
            self.0.clone()
        }
    }

    /// Answers from a script and remembers every idempotency key it saw.
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        keys: Mutex<Vec<String>>,
    }

    impl ScriptedGateway {
        fn new(replies: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                keys: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn charge(&self, request: &ChargeRequest) -> Result<String, GatewayError> {
            self.keys.lock().await.push(request.idempotency_key.clone());
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Transient("script exhausted".to_string())))
        }
    }

    fn submission(token: &str) -> PaymentSubmission {
        PaymentSubmission {
            stripe_token: token.to_string(),
            stripe_email: Email::parse("kund@example.se").unwrap(),
        }
    }

    fn amount() -> Price {
        Price::new(dec!(1250), CurrencyCode::SEK)
    }

    fn coordinator(
        gateway: impl PaymentGateway + 'static,
        orders: &InMemoryOrderStore,
    ) -> PaymentCoordinator {
        PaymentCoordinator::new(
            Arc::new(gateway),
            Arc::new(orders.clone()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_success_records_source_and_purchase_event() {
        let orders = InMemoryOrderStore::new();
        let coordinator = coordinator(FixedGateway(Ok("ch_123".to_string())), &orders);

        let receipt = coordinator
            .charge(OrderNumber::new(100_001), amount(), &submission("tok_visa"))
            .await
            .unwrap();

        assert_eq!(receipt.attempt.outcome, PaymentOutcome::Succeeded);
        assert_eq!(receipt.source.reference, "ch_123");
        assert_eq!(receipt.source.source_type, "Stripe");
        assert_eq!(receipt.source.amount_debited, dec!(1250));
        assert_eq!(receipt.event.kind, PaymentEventKind::Purchase);
        assert_eq!(receipt.event.amount, dec!(1250));
        assert!(receipt.newly_recorded);
    }

    #[tokio::test]
    async fn test_decline_surfaces_reason() {
        let orders = InMemoryOrderStore::new();
        let coordinator = coordinator(
            FixedGateway(Err(GatewayError::Declined("insufficient_funds".to_string()))),
            &orders,
        );

        let err = coordinator
            .charge(OrderNumber::new(100_001), amount(), &submission("tok_visa"))
            .await
            .unwrap_err();
        match err {
            CheckoutError::Declined { reason } => assert_eq!(reason, "insufficient_funds"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_error() {
        let orders = InMemoryOrderStore::new();
        let coordinator = PaymentCoordinator::new(
            Arc::new(SandboxGateway::new().with_delay(Duration::from_millis(200))),
            Arc::new(orders),
            Duration::from_millis(20),
        );

        let err = coordinator
            .charge(OrderNumber::new(100_001), amount(), &submission("tok_visa"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Gateway(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_retry_after_gateway_error_records_once() {
        let orders = InMemoryOrderStore::new();
        let gateway = Arc::new(SandboxGateway::new().failing_next(1));
        let coordinator = PaymentCoordinator::new(
            gateway.clone(),
            Arc::new(orders.clone()),
            Duration::from_secs(5),
        );
        let number = OrderNumber::new(100_001);

        assert!(matches!(
            coordinator.charge(number, amount(), &submission("tok_visa")).await,
            Err(CheckoutError::Gateway(_))
        ));
        let first = coordinator
            .charge(number, amount(), &submission("tok_visa"))
            .await
            .unwrap();
        let replay = coordinator
            .charge(number, amount(), &submission("tok_visa"))
            .await
            .unwrap();

        assert!(first.newly_recorded);
        assert!(!replay.newly_recorded);
        assert_eq!(first.source.reference, replay.source.reference);
        assert_eq!(gateway.charges_created(), 1);
    }

    #[tokio::test]
    async fn test_key_advances_only_after_decline() {
        let orders = InMemoryOrderStore::new();
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(GatewayError::Transient("connection reset".to_string())),
            Err(GatewayError::Declined("card_declined".to_string())),
            Ok("ch_1".to_string()),
        ]));
        let coordinator = PaymentCoordinator::new(
            gateway.clone(),
            Arc::new(orders.clone()),
            Duration::from_secs(5),
        );
        let number = OrderNumber::new(100_042);

        for token in ["tok_first", "tok_second", "tok_third"] {
            let _ = coordinator.charge(number, amount(), &submission(token)).await;
        }

        assert_eq!(
            *gateway.keys.lock().await,
            vec![
                "cleanjoy-order-100042-1".to_string(),
                "cleanjoy-order-100042-1".to_string(),
                "cleanjoy-order-100042-2".to_string(),
            ]
        );
        assert_eq!(orders.declined_attempts(number).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lost_response_then_new_token_charges_once() {
        let orders = InMemoryOrderStore::new();
        let gateway = Arc::new(SandboxGateway::new().losing_next_response(1));
        let coordinator = PaymentCoordinator::new(
            gateway.clone(),
            Arc::new(orders.clone()),
            Duration::from_secs(5),
        );
        let number = OrderNumber::new(100_042);

        assert!(matches!(
            coordinator.charge(number, amount(), &submission("tok_first")).await,
            Err(CheckoutError::Gateway(_))
        ));
        let receipt = coordinator
            .charge(number, amount(), &submission("tok_second"))
            .await
            .unwrap();

        assert_eq!(receipt.attempt.sequence, 1);
        assert_eq!(receipt.source.reference, "ch_sandbox_000001");
        assert_eq!(gateway.charges_created(), 1);
    }
}
