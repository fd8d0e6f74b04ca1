//! Abandon, restart, events and address-book upkeep.

use cleanjoy_checkout::flow::{ADDRESS_DELETED, ADDRESS_SAVED};
use cleanjoy_checkout::models::{
    AddressRecord, Identity, Message, ServiceKind, StepView, UserAddress,
};
use cleanjoy_checkout::sequencer::BASKET_ALREADY_ORDERED;
use cleanjoy_checkout::services::AddressBook;
use cleanjoy_checkout::{Action, CheckoutError, CheckoutRequest, Step, Transition};
use cleanjoy_core::{AddressId, UserId};
use cleanjoy_integration_tests::{
    TestContext, TestSetup, address_form, details_input, payment_input, user,
};

fn entry(id: i32, owner: i32) -> UserAddress {
    UserAddress {
        id: AddressId::new(id),
        owner: UserId::new(owner),
        record: AddressRecord {
            title: None,
            first_name: "Erik".to_string(),
            last_name: "Lind".to_string(),
            line1: "Sveavägen 1".to_string(),
            line2: None,
            line3: None,
            line4: "Stockholm".to_string(),
            state: None,
            postcode: "113 50".to_string(),
            country: "SE".to_string(),
            phone: None,
            notes: None,
        },
        is_default_for_shipping: true,
    }
}

#[tokio::test]
async fn test_checkout_started_emitted_once() {
    let mut ctx = TestContext::guest();

    ctx.submit(Step::Details, details_input(Some("kund@example.se")))
        .await;
    ctx.submit(Step::Details, details_input(Some("kund@example.se")))
        .await;

    let event = ctx.started.try_recv().unwrap();
    assert_eq!(event.session_id, ctx.session_id);
    assert_eq!(event.service, ServiceKind::HomeCleaning);
    assert_eq!(
        event.email.as_ref().map(cleanjoy_core::Email::as_str),
        Some("kund@example.se")
    );
    assert!(ctx.started.try_recv().is_err());
}

#[tokio::test]
async fn test_invalid_details_stay_on_step() {
    let mut ctx = TestContext::guest();

    match ctx.submit(Step::Details, details_input(None)).await {
        Transition::Render {
            view: StepView::Details { errors, .. },
            ..
        } => assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["guest_email"]),
        other => panic!("unexpected transition: {other:?}"),
    }
    assert!(ctx.session().await.guest_email().is_none());
    assert!(ctx.started.try_recv().is_err());
}

#[tokio::test]
async fn test_abandon_clears_progress() {
    let ctx = TestContext::guest();
    ctx.fill_details_and_address().await;
    assert!(ctx.session().await.is_shipping_address_set());

    ctx.flow.abandon(&ctx.session_id).await.unwrap();
    assert!(ctx.flow.session(&ctx.session_id).await.unwrap().is_none());

    // A fresh session starts without the captured email.
    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::redirect(
            Step::Details,
            Message::error("Please either sign in or enter your email address")
        )
    );
}

#[tokio::test]
async fn test_details_after_order_starts_new_checkout() {
    let ctx = TestContext::guest();
    ctx.ready_to_pay().await;
    ctx.submit(Step::PaymentDetails, payment_input("tok_visa"))
        .await;
    assert!(ctx.session().await.is_finalized());

    assert_eq!(
        ctx.view(Step::Address).await,
        Transition::Redirect {
            target: Step::ThankYou,
            message: None
        }
    );

    assert!(matches!(
        ctx.view(Step::Details).await,
        Transition::Render {
            view: StepView::Details { .. },
            ..
        }
    ));
    let session = ctx.session().await;
    assert!(!session.is_finalized());
    assert!(session.order_number().is_none());
    assert!(session.guest_email().is_none());
}

#[tokio::test]
async fn test_new_checkout_on_ordered_basket_is_refused() {
    let mut ctx = TestContext::guest();
    ctx.ready_to_pay().await;
    assert_eq!(
        ctx.submit(Step::PaymentDetails, payment_input("tok_visa")).await,
        Transition::next(Step::ThankYou)
    );

    ctx.view(Step::Details).await;
    for line in &mut ctx.basket.lines {
        line.quantity = 3;
    }
    ctx.ready_to_pay().await;

    assert_eq!(
        ctx.submit(Step::PaymentDetails, payment_input("tok_mastercard")).await,
        Transition::redirect(Step::Details, Message::error(BASKET_ALREADY_ORDERED))
    );
    assert_eq!(ctx.sandbox.charges_created(), 1);
    assert!(!ctx.session().await.is_finalized());

    let order = ctx.order().await.unwrap();
    assert!(order.lines.iter().all(|line| line.quantity == 1));
    assert_eq!(order.payment_sources.len(), 1);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let ctx = TestContext::guest();
    ctx.fill_details_and_address().await;

    let other = ctx
        .flow
        .handle(CheckoutRequest {
            session_id: "someone-else".into(),
            identity: Identity::Guest,
            basket: ctx.basket.clone(),
            step: Step::ShippingMethod,
            action: Action::View,
        })
        .await
        .unwrap();
    assert_eq!(other.destination(), Step::Details);
    assert!(ctx.session().await.is_shipping_address_set());
}

#[tokio::test]
async fn test_request_deserializes_from_json() {
    let ctx = TestContext::guest();
    let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
        "session_id": "json-session",
        "identity": "guest",
        "basket": {
            "id": 42,
            "lines": [{
                "sku": "clean-30hr",
                "title": "Home cleaning 3h",
                "quantity": 1,
                "unit_price_excl_tax": "800",
                "unit_tax": "200"
            }]
        },
        "step": "details",
        "action": {
            "submit": {
                "type": "service",
                "kind": "home_cleaning",
                "fields": { "service_choice": "25hr" },
                "guest_email": "kund@example.se"
            }
        }
    }))
    .unwrap();

    assert_eq!(
        ctx.flow.handle(request).await.unwrap(),
        Transition::next(Step::Address)
    );
    let session = ctx.flow.session(&"json-session".into()).await.unwrap().unwrap();
    assert_eq!(
        session.service().map(|s| s.label.as_str()),
        Some("02:30 Hours (~45 m2)")
    );
}

#[tokio::test]
async fn test_address_book_update_and_delete() {
    let ctx = TestSetup {
        identity: user(7),
        address_book: vec![entry(1, 7), entry(2, 8)],
        ..TestSetup::default()
    }
    .start();

    let mut form = address_form();
    form.line1 = Some("Drottninggatan 5".to_string());

    assert_eq!(
        ctx.flow
            .update_user_address(&user(7), AddressId::new(1), &form)
            .await
            .unwrap(),
        Message::info(ADDRESS_SAVED)
    );
    let saved = ctx
        .book
        .get(UserId::new(7), AddressId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.record.line1, "Drottninggatan 5");
    assert_eq!(saved.record.postcode, "111 22");

    assert!(matches!(
        ctx.flow
            .update_user_address(&user(7), AddressId::new(2), &form)
            .await,
        Err(CheckoutError::NotFound)
    ));
    assert!(matches!(
        ctx.flow
            .delete_user_address(&Identity::Guest, AddressId::new(1))
            .await,
        Err(CheckoutError::NotFound)
    ));

    assert_eq!(
        ctx.flow
            .delete_user_address(&user(7), AddressId::new(1))
            .await
            .unwrap(),
        Message::info(ADDRESS_DELETED)
    );
    assert!(ctx.book.addresses_for(UserId::new(7)).await.unwrap().is_empty());
    assert_eq!(ctx.book.addresses_for(UserId::new(8)).await.unwrap().len(), 1);
}
