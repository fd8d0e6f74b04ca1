//! Step order, guards and shipping-method shortcuts.

use rust_decimal_macros::dec;

use cleanjoy_checkout::models::{AddressRecord, AddressSource, Message, StepView, UserAddress};
use cleanjoy_checkout::services::StaticShippingRepository;
use cleanjoy_checkout::steps::shipping_method::{SHIPPING_NOT_PERMITTED, SHIPPING_UNAVAILABLE};
use cleanjoy_checkout::{Step, StepInput, Transition};
use cleanjoy_core::{AddressId, BasketId, CurrencyCode, UserId};
use cleanjoy_integration_tests::{
    TestContext, TestSetup, address_input, basket, details_input, method, payment_input, user,
};

fn stored_address(id: i32, owner: i32, default: bool) -> UserAddress {
    UserAddress {
        id: AddressId::new(id),
        owner: UserId::new(owner),
        record: AddressRecord {
            title: None,
            first_name: "Erik".to_string(),
            last_name: "Lind".to_string(),
            line1: format!("Sveavägen {id}"),
            line2: None,
            line3: None,
            line4: "Stockholm".to_string(),
            state: None,
            postcode: "113 50".to_string(),
            country: "SE".to_string(),
            phone: None,
            notes: None,
        },
        is_default_for_shipping: default,
    }
}

#[tokio::test]
async fn test_guest_checkout_happy_path() {
    let ctx = TestContext::guest();

    match ctx.view(Step::Details).await {
        Transition::Render {
            view: StepView::Details { email_required, .. },
            ..
        } => assert!(email_required),
        other => panic!("unexpected transition: {other:?}"),
    }

    ctx.ready_to_pay().await;

    match ctx.view(Step::PaymentDetails).await {
        Transition::Render {
            view:
                StepView::PaymentDetails {
                    total,
                    total_minor_units,
                    ..
                },
            ..
        } => {
            assert_eq!(total.incl_tax.amount, dec!(1000));
            assert_eq!(total_minor_units, 100_000);
        }
        other => panic!("unexpected transition: {other:?}"),
    }

    assert_eq!(
        ctx.submit(Step::PaymentDetails, payment_input("tok_visa")).await,
        Transition::next(Step::ThankYou)
    );

    match ctx.view(Step::ThankYou).await {
        Transition::Render {
            view: StepView::ThankYou { order },
            ..
        } => {
            assert_eq!(order.number, cleanjoy_integration_tests::order_number());
            assert_eq!(order.email.as_str(), cleanjoy_integration_tests::EMAIL);
            assert_eq!(
                order.service.as_ref().map(|s| s.choice.as_str()),
                Some("30hr")
            );
            assert_eq!(
                order.shipping_address.as_ref().map(|a| a.postcode.as_str()),
                Some("111 22")
            );
        }
        other => panic!("unexpected transition: {other:?}"),
    }
}

#[tokio::test]
async fn test_shipping_method_without_address_redirects_with_message() {
    let ctx = TestContext::guest();
    ctx.submit(Step::Details, details_input(Some("kund@example.se")))
        .await;

    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::redirect(
            Step::Address,
            Message::error("Please choose a shipping address")
        )
    );
}

#[tokio::test]
async fn test_guards_report_earliest_failure() {
    // Nothing captured and an empty basket: the basket check comes first.
    let ctx = TestSetup {
        basket: cleanjoy_checkout::models::Basket::new(BasketId::new(5), CurrencyCode::SEK),
        ..TestSetup::default()
    }
    .start();
    assert_eq!(
        ctx.view(Step::PaymentDetails).await,
        Transition::redirect(
            Step::Details,
            Message::error("You need to add some items to your basket to checkout")
        )
    );

    // Basket filled but no email: email is reported before the address.
    let ctx = TestContext::guest();
    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::redirect(
            Step::Details,
            Message::error("Please either sign in or enter your email address")
        )
    );
}

#[tokio::test]
async fn test_unavailable_basket_line_blocks_address_step() {
    let mut stale = basket();
    for line in &mut stale.lines {
        line.available = false;
    }
    let ctx = TestSetup {
        basket: stale,
        ..TestSetup::default()
    }
    .start();

    assert_eq!(
        ctx.view(Step::Address).await,
        Transition::redirect(
            Step::Details,
            Message::error("Your basket has items that can no longer be booked")
        )
    );
}

#[tokio::test]
async fn test_no_shipping_required_skips_method_step() {
    let mut basket = basket();
    basket.shipping_required = false;
    let ctx = TestSetup {
        basket,
        shipping: StaticShippingRepository::new(vec![method("a", dec!(50)), method("b", dec!(90))]),
        ..TestSetup::default()
    }
    .start();

    ctx.submit(Step::Details, details_input(Some("kund@example.se")))
        .await;
    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::next(Step::PaymentMethod)
    );
    let session = ctx.session().await;
    assert!(
        session
            .shipping_method_code()
            .is_some_and(|code| code.is_no_shipping_required())
    );
    assert!(session.shipping_address().is_none());

    assert_eq!(
        ctx.submit(Step::PaymentDetails, payment_input("tok_visa")).await,
        Transition::next(Step::ThankYou)
    );
    let order = ctx.order().await.unwrap();
    assert!(order.shipping_method.code.is_no_shipping_required());
    assert_eq!(order.total.incl_tax.amount, dec!(1000));
}

#[tokio::test]
async fn test_single_method_auto_selected() {
    let ctx = TestSetup {
        shipping: StaticShippingRepository::new(vec![method("travel-zone-1", dec!(50))]),
        ..TestSetup::default()
    }
    .start();
    ctx.fill_details_and_address().await;

    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::next(Step::PaymentMethod)
    );
    assert_eq!(
        ctx.session()
            .await
            .shipping_method_code()
            .map(|c| c.as_str().to_owned())
            .as_deref(),
        Some("travel-zone-1")
    );
}

#[tokio::test]
async fn test_no_methods_redirects_to_address() {
    let ctx = TestSetup {
        shipping: StaticShippingRepository::default().serving(&["NO"]),
        ..TestSetup::default()
    }
    .start();
    ctx.fill_details_and_address().await;

    assert_eq!(
        ctx.view(Step::ShippingMethod).await,
        Transition::redirect(Step::Address, Message::warning(SHIPPING_UNAVAILABLE))
    );
    assert!(!ctx.session().await.is_shipping_method_set());
}

#[tokio::test]
async fn test_several_methods_offered_and_chosen() {
    let ctx = TestSetup {
        shipping: StaticShippingRepository::new(vec![
            method("travel-zone-1", dec!(50)),
            method("travel-zone-2", dec!(100)),
        ]),
        ..TestSetup::default()
    }
    .start();
    ctx.fill_details_and_address().await;

    match ctx.view(Step::ShippingMethod).await {
        Transition::Render {
            view: StepView::ShippingMethod { methods },
            ..
        } => assert_eq!(methods.len(), 2),
        other => panic!("unexpected transition: {other:?}"),
    }

    match ctx
        .submit(
            Step::ShippingMethod,
            StepInput::ShippingMethod {
                code: "express".to_string(),
            },
        )
        .await
    {
        Transition::Render { messages, .. } => {
            assert_eq!(messages, vec![Message::error(SHIPPING_NOT_PERMITTED)]);
        }
        other => panic!("unexpected transition: {other:?}"),
    }

    assert_eq!(
        ctx.submit(
            Step::ShippingMethod,
            StepInput::ShippingMethod {
                code: "travel-zone-2".to_string(),
            },
        )
        .await,
        Transition::next(Step::PaymentMethod)
    );

    match ctx.view(Step::PaymentDetails).await {
        Transition::Render {
            view: StepView::PaymentDetails { total, .. },
            ..
        } => {
            assert_eq!(total.incl_tax.amount, dec!(1100));
            assert_eq!(total.shipping_incl_tax.amount, dec!(100));
        }
        other => panic!("unexpected transition: {other:?}"),
    }
}

#[tokio::test]
async fn test_signed_in_user_ships_to_book_entry() {
    let ctx = TestSetup {
        identity: user(7),
        address_book: vec![
            stored_address(1, 7, false),
            stored_address(2, 7, true),
            stored_address(3, 7, false),
            stored_address(4, 8, false),
        ],
        ..TestSetup::default()
    }
    .start();

    assert_eq!(
        ctx.submit(Step::Details, details_input(None)).await,
        Transition::next(Step::Address)
    );

    match ctx.view(Step::Address).await {
        Transition::Render {
            view: StepView::Address { addresses, .. },
            ..
        } => {
            let ids: Vec<AddressId> = addresses.iter().map(|a| a.id).collect();
            assert_eq!(ids, vec![AddressId::new(2), AddressId::new(1)]);
        }
        other => panic!("unexpected transition: {other:?}"),
    }

    // Someone else's entry is treated as not found.
    match ctx
        .submit(
            Step::Address,
            StepInput::Address {
                source: AddressSource::BookEntry(AddressId::new(4)),
            },
        )
        .await
    {
        Transition::Redirect { target, message } => {
            assert_eq!(target, Step::Address);
            assert!(message.is_some());
        }
        other => panic!("unexpected transition: {other:?}"),
    }
    assert!(!ctx.session().await.is_shipping_address_set());

    assert_eq!(
        ctx.submit(
            Step::Address,
            StepInput::Address {
                source: AddressSource::BookEntry(AddressId::new(3)),
            },
        )
        .await,
        Transition::next(Step::ShippingMethod)
    );
    let session = ctx.session().await;
    assert_eq!(session.user_address_id(), Some(AddressId::new(3)));
    assert_eq!(
        session.shipping_address().map(|a| a.line1.as_str()),
        Some("Sveavägen 3")
    );
}

#[tokio::test]
async fn test_invalid_address_fields_rendered() {
    let ctx = TestContext::guest();
    ctx.submit(Step::Details, details_input(Some("kund@example.se")))
        .await;

    let mut form = cleanjoy_integration_tests::address_form();
    form.postcode = Some("1234".to_string());
    form.line1 = None;

    match ctx
        .submit(
            Step::Address,
            StepInput::Address {
                source: AddressSource::Fields(form),
            },
        )
        .await
    {
        Transition::Render {
            view: StepView::Address { errors, .. },
            ..
        } => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["line1", "postcode"]);
        }
        other => panic!("unexpected transition: {other:?}"),
    }

    assert_eq!(
        ctx.submit(Step::Address, address_input()).await,
        Transition::next(Step::ShippingMethod)
    );
}
