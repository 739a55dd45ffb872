//! Checkout Demo
//!
//! Walks a guest buyer through checkout against the in-memory backend:
//! - Browse the catalog and fill the cart
//! - Enter contact details and continue as a guest
//! - Apply a discount code
//! - Submit and wait for the mobile-money payment to be confirmed
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=eventdesk_checkout=debug cargo run --bin checkout-demo
//! ```

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use eventdesk_checkout::api::MockCheckoutApi;
use eventdesk_checkout::catalog::{Event, EventCatalog, EventFilter, EventId, InMemoryEventCatalog};
use eventdesk_checkout::format::{format_date_range, format_price};
use eventdesk_checkout::session::{CartStore, InMemoryAuth, InMemoryCart};
use eventdesk_checkout::types::{ContactField, Discount, Money, PaymentStatus, PaymentStatusReport};
use eventdesk_checkout::wizard::{CheckoutSettings, PaymentProgress};
use eventdesk_checkout::{
    CheckoutAction, CheckoutConfig, CheckoutEnvironment, CheckoutState, CheckoutStep,
    checkout_store,
};
use eventdesk_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,eventdesk_checkout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = CheckoutConfig::from_env();
    // Keep the demo short regardless of the configured interval
    config.payment.poll_interval_ms = config.payment.poll_interval_ms.min(500);
    let currency = config.pricing.currency.clone();

    println!("\n=== Eventdesk checkout demo ===\n");

    // ========== Browse ==========

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let catalog = InMemoryEventCatalog::new(demo_events(clock.now()), Arc::clone(&clock))
        .with_latency(Duration::from_millis(150));

    let upcoming = catalog.list(&EventFilter::new().upcoming()).await?;
    println!("Upcoming events:");
    for event in &upcoming {
        println!(
            "  {:<24} {:<40} {}",
            event.title,
            format_date_range(event.starts_at, event.ends_at),
            format_price(event.price, &currency)
        );
    }

    let jazz = catalog.get(&EventId::new("evt-jazz")).await?;
    let cart = Arc::new(InMemoryCart::new());
    cart.add_item(jazz.to_cart_item(2));
    println!("\nAdded 2 x {} to the cart", jazz.title);

    // ========== Checkout ==========

    let api = Arc::new(
        MockCheckoutApi::new()
            .with_latency(Duration::from_millis(200))
            .with_discount(Discount {
                code: "EARLYBIRD".to_string(),
                percentage: 10.0,
                description: "Early bird 10% off".to_string(),
            })
            .with_statuses([
                PaymentStatusReport::new(PaymentStatus::Pending),
                PaymentStatusReport::new(PaymentStatus::Processing),
                PaymentStatusReport::new(PaymentStatus::Completed),
            ]),
    );

    let environment = CheckoutEnvironment::new(
        api,
        Arc::clone(&cart) as Arc<dyn CartStore>,
        Arc::new(InMemoryAuth::anonymous()),
        clock,
    )
    .with_settings(CheckoutSettings::from(&config));
    let tax_rate = environment.settings.tax_rate;
    let store = checkout_store(CheckoutState::new(), environment);
    let timeout = Duration::from_secs(10);

    for (field, value) in [
        (ContactField::FirstName, "Amina"),
        (ContactField::LastName, "Otieno"),
        (ContactField::Email, "amina@example.com"),
        (ContactField::Phone, "254712345678"),
    ] {
        store
            .send(CheckoutAction::UpdateContact {
                field,
                value: value.to_string(),
            })
            .await?;
    }

    store.send(CheckoutAction::ProceedToPayment).await?;
    let prompted = store.state(|state| state.auth_prompt).await;
    println!("Not logged in, offered login / register / guest: {prompted}");

    store
        .send_and_wait_for(
            CheckoutAction::ContinueAsGuest,
            |action| {
                matches!(
                    action,
                    CheckoutAction::GuestOrderCreated { .. } | CheckoutAction::GuestOrderFailed { .. }
                )
            },
            timeout,
        )
        .await
        .context("guest order was not created")?;
    let step = store.state(|state| state.step).await;
    println!("Continued as guest, now on step {} ({step})", step.number());

    store
        .send_and_wait_for(
            CheckoutAction::ApplyDiscount {
                code: "earlybird".to_string(),
            },
            |action| {
                matches!(
                    action,
                    CheckoutAction::DiscountApplied { .. } | CheckoutAction::DiscountRejected { .. }
                )
            },
            timeout,
        )
        .await
        .context("discount was not applied")?;

    let totals = store
        .state(|state| state.totals(&cart.items(), tax_rate))
        .await;
    println!("\nSubtotal {:>16}", format_price(totals.subtotal, &currency));
    println!("Discount {:>16}", format_price(totals.discount_amount, &currency));
    println!("Tax      {:>16}", format_price(totals.tax, &currency));
    println!("Total    {:>16}\n", format_price(totals.total, &currency));

    let mut actions = store.subscribe_actions();
    store.send(CheckoutAction::SubmitCheckout).await?;
    println!("Order submitted, waiting for the buyer to approve on their phone...");

    let settled = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match actions.recv().await {
                Ok(
                    action @ (CheckoutAction::PaymentSettled { .. }
                    | CheckoutAction::PaymentPollFailed { .. }
                    | CheckoutAction::CheckoutRejected { .. }),
                ) => return Ok(action),
                Ok(_) => {},
                Err(error) => return Err(error),
            }
        }
    })
    .await
    .context("payment was not confirmed in time")??;
    tracing::debug!(?settled, "Checkout finished");

    let (step, payment, confirmation) = store
        .state(|state| (state.step, state.payment.clone(), state.confirmation.clone()))
        .await;

    match (step, payment, confirmation) {
        (CheckoutStep::Complete, _, Some(confirmation)) => {
            println!(
                "Payment confirmed. Order {} paid {}",
                confirmation
                    .order_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string()),
                format_price(confirmation.totals.total, &currency)
            );
            println!("Cart is now empty: {}", cart.is_empty());
        },
        (_, PaymentProgress::Failed { message }, _) => println!("Payment failed: {message}"),
        (step, _, _) => println!("Checkout stopped on step {step}"),
    }

    store.send(CheckoutAction::Teardown).await?;
    store.shutdown();

    println!("\n=== Demo complete ===\n");
    Ok(())
}

fn demo_events(now: chrono::DateTime<chrono::Utc>) -> Vec<Event> {
    let at = |days: i64, hours: i64| now + ChronoDuration::days(days) + ChronoDuration::hours(hours);

    vec![
        Event {
            id: EventId::new("evt-jazz"),
            title: "Jazz Night".to_string(),
            description: "An evening of live jazz".to_string(),
            category: "music".to_string(),
            venue: "Alliance Française".to_string(),
            location: "Nairobi".to_string(),
            starts_at: at(7, 0),
            ends_at: Some(at(7, 3)),
            price: Money::from_major(1_500),
            tickets_available: 120,
            featured: true,
            image: String::new(),
        },
        Event {
            id: EventId::new("evt-run"),
            title: "City Fun Run".to_string(),
            description: "5km charity run".to_string(),
            category: "sports".to_string(),
            venue: "Uhuru Gardens".to_string(),
            location: "Nairobi".to_string(),
            starts_at: at(14, 0),
            ends_at: None,
            price: Money::ZERO,
            tickets_available: 500,
            featured: false,
            image: String::new(),
        },
    ]
}
